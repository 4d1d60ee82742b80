// src/exports.rs
//
// Render an imported environment as `export` statements for a POSIX shell
// running on Windows (MSYS2 / Git Bash, Cygwin, WSL).  `PATH` is converted
// element-wise and prepended to the target shell's own `$PATH`; every other
// value is quoted verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::env_map::EnvironmentMap;

/// Path-list separator of the shell that produced the dump.
const SOURCE_LIST_SEP: &str = ";";
/// Path-list separator of the shell consuming the exports.
const TARGET_LIST_SEP: &str = ":";

// ─── Static regex — compiled once at first use ────────────────────────────────

static DRIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]):(.*)$").expect("DRIVE_RE is a valid static pattern")
});

// ─── Path style ───────────────────────────────────────────────────────────────

/// How the target shell spells a drive-letter path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PathStyle {
    /// MSYS2 / Git Bash: `C:\Foo` → `/c/Foo`
    #[default]
    Msys,
    /// Cygwin: `C:\Foo` → `/cygdrive/c/Foo`
    Cygwin,
    /// WSL: `C:\Foo` → `/mnt/c/Foo`
    Wsl,
}

impl PathStyle {
    fn drive_prefix(self) -> &'static str {
        match self {
            Self::Msys => "/",
            Self::Cygwin => "/cygdrive/",
            Self::Wsl => "/mnt/",
        }
    }
}

/// Translate one Windows path into the target shell's notation.
///
/// Backslashes become forward slashes; a leading drive letter becomes a
/// lower-case path component.  Anything else is left alone.
#[must_use]
pub fn win_to_posix(path: &str, style: PathStyle) -> String {
    let slashed = path.replace('\\', "/");
    match DRIVE_RE.captures(&slashed) {
        Some(caps) => format!(
            "{}{}{}",
            style.drive_prefix(),
            caps[1].to_ascii_lowercase(),
            &caps[2]
        ),
        None => slashed,
    }
}

/// Convert a `;`-separated Windows search path into a `:`-separated POSIX one.
/// Empty segments are dropped.
#[must_use]
pub fn convert_search_path(value: &str, style: PathStyle) -> String {
    value
        .split(SOURCE_LIST_SEP)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| win_to_posix(s, style))
        .collect::<Vec<_>>()
        .join(TARGET_LIST_SEP)
}

/// Escape a value for use inside a double-quoted shell word: backslash,
/// quote, `$` and backtick are the characters still special there.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ─── Rendering ────────────────────────────────────────────────────────────────

/// One statement per entry, in the map's iteration order.
#[must_use]
pub fn render_exports(env: &EnvironmentMap, style: PathStyle) -> Vec<String> {
    let mut out = Vec::with_capacity(env.len());
    for (key, value) in env {
        if key.eq_ignore_ascii_case("PATH") {
            let converted = convert_search_path(value, style);
            if converted.is_empty() {
                log::debug!("PATH has no usable segments; leaving target PATH alone");
                continue;
            }
            let converted = escape_value(&converted);
            out.push(format!("export PATH=\"{converted}{TARGET_LIST_SEP}$PATH\""));
        } else {
            out.push(format!("export {key}=\"{}\"", escape_value(value)));
        }
    }
    out
}
