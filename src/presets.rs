// src/presets.rs
//
// Presets, the toolchain each one is bound to, and the configure / build /
// test commands run for it.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::process::Invocation;

/// Preset manifest expected at the project root.
pub const MANIFEST: &str = "CMakePresets.json";

/// Validation order: GCC and Clang first, they fail fastest on syntax errors.
pub const DEFAULT_PRESETS: &[&str] = &["gcc", "clang", "msvc", "intel"];

// ─── Toolchain ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    Gcc,
    Clang,
    Msvc,
    Intel,
    Other,
}

impl Toolchain {
    /// Infer the toolchain from a preset name (`intel`, `intel-release`, ...).
    #[must_use]
    pub fn from_preset_name(name: &str) -> Self {
        let n = name.to_ascii_lowercase();
        if n.starts_with("gcc") {
            Self::Gcc
        } else if n.starts_with("clang") {
            Self::Clang
        } else if n.starts_with("msvc") {
            Self::Msvc
        } else if n.starts_with("intel") || n.starts_with("icx") || n.starts_with("oneapi") {
            Self::Intel
        } else {
            Self::Other
        }
    }

    /// Whether the vendor environment must be imported before any step runs.
    #[must_use]
    pub const fn needs_vendor_env(self) -> bool {
        matches!(self, Self::Intel)
    }

    /// Multi-config generators need the configuration named for `ctest`.
    #[must_use]
    pub const fn is_multi_config(self) -> bool {
        matches!(self, Self::Msvc)
    }
}

// ─── Steps ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Configure,
    Build,
    Test,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Test => "tests",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub invocation: Invocation,
}

// ─── Preset ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub toolchain: Toolchain,
}

impl Preset {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            toolchain: Toolchain::from_preset_name(name),
        }
    }

    /// `cmake --preset`, `cmake --build --preset`, `ctest --preset`, in order.
    #[must_use]
    pub fn steps(&self, root: &Path, multi_config: &str) -> Vec<Step> {
        let configure = Invocation::new("cmake")
            .args(["--preset", self.name.as_str()])
            .current_dir(Some(root));

        let build = Invocation::new("cmake")
            .args(["--build", "--preset", self.name.as_str()])
            .current_dir(Some(root));

        let mut test = Invocation::new("ctest").args(["--preset", self.name.as_str()]);
        if self.toolchain.is_multi_config() {
            test = test.args(["-C", multi_config]);
        }
        let test = test.arg("--output-on-failure").current_dir(Some(root));

        vec![
            Step { kind: StepKind::Configure, invocation: configure },
            Step { kind: StepKind::Build, invocation: build },
            Step { kind: StepKind::Test, invocation: test },
        ]
    }
}

// ─── Manifest ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresetsFile {
    #[serde(default)]
    configure_presets: Vec<NamedPreset>,
}

#[derive(Debug, Deserialize)]
struct NamedPreset {
    name: String,
    #[serde(default)]
    hidden: bool,
}

/// Names of the visible configure presets declared in `path`.
///
/// Presets pulled in through `include` are not followed.
pub fn declared_presets(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: PresetsFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(file
        .configure_presets
        .into_iter()
        .filter(|p| !p.hidden)
        .map(|p| p.name)
        .collect())
}
