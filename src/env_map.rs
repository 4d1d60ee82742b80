// src/env_map.rs
//
// Parsing and filtering of a captured environment dump (`set` / `env`).
//
// The dump format is not formally specified by whoever produces it, so the
// parser is line-oriented and lenient: each line is split on its first `=`
// and anything that does not look like `KEY=VALUE` is skipped.

use std::collections::btree_map::{self, BTreeMap};

/// Variable-name fragments relevant to compilation.  Matched as substrings of
/// the upper-cased key so compound names (`LIBPATH`, `CPLUS_INCLUDE_PATH`)
/// are kept too.
pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "INCLUDE",
    "LIB",
    "LIBPATH",
    "ONEAPI_ROOT",
    "IFORT_COMPILER",
    "ICPP_COMPILER",
    "CMAKE_PREFIX_PATH",
    "PKG_CONFIG_PATH",
    "PATH",
];

/// Keys the in-process import expects after filtering.
pub const EXPECTED_KEYS: &[&str] = &["INCLUDE", "ONEAPI_ROOT"];

/// Key the export stream cannot do without.
pub const CRITICAL_KEY: &str = "INCLUDE";

/// How keys are stored when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// Upper-cased key only.
    UpperOnly,
    /// Upper-cased key plus the key as printed, both pointing at the same
    /// value.  Some consumers of the environment are case-sensitive.
    UpperAndOriginal,
}

// ─── EnvironmentMap ───────────────────────────────────────────────────────────

/// Variable name → value.  Iteration order is the key order of the map and
/// is what rendering follows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: BTreeMap<String, String>,
}

impl EnvironmentMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Exact lookup, falling back to the upper-cased name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .or_else(|| self.vars.get(&name.to_uppercase()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.vars.iter()
    }

    /// Keep only keys whose upper-cased form contains one of `allow`.
    #[must_use]
    pub fn filter(&self, allow: &[&str]) -> Self {
        let vars = self
            .vars
            .iter()
            .filter(|(k, _)| is_allowed(k, allow))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { vars }
    }

    /// Names from `expected` that are not present.
    #[must_use]
    pub fn missing(&self, expected: &[&str]) -> Vec<String> {
        expected
            .iter()
            .filter(|k| !self.contains_key(k))
            .map(|k| (*k).to_owned())
            .collect()
    }
}

impl<'a> IntoIterator for &'a EnvironmentMap {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn is_allowed(key: &str, allow: &[&str]) -> bool {
    let upper = key.to_uppercase();
    allow.iter().any(|frag| upper.contains(frag))
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

/// Split one dump line into `(key, value)`, both trimmed.
///
/// Lines without `=`, with an empty key, or starting with `=` (cmd.exe's
/// per-drive `=C:=C:\...` entries) yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    if line.starts_with('=') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Parse a whole environment dump.  Later duplicates overwrite earlier ones.
#[must_use]
pub fn parse_env_dump(text: &str, mode: CaseMode) -> EnvironmentMap {
    let mut map = EnvironmentMap::new();
    for (key, value) in text.lines().filter_map(parse_line) {
        let upper = key.to_uppercase();
        if mode == CaseMode::UpperAndOriginal && upper != key {
            map.insert(key, value);
        }
        map.insert(upper, value);
    }
    map
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn well_formed_lines_are_recovered() {
        assert_eq!(parse_line("INCLUDE=C:\\X\\include"), Some(("INCLUDE", "C:\\X\\include")));
        assert_eq!(parse_line("  Path = a;b  "), Some(("Path", "a;b")));
        assert_eq!(parse_line("EMPTY="), Some(("EMPTY", "")));
    }

    #[test]
    fn value_keeps_embedded_equals() {
        assert_eq!(parse_line("OPTS=-DFOO=1 -DBAR=2"), Some(("OPTS", "-DFOO=1 -DBAR=2")));
    }

    #[test]
    fn malformed_lines_are_dropped() {
        assert_eq!(parse_line("no separator here"), None);
        assert_eq!(parse_line("=C:=C:\\work"), None);
        assert_eq!(parse_line("   =value"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn dump_upper_only() {
        let text = "Path=C:\\a;C:\\b\r\nINCLUDE=C:\\inc\r\n=C:=C:\\\r\nnoise\r\n";
        let map = parse_env_dump(text, CaseMode::UpperOnly);

        let keys: Vec<&str> = map.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["INCLUDE", "PATH"]);
        assert_eq!(map.get("PATH"), Some("C:\\a;C:\\b"));
    }

    #[test]
    fn dump_keeps_original_case_alongside_upper() {
        let map = parse_env_dump("Path=x\nLIB=y\n", CaseMode::UpperAndOriginal);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("Path"), Some("x"));
        assert_eq!(map.get("PATH"), Some("x"));
        assert_eq!(map.get("LIB"), Some("y"));
    }

    #[test]
    fn get_falls_back_to_upper_case() {
        let map = parse_env_dump("ONEAPI_ROOT=/opt/intel\n", CaseMode::UpperOnly);
        assert_eq!(map.get("oneapi_root"), Some("/opt/intel"));
    }

    #[test]
    fn filter_keeps_relevant_substrings() {
        let text = "ONEAPI_ROOT=C:\\IntelOneAPI\nINCLUDE=C:\\X\\include\nUNRELATED=1\nLIBPATH=C:\\lp\n";
        let map = parse_env_dump(text, CaseMode::UpperOnly).filter(DEFAULT_ALLOW_LIST);

        let keys: Vec<&str> = map.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["INCLUDE", "LIBPATH", "ONEAPI_ROOT"]);
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let map = parse_env_dump("Path=x\nTemp=y\n", CaseMode::UpperAndOriginal).filter(&["PATH"]);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("Path"));
        assert!(!map.contains_key("TEMP"));
    }

    #[test]
    fn filter_is_idempotent() {
        let text = "INCLUDE=a\nCPLUS_INCLUDE_PATH=b\nHOME=c\nPKG_CONFIG_PATH=d\nUSER=e\n";
        let once = parse_env_dump(text, CaseMode::UpperOnly).filter(DEFAULT_ALLOW_LIST);
        let twice = once.filter(DEFAULT_ALLOW_LIST);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_reports_absent_expected_keys() {
        let map = parse_env_dump("ONEAPI_ROOT=r\n", CaseMode::UpperOnly);
        assert_eq!(map.missing(EXPECTED_KEYS), vec!["INCLUDE".to_owned()]);
    }
}
