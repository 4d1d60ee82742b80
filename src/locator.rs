// src/locator.rs
//
// Toolchain root discovery.  An override variable wins outright; otherwise
// the first existing directory from an ordered candidate list is used.
// Absence is a normal outcome (the toolchain is simply not installed) and
// is reported as `None`, never as an error.

use std::path::{Path, PathBuf};

use crate::env_source::EnvSource;

/// Default Windows installation roots, in priority order.
pub const WINDOWS_CANDIDATES: [&str; 4] = [
    r"C:\Program Files (x86)\Intel\oneAPI",
    r"C:\Program Files\Intel\oneAPI",
    r"D:\Program Files (x86)\Intel\oneAPI",
    r"D:\Program Files\Intel\oneAPI",
];

/// Default POSIX installation root (system-wide install).
pub const POSIX_CANDIDATES: [&str; 1] = ["/opt/intel/oneapi"];

// ─── Filesystem probe ─────────────────────────────────────────────────────────

/// The two questions the locator asks of the filesystem.
pub trait Filesystem {
    fn is_dir(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl Filesystem for RealFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Environment variable naming the root directly (`ONEAPI_ROOT`).
    pub override_var: String,
    /// Installation roots, first existing one wins.
    pub candidates: Vec<PathBuf>,
    /// File name of the setup script beneath the root.
    pub script_name: String,
}

impl LocatorConfig {
    /// Platform defaults: `setvars.bat` and the Program Files variants on
    /// Windows, `setvars.sh` under `/opt/intel/oneapi` and `~/intel/oneapi`
    /// elsewhere.
    #[must_use]
    pub fn platform_default(env: &dyn EnvSource) -> Self {
        let (candidates, script_name) = if cfg!(windows) {
            (
                WINDOWS_CANDIDATES.iter().map(PathBuf::from).collect(),
                "setvars.bat",
            )
        } else {
            let mut v: Vec<PathBuf> = POSIX_CANDIDATES.iter().map(PathBuf::from).collect();
            if let Some(home) = env.var("HOME").filter(|h| !h.is_empty()) {
                v.push(Path::new(&home).join("intel").join("oneapi"));
            }
            (v, "setvars.sh")
        };

        Self {
            override_var: "ONEAPI_ROOT".to_owned(),
            candidates,
            script_name: script_name.to_owned(),
        }
    }
}

// ─── Locator ──────────────────────────────────────────────────────────────────

pub struct Locator<'a, F: Filesystem = RealFs> {
    config: &'a LocatorConfig,
    env: &'a dyn EnvSource,
    fs: F,
}

impl<'a> Locator<'a, RealFs> {
    #[must_use]
    pub fn new(config: &'a LocatorConfig, env: &'a dyn EnvSource) -> Self {
        Self::with_fs(config, env, RealFs)
    }
}

impl<'a, F: Filesystem> Locator<'a, F> {
    #[must_use]
    pub fn with_fs(config: &'a LocatorConfig, env: &'a dyn EnvSource, fs: F) -> Self {
        Self { config, env, fs }
    }

    /// Resolve the toolchain root.  Not cached; every call re-probes.
    #[must_use]
    pub fn locate_root(&self) -> Option<PathBuf> {
        self.from_override().or_else(|| self.from_candidates())
    }

    /// Resolve `<root>/<script_name>`, `None` if either is missing.
    #[must_use]
    pub fn locate_setup_script(&self) -> Option<PathBuf> {
        let script = self.locate_root()?.join(&self.config.script_name);
        self.fs.is_file(&script).then_some(script)
    }

    fn from_override(&self) -> Option<PathBuf> {
        let value = self.env.var(&self.config.override_var)?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let root = PathBuf::from(value);
        if self.fs.is_dir(&root) {
            log::debug!("toolchain root from {}: {}", self.config.override_var, root.display());
            Some(root)
        } else {
            log::debug!(
                "{} points at a missing directory: {}",
                self.config.override_var,
                root.display()
            );
            None
        }
    }

    fn from_candidates(&self) -> Option<PathBuf> {
        self.config
            .candidates
            .iter()
            .find(|p| self.fs.is_dir(p))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::env_source::MapEnv;

    /// In-memory tree: a set of directories and a set of files.
    #[derive(Default)]
    struct FakeFs {
        dirs: HashSet<PathBuf>,
        files: HashSet<PathBuf>,
    }

    impl FakeFs {
        fn dir(mut self, p: &str) -> Self {
            self.dirs.insert(PathBuf::from(p));
            self
        }

        fn file(mut self, p: &Path) -> Self {
            self.files.insert(p.to_path_buf());
            self
        }
    }

    impl Filesystem for FakeFs {
        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.contains(path)
        }

        fn is_file(&self, path: &Path) -> bool {
            self.files.contains(path)
        }
    }

    fn config(candidates: &[&str]) -> LocatorConfig {
        LocatorConfig {
            override_var: "ONEAPI_ROOT".to_owned(),
            candidates: candidates.iter().map(PathBuf::from).collect(),
            script_name: "setvars.bat".to_owned(),
        }
    }

    #[test]
    fn override_wins_over_candidates() {
        let cfg = config(&["/a", "/b"]);
        let env = MapEnv::new().with("ONEAPI_ROOT", "/custom");
        let fs = FakeFs::default().dir("/a").dir("/b").dir("/custom");

        let loc = Locator::with_fs(&cfg, &env, fs);
        assert_eq!(loc.locate_root(), Some(PathBuf::from("/custom")));
    }

    #[test]
    fn override_pointing_nowhere_falls_back_to_candidates() {
        let cfg = config(&["/a", "/b"]);
        let env = MapEnv::new().with("ONEAPI_ROOT", "/gone");
        let fs = FakeFs::default().dir("/b");

        let loc = Locator::with_fs(&cfg, &env, fs);
        assert_eq!(loc.locate_root(), Some(PathBuf::from("/b")));
    }

    #[test]
    fn first_existing_candidate_wins() {
        let cfg = config(&["/a", "/b", "/c"]);
        let env = MapEnv::new();
        let fs = FakeFs::default().dir("/b").dir("/c");

        let loc = Locator::with_fs(&cfg, &env, fs);
        assert_eq!(loc.locate_root(), Some(PathBuf::from("/b")));
    }

    #[test]
    fn nothing_installed_is_absent() {
        let cfg = config(&["/a", "/b"]);
        let env = MapEnv::new();

        let loc = Locator::with_fs(&cfg, &env, FakeFs::default());
        assert_eq!(loc.locate_root(), None);
        assert_eq!(loc.locate_setup_script(), None);
    }

    #[test]
    fn root_without_script_is_absent() {
        let cfg = config(&["/a"]);
        let env = MapEnv::new();
        let fs = FakeFs::default().dir("/a");

        let loc = Locator::with_fs(&cfg, &env, fs);
        assert_eq!(loc.locate_root(), Some(PathBuf::from("/a")));
        assert_eq!(loc.locate_setup_script(), None);
    }

    #[test]
    fn script_resolved_beneath_root() {
        let cfg = config(&["/a"]);
        let env = MapEnv::new();
        let script = Path::new("/a").join("setvars.bat");
        let fs = FakeFs::default().dir("/a").file(&script);

        let loc = Locator::with_fs(&cfg, &env, fs);
        assert_eq!(loc.locate_setup_script(), Some(script));
    }

    #[test]
    fn real_fs_finds_a_temp_install() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("oneapi");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("setvars.sh"), "true\n").unwrap();

        let cfg = LocatorConfig {
            override_var: "ONEAPI_ROOT".to_owned(),
            candidates: vec![tmp.path().join("missing"), root.clone()],
            script_name: "setvars.sh".to_owned(),
        };
        let env = MapEnv::new();

        let loc = Locator::new(&cfg, &env);
        assert_eq!(loc.locate_root(), Some(root.clone()));
        assert_eq!(loc.locate_setup_script(), Some(root.join("setvars.sh")));
    }
}
