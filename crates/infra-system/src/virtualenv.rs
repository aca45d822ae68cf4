// Python virtual environment activation for the worker
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;

use pixstar_supervisor_core::domain::LaunchSpec;

/// A local virtual environment the worker should run from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    /// Detect a virtual environment directory
    pub fn detect(root: impl Into<PathBuf>) -> Option<Self> {
        let root = root.into();
        root.is_dir().then_some(Self { root })
    }

    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    /// Apply the same changes `bin/activate` makes, scoped to the worker
    ///
    /// - `VIRTUAL_ENV` points at the venv
    /// - the venv's bin directory is prepended to `PATH`
    /// - `PYTHONHOME` is removed
    /// - a bare program name found in the venv's bin directory resolves to it
    pub fn activate(&self, spec: &mut LaunchSpec, inherited_path: Option<OsString>) {
        let bin_dir = self.bin_dir();

        let mut paths = vec![bin_dir.clone()];
        if let Some(path) = inherited_path {
            paths.extend(env::split_paths(&path));
        }
        if let Ok(joined) = env::join_paths(paths) {
            spec.env
                .insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }

        spec.env.insert(
            "VIRTUAL_ENV".to_string(),
            self.root.to_string_lossy().into_owned(),
        );
        if !spec.env_remove.iter().any(|key| key == "PYTHONHOME") {
            spec.env_remove.push("PYTHONHOME".to_string());
        }

        let is_bare_name = spec.program.components().count() == 1;
        if is_bare_name {
            let candidate = bin_dir.join(&spec.program);
            if candidate.is_file() {
                spec.program = candidate;
            }
        }

        info!(venv = %self.root.display(), program = %spec.program.display(), "Virtual environment activated");
    }
}
