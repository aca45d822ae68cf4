//! Supervisor settings
//!
//! Layered with the `config` crate: serde defaults, then an optional TOML file
//! (`<base-dir>/supervisor.toml`), then `PIXSTAR_SUPERVISOR_*` environment
//! variables. Relative paths resolve against the base directory.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pixstar_supervisor_core::application::constants::{
    DEFAULT_CONFIG_SOURCE_DIR, DEFAULT_FALLBACK_PATTERN, DEFAULT_GRACE_PERIOD, DEFAULT_PID_FILE,
    DEFAULT_PROVISIONED_FILES, DEFAULT_VENV_DIR, DEFAULT_WORKER_ARGS, DEFAULT_WORKER_PROGRAM,
};
use pixstar_supervisor_core::domain::LaunchSpec;
use pixstar_supervisor_infra_system::VirtualEnv;

pub const DEFAULT_SETTINGS_FILE: &str = "supervisor.toml";
pub const ENV_PREFIX: &str = "PIXSTAR_SUPERVISOR";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pid_file: String,
    pub worker_program: String,
    pub worker_args: Vec<String>,
    pub venv_dir: String,
    pub grace_period_ms: u64,
    pub fallback_pattern: String,
    pub single_instance: bool,
    pub config_source_dir: String,
    pub provisioned_files: Vec<String>,
    /// Supervisor log directory; the base directory when unset
    pub log_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pid_file: DEFAULT_PID_FILE.to_string(),
            worker_program: DEFAULT_WORKER_PROGRAM.to_string(),
            worker_args: DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect(),
            venv_dir: DEFAULT_VENV_DIR.to_string(),
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            fallback_pattern: DEFAULT_FALLBACK_PATTERN.to_string(),
            single_instance: false,
            config_source_dir: DEFAULT_CONFIG_SOURCE_DIR.to_string(),
            provisioned_files: DEFAULT_PROVISIONED_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    ///
    /// An explicitly given `config_file` must exist; the default one is optional.
    pub fn load(base_dir: &Path, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(base_dir, config_file, None)
    }

    /// Load settings with an explicit environment map (`None` reads the process env)
    pub fn load_with_env(
        base_dir: &Path,
        config_file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let (file, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (base_dir.join(DEFAULT_SETTINGS_FILE), false),
        };

        Config::builder()
            .add_source(File::from(file).required(required))
            // Values stay strings; typed fields convert on deserialize
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .list_separator(",")
                    .with_list_parse_key("worker_args")
                    .with_list_parse_key("provisioned_files")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn pid_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.pid_file)
    }

    pub fn venv_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.venv_dir)
    }

    pub fn config_source_path(&self, base_dir: &Path) -> PathBuf {
        resolve(base_dir, &self.config_source_dir)
    }

    pub fn log_path(&self, base_dir: &Path) -> PathBuf {
        match &self.log_dir {
            Some(dir) => resolve(base_dir, dir),
            None => base_dir.to_path_buf(),
        }
    }

    /// Worker launch description, with the local venv activated if present
    pub fn launch_spec(&self, base_dir: &Path, extra_args: &[String]) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.worker_program, base_dir)
            .with_args(self.worker_args.iter().chain(extra_args).cloned());

        if let Some(venv) = VirtualEnv::detect(self.venv_path(base_dir)) {
            venv.activate(&mut spec, std::env::var_os("PATH"));
        }
        spec
    }
}

/// Expand `~` and anchor relative paths at the base directory
pub fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

/// Default base directory: the directory containing the supervisor binary
pub fn default_base_dir() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Make a caller-supplied base directory absolute
pub fn absolute_base_dir(dir: PathBuf) -> std::io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir)
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}
