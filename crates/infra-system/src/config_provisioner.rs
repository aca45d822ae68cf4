// Config provisioner: stage optional mounted config files into the worker directory
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid config file name {0:?}: must be a plain file name")]
    InvalidFileName(String),

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files copied and files skipped by one provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub copied: Vec<String>,
    pub missing: Vec<String>,
}

/// Copies a fixed set of optional files from a mounted directory
///
/// Existing copies in the target directory are overwritten. The first failed
/// copy aborts the run; files copied before it stay in place.
#[derive(Debug, Clone)]
pub struct ConfigProvisioner {
    source_dir: PathBuf,
    target_dir: PathBuf,
    files: Vec<String>,
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl ConfigProvisioner {
    /// # Errors
    /// - ProvisionError::InvalidFileName if a name is not a single path component
    pub fn new<I, S>(
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        files: I,
    ) -> Result<Self, ProvisionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: Vec<String> = files.into_iter().map(Into::into).collect();
        if let Some(bad) = files.iter().find(|name| !is_plain_file_name(name)) {
            return Err(ProvisionError::InvalidFileName(bad.clone()));
        }

        Ok(Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            files,
        })
    }

    pub fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        let mut report = ProvisionReport::default();

        for name in &self.files {
            let from = self.source_dir.join(name);
            if !from.is_file() {
                info!(file = %from.display(), "Optional config file not present, skipping");
                report.missing.push(name.clone());
                continue;
            }

            let to = self.target_dir.join(name);
            fs::copy(&from, &to).map_err(|source| ProvisionError::Copy {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

            info!(from = %from.display(), to = %to.display(), "Config file provisioned");
            report.copied.push(name.clone());
        }

        Ok(report)
    }
}
