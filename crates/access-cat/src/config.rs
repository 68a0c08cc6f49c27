//! Resolve command line and settings file into access settings.
//!
//! Precedence: command line, then settings file, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use file_access::config::AccessConfigFile;
use file_access::{AccessConfig, AccessMode, AccessRequest};

/// Settings layered over the file by command line flags.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub access: Option<AccessMode>,
    pub caching_ms: Option<u64>,
    pub poll_slice_ms: Option<u64>,
}

/// One resolved session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub request: AccessRequest,
    pub access: AccessConfig,
}

impl SessionConfig {
    pub fn resolve(mrl: &str, overrides: &Overrides) -> Result<Self> {
        let file = match &overrides.config {
            Some(path) => load_file(path)?,
            None => AccessConfigFile::default(),
        };
        let mut access = file.apply(AccessConfig::default());
        if let Some(ms) = overrides.caching_ms {
            access.caching = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.poll_slice_ms {
            access.poll_slice = Duration::from_millis(ms);
        }

        let mut request = AccessRequest::parse(mrl);
        if let Some(mode) = overrides.access {
            request.mode = mode;
        }

        Ok(Self { request, access })
    }
}

fn load_file(path: &Path) -> Result<AccessConfigFile> {
    AccessConfigFile::load(path).with_context(|| format!("load config {:?}", path))
}
