//! Where the RSA key files live.
//!
//! Sources, lowest priority first: built-in defaults, a JSON file (given on
//! the command line or through `PNGSEAL_CONFIG`), then environment variables.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `PNGSEAL_CONFIG` | JSON file to read when none is given explicitly |
//! | `PNGSEAL_KEY_DIR` | directory holding both key files under their default names |
//! | `PNGSEAL_PUBLIC_KEY` | public key file, wins over `PNGSEAL_KEY_DIR` |
//! | `PNGSEAL_PRIVATE_KEY` | private key file, wins over `PNGSEAL_KEY_DIR` |

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ENV_CONFIG_PATH: &str = "PNGSEAL_CONFIG";
pub const ENV_KEY_DIR: &str = "PNGSEAL_KEY_DIR";
pub const ENV_PUBLIC_KEY: &str = "PNGSEAL_PUBLIC_KEY";
pub const ENV_PRIVATE_KEY: &str = "PNGSEAL_PRIVATE_KEY";

pub const PUBLIC_KEY_FILE_NAME: &str = "pngseal_pub.pem";
pub const PRIVATE_KEY_FILE_NAME: &str = "pngseal_prv.pem";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub public_key_path: String,
    pub private_key_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

impl Config {
    pub fn new(public_key_path: impl Into<String>, private_key_path: impl Into<String>) -> Self {
        Self {
            public_key_path: public_key_path.into(),
            private_key_path: private_key_path.into(),
        }
    }

    /// Both key files under their default names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join(PUBLIC_KEY_FILE_NAME).to_string_lossy(),
            dir.join(PRIVATE_KEY_FILE_NAME).to_string_lossy(),
        )
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Build the effective configuration from the process environment.
    ///
    /// An explicitly given `file` must exist; one named by `PNGSEAL_CONFIG`
    /// is skipped with a warning when absent.
    pub fn resolve(file: Option<&Path>) -> Result<Self> {
        Self::resolve_with(file, |name| env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with a custom variable lookup
    pub fn resolve_with<F>(file: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => {
                info!(path = %path.display(), "loading config");
                Self::from_file(path)?
            }
            None => match lookup(ENV_CONFIG_PATH).map(PathBuf::from) {
                Some(path) if path.is_file() => {
                    info!(path = %path.display(), "loading config named by {}", ENV_CONFIG_PATH);
                    Self::from_file(&path)?
                }
                Some(path) => {
                    warn!(path = %path.display(), "{} points to a missing file, using defaults", ENV_CONFIG_PATH);
                    Self::default()
                }
                None => {
                    debug!("using default key locations");
                    Self::default()
                }
            },
        };

        config.apply_overrides(lookup);
        config.check()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_KEY_DIR) {
            debug!(dir = %dir, "key directory from environment");
            *self = Self::in_dir(Path::new(&dir));
        }

        let fields: [(&str, &mut String); 2] = [
            (ENV_PUBLIC_KEY, &mut self.public_key_path),
            (ENV_PRIVATE_KEY, &mut self.private_key_path),
        ];
        for (name, slot) in fields {
            if let Some(value) = lookup(name) {
                debug!(var = name, value = %value, "key path from environment");
                *slot = value;
            }
        }
    }

    /// Reject unusable paths and warn about an exposed private key
    pub fn check(&self) -> Result<()> {
        if self.public_key_path.trim().is_empty() || self.private_key_path.trim().is_empty() {
            bail!("key file paths cannot be empty");
        }
        if Path::new(&self.public_key_path) == Path::new(&self.private_key_path) {
            bail!(
                "public and private keys must live in different files, both point to {}",
                self.public_key_path
            );
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(&self.private_key_path) {
                if meta.permissions().mode() & 0o077 != 0 {
                    warn!(
                        path = %self.private_key_path,
                        "private key file is readable by other users"
                    );
                }
            }
        }

        Ok(())
    }
}
