//! Optional `upk.toml` settings
//!
//! ```toml
//! flash = "16m"
//! version_dir = "versions"
//! package_id = "neuros-osd"
//! signature = "Neuros Technology International LLC"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpkError};
use crate::layout::FlashSize;
use crate::records::{NAMELEN, PACKAGE_ID, SIGNATURELEN, Signature, UPK_SIGNATURE, check_len};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "upk.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    pub flash: FlashSize,
    pub version_dir: PathBuf,
    pub package_id: String,
    pub signature: String,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            flash: FlashSize::default(),
            version_dir: PathBuf::from("."),
            package_id: PACKAGE_ID.to_string(),
            signature: UPK_SIGNATURE.to_string(),
        }
    }
}

impl PackConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| UpkError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| UpkError::open(path, e))?;
        let mut config = Self::from_toml(&text)?;
        // relative version directories follow the config file
        if config.version_dir.is_relative()
            && let Some(parent) = path.parent()
        {
            config.version_dir = parent.join(&config.version_dir);
        }
        debug!("loaded {}: {config:?}", path.display());
        Ok(config)
    }

    /// Load `upk.toml` from `dir` if it exists, defaults otherwise
    pub fn load_default(dir: &Path) -> Result<Self> {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_len("package id", &self.package_id, NAMELEN - 1)
            .map_err(|e| UpkError::config(e.to_string()))?;
        check_len("signature", &self.signature, SIGNATURELEN)
            .map_err(|e| UpkError::config(e.to_string()))?;
        Ok(())
    }

    pub fn signature(&self) -> Result<Signature> {
        Signature::new(self.signature.clone())
    }
}
