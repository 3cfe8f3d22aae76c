//! Error types for package assembly

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, UpkError>;

/// Everything that can abort a package build
///
/// Every variant is fatal: the output file is left as-is and must be
/// discarded by the caller.
#[derive(Debug, Error)]
pub enum UpkError {
    /// Missing flash variant, bad mode, missing arguments or a bad config file
    #[error("configuration error: {0}")]
    Config(String),

    /// A source file (image, blob or version file) could not be opened
    #[error("can't open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A string does not fit its fixed-width field
    #[error("{field} is too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A version file holds a longer string than allowed
    #[error("version in {file} can't be longer than {max} (got {len})")]
    VersionTooLong {
        file: &'static str,
        len: usize,
        max: usize,
    },

    /// The root filesystem does not fit the flash assigned to it
    #[error("{name} is {size} bytes, larger than the {capacity} bytes of flash assigned to it")]
    ImageTooLarge {
        name: String,
        size: u64,
        capacity: u64,
    },

    /// The hardware section can't be padded within the allowed block count
    #[error("hardware section is too big: {len} bytes (max {max})")]
    HardwareTooLarge { len: u64, max: u64 },

    /// No image was given
    #[error("no images to package")]
    MissingInput,

    /// Any other I/O failure, including short writes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpkError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an open failure with the offending path
    pub fn open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a field length error
    pub fn field_too_long(field: &'static str, len: usize, max: usize) -> Self {
        Self::FieldTooLong { field, len, max }
    }
}
