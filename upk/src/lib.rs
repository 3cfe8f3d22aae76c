//! # upk
//!
//! Builds firmware update packages (`.upk`) for flash based devices.
//!
//! A package holds optional hardware blobs, a signature block, a header with
//! an image table, the images themselves and a version record, closed by a
//! trailer giving the size of the hardware section.
//!
//! ## Example
//!
//! ```no_run
//! use upk::{FlashSize, ImageInput, PackageBuilder};
//!
//! let summary = PackageBuilder::new()
//!     .flash_size(FlashSize::Flash16M)
//!     .description("release 3")
//!     .name("r3.upk")
//!     .version_dir("versions")
//!     .image(ImageInput::from_path("u-boot.bin"))
//!     .image(ImageInput::from_path("uImage"))
//!     .image(ImageInput::from_path("root.cramfs"))
//!     .build_to_file("r3.upk")?;
//! summary.print_info();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[macro_use]
extern crate log;

pub mod builder;
pub mod cli;
pub mod config;
pub mod crc;
pub mod error;
pub mod hardware;
pub mod image_types;
pub mod layout;
pub mod records;
pub mod signature;
pub mod sink;
pub mod table;
pub mod version;
pub mod version_block;

// Re-export main types for convenience
pub use builder::{HardwareMode, PackageBuilder, PackageSummary};
pub use config::PackConfig;
pub use crc::{calculate_crc32, crc32};
pub use error::{Result, UpkError};
pub use image_types::ImageKind;
pub use layout::{FlashMap, FlashRange, FlashSize};
pub use records::{HardwareTrailer, ImageInfo, PackageHeader, Signature, VersionInfo};
pub use sink::PackageSink;
pub use table::ImageInput;
pub use version::{DirVersionSource, VersionFile, VersionSource};

/// Current version of upk
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
