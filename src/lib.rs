//! # imgmeta
//!
//! Read and modify the EXIF, IPTC, XMP, ICC and comment metadata of JPEG,
//! PNG and WebP images, exchanged as plain `(key, value, type)` rows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgmeta::{Image, TagRow};
//!
//! fn main() -> imgmeta::Result<()> {
//!     let mut img = Image::open("photo.jpg")?;
//!
//!     for row in img.read_exif()? {
//!         println!("{:<40} {:<10} {}", row.key_str(), row.type_name, String::from_utf8_lossy(&row.value));
//!     }
//!
//!     img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "Jane")], "utf-8")?;
//!     img.modify_iptc(
//!         &[TagRow::array("Iptc.Application2.Keywords", &["tree", "sky", "lake"])],
//!         "utf-8",
//!     )?;
//!     img.modify_xmp(&[TagRow::scalar("Xmp.dc.title", "lang=\"x-default\" Lake")], "utf-8")?;
//!
//!     // An empty value deletes the tag.
//!     img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "")], "utf-8")?;
//!
//!     img.close();
//!     Ok(())
//! }
//! ```
//!
//! ## In-memory images
//!
//! ```rust,no_run
//! use imgmeta::{ByteBuffer, Image};
//!
//! # fn main() -> imgmeta::Result<()> {
//! let data = std::fs::read("photo.jpg")?;
//! let buffer = ByteBuffer::from_slice(&data)?;
//! let mut img = Image::from_buffer(&buffer)?;
//! img.modify_comment("hello", "utf-8")?;
//! let updated: Vec<u8> = img.raw_bytes()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Problems inside a metadata store do not abort an operation. They are
//! collected while it runs and returned together as [`Error::Store`]. The
//! [`LogLevel`] decides which of them are reported at all:
//! [`LogLevel::Mute`] silences errors too.
//!
//! ## Supported Formats
//!
//! | Format | EXIF | IPTC | XMP | Comment | ICC |
//! |--------|------|------|-----|---------|-----|
//! | JPEG | yes | yes | yes | yes | yes |
//! | PNG | yes | | yes | yes | yes |
//! | WebP | yes | | | | yes |
//!
//! ## Modules
//!
//! - [`image`]: the [`Image`] session
//! - [`rows`]: [`TagRow`] and the conversion to and from store entries
//! - [`store`]: typed EXIF, IPTC and XMP stores and their wire codecs
//! - [`container`]: metadata blocks inside JPEG, PNG and WebP files
//! - [`diagnostics`]: deferred error collection and log levels
//! - [`config`]: configuration loading and saving
//! - [`pipeline`]: format detection, image collection and backups

pub mod buffer;
pub mod config;
pub mod container;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod rows;
pub mod store;

pub use buffer::ByteBuffer;
pub use config::Config;
pub use diagnostics::{LogLevel, log_level, set_log_level};
pub use error::{Error, Result};
pub use crate::image::Image;
pub use rows::{TagRow, TagValue};
