//! The image session: one resource, its parsed metadata, and the
//! read/modify/clear operations over it.
//!
//! ```rust,no_run
//! use imgmeta::{Image, TagRow};
//!
//! let mut img = Image::open("photo.jpg")?;
//! for row in img.read_exif()? {
//!     println!("{} = {}", row.key_str(), String::from_utf8_lossy(&row.value));
//! }
//!
//! img.modify_iptc(&[TagRow::array("Iptc.Application2.Keywords", &["tree", "sky"])], "utf-8")?;
//! img.close();
//! # Ok::<(), imgmeta::Error>(())
//! ```

use std::path::{Path, PathBuf};

use crate::buffer::ByteBuffer;
use crate::config::Config;
use crate::container::Container;
use crate::diagnostics::{Diagnostics, LogLevel};
use crate::error::{Error, Result};
use crate::pipeline::{ImageKind, backup_file};
use crate::rows::{self, TagRow, TagValue};
use crate::store::exif::{ExifData, ExifKey, ExifValue};
use crate::store::iptc::{self, IptcData, IptcKey, IptcValue};
use crate::store::tiff;
use crate::store::xmp::{self, XmpData};

#[derive(Debug)]
enum Source {
    Path(PathBuf),
    Memory,
}

#[derive(Debug)]
struct Session {
    source: Source,
    container: Container,
    bytes: Vec<u8>,
    exif: ExifData,
    iptc: IptcData,
    xmp: XmpData,
    raw_xmp: String,
    comment: Vec<u8>,
    icc: Option<Vec<u8>>,
    backup_originals: bool,
    backed_up: bool,
}

/// An open image and its metadata.
///
/// All domains are parsed once when the image is opened. Every `modify_*`
/// and `clear_*` call writes the result back to the resource right away:
/// to the file for path-backed images, to the in-memory copy returned by
/// [`Image::raw_bytes`] otherwise.
///
/// Problems inside a store (unknown keys, values that do not parse, a tree
/// that cannot be serialized) do not stop an operation half-way. They are
/// collected and returned as one [`Error::Store`] when it finishes.
#[derive(Debug)]
pub struct Image {
    inner: Option<Session>,
    diag: Diagnostics,
}

impl Image {
    /// Open an image file with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &Config::default())
    }

    /// Open an image file, taking the log level and backup behavior from `config`.
    pub fn open_with(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Open(format!("{}: {e}", path.display())))?;
        log::debug!("Opening {} ({} bytes)", path.display(), data.len());

        let mut diag = Diagnostics::new(config.log_level);
        let mut session = Session::parse(data, Source::Path(path.to_path_buf()), &mut diag)?;
        session.backup_originals = config.backup_originals;
        Self::finish_open(session, diag)
    }

    /// Open an image held in memory. The bytes are copied.
    pub fn from_buffer(buffer: &ByteBuffer) -> Result<Self> {
        if buffer.is_released() {
            return Err(Error::Open("the byte buffer has been released".into()));
        }
        let mut diag = Diagnostics::default();
        let session = Session::parse(buffer.dump(), Source::Memory, &mut diag)?;
        Self::finish_open(session, diag)
    }

    fn finish_open(session: Session, mut diag: Diagnostics) -> Result<Self> {
        diag.check()?;
        Ok(Self {
            inner: Some(session),
            diag,
        })
    }

    /// Release the image. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            log::debug!("Image closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Verbosity of this session's diagnostics.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.diag.set_level(level);
    }

    pub fn log_level(&self) -> LogLevel {
        self.diag.level()
    }

    pub fn kind(&self) -> Result<ImageKind> {
        Ok(self.session()?.container.kind())
    }

    fn session(&self) -> Result<&Session> {
        self.inner.as_ref().ok_or(Error::UseAfterClose)
    }

    /// Run `f` on the open session, then drain diagnostics.
    fn with_session<T>(&mut self, f: impl FnOnce(&mut Session, &mut Diagnostics) -> Result<T>) -> Result<T> {
        let session = self.inner.as_mut().ok_or(Error::UseAfterClose)?;
        let out = f(session, &mut self.diag);
        // A hard error wins, but still leaves the diagnostics clean.
        let drained = self.diag.check();
        let out = out?;
        drained?;
        Ok(out)
    }

    /// Run a mutation, then write everything back.
    fn mutate(&mut self, f: impl FnOnce(&mut Session, &mut Diagnostics) -> Result<()>) -> Result<()> {
        self.with_session(|session, diag| {
            f(session, diag)?;
            session.persist(diag)
        })
    }

    // ── Read ─────────────────────────────────────────────────────────

    /// The image as currently held in memory, metadata changes included.
    pub fn raw_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.session()?.bytes.clone())
    }

    pub fn read_exif(&mut self) -> Result<Vec<TagRow>> {
        self.with_session(|s, _| Ok(rows::to_rows(s.exif.entries())))
    }

    pub fn read_iptc(&mut self) -> Result<Vec<TagRow>> {
        self.with_session(|s, _| Ok(rows::to_rows(&s.iptc)))
    }

    pub fn read_xmp(&mut self) -> Result<Vec<TagRow>> {
        self.with_session(|s, _| Ok(rows::to_rows(s.xmp.entries())))
    }

    /// The XMP packet exactly as it was found when the image was opened.
    pub fn read_raw_xmp(&mut self) -> Result<String> {
        self.with_session(|s, _| Ok(s.raw_xmp.clone()))
    }

    /// Comment bytes, empty when the image has none.
    pub fn read_comment(&mut self) -> Result<Vec<u8>> {
        self.with_session(|s, _| Ok(s.comment.clone()))
    }

    pub fn read_icc(&mut self) -> Result<Vec<u8>> {
        self.with_session(|s, _| s.icc.clone().ok_or(Error::NotPresent("ICC profile")))
    }

    // ── Modify ───────────────────────────────────────────────────────

    /// Set EXIF tags. Rows with an empty value delete the tag.
    pub fn modify_exif(&mut self, tags: &[TagRow], encoding: &str) -> Result<()> {
        let edits = rows::prepare(tags, encoding)?;
        self.mutate(|s, diag| {
            for edit in edits {
                let Some(key) = ExifKey::parse(&edit.key) else {
                    diag.error(format!("Invalid tag name or ifdId `{}'", edit.key));
                    continue;
                };
                let entries = s.exif.entries_mut();
                entries.erase(&key);
                if edit.is_delete() {
                    continue;
                }
                match ExifValue::parse(key.default_type(), &edit.value) {
                    Ok(value) => entries.add(key, value),
                    Err(e) => diag.error(e),
                }
            }
            Ok(())
        })
    }

    /// Set IPTC datasets. Every existing dataset with the row's key is
    /// removed first; an `"array"` row then adds one dataset per piece.
    pub fn modify_iptc(&mut self, tags: &[TagRow], encoding: &str) -> Result<()> {
        let edits = rows::prepare(tags, encoding)?;
        self.mutate(|s, diag| {
            for edit in edits {
                let Some(key) = IptcKey::parse(&edit.key) else {
                    diag.error(format!("Invalid record name or dataset name `{}'", edit.key));
                    continue;
                };
                s.iptc.erase_all(&key);
                if edit.is_delete() {
                    continue;
                }
                let pieces = match edit.into_value() {
                    TagValue::Scalar(v) => vec![v],
                    TagValue::Array(pieces) => pieces,
                };
                for piece in pieces {
                    match IptcValue::parse(key.default_type(), &piece) {
                        Ok(value) => s.iptc.add(key, value),
                        Err(e) => diag.error(e),
                    }
                }
            }
            Ok(())
        })
    }

    /// Set XMP properties. Array-typed properties collect each piece of an
    /// `"array"` row; text properties keep the last one.
    pub fn modify_xmp(&mut self, tags: &[TagRow], encoding: &str) -> Result<()> {
        let edits = rows::prepare(tags, encoding)?;
        self.mutate(|s, diag| {
            for edit in edits {
                let key = match s.xmp.key(&edit.key) {
                    Ok(key) => key,
                    Err(e) => {
                        diag.error(e);
                        continue;
                    }
                };
                s.xmp.entries_mut().erase(&key);
                if edit.is_delete() {
                    continue;
                }
                let pieces = match edit.into_value() {
                    TagValue::Scalar(v) => vec![v],
                    TagValue::Array(pieces) => pieces,
                };
                for piece in pieces {
                    if let Err(e) = s.xmp.assign(key.clone(), &piece) {
                        diag.error(e);
                        break;
                    }
                }
            }
            Ok(())
        })
    }

    /// Replace the comment. An empty comment removes it.
    pub fn modify_comment(&mut self, comment: &str, encoding: &str) -> Result<()> {
        let bytes = rows::encoding::encode(comment, encoding)?;
        self.mutate(|s, _| {
            s.comment = bytes;
            Ok(())
        })
    }

    /// Replace the ICC profile. An empty profile removes it.
    pub fn modify_icc(&mut self, profile: &[u8]) -> Result<()> {
        let profile = (!profile.is_empty()).then(|| profile.to_vec());
        self.mutate(|s, _| {
            s.icc = profile;
            Ok(())
        })
    }

    // ── Clear ────────────────────────────────────────────────────────

    pub fn clear_exif(&mut self) -> Result<()> {
        self.mutate(|s, _| {
            s.exif.clear();
            Ok(())
        })
    }

    pub fn clear_iptc(&mut self) -> Result<()> {
        self.mutate(|s, _| {
            s.iptc.clear();
            Ok(())
        })
    }

    pub fn clear_xmp(&mut self) -> Result<()> {
        self.mutate(|s, _| {
            s.xmp.clear();
            Ok(())
        })
    }

    pub fn clear_comment(&mut self) -> Result<()> {
        self.mutate(|s, _| {
            s.comment.clear();
            Ok(())
        })
    }

    pub fn clear_icc(&mut self) -> Result<()> {
        self.mutate(|s, _| {
            s.icc = None;
            Ok(())
        })
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.close();
    }
}

impl Session {
    fn parse(data: Vec<u8>, source: Source, diag: &mut Diagnostics) -> Result<Self> {
        let container = Container::parse(data.clone())?;

        let exif = match container.exif() {
            Some(block) => tiff::decode(&block, diag).unwrap_or_else(|| {
                diag.warn("Failed to decode Exif metadata.");
                ExifData::new()
            }),
            None => ExifData::new(),
        };

        let iptc = match container.iptc() {
            Some(block) => iptc::decode(&block, diag).unwrap_or_else(|| {
                diag.warn("Failed to decode IPTC metadata.");
                IptcData::new()
            }),
            None => IptcData::new(),
        };

        let mut raw_xmp = String::new();
        let xmp = match container.xmp() {
            Some(block) => match String::from_utf8(block) {
                Ok(packet) => {
                    let parsed = xmp::decode(&packet, diag);
                    raw_xmp = packet;
                    parsed.unwrap_or_else(|| {
                        diag.warn("Failed to decode XMP metadata.");
                        XmpData::new()
                    })
                }
                Err(_) => {
                    diag.warn("Failed to decode XMP metadata.");
                    XmpData::new()
                }
            },
            None => XmpData::new(),
        };

        let comment = container.comment().unwrap_or_default();
        let icc = container.icc();

        log::debug!(
            "Parsed {} image: {} EXIF, {} IPTC, {} XMP entries",
            container.kind().name(),
            exif.entries().len(),
            iptc.len(),
            xmp.entries().len()
        );

        Ok(Self {
            source,
            container,
            bytes: data,
            exif,
            iptc,
            xmp,
            raw_xmp,
            comment,
            icc,
            backup_originals: false,
            backed_up: false,
        })
    }

    /// Encode every domain into the container and write it out.
    fn persist(&mut self, diag: &mut Diagnostics) -> Result<()> {
        let tiff = if self.exif.is_empty() {
            None
        } else {
            tiff::encode(&self.exif)
        };
        self.container.set_exif(tiff, diag);

        self.container.set_iptc(&iptc::encode(&self.iptc), diag);

        if self.xmp.is_empty() {
            self.container.set_xmp(None, diag);
        } else if let Some(packet) = xmp::encode(&self.xmp, diag) {
            self.container.set_xmp(Some(packet.as_bytes()), diag);
        }

        self.container.set_comment(&self.comment, diag);
        self.container.set_icc(self.icc.as_deref());

        self.bytes = self.container.to_bytes();

        if let Source::Path(path) = &self.source {
            if self.backup_originals && !self.backed_up {
                backup_file(path)?;
                self.backed_up = true;
            }
            std::fs::write(path, &self.bytes)?;
            log::debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_image() -> Image {
        let mut buf = Vec::new();
        ::image::RgbImage::new(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut buf), ::image::ImageFormat::Jpeg)
            .unwrap();
        Image::from_buffer(&ByteBuffer::from_slice(&buf).unwrap()).unwrap()
    }

    #[test]
    fn fresh_image_is_empty() {
        let mut img = jpeg_image();
        assert!(img.read_exif().unwrap().is_empty());
        assert!(img.read_iptc().unwrap().is_empty());
        assert!(img.read_xmp().unwrap().is_empty());
        assert!(img.read_comment().unwrap().is_empty());
        assert_eq!(img.read_raw_xmp().unwrap(), "");
        assert!(matches!(img.read_icc(), Err(Error::NotPresent(_))));
    }

    #[test]
    fn bad_rows_do_not_stop_the_batch() {
        let mut img = jpeg_image();
        let err = img
            .modify_exif(
                &[
                    TagRow::scalar("Exif.Image.NoSuchTag", "x"),
                    TagRow::scalar("Exif.Image.Artist", "someone"),
                ],
                "utf-8",
            )
            .unwrap_err();
        assert!(matches!(err, Error::Store(ref m) if m.contains("NoSuchTag")));

        let rows = img.read_exif().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, b"someone".to_vec());
    }

    #[test]
    fn unparsable_value_is_reported() {
        let mut img = jpeg_image();
        let err = img
            .modify_exif(&[TagRow::scalar("Exif.Image.XResolution", "wide")], "utf-8")
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(img.read_exif().unwrap().is_empty());
    }

    #[test]
    fn unknown_encoding_fails_before_any_change() {
        let mut img = jpeg_image();
        let err = img
            .modify_exif(&[TagRow::scalar("Exif.Image.Artist", "a")], "klingon")
            .unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(img.read_exif().unwrap().is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let mut img = jpeg_image();
        img.close();
        img.close();
        assert!(img.is_closed());
        assert!(matches!(img.read_exif(), Err(Error::UseAfterClose)));
        assert!(matches!(img.raw_bytes(), Err(Error::UseAfterClose)));
        assert!(matches!(img.clear_icc(), Err(Error::UseAfterClose)));
    }

    #[test]
    fn released_buffer_cannot_be_opened() {
        let mut buffer = ByteBuffer::from_slice(b"\xFF\xD8\xFF").unwrap();
        buffer.release();
        assert!(matches!(Image::from_buffer(&buffer), Err(Error::Open(_))));
    }
}
