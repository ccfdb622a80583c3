use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The container format of an image, which decides the metadata it can hold.
///
/// - **JPEG** holds EXIF, IPTC, XMP, a comment and an ICC profile.
/// - **PNG** holds EXIF, XMP, a comment and an ICC profile.
/// - **WebP** holds EXIF and an ICC profile.
///
/// # Example
///
/// ```rust
/// use imgmeta::pipeline::ImageKind;
/// use std::path::Path;
///
/// let kind = ImageKind::from_path(Path::new("photo.JPG"));
/// assert_eq!(kind, Some(ImageKind::Jpeg));
///
/// let kind = ImageKind::from_magic(b"\x89PNG\r\n\x1a\n....");
/// assert_eq!(kind, Some(ImageKind::Png));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Determine the image kind from the first bytes of the file.
    pub fn from_magic(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    /// Upper-case format name, as used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WEBP",
        }
    }

    pub fn supports_iptc(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    pub fn supports_xmp(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }

    pub fn supports_comment(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// Collect image files from a list of paths (files and/or directories).
///
/// Directories are walked recursively. Files whose extension is not a
/// supported image format are skipped with a warning.
///
/// # Example
///
/// ```rust,no_run
/// use imgmeta::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./photos/"),        // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}

/// Copy `path` to `<path>.<ext>.bak` unless that backup already exists.
pub(crate) fn backup_file(path: &Path) -> std::io::Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path)?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}
