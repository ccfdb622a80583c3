//! Locating and replacing metadata blocks inside image containers.
//!
//! `img-parts` does the segment and chunk bookkeeping; this module knows
//! where each kind of metadata lives in each format:
//!
//! | | JPEG | PNG | WebP |
//! |---|---|---|---|
//! | EXIF | APP1 `Exif\0\0` | `eXIf` | `EXIF` |
//! | XMP | APP1 XMP namespace | `iTXt` `XML:com.adobe.xmp` | |
//! | IPTC | APP13 Photoshop 0x0404 | | |
//! | Comment | COM | `tEXt` `Comment` | |
//! | ICC | APP2 `ICC_PROFILE` | `iCCP` | `ICCP` |

use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::{Png, PngChunk};
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF, ImageICC};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::pipeline::ImageKind;
use crate::store::iptc;

const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const COM: u8 = 0xFE;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Largest payload a JPEG marker segment can carry.
const JPEG_SEGMENT_MAX: usize = 65533;

const PNG_ITXT: [u8; 4] = *b"iTXt";
const PNG_TEXT: [u8; 4] = *b"tEXt";
const PNG_IDAT: [u8; 4] = *b"IDAT";
const PNG_XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";
const PNG_COMMENT_KEYWORD: &[u8] = b"Comment";

/// A parsed image, ready to have its metadata blocks swapped.
#[derive(Debug, Clone)]
pub enum Container {
    Jpeg(Jpeg),
    Png(Png),
    WebP(WebP),
}

impl Container {
    /// Parse an image, detecting its format from the leading bytes.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let kind = ImageKind::from_magic(&data)
            .ok_or_else(|| Error::Open("The image format is not supported".into()))?;
        let bytes = Bytes::from(data);
        let parsed = match kind {
            ImageKind::Jpeg => Jpeg::from_bytes(bytes).map(Container::Jpeg),
            ImageKind::Png => Png::from_bytes(bytes).map(Container::Png),
            ImageKind::WebP => WebP::from_bytes(bytes).map(Container::WebP),
        };
        parsed.map_err(|e| Error::Open(format!("Failed to parse {} image: {e}", kind.name())))
    }

    pub fn kind(&self) -> ImageKind {
        match self {
            Container::Jpeg(_) => ImageKind::Jpeg,
            Container::Png(_) => ImageKind::Png,
            Container::WebP(_) => ImageKind::WebP,
        }
    }

    /// Encode the image back into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Container::Jpeg(jpeg) => jpeg.clone().encoder().bytes().to_vec(),
            Container::Png(png) => png.clone().encoder().bytes().to_vec(),
            Container::WebP(webp) => webp.clone().encoder().bytes().to_vec(),
        }
    }

    fn unsupported(&self, what: &str, diag: &mut Diagnostics) {
        diag.error(format!(
            "Setting {what} in {} images is not supported",
            self.kind().name()
        ));
    }

    // ── EXIF ─────────────────────────────────────────────────────────

    /// The TIFF structure of the EXIF block, without any `Exif\0\0` prefix.
    pub fn exif(&self) -> Option<Vec<u8>> {
        let data = match self {
            Container::Jpeg(jpeg) => jpeg.exif(),
            Container::Png(png) => png.exif(),
            Container::WebP(webp) => webp.exif(),
        }?;
        let data = data.strip_prefix(EXIF_PREFIX).unwrap_or(&data[..]).to_vec();
        Some(data)
    }

    pub fn set_exif(&mut self, tiff: Option<Vec<u8>>, diag: &mut Diagnostics) {
        match self {
            Container::Jpeg(jpeg) => {
                if tiff.as_ref().is_some_and(|t| t.len() + EXIF_PREFIX.len() > JPEG_SEGMENT_MAX) {
                    diag.error("Size of the Exif block exceeds the JPEG segment limit");
                    return;
                }
                let orig_pos = find_segment(jpeg.segments(), APP1, EXIF_PREFIX);
                jpeg.set_exif(tiff.map(Bytes::from));

                // set_exif() appends the segment after the first few; move it
                // back to where it was, or right after APP0.
                if let Some(new_pos) = find_segment(jpeg.segments(), APP1, EXIF_PREFIX) {
                    let target = orig_pos.unwrap_or_else(|| after_app0(jpeg.segments()));
                    if target < new_pos {
                        let segments = jpeg.segments_mut();
                        let seg = segments.remove(new_pos);
                        segments.insert(target, seg);
                    }
                }
            }
            Container::Png(png) => png.set_exif(tiff.map(Bytes::from)),
            Container::WebP(webp) => webp.set_exif(tiff.map(Bytes::from)),
        }
    }

    // ── XMP ──────────────────────────────────────────────────────────

    /// The XMP packet, if the image carries one.
    pub fn xmp(&self) -> Option<Vec<u8>> {
        match self {
            Container::Jpeg(jpeg) => {
                let pos = find_segment(jpeg.segments(), APP1, XMP_HEADER)?;
                Some(jpeg.segments()[pos].contents()[XMP_HEADER.len()..].to_vec())
            }
            Container::Png(png) => png
                .chunks()
                .iter()
                .filter(|c| c.kind() == PNG_ITXT)
                .find_map(|c| parse_itxt(c.contents(), PNG_XMP_KEYWORD)),
            Container::WebP(_) => None,
        }
    }

    pub fn set_xmp(&mut self, packet: Option<&[u8]>, diag: &mut Diagnostics) {
        match self {
            Container::Jpeg(jpeg) => {
                let contents = match packet {
                    Some(p) if XMP_HEADER.len() + p.len() > JPEG_SEGMENT_MAX => {
                        diag.error("Size of the XMP packet exceeds the JPEG segment limit");
                        return;
                    }
                    Some(p) => Some([XMP_HEADER, p].concat()),
                    None => None,
                };
                replace_segment(jpeg, APP1, XMP_HEADER, contents, |segs| {
                    // Right after EXIF, or after APP0.
                    find_segment(segs, APP1, EXIF_PREFIX)
                        .map(|p| p + 1)
                        .unwrap_or_else(|| after_app0(segs))
                });
            }
            Container::Png(png) => {
                let chunk = packet.map(|p| PngChunk::new(PNG_ITXT, Bytes::from(build_itxt(PNG_XMP_KEYWORD, p))));
                replace_chunk(png, PNG_ITXT, PNG_XMP_KEYWORD, chunk);
            }
            Container::WebP(_) => {
                if packet.is_some() {
                    self.unsupported("XMP metadata", diag);
                }
            }
        }
    }

    // ── IPTC ─────────────────────────────────────────────────────────

    /// Raw IIM datasets from the Photoshop resource block.
    pub fn iptc(&self) -> Option<Vec<u8>> {
        match self {
            Container::Jpeg(jpeg) => jpeg
                .segments()
                .iter()
                .filter(|s| s.marker() == APP13 && s.contents().starts_with(iptc::PHOTOSHOP_HEADER))
                .find_map(|s| iptc::iim_from_resources(s.contents())),
            Container::Png(_) | Container::WebP(_) => None,
        }
    }

    pub fn set_iptc(&mut self, iim: &[u8], diag: &mut Diagnostics) {
        match self {
            Container::Jpeg(jpeg) => {
                let existing = find_segment(jpeg.segments(), APP13, iptc::PHOTOSHOP_HEADER)
                    .map(|pos| jpeg.segments()[pos].contents().to_vec());
                let contents = iptc::replace_in_resources(existing.as_deref(), iim);
                if contents.as_ref().is_some_and(|c| c.len() > JPEG_SEGMENT_MAX) {
                    diag.error("Size of the IPTC block exceeds the JPEG segment limit");
                    return;
                }
                replace_segment(jpeg, APP13, iptc::PHOTOSHOP_HEADER, contents, after_app_segments);
            }
            Container::Png(_) | Container::WebP(_) => {
                if !iim.is_empty() {
                    self.unsupported("IPTC metadata", diag);
                }
            }
        }
    }

    // ── Comment ──────────────────────────────────────────────────────

    pub fn comment(&self) -> Option<Vec<u8>> {
        match self {
            Container::Jpeg(jpeg) => jpeg
                .segments()
                .iter()
                .find(|s| s.marker() == COM)
                .map(|s| s.contents().to_vec()),
            Container::Png(png) => png
                .chunks()
                .iter()
                .filter(|c| c.kind() == PNG_TEXT)
                .find_map(|c| parse_text(c.contents(), PNG_COMMENT_KEYWORD)),
            Container::WebP(_) => None,
        }
    }

    pub fn set_comment(&mut self, comment: &[u8], diag: &mut Diagnostics) {
        let comment = (!comment.is_empty()).then_some(comment);
        match self {
            Container::Jpeg(jpeg) => {
                if comment.is_some_and(|c| c.len() > JPEG_SEGMENT_MAX) {
                    diag.error("Size of the comment exceeds the JPEG segment limit");
                    return;
                }
                replace_segment(jpeg, COM, b"", comment.map(<[u8]>::to_vec), after_app_segments);
            }
            Container::Png(png) => {
                let chunk = comment.map(|c| {
                    let contents = [PNG_COMMENT_KEYWORD, b"\0", c].concat();
                    PngChunk::new(PNG_TEXT, Bytes::from(contents))
                });
                replace_chunk(png, PNG_TEXT, PNG_COMMENT_KEYWORD, chunk);
            }
            Container::WebP(_) => {
                if comment.is_some() {
                    self.unsupported("Image comment", diag);
                }
            }
        }
    }

    // ── ICC ──────────────────────────────────────────────────────────

    pub fn icc(&self) -> Option<Vec<u8>> {
        let profile = match self {
            Container::Jpeg(jpeg) => jpeg.icc_profile(),
            Container::Png(png) => png.icc_profile(),
            Container::WebP(webp) => webp.icc_profile(),
        };
        profile.map(|p| p.to_vec())
    }

    pub fn set_icc(&mut self, profile: Option<&[u8]>) {
        let profile = profile.map(Bytes::copy_from_slice);
        match self {
            Container::Jpeg(jpeg) => jpeg.set_icc_profile(profile),
            Container::Png(png) => png.set_icc_profile(profile),
            Container::WebP(webp) => webp.set_icc_profile(profile),
        }
    }
}

// ============================================================================
// JPEG segments
// ============================================================================

fn find_segment(segments: &[JpegSegment], marker: u8, prefix: &[u8]) -> Option<usize> {
    segments
        .iter()
        .position(|s| s.marker() == marker && s.contents().starts_with(prefix))
}

fn after_app0(segments: &[JpegSegment]) -> usize {
    match segments.first() {
        Some(s) if s.marker() == APP0 => 1,
        _ => 0,
    }
}

/// Index just past the leading run of APPn segments.
fn after_app_segments(segments: &[JpegSegment]) -> usize {
    segments
        .iter()
        .take_while(|s| (0xE0..=0xEF).contains(&s.marker()))
        .count()
}

/// Replace the first segment matching `marker` and `prefix` in place, drop
/// any other match, or insert a new one at `insert_at` when none exists.
fn replace_segment(
    jpeg: &mut Jpeg,
    marker: u8,
    prefix: &[u8],
    contents: Option<Vec<u8>>,
    insert_at: impl FnOnce(&[JpegSegment]) -> usize,
) {
    let first = find_segment(jpeg.segments(), marker, prefix);
    let segments = jpeg.segments_mut();
    let mut index = 0;
    segments.retain(|s| {
        let keep = Some(index) == first || !(s.marker() == marker && s.contents().starts_with(prefix));
        index += 1;
        keep
    });

    match (first, contents) {
        (Some(pos), Some(contents)) => {
            segments[pos] = JpegSegment::new_with_contents(marker, Bytes::from(contents));
        }
        (Some(pos), None) => {
            segments.remove(pos);
        }
        (None, Some(contents)) => {
            let pos = insert_at(segments.as_slice()).min(segments.len());
            segments.insert(pos, JpegSegment::new_with_contents(marker, Bytes::from(contents)));
        }
        (None, None) => {}
    }
}

// ============================================================================
// PNG text chunks
// ============================================================================

/// `keyword \0 text`
fn parse_text(contents: &[u8], keyword: &[u8]) -> Option<Vec<u8>> {
    let text = contents.strip_prefix(keyword)?.strip_prefix(b"\0")?;
    Some(text.to_vec())
}

/// `keyword \0 compressed method language \0 translated \0 text`
fn parse_itxt(contents: &[u8], keyword: &[u8]) -> Option<Vec<u8>> {
    let rest = contents.strip_prefix(keyword)?.strip_prefix(b"\0")?;
    let (&compressed, rest) = rest.split_first()?;
    let (_method, rest) = rest.split_first()?;
    if compressed != 0 {
        log::warn!("Compressed iTXt chunks are not supported; ignoring XMP");
        return None;
    }
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    Some(rest[translated_end + 1..].to_vec())
}

fn build_itxt(keyword: &[u8], text: &[u8]) -> Vec<u8> {
    [keyword, b"\0", &[0, 0], b"\0", b"\0", text].concat()
}

fn chunk_has_keyword(chunk: &PngChunk, kind: [u8; 4], keyword: &[u8]) -> bool {
    chunk.kind() == kind
        && chunk
            .contents()
            .strip_prefix(keyword)
            .is_some_and(|rest| rest.first() == Some(&0))
}

/// Same contract as [`replace_segment`]; new chunks go before the first IDAT.
fn replace_chunk(png: &mut Png, kind: [u8; 4], keyword: &[u8], chunk: Option<PngChunk>) {
    let chunks = png.chunks_mut();
    let first = chunks.iter().position(|c| chunk_has_keyword(c, kind, keyword));
    let mut index = 0;
    chunks.retain(|c| {
        let keep = Some(index) == first || !chunk_has_keyword(c, kind, keyword);
        index += 1;
        keep
    });

    match (first, chunk) {
        (Some(pos), Some(chunk)) => chunks[pos] = chunk,
        (Some(pos), None) => {
            chunks.remove(pos);
        }
        (None, Some(chunk)) => {
            let pos = chunks
                .iter()
                .position(|c| c.kind() == PNG_IDAT)
                .unwrap_or(chunks.len().saturating_sub(1));
            chunks.insert(pos, chunk);
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::LogLevel;

    fn jpeg() -> Container {
        let mut buf = Vec::new();
        ::image::RgbImage::new(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut buf), ::image::ImageFormat::Jpeg)
            .unwrap();
        Container::parse(buf).unwrap()
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!(matches!(Container::parse(b"GIF89a....".to_vec()), Err(Error::Open(_))));
        assert!(matches!(Container::parse(Vec::new()), Err(Error::Open(_))));
    }

    #[test]
    fn jpeg_blocks_round_trip() {
        let mut c = jpeg();
        let mut diag = Diagnostics::new(LogLevel::Debug);
        c.set_exif(Some(b"II*\0\x08\0\0\0\0\0\0\0\0\0".to_vec()), &mut diag);
        c.set_xmp(Some(b"<x/>"), &mut diag);
        c.set_comment(b"hello", &mut diag);
        assert!(diag.check().is_ok());

        let c = Container::parse(c.to_bytes()).unwrap();
        assert_eq!(&c.exif().unwrap()[..4], b"II*\0");
        assert_eq!(c.xmp().unwrap(), b"<x/>".to_vec());
        assert_eq!(c.comment().unwrap(), b"hello".to_vec());

        let Container::Jpeg(j) = &c else { panic!("not a jpeg") };
        let markers: Vec<u8> = j.segments().iter().map(|s| s.marker()).collect();
        assert_eq!(&markers[..4], &[APP0, APP1, APP1, COM]);
        assert_eq!(find_segment(j.segments(), APP1, EXIF_PREFIX), Some(1));
    }

    #[test]
    fn removing_blocks() {
        let mut c = jpeg();
        let mut diag = Diagnostics::new(LogLevel::Debug);
        c.set_comment(b"hello", &mut diag);
        c.set_comment(b"", &mut diag);
        c.set_xmp(Some(b"<x/>"), &mut diag);
        c.set_xmp(None, &mut diag);
        assert!(c.comment().is_none());
        assert!(c.xmp().is_none());
    }

    #[test]
    fn itxt_layout() {
        let chunk = build_itxt(PNG_XMP_KEYWORD, b"<x/>");
        assert_eq!(parse_itxt(&chunk, PNG_XMP_KEYWORD), Some(b"<x/>".to_vec()));
        assert_eq!(parse_itxt(&chunk, b"Other"), None);
        assert_eq!(parse_text(b"Comment\0hi", PNG_COMMENT_KEYWORD), Some(b"hi".to_vec()));
    }
}
