//! EXIF keys, tag tables and typed values.
//!
//! Keys follow the `Exif.<Group>.<TagName>` convention. Tags missing from the
//! tables are addressed by their hex id, e.g. `Exif.Image.0xabcd`. Values keep
//! their TIFF type and are rendered the way the reference tooling renders
//! them: numbers separated by spaces, rationals as `n/d`, and
//! byte-like data as decimal octets.

use std::borrow::Cow;
use std::fmt;

use super::tiff::ByteOrder;
use super::{Metadata, MetaValue, join_numbers, parse_tokens};

/// The IFD an EXIF tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    Image,
    Photo,
    GpsInfo,
    Iop,
    Thumbnail,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::Image,
        Group::Photo,
        Group::GpsInfo,
        Group::Iop,
        Group::Thumbnail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Group::Image => "Image",
            Group::Photo => "Photo",
            Group::GpsInfo => "GPSInfo",
            Group::Iop => "Iop",
            Group::Thumbnail => "Thumbnail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    fn table(self) -> &'static [TagInfo] {
        match self {
            Group::Image | Group::Thumbnail => IMAGE_TAGS,
            Group::Photo => PHOTO_TAGS,
            Group::GpsInfo => GPS_TAGS,
            Group::Iop => IOP_TAGS,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TIFF field types, plus the Comment pseudo-type used for UserComment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Comment,
}

impl ExifType {
    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            _ => return None,
        })
    }

    /// The TIFF type id written to the file.
    pub fn id(self) -> u16 {
        match self {
            Self::Byte => 1,
            Self::Ascii => 2,
            Self::Short => 3,
            Self::Long => 4,
            Self::Rational => 5,
            Self::SByte => 6,
            Self::Undefined | Self::Comment => 7,
            Self::SShort => 8,
            Self::SLong => 9,
            Self::SRational => 10,
            Self::Float => 11,
            Self::Double => 12,
        }
    }

    /// Size in bytes of one component.
    pub fn unit_size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined | Self::Comment => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Ascii => "Ascii",
            Self::Short => "Short",
            Self::Long => "Long",
            Self::Rational => "Rational",
            Self::SByte => "SByte",
            Self::Undefined => "Undefined",
            Self::SShort => "SShort",
            Self::SLong => "SLong",
            Self::SRational => "SRational",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Comment => "Comment",
        }
    }
}

pub struct TagInfo {
    pub tag: u16,
    pub name: &'static str,
    pub ty: ExifType,
}

const fn tag(tag: u16, name: &'static str, ty: ExifType) -> TagInfo {
    TagInfo { tag, name, ty }
}

use ExifType::*;

static IMAGE_TAGS: &[TagInfo] = &[
    tag(0x000b, "ProcessingSoftware", Ascii),
    tag(0x00fe, "NewSubfileType", Long),
    tag(0x0100, "ImageWidth", Long),
    tag(0x0101, "ImageLength", Long),
    tag(0x0102, "BitsPerSample", Short),
    tag(0x0103, "Compression", Short),
    tag(0x0106, "PhotometricInterpretation", Short),
    tag(0x010d, "DocumentName", Ascii),
    tag(0x010e, "ImageDescription", Ascii),
    tag(0x010f, "Make", Ascii),
    tag(0x0110, "Model", Ascii),
    tag(0x0111, "StripOffsets", Long),
    tag(0x0112, "Orientation", Short),
    tag(0x0115, "SamplesPerPixel", Short),
    tag(0x0116, "RowsPerStrip", Long),
    tag(0x0117, "StripByteCounts", Long),
    tag(0x011a, "XResolution", Rational),
    tag(0x011b, "YResolution", Rational),
    tag(0x011c, "PlanarConfiguration", Short),
    tag(0x0128, "ResolutionUnit", Short),
    tag(0x0131, "Software", Ascii),
    tag(0x0132, "DateTime", Ascii),
    tag(0x013b, "Artist", Ascii),
    tag(0x013c, "HostComputer", Ascii),
    tag(0x013e, "WhitePoint", Rational),
    tag(0x013f, "PrimaryChromaticities", Rational),
    tag(0x0201, "JPEGInterchangeFormat", Long),
    tag(0x0202, "JPEGInterchangeFormatLength", Long),
    tag(0x0211, "YCbCrCoefficients", Rational),
    tag(0x0212, "YCbCrSubSampling", Short),
    tag(0x0213, "YCbCrPositioning", Short),
    tag(0x0214, "ReferenceBlackWhite", Rational),
    tag(0x4746, "Rating", Short),
    tag(0x4749, "RatingPercent", Short),
    tag(0x8298, "Copyright", Ascii),
    tag(0x8769, "ExifTag", Long),
    tag(0x8825, "GPSTag", Long),
    tag(0x9c9b, "XPTitle", Byte),
    tag(0x9c9c, "XPComment", Byte),
    tag(0x9c9d, "XPAuthor", Byte),
    tag(0x9c9e, "XPKeywords", Byte),
    tag(0x9c9f, "XPSubject", Byte),
    tag(0xc4a5, "PrintImageMatching", Undefined),
];

static PHOTO_TAGS: &[TagInfo] = &[
    tag(0x829a, "ExposureTime", Rational),
    tag(0x829d, "FNumber", Rational),
    tag(0x8822, "ExposureProgram", Short),
    tag(0x8827, "ISOSpeedRatings", Short),
    tag(0x8830, "SensitivityType", Short),
    tag(0x9000, "ExifVersion", Undefined),
    tag(0x9003, "DateTimeOriginal", Ascii),
    tag(0x9004, "DateTimeDigitized", Ascii),
    tag(0x9010, "OffsetTime", Ascii),
    tag(0x9011, "OffsetTimeOriginal", Ascii),
    tag(0x9012, "OffsetTimeDigitized", Ascii),
    tag(0x9101, "ComponentsConfiguration", Undefined),
    tag(0x9102, "CompressedBitsPerPixel", Rational),
    tag(0x9201, "ShutterSpeedValue", SRational),
    tag(0x9202, "ApertureValue", Rational),
    tag(0x9203, "BrightnessValue", SRational),
    tag(0x9204, "ExposureBiasValue", SRational),
    tag(0x9205, "MaxApertureValue", Rational),
    tag(0x9206, "SubjectDistance", Rational),
    tag(0x9207, "MeteringMode", Short),
    tag(0x9208, "LightSource", Short),
    tag(0x9209, "Flash", Short),
    tag(0x920a, "FocalLength", Rational),
    tag(0x927c, "MakerNote", Undefined),
    tag(0x9286, "UserComment", Comment),
    tag(0x9290, "SubSecTime", Ascii),
    tag(0x9291, "SubSecTimeOriginal", Ascii),
    tag(0x9292, "SubSecTimeDigitized", Ascii),
    tag(0xa000, "FlashpixVersion", Undefined),
    tag(0xa001, "ColorSpace", Short),
    tag(0xa002, "PixelXDimension", Long),
    tag(0xa003, "PixelYDimension", Long),
    tag(0xa004, "RelatedSoundFile", Ascii),
    tag(0xa005, "InteroperabilityTag", Long),
    tag(0xa20e, "FocalPlaneXResolution", Rational),
    tag(0xa20f, "FocalPlaneYResolution", Rational),
    tag(0xa210, "FocalPlaneResolutionUnit", Short),
    tag(0xa215, "ExposureIndex", Rational),
    tag(0xa217, "SensingMethod", Short),
    tag(0xa300, "FileSource", Undefined),
    tag(0xa301, "SceneType", Undefined),
    tag(0xa401, "CustomRendered", Short),
    tag(0xa402, "ExposureMode", Short),
    tag(0xa403, "WhiteBalance", Short),
    tag(0xa404, "DigitalZoomRatio", Rational),
    tag(0xa405, "FocalLengthIn35mmFilm", Short),
    tag(0xa406, "SceneCaptureType", Short),
    tag(0xa407, "GainControl", Short),
    tag(0xa408, "Contrast", Short),
    tag(0xa409, "Saturation", Short),
    tag(0xa40a, "Sharpness", Short),
    tag(0xa40c, "SubjectDistanceRange", Short),
    tag(0xa420, "ImageUniqueID", Ascii),
    tag(0xa430, "CameraOwnerName", Ascii),
    tag(0xa431, "BodySerialNumber", Ascii),
    tag(0xa432, "LensSpecification", Rational),
    tag(0xa433, "LensMake", Ascii),
    tag(0xa434, "LensModel", Ascii),
    tag(0xa435, "LensSerialNumber", Ascii),
];

static GPS_TAGS: &[TagInfo] = &[
    tag(0x0000, "GPSVersionID", Byte),
    tag(0x0001, "GPSLatitudeRef", Ascii),
    tag(0x0002, "GPSLatitude", Rational),
    tag(0x0003, "GPSLongitudeRef", Ascii),
    tag(0x0004, "GPSLongitude", Rational),
    tag(0x0005, "GPSAltitudeRef", Byte),
    tag(0x0006, "GPSAltitude", Rational),
    tag(0x0007, "GPSTimeStamp", Rational),
    tag(0x0008, "GPSSatellites", Ascii),
    tag(0x0009, "GPSStatus", Ascii),
    tag(0x000a, "GPSMeasureMode", Ascii),
    tag(0x000b, "GPSDOP", Rational),
    tag(0x000c, "GPSSpeedRef", Ascii),
    tag(0x000d, "GPSSpeed", Rational),
    tag(0x000e, "GPSTrackRef", Ascii),
    tag(0x000f, "GPSTrack", Rational),
    tag(0x0010, "GPSImgDirectionRef", Ascii),
    tag(0x0011, "GPSImgDirection", Rational),
    tag(0x0012, "GPSMapDatum", Ascii),
    tag(0x001b, "GPSProcessingMethod", Comment),
    tag(0x001d, "GPSDateStamp", Ascii),
];

static IOP_TAGS: &[TagInfo] = &[
    tag(0x0001, "InteroperabilityIndex", Ascii),
    tag(0x0002, "InteroperabilityVersion", Undefined),
    tag(0x1001, "RelatedImageWidth", Long),
    tag(0x1002, "RelatedImageLength", Long),
];

/// Offset tags that describe file structure rather than metadata.
pub(crate) const EXIF_IFD_POINTER: u16 = 0x8769;
pub(crate) const GPS_IFD_POINTER: u16 = 0x8825;
pub(crate) const INTEROP_IFD_POINTER: u16 = 0xa005;
pub(crate) const THUMBNAIL_OFFSET: u16 = 0x0201;
pub(crate) const THUMBNAIL_LENGTH: u16 = 0x0202;

/// Whether `tag` in `group` is handled by the codec instead of the store.
pub(crate) fn is_structural(group: Group, tag: u16) -> bool {
    match group {
        Group::Image => tag == EXIF_IFD_POINTER || tag == GPS_IFD_POINTER,
        Group::Photo => tag == INTEROP_IFD_POINTER,
        Group::Thumbnail => tag == THUMBNAIL_OFFSET || tag == THUMBNAIL_LENGTH,
        Group::GpsInfo | Group::Iop => false,
    }
}

/// `Exif.<Group>.<TagName>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExifKey {
    pub group: Group,
    pub tag: u16,
}

impl ExifKey {
    pub fn new(group: Group, tag: u16) -> Self {
        Self { group, tag }
    }

    /// Parse a dotted key. Returns `None` for malformed keys and unknown tag names.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '.');
        if parts.next()? != "Exif" {
            return None;
        }
        let group = Group::from_name(parts.next()?)?;
        let name = parts.next()?;

        if let Some(hex) = name.strip_prefix("0x") {
            let tag = u16::from_str_radix(hex, 16).ok()?;
            return Some(Self { group, tag });
        }

        group
            .table()
            .iter()
            .find(|t| t.name == name)
            .map(|t| Self { group, tag: t.tag })
    }

    fn info(&self) -> Option<&'static TagInfo> {
        self.group.table().iter().find(|t| t.tag == self.tag)
    }

    pub fn tag_name(&self) -> Cow<'static, str> {
        match self.info() {
            Some(info) => Cow::Borrowed(info.name),
            None => Cow::Owned(format!("0x{:04x}", self.tag)),
        }
    }

    /// The type used for values written to this key. Unknown tags take Ascii.
    pub fn default_type(&self) -> ExifType {
        self.info().map(|i| i.ty).unwrap_or(ExifType::Ascii)
    }
}

impl fmt::Display for ExifKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exif.{}.{}", self.group, self.tag_name())
    }
}

/// Character set marker at the start of a comment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    Jis,
    Unicode,
    Undefined,
}

impl Charset {
    const ALL: [Charset; 4] = [Charset::Ascii, Charset::Jis, Charset::Unicode, Charset::Undefined];

    fn code(self) -> &'static [u8; 8] {
        match self {
            Charset::Ascii => b"ASCII\0\0\0",
            Charset::Jis => b"JIS\0\0\0\0\0",
            Charset::Unicode => b"UNICODE\0",
            Charset::Undefined => b"\0\0\0\0\0\0\0\0",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Charset::Ascii => "Ascii",
            Charset::Jis => "Jis",
            Charset::Unicode => "Unicode",
            Charset::Undefined => "Undefined",
        }
    }

    fn from_code(code: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code().as_slice() == code)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// A typed EXIF value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Byte(Vec<u8>),
    Ascii(Vec<u8>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Comment { charset: Charset, text: Vec<u8> },
}

impl ExifValue {
    pub fn exif_type(&self) -> ExifType {
        match self {
            Self::Byte(_) => ExifType::Byte,
            Self::Ascii(_) => ExifType::Ascii,
            Self::Short(_) => ExifType::Short,
            Self::Long(_) => ExifType::Long,
            Self::Rational(_) => ExifType::Rational,
            Self::SByte(_) => ExifType::SByte,
            Self::Undefined(_) => ExifType::Undefined,
            Self::SShort(_) => ExifType::SShort,
            Self::SLong(_) => ExifType::SLong,
            Self::SRational(_) => ExifType::SRational,
            Self::Float(_) => ExifType::Float,
            Self::Double(_) => ExifType::Double,
            Self::Comment { .. } => ExifType::Comment,
        }
    }

    /// Parse the string form of a value as type `ty`.
    pub fn parse(ty: ExifType, text: &[u8]) -> Result<Self, String> {
        let value = match ty {
            ExifType::Ascii => Some(Self::Ascii(text.to_vec())),
            ExifType::Byte => parse_tokens(text, |t| t.parse().ok()).map(Self::Byte),
            ExifType::Undefined => parse_tokens(text, |t| t.parse().ok()).map(Self::Undefined),
            ExifType::SByte => parse_tokens(text, |t| t.parse().ok()).map(Self::SByte),
            ExifType::Short => parse_tokens(text, |t| t.parse().ok()).map(Self::Short),
            ExifType::Long => parse_tokens(text, |t| t.parse().ok()).map(Self::Long),
            ExifType::SShort => parse_tokens(text, |t| t.parse().ok()).map(Self::SShort),
            ExifType::SLong => parse_tokens(text, |t| t.parse().ok()).map(Self::SLong),
            ExifType::Rational => parse_tokens(text, parse_ratio::<u32>).map(Self::Rational),
            ExifType::SRational => parse_tokens(text, parse_ratio::<i32>).map(Self::SRational),
            ExifType::Float => parse_tokens(text, |t| t.parse().ok()).map(Self::Float),
            ExifType::Double => parse_tokens(text, |t| t.parse().ok()).map(Self::Double),
            ExifType::Comment => parse_comment(text).map(|(charset, text)| Self::Comment { charset, text }),
        };
        value.ok_or_else(|| {
            format!(
                "Cannot read {} value from '{}'",
                ty.name(),
                String::from_utf8_lossy(text)
            )
        })
    }

    /// Decode the raw bytes of an IFD entry. `hint` upgrades Undefined data
    /// to the Comment type for tags declared as comments.
    pub fn decode(ty: ExifType, raw: &[u8], order: ByteOrder, hint: ExifType) -> Self {
        match ty {
            ExifType::Byte => Self::Byte(raw.to_vec()),
            ExifType::Ascii => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Self::Ascii(raw[..end].to_vec())
            }
            ExifType::Undefined | ExifType::Comment if hint == ExifType::Comment && raw.len() >= 8 => {
                decode_comment(raw, order)
            }
            ExifType::Undefined | ExifType::Comment => Self::Undefined(raw.to_vec()),
            ExifType::SByte => Self::SByte(raw.iter().map(|&b| b as i8).collect()),
            ExifType::Short => Self::Short(raw.chunks_exact(2).map(|c| order.u16(c)).collect()),
            ExifType::SShort => Self::SShort(raw.chunks_exact(2).map(|c| order.u16(c) as i16).collect()),
            ExifType::Long => Self::Long(raw.chunks_exact(4).map(|c| order.u32(c)).collect()),
            ExifType::SLong => Self::SLong(raw.chunks_exact(4).map(|c| order.u32(c) as i32).collect()),
            ExifType::Rational => Self::Rational(
                raw.chunks_exact(8)
                    .map(|c| (order.u32(&c[..4]), order.u32(&c[4..])))
                    .collect(),
            ),
            ExifType::SRational => Self::SRational(
                raw.chunks_exact(8)
                    .map(|c| (order.u32(&c[..4]) as i32, order.u32(&c[4..]) as i32))
                    .collect(),
            ),
            ExifType::Float => Self::Float(
                raw.chunks_exact(4)
                    .map(|c| f32::from_bits(order.u32(c)))
                    .collect(),
            ),
            ExifType::Double => Self::Double(
                raw.chunks_exact(8)
                    .map(|c| f64::from_bits(order.u64(c)))
                    .collect(),
            ),
        }
    }

    /// Encode into (TIFF type id, component count, raw bytes).
    pub fn encode(&self, order: ByteOrder) -> (u16, u32, Vec<u8>) {
        let mut out = Vec::new();
        match self {
            Self::Byte(v) | Self::Undefined(v) => out.extend_from_slice(v),
            Self::Ascii(v) => {
                out.extend_from_slice(v);
                out.push(0);
            }
            Self::SByte(v) => out.extend(v.iter().map(|&b| b as u8)),
            Self::Short(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u16(n))),
            Self::SShort(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u16(n as u16))),
            Self::Long(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u32(n))),
            Self::SLong(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u32(n as u32))),
            Self::Rational(v) => v.iter().for_each(|&(n, d)| {
                out.extend_from_slice(&order.encode_u32(n));
                out.extend_from_slice(&order.encode_u32(d));
            }),
            Self::SRational(v) => v.iter().for_each(|&(n, d)| {
                out.extend_from_slice(&order.encode_u32(n as u32));
                out.extend_from_slice(&order.encode_u32(d as u32));
            }),
            Self::Float(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u32(n.to_bits()))),
            Self::Double(v) => v.iter().for_each(|&n| out.extend_from_slice(&order.encode_u64(n.to_bits()))),
            Self::Comment { charset, text } => {
                out.extend_from_slice(charset.code());
                match (charset, std::str::from_utf8(text)) {
                    (Charset::Unicode, Ok(s)) => {
                        s.encode_utf16().for_each(|u| out.extend_from_slice(&order.encode_u16(u)));
                    }
                    _ => out.extend_from_slice(text),
                }
            }
        }
        let ty = self.exif_type();
        let count = (out.len() / ty.unit_size()) as u32;
        (ty.id(), count, out)
    }
}

impl MetaValue for ExifValue {
    fn type_name(&self) -> Option<&'static str> {
        Some(self.exif_type().name())
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ascii(v) => v.clone(),
            Self::Byte(v) | Self::Undefined(v) => join_numbers(v),
            Self::SByte(v) => join_numbers(v),
            Self::Short(v) => join_numbers(v),
            Self::Long(v) => join_numbers(v),
            Self::SShort(v) => join_numbers(v),
            Self::SLong(v) => join_numbers(v),
            Self::Float(v) => join_numbers(v),
            Self::Double(v) => join_numbers(v),
            Self::Rational(v) => join_numbers(&v.iter().map(|(n, d)| format!("{n}/{d}")).collect::<Vec<_>>()),
            Self::SRational(v) => join_numbers(&v.iter().map(|(n, d)| format!("{n}/{d}")).collect::<Vec<_>>()),
            Self::Comment { charset, text } => {
                let mut out = Vec::new();
                if *charset != Charset::Undefined {
                    out.extend_from_slice(format!("charset={} ", charset.name()).as_bytes());
                }
                out.extend_from_slice(text);
                out
            }
        }
    }
}

fn parse_ratio<T: std::str::FromStr>(token: &str) -> Option<(T, T)>
where
    T: From<u8>,
{
    match token.split_once('/') {
        Some((n, d)) => Some((n.parse().ok()?, d.parse().ok()?)),
        None => Some((token.parse().ok()?, T::from(1u8))),
    }
}

fn parse_comment(text: &[u8]) -> Option<(Charset, Vec<u8>)> {
    let Some(rest) = text.strip_prefix(b"charset=") else {
        return Some((Charset::Undefined, text.to_vec()));
    };
    let end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    let name = std::str::from_utf8(&rest[..end]).ok()?.trim_matches('"');
    let charset = Charset::from_name(name)?;
    let body = rest.get(end + 1..).unwrap_or_default();
    // Unicode comments are stored as UCS-2, converted from UTF-8 text.
    if charset == Charset::Unicode && std::str::from_utf8(body).is_err() {
        return None;
    }
    Some((charset, body.to_vec()))
}

fn decode_comment(raw: &[u8], order: ByteOrder) -> ExifValue {
    let Some(charset) = Charset::from_code(&raw[..8]) else {
        return ExifValue::Undefined(raw.to_vec());
    };
    let body = &raw[8..];
    let text = match charset {
        Charset::Unicode => {
            let units: Vec<u16> = body.chunks_exact(2).map(|c| order.u16(c)).collect();
            String::from_utf16_lossy(&units)
                .trim_end_matches('\0')
                .as_bytes()
                .to_vec()
        }
        _ => {
            let end = body.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
            body[..end].to_vec()
        }
    };
    ExifValue::Comment { charset, text }
}

/// The EXIF store of one image.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub(crate) entries: Metadata<ExifKey, ExifValue>,
    pub(crate) byte_order: ByteOrder,
    pub(crate) thumbnail: Option<Vec<u8>>,
}

impl ExifData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &Metadata<ExifKey, ExifValue> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Metadata<ExifKey, ExifValue> {
        &mut self.entries
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// JPEG thumbnail data from IFD1, if any.
    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.thumbnail.is_none()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.thumbnail = None;
    }
}
