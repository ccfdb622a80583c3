//! IPTC-IIM datasets and the Photoshop resource block that carries them.
//!
//! Keys follow `Iptc.<Record>.<DataSet>`. Unlike EXIF and XMP, a key may
//! appear several times (keywords, by-lines, ...), so the store is a plain
//! ordered list.

use std::fmt;

use super::{Metadata, MetaValue, join_numbers, parse_tokens};
use crate::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IptcType {
    String,
    Short,
    Date,
    Time,
    Undefined,
}

impl IptcType {
    pub fn name(self) -> &'static str {
        match self {
            IptcType::String => "String",
            IptcType::Short => "Short",
            IptcType::Date => "Date",
            IptcType::Time => "Time",
            IptcType::Undefined => "Undefined",
        }
    }
}

struct DataSet {
    number: u8,
    name: &'static str,
    ty: IptcType,
}

const fn ds(number: u8, name: &'static str, ty: IptcType) -> DataSet {
    DataSet { number, name, ty }
}

pub const ENVELOPE: u8 = 1;
pub const APPLICATION2: u8 = 2;

static ENVELOPE_SETS: &[DataSet] = &[
    ds(0, "ModelVersion", IptcType::Short),
    ds(5, "Destination", IptcType::String),
    ds(20, "FileFormat", IptcType::Short),
    ds(22, "FileVersion", IptcType::Short),
    ds(30, "ServiceId", IptcType::String),
    ds(40, "EnvelopeNumber", IptcType::String),
    ds(50, "ProductId", IptcType::String),
    ds(60, "EnvelopePriority", IptcType::String),
    ds(70, "DateSent", IptcType::Date),
    ds(80, "TimeSent", IptcType::Time),
    ds(90, "CharacterSet", IptcType::Undefined),
    ds(100, "UNO", IptcType::String),
    ds(120, "ARMId", IptcType::Short),
    ds(122, "ARMVersion", IptcType::Short),
];

static APPLICATION2_SETS: &[DataSet] = &[
    ds(0, "RecordVersion", IptcType::Short),
    ds(3, "ObjectType", IptcType::String),
    ds(4, "ObjectAttribute", IptcType::String),
    ds(5, "ObjectName", IptcType::String),
    ds(7, "EditStatus", IptcType::String),
    ds(8, "EditorialUpdate", IptcType::String),
    ds(10, "Urgency", IptcType::String),
    ds(12, "Subject", IptcType::String),
    ds(15, "Category", IptcType::String),
    ds(20, "SuppCategory", IptcType::String),
    ds(22, "FixtureId", IptcType::String),
    ds(25, "Keywords", IptcType::String),
    ds(26, "LocationCode", IptcType::String),
    ds(27, "LocationName", IptcType::String),
    ds(30, "ReleaseDate", IptcType::Date),
    ds(35, "ReleaseTime", IptcType::Time),
    ds(37, "ExpirationDate", IptcType::Date),
    ds(38, "ExpirationTime", IptcType::Time),
    ds(40, "SpecialInstructions", IptcType::String),
    ds(42, "ActionAdvised", IptcType::String),
    ds(45, "ReferenceService", IptcType::String),
    ds(47, "ReferenceDate", IptcType::Date),
    ds(50, "ReferenceNumber", IptcType::String),
    ds(55, "DateCreated", IptcType::Date),
    ds(60, "TimeCreated", IptcType::Time),
    ds(62, "DigitizationDate", IptcType::Date),
    ds(63, "DigitizationTime", IptcType::Time),
    ds(65, "Program", IptcType::String),
    ds(70, "ProgramVersion", IptcType::String),
    ds(75, "ObjectCycle", IptcType::String),
    ds(80, "Byline", IptcType::String),
    ds(85, "BylineTitle", IptcType::String),
    ds(90, "City", IptcType::String),
    ds(92, "SubLocation", IptcType::String),
    ds(95, "ProvinceState", IptcType::String),
    ds(100, "CountryCode", IptcType::String),
    ds(101, "CountryName", IptcType::String),
    ds(103, "TransmissionReference", IptcType::String),
    ds(105, "Headline", IptcType::String),
    ds(110, "Credit", IptcType::String),
    ds(115, "Source", IptcType::String),
    ds(116, "Copyright", IptcType::String),
    ds(118, "Contact", IptcType::String),
    ds(120, "Caption", IptcType::String),
    ds(122, "Writer", IptcType::String),
    ds(125, "RasterizedCaption", IptcType::Undefined),
    ds(130, "ImageType", IptcType::String),
    ds(131, "ImageOrientation", IptcType::String),
    ds(135, "Language", IptcType::String),
    ds(150, "AudioType", IptcType::String),
    ds(151, "AudioRate", IptcType::String),
    ds(152, "AudioResolution", IptcType::String),
    ds(153, "AudioDuration", IptcType::String),
    ds(154, "AudioOutcue", IptcType::String),
    ds(200, "PreviewFormat", IptcType::Short),
    ds(201, "PreviewVersion", IptcType::Short),
    ds(202, "Preview", IptcType::Undefined),
];

fn record_name(record: u8) -> Option<&'static str> {
    match record {
        ENVELOPE => Some("Envelope"),
        APPLICATION2 => Some("Application2"),
        _ => None,
    }
}

fn record_sets(record: u8) -> &'static [DataSet] {
    match record {
        ENVELOPE => ENVELOPE_SETS,
        APPLICATION2 => APPLICATION2_SETS,
        _ => &[],
    }
}

/// `Iptc.<Record>.<DataSet>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IptcKey {
    pub record: u8,
    pub dataset: u8,
}

impl IptcKey {
    pub fn new(record: u8, dataset: u8) -> Self {
        Self { record, dataset }
    }

    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '.');
        if parts.next()? != "Iptc" {
            return None;
        }
        let record = match parts.next()? {
            "Envelope" => ENVELOPE,
            "Application2" => APPLICATION2,
            other => parse_hex(other)?,
        };
        let name = parts.next()?;
        let dataset = match parse_hex(name) {
            Some(n) => n,
            None => record_sets(record).iter().find(|d| d.name == name)?.number,
        };
        Some(Self { record, dataset })
    }

    fn info(&self) -> Option<&'static DataSet> {
        record_sets(self.record).iter().find(|d| d.number == self.dataset)
    }

    /// Type used for values written to this key. Unknown datasets are strings.
    pub fn default_type(&self) -> IptcType {
        self.info().map_or(IptcType::String, |d| d.ty)
    }
}

fn parse_hex(text: &str) -> Option<u8> {
    let hex = text.strip_prefix("0x")?;
    u16::from_str_radix(hex, 16).ok()?.try_into().ok()
}

impl fmt::Display for IptcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match record_name(self.record) {
            Some(name) => write!(f, "Iptc.{name}.")?,
            None => write!(f, "Iptc.0x{:04x}.", self.record)?,
        }
        match self.info() {
            Some(info) => f.write_str(info.name),
            None => write!(f, "0x{:04x}", self.dataset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IptcValue {
    String(Vec<u8>),
    Short(Vec<u16>),
    Date { year: u16, month: u8, day: u8 },
    /// Offset in minutes from UTC.
    Time { hour: u8, minute: u8, second: u8, offset: i16 },
    Undefined(Vec<u8>),
}

impl IptcValue {
    pub fn iptc_type(&self) -> IptcType {
        match self {
            IptcValue::String(_) => IptcType::String,
            IptcValue::Short(_) => IptcType::Short,
            IptcValue::Date { .. } => IptcType::Date,
            IptcValue::Time { .. } => IptcType::Time,
            IptcValue::Undefined(_) => IptcType::Undefined,
        }
    }

    /// Parse the string form of a value as type `ty`.
    pub fn parse(ty: IptcType, text: &[u8]) -> Result<Self, String> {
        let value = match ty {
            IptcType::String => Some(IptcValue::String(text.to_vec())),
            IptcType::Short => parse_tokens(text, |t| t.parse().ok()).map(IptcValue::Short),
            IptcType::Undefined => parse_tokens(text, |t| t.parse().ok()).map(IptcValue::Undefined),
            IptcType::Date => parse_date(text),
            IptcType::Time => parse_time(text),
        };
        value.ok_or_else(|| {
            format!(
                "Cannot read {} value from '{}'",
                ty.name(),
                String::from_utf8_lossy(text)
            )
        })
    }

    /// Decode dataset bytes. Dates and times that do not match the IIM
    /// layout are kept as strings.
    fn decode(ty: IptcType, raw: &[u8]) -> Self {
        match ty {
            IptcType::String => IptcValue::String(raw.to_vec()),
            IptcType::Undefined => IptcValue::Undefined(raw.to_vec()),
            IptcType::Short => {
                IptcValue::Short(raw.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
            }
            IptcType::Date => parse_date(raw).unwrap_or_else(|| IptcValue::String(raw.to_vec())),
            IptcType::Time => parse_time(raw).unwrap_or_else(|| IptcValue::String(raw.to_vec())),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            IptcValue::String(v) | IptcValue::Undefined(v) => v.clone(),
            IptcValue::Short(v) => v.iter().flat_map(|n| n.to_be_bytes()).collect(),
            IptcValue::Date { year, month, day } => format!("{year:04}{month:02}{day:02}").into_bytes(),
            IptcValue::Time { hour, minute, second, offset } => {
                let (sign, abs) = split_offset(*offset);
                format!(
                    "{hour:02}{minute:02}{second:02}{sign}{:02}{:02}",
                    abs / 60,
                    abs % 60
                )
                .into_bytes()
            }
        }
    }
}

fn split_offset(offset: i16) -> (char, u16) {
    let sign = if offset < 0 { '-' } else { '+' };
    (sign, offset.unsigned_abs())
}

fn digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// `YYYY-MM-DD` or the IIM form `YYYYMMDD`.
fn parse_date(text: &[u8]) -> Option<IptcValue> {
    let text = std::str::from_utf8(text).ok()?.trim();
    if !text.is_ascii() {
        return None;
    }
    let compact: String = match text.len() {
        10 if text.as_bytes()[4] == b'-' && text.as_bytes()[7] == b'-' => {
            [&text[0..4], &text[5..7], &text[8..10]].concat()
        }
        8 => text.to_string(),
        _ => return None,
    };
    if compact.len() != 8 || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits(&compact[0..4])? as u16;
    let month = digits(&compact[4..6])? as u8;
    let day = digits(&compact[6..8])? as u8;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some(IptcValue::Date { year, month, day })
}

/// `HH:MM:SS[±HH:MM]` or the IIM form `HHMMSS±HHMM`.
fn parse_time(text: &[u8]) -> Option<IptcValue> {
    let text = std::str::from_utf8(text).ok()?.trim();
    if !text.is_ascii() {
        return None;
    }
    let compact = text.replace(':', "");
    if compact.len() < 6 {
        return None;
    }
    let (clock, zone) = compact.split_at(6);
    let hour = digits(&clock[0..2])? as u8;
    let minute = digits(&clock[2..4])? as u8;
    let second = digits(&clock[4..6])? as u8;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }

    let offset = match zone.len() {
        0 => 0,
        5 => {
            let sign = match zone.as_bytes()[0] {
                b'+' => 1,
                b'-' => -1,
                _ => return None,
            };
            let h = digits(&zone[1..3])? as i16;
            let m = digits(&zone[3..5])? as i16;
            if h > 23 || m > 59 {
                return None;
            }
            sign * (h * 60 + m)
        }
        _ => return None,
    };
    Some(IptcValue::Time { hour, minute, second, offset })
}

impl MetaValue for IptcValue {
    fn type_name(&self) -> Option<&'static str> {
        Some(self.iptc_type().name())
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            IptcValue::String(v) => v.clone(),
            IptcValue::Short(v) => join_numbers(v),
            IptcValue::Undefined(v) => join_numbers(v),
            IptcValue::Date { year, month, day } => format!("{year:04}-{month:02}-{day:02}").into_bytes(),
            IptcValue::Time { hour, minute, second, offset } => {
                let (sign, abs) = split_offset(*offset);
                format!(
                    "{hour:02}:{minute:02}:{second:02}{sign}{:02}:{:02}",
                    abs / 60,
                    abs % 60
                )
                .into_bytes()
            }
        }
    }
}

/// The IPTC store of one image.
pub type IptcData = Metadata<IptcKey, IptcValue>;

// ============================================================================
// IIM dataset codec
// ============================================================================

const MARKER: u8 = 0x1C;

/// Decode a stream of IIM datasets. Returns `None` when a dataset runs past
/// the end of the data.
pub fn decode(data: &[u8], diag: &mut Diagnostics) -> Option<IptcData> {
    let mut out = IptcData::new();
    let mut pos = 0;

    while pos < data.len() {
        if data[pos] != MARKER {
            pos += 1;
            continue;
        }
        let header = data.get(pos + 1..pos + 5)?;
        let record = header[0];
        let dataset = header[1];
        let mut len = u16::from_be_bytes([header[2], header[3]]) as usize;
        pos += 5;

        if len & 0x8000 != 0 {
            let size_len = len & 0x7fff;
            if size_len > 4 {
                return None;
            }
            let size = data.get(pos..pos + size_len)?;
            len = size.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            pos += size_len;
        }

        let raw = data.get(pos..pos + len)?;
        pos += len;

        let key = IptcKey::new(record, dataset);
        out.add(key, IptcValue::decode(key.default_type(), raw));
    }

    diag.debug(format!("Decoded {} IPTC datasets", out.len()));
    Some(out)
}

/// Encode the store as IIM datasets, records in ascending order.
pub fn encode(data: &IptcData) -> Vec<u8> {
    let mut sorted = data.clone();
    sorted.sort_by_key(|d| d.key.record);

    let mut out = Vec::new();
    for d in &sorted {
        let bytes = d.value.encode();
        out.extend_from_slice(&[MARKER, d.key.record, d.key.dataset]);
        if bytes.len() <= 0x7fff {
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        } else {
            out.extend_from_slice(&0x8004u16.to_be_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        }
        out.extend_from_slice(&bytes);
    }
    out
}

// ============================================================================
// Photoshop image resource block (JPEG APP13)
// ============================================================================

pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const RESOURCE_SIGNATURE: &[u8] = b"8BIM";
const IPTC_RESOURCE: u16 = 0x0404;

struct Resource<'a> {
    id: u16,
    /// The whole resource, padding included.
    raw: &'a [u8],
    data: &'a [u8],
}

fn resources(block: &[u8]) -> Vec<Resource<'_>> {
    let mut out = Vec::new();
    let mut pos = block.starts_with(PHOTOSHOP_HEADER).then_some(PHOTOSHOP_HEADER.len()).unwrap_or(0);

    while pos + 12 <= block.len() {
        if &block[pos..pos + 4] != RESOURCE_SIGNATURE {
            break;
        }
        let id = u16::from_be_bytes([block[pos + 4], block[pos + 5]]);
        // Pascal string name, padded to an even size including the length byte.
        let name_len = block[pos + 6] as usize;
        let name_padded = (name_len + 2) & !1;
        let data_start = pos + 6 + name_padded;
        let Some(size) = block.get(data_start..data_start + 4) else {
            break;
        };
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        let data_end = data_start + 4 + size;
        if data_end > block.len() {
            break;
        }
        let end = (data_end + (size & 1)).min(block.len());
        out.push(Resource {
            id,
            raw: &block[pos..end],
            data: &block[data_start + 4..data_end],
        });
        pos = end;
    }
    out
}

/// IIM data held in a Photoshop resource block, if any.
pub fn iim_from_resources(block: &[u8]) -> Option<Vec<u8>> {
    let mut found = false;
    let mut out = Vec::new();
    for res in resources(block).into_iter().filter(|r| r.id == IPTC_RESOURCE) {
        found = true;
        out.extend_from_slice(res.data);
    }
    found.then_some(out)
}

/// Rebuild a resource block with `iim` as its IPTC resource. Other resources
/// are kept. Returns `None` when the result would hold no resource at all.
pub fn replace_in_resources(existing: Option<&[u8]>, iim: &[u8]) -> Option<Vec<u8>> {
    let mut out = PHOTOSHOP_HEADER.to_vec();
    let mut kept = 0;

    if let Some(block) = existing {
        for res in resources(block).into_iter().filter(|r| r.id != IPTC_RESOURCE) {
            out.extend_from_slice(res.raw);
            kept += 1;
        }
    }

    if !iim.is_empty() {
        out.extend_from_slice(RESOURCE_SIGNATURE);
        out.extend_from_slice(&IPTC_RESOURCE.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        out.extend_from_slice(iim);
        if iim.len() % 2 != 0 {
            out.push(0);
        }
        kept += 1;
    }

    (kept > 0).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::LogLevel;

    #[test]
    fn keys() {
        let key = IptcKey::parse("Iptc.Application2.Keywords").unwrap();
        assert_eq!(key, IptcKey::new(2, 25));
        assert_eq!(key.to_string(), "Iptc.Application2.Keywords");
        assert_eq!(IptcKey::parse("Iptc.Envelope.CharacterSet").unwrap().dataset, 90);
        assert_eq!(IptcKey::new(2, 250).to_string(), "Iptc.Application2.0x00fa");
        assert_eq!(IptcKey::parse("Iptc.Application2.0x00fa").unwrap().dataset, 250);
        assert!(IptcKey::parse("Iptc.Application2.Nope").is_none());
        assert!(IptcKey::parse("Exif.Application2.Keywords").is_none());
    }

    #[test]
    fn date_and_time_forms() {
        let date = IptcValue::parse(IptcType::Date, b"2019-06-23").unwrap();
        assert_eq!(date.to_bytes(), b"2019-06-23".to_vec());
        assert_eq!(date.encode(), b"20190623".to_vec());

        let time = IptcValue::parse(IptcType::Time, b"19:45:17+08:00").unwrap();
        assert_eq!(time.to_bytes(), b"19:45:17+08:00".to_vec());
        assert_eq!(time.encode(), b"194517+0800".to_vec());

        let time = IptcValue::parse(IptcType::Time, b"194517-0130").unwrap();
        assert_eq!(time.to_bytes(), b"19:45:17-01:30".to_vec());

        assert!(IptcValue::parse(IptcType::Date, b"2019-13-01").is_err());
        assert!(IptcValue::parse(IptcType::Time, b"noon").is_err());
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for text in [&b"2019-06-2-"[..], b"2019--0623", b"-2019-06-2", b"2019/06/23", b"201906+3", b"20190623x"] {
            assert!(parse_date(text).is_none(), "{:?}", String::from_utf8_lossy(text));
        }
        assert!(parse_time(b"19:45:1-").is_none());
        assert!(parse_time(b"194517+08").is_none());

        let raw = IptcValue::decode(IptcType::Date, b"2019-06-2-");
        assert_eq!(raw, IptcValue::String(b"2019-06-2-".to_vec()));
    }

    #[test]
    fn iim_round_trip_sorts_records() {
        let mut data = IptcData::new();
        data.add(IptcKey::new(2, 25), IptcValue::String(b"tag1".to_vec()));
        data.add(IptcKey::new(1, 90), IptcValue::Undefined(vec![27, 37, 71]));
        data.add(IptcKey::new(2, 25), IptcValue::String(b"tag2".to_vec()));
        data.add(IptcKey::new(2, 0), IptcValue::Short(vec![4]));

        let bytes = encode(&data);
        let mut diag = Diagnostics::new(LogLevel::Debug);
        let back = decode(&bytes, &mut diag).unwrap();
        let keys: Vec<String> = back.iter().map(|d| d.key.to_string()).collect();
        assert_eq!(
            keys,
            [
                "Iptc.Envelope.CharacterSet",
                "Iptc.Application2.Keywords",
                "Iptc.Application2.Keywords",
                "Iptc.Application2.RecordVersion",
            ]
        );
        assert_eq!(back.iter().nth(2).unwrap().value, IptcValue::String(b"tag2".to_vec()));
    }

    #[test]
    fn extended_length_dataset() {
        let mut data = IptcData::new();
        data.add(IptcKey::new(2, 202), IptcValue::Undefined(vec![7; 40_000]));
        let bytes = encode(&data);
        assert_eq!(&bytes[3..5], &[0x80, 0x04]);
        let mut diag = Diagnostics::new(LogLevel::Debug);
        let back = decode(&bytes, &mut diag).unwrap();
        assert_eq!(back.iter().next().unwrap().value, IptcValue::Undefined(vec![7; 40_000]));
    }

    #[test]
    fn truncated_dataset_fails() {
        let mut diag = Diagnostics::new(LogLevel::Debug);
        assert!(decode(&[0x1C, 2, 5, 0, 10, b'a'], &mut diag).is_none());
    }

    #[test]
    fn resource_block_keeps_other_resources() {
        // A resolution-info resource (0x03ED) with an odd-length name.
        let mut block = PHOTOSHOP_HEADER.to_vec();
        block.extend_from_slice(b"8BIM");
        block.extend_from_slice(&0x03EDu16.to_be_bytes());
        block.extend_from_slice(&[1, b'x']);
        block.extend_from_slice(&3u32.to_be_bytes());
        block.extend_from_slice(&[1, 2, 3, 0]);

        let iim = [0x1C, 2, 5, 0, 1, b'a'];
        let rebuilt = replace_in_resources(Some(&block), &iim).unwrap();
        assert!(rebuilt.starts_with(&block));
        assert_eq!(iim_from_resources(&rebuilt).unwrap(), iim.to_vec());

        let cleared = replace_in_resources(Some(&rebuilt), &[]).unwrap();
        assert_eq!(cleared, block);
        assert!(iim_from_resources(&cleared).is_none());
    }

    #[test]
    fn empty_block_is_dropped() {
        assert!(replace_in_resources(None, &[]).is_none());
    }
}
