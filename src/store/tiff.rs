//! TIFF structure codec for EXIF blocks.
//!
//! Decoding walks IFD0, the Exif, GPS and Interop sub-IFDs and IFD1 and
//! turns every entry into an [`ExifData`] item. Encoding rebuilds the whole
//! structure from the store in the original byte order. Offsets are
//! recomputed and each IFD keeps its entries sorted by tag.

use std::collections::HashSet;

use super::exif::{
    EXIF_IFD_POINTER, ExifData, ExifKey, ExifType, ExifValue, GPS_IFD_POINTER, Group,
    INTEROP_IFD_POINTER, THUMBNAIL_LENGTH, THUMBNAIL_OFFSET, is_structural,
};
use crate::diagnostics::Diagnostics;

/// Byte order of a TIFF structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn marker(self) -> &'static [u8; 2] {
        match self {
            ByteOrder::LittleEndian => b"II",
            ByteOrder::BigEndian => b"MM",
        }
    }

    pub fn u16(self, b: &[u8]) -> u16 {
        let bytes = [b[0], b[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    pub fn u32(self, b: &[u8]) -> u32 {
        let bytes = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    pub fn u64(self, b: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&b[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
        }
    }

    pub fn encode_u16(self, val: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => val.to_le_bytes(),
            ByteOrder::BigEndian => val.to_be_bytes(),
        }
    }

    pub fn encode_u32(self, val: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => val.to_le_bytes(),
            ByteOrder::BigEndian => val.to_be_bytes(),
        }
    }

    pub fn encode_u64(self, val: u64) -> [u8; 8] {
        match self {
            ByteOrder::LittleEndian => val.to_le_bytes(),
            ByteOrder::BigEndian => val.to_be_bytes(),
        }
    }
}

const TIFF_MAGIC: u16 = 42;
const IFD_ENTRY_SIZE: usize = 12;

// ============================================================================
// Decoding
// ============================================================================

struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
    visited: HashSet<usize>,
}

/// Pointers collected while reading one IFD.
#[derive(Default)]
struct Links {
    exif: Option<usize>,
    gps: Option<usize>,
    interop: Option<usize>,
    thumb_offset: Option<usize>,
    thumb_length: Option<usize>,
    next: Option<usize>,
}

impl Reader<'_> {
    fn read_ifd(
        &mut self,
        offset: usize,
        group: Group,
        out: &mut ExifData,
        diag: &mut Diagnostics,
    ) -> Links {
        let mut links = Links::default();

        if !self.visited.insert(offset) {
            diag.warn(format!("Directory {group} at offset {offset} was already read; skipping"));
            return links;
        }
        if offset + 2 > self.data.len() {
            diag.warn(format!("Directory {group}: offset {offset} is out of bounds"));
            return links;
        }

        let count = self.order.u16(&self.data[offset..]) as usize;
        let entries_start = offset + 2;
        let entries_end = entries_start + count * IFD_ENTRY_SIZE;
        if entries_end > self.data.len() {
            diag.warn(format!(
                "Directory {group} with {count} entries considered invalid; not read"
            ));
            return links;
        }

        for i in 0..count {
            let pos = entries_start + i * IFD_ENTRY_SIZE;
            let entry = &self.data[pos..pos + IFD_ENTRY_SIZE];
            let tag = self.order.u16(&entry[0..2]);
            let type_id = self.order.u16(&entry[2..4]);
            let components = self.order.u32(&entry[4..8]) as usize;

            let Some(ty) = ExifType::from_id(type_id) else {
                diag.warn(format!(
                    "Directory {group}, entry 0x{tag:04x} has unknown Exif (TIFF) type {type_id}; skipping"
                ));
                continue;
            };

            let Some(size) = components.checked_mul(ty.unit_size()) else {
                diag.warn(format!("Directory {group}, entry 0x{tag:04x}: size overflow"));
                continue;
            };
            let raw = if size <= 4 {
                &entry[8..8 + size]
            } else {
                let data_offset = self.order.u32(&entry[8..12]) as usize;
                match self.data.get(data_offset..data_offset.saturating_add(size)) {
                    Some(raw) => raw,
                    None => {
                        diag.warn(format!(
                            "Directory {group}, entry 0x{tag:04x}: data area exceeds data buffer, ignoring it"
                        ));
                        continue;
                    }
                }
            };

            if is_structural(group, tag) {
                let value = match raw.len() {
                    n if n >= 4 => Some(self.order.u32(raw) as usize),
                    n if n >= 2 => Some(self.order.u16(raw) as usize),
                    _ => None,
                };
                match tag {
                    EXIF_IFD_POINTER if group == Group::Image => links.exif = value,
                    GPS_IFD_POINTER if group == Group::Image => links.gps = value,
                    INTEROP_IFD_POINTER => links.interop = value,
                    THUMBNAIL_OFFSET => links.thumb_offset = value,
                    THUMBNAIL_LENGTH => links.thumb_length = value,
                    _ => {}
                }
                continue;
            }

            let key = ExifKey::new(group, tag);
            let value = ExifValue::decode(ty, raw, self.order, key.default_type());
            out.entries.add(key, value);
        }

        if let Some(next) = self.data.get(entries_end..entries_end + 4) {
            let next = self.order.u32(next) as usize;
            if next != 0 {
                links.next = Some(next);
            }
        }
        links
    }
}

/// Decode a TIFF structure (the contents of an EXIF block without the
/// `Exif\0\0` prefix). Returns `None` when the header is not TIFF.
pub fn decode(data: &[u8], diag: &mut Diagnostics) -> Option<ExifData> {
    if data.len() < 8 {
        return None;
    }
    let order = match &data[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return None,
    };
    if order.u16(&data[2..4]) != TIFF_MAGIC {
        return None;
    }

    let mut out = ExifData {
        byte_order: order,
        ..ExifData::default()
    };
    let mut reader = Reader {
        data,
        order,
        visited: HashSet::new(),
    };

    let ifd0 = order.u32(&data[4..8]) as usize;
    let links = reader.read_ifd(ifd0, Group::Image, &mut out, diag);

    if let Some(exif) = links.exif {
        let sub = reader.read_ifd(exif, Group::Photo, &mut out, diag);
        if let Some(interop) = sub.interop {
            reader.read_ifd(interop, Group::Iop, &mut out, diag);
        }
    }
    if let Some(gps) = links.gps {
        reader.read_ifd(gps, Group::GpsInfo, &mut out, diag);
    }
    if let Some(ifd1) = links.next {
        let thumb = reader.read_ifd(ifd1, Group::Thumbnail, &mut out, diag);
        if let (Some(offset), Some(length)) = (thumb.thumb_offset, thumb.thumb_length) {
            match data.get(offset..offset.saturating_add(length)) {
                Some(bytes) if length > 0 => out.thumbnail = Some(bytes.to_vec()),
                Some(_) => {}
                None => diag.warn("Thumbnail data exceeds the Exif block; dropping it"),
            }
        }
    }

    diag.debug(format!("Decoded {} Exif entries", out.entries.len()));
    Some(out)
}

// ============================================================================
// Encoding
// ============================================================================

struct Field {
    tag: u16,
    type_id: u16,
    count: u32,
    data: Vec<u8>,
}

impl Field {
    fn placeholder(tag: u16) -> Self {
        Self {
            tag,
            type_id: ExifType::Long.id(),
            count: 1,
            data: vec![0; 4],
        }
    }
}

struct IfdLayout {
    offset: u32,
    /// Position of each entry's 4-byte value field, by tag.
    value_slots: Vec<(u16, usize)>,
    next_slot: usize,
}

impl IfdLayout {
    fn slot(&self, tag: u16) -> Option<usize> {
        self.value_slots.iter().find(|(t, _)| *t == tag).map(|(_, p)| *p)
    }
}

struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    fn align(&mut self) {
        if self.buf.len() % 2 != 0 {
            self.buf.push(0);
        }
    }

    fn offset(&self) -> u32 {
        self.buf.len() as u32
    }

    fn patch_u32(&mut self, at: usize, val: u32) {
        let bytes = self.order.encode_u32(val);
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn write_ifd(&mut self, mut fields: Vec<Field>) -> IfdLayout {
        fields.sort_by_key(|f| f.tag);
        self.align();

        let offset = self.offset();
        let order = self.order;
        self.buf.extend_from_slice(&order.encode_u16(fields.len() as u16));

        let mut value_slots = Vec::with_capacity(fields.len());
        let mut deferred: Vec<(usize, &[u8])> = Vec::new();
        for field in &fields {
            self.buf.extend_from_slice(&order.encode_u16(field.tag));
            self.buf.extend_from_slice(&order.encode_u16(field.type_id));
            self.buf.extend_from_slice(&order.encode_u32(field.count));
            let slot = self.buf.len();
            value_slots.push((field.tag, slot));
            if field.data.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..field.data.len()].copy_from_slice(&field.data);
                self.buf.extend_from_slice(&inline);
            } else {
                self.buf.extend_from_slice(&[0u8; 4]);
                deferred.push((slot, &field.data));
            }
        }

        let next_slot = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);

        for (slot, data) in deferred {
            self.align();
            let at = self.offset();
            self.buf.extend_from_slice(data);
            let bytes = order.encode_u32(at);
            self.buf[slot..slot + 4].copy_from_slice(&bytes);
        }

        IfdLayout {
            offset,
            value_slots,
            next_slot,
        }
    }
}

fn fields_of(exif: &ExifData, group: Group) -> Vec<Field> {
    exif.entries
        .iter()
        // Sub-IFD pointers and thumbnail offsets are written from the layout.
        .filter(|d| d.key.group == group && !is_structural(d.key.group, d.key.tag))
        .map(|d| {
            let (type_id, count, data) = d.value.encode(exif.byte_order);
            Field {
                tag: d.key.tag,
                type_id,
                count,
                data,
            }
        })
        .collect()
}

/// Encode the store into a TIFF structure. Returns `None` for an empty store.
pub fn encode(exif: &ExifData) -> Option<Vec<u8>> {
    if exif.is_empty() {
        return None;
    }

    let order = exif.byte_order;
    let mut w = Writer {
        buf: Vec::new(),
        order,
    };
    w.buf.extend_from_slice(order.marker());
    w.buf.extend_from_slice(&order.encode_u16(TIFF_MAGIC));
    w.buf.extend_from_slice(&order.encode_u32(8));

    let photo = fields_of(exif, Group::Photo);
    let iop = fields_of(exif, Group::Iop);
    let gps = fields_of(exif, Group::GpsInfo);
    let mut thumb = fields_of(exif, Group::Thumbnail);

    let has_photo = !photo.is_empty() || !iop.is_empty();
    let has_gps = !gps.is_empty();

    let mut ifd0 = fields_of(exif, Group::Image);
    if has_photo {
        ifd0.push(Field::placeholder(EXIF_IFD_POINTER));
    }
    if has_gps {
        ifd0.push(Field::placeholder(GPS_IFD_POINTER));
    }
    let ifd0 = w.write_ifd(ifd0);

    if has_photo {
        let mut photo = photo;
        if !iop.is_empty() {
            photo.push(Field::placeholder(INTEROP_IFD_POINTER));
        }
        let photo_layout = w.write_ifd(photo);
        if let Some(slot) = ifd0.slot(EXIF_IFD_POINTER) {
            w.patch_u32(slot, photo_layout.offset);
        }
        if !iop.is_empty() {
            let iop_layout = w.write_ifd(iop);
            if let Some(slot) = photo_layout.slot(INTEROP_IFD_POINTER) {
                w.patch_u32(slot, iop_layout.offset);
            }
        }
    }

    if has_gps {
        let gps_layout = w.write_ifd(gps);
        if let Some(slot) = ifd0.slot(GPS_IFD_POINTER) {
            w.patch_u32(slot, gps_layout.offset);
        }
    }

    if !thumb.is_empty() || exif.thumbnail.is_some() {
        if let Some(data) = &exif.thumbnail {
            thumb.push(Field::placeholder(THUMBNAIL_OFFSET));
            let mut length = Field::placeholder(THUMBNAIL_LENGTH);
            length.data = order.encode_u32(data.len() as u32).to_vec();
            thumb.push(length);
        }
        let ifd1 = w.write_ifd(thumb);
        w.patch_u32(ifd0.next_slot, ifd1.offset);

        if let Some(data) = &exif.thumbnail {
            w.align();
            let at = w.offset();
            w.buf.extend_from_slice(data);
            if let Some(slot) = ifd1.slot(THUMBNAIL_OFFSET) {
                w.patch_u32(slot, at);
            }
        }
    }

    Some(w.buf)
}
