use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use imgmeta::{ByteBuffer, Config, Error, Image, LogLevel, TagRow};
use tempfile::TempDir;

fn encoded(format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(16, 16, image::Rgb([200, 120, 40]))
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn open(data: &[u8]) -> Image {
    Image::from_buffer(&ByteBuffer::from_slice(data).unwrap()).unwrap()
}

fn reopen(img: &Image) -> Image {
    open(&img.raw_bytes().unwrap())
}

/// `(key, value)` pairs of a read, values decoded as UTF-8.
fn pairs(rows: &[TagRow]) -> Vec<(String, String)> {
    rows.iter()
        .map(|r| (r.key_str(), String::from_utf8_lossy(&r.value).into_owned()))
        .collect()
}

fn value_of(rows: &[TagRow], key: &str) -> Option<String> {
    pairs(rows).into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

// ── EXIF ─────────────────────────────────────────────────────────────

#[test]
fn exif_values_survive_reopen() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(
        &[
            TagRow::scalar("Exif.Image.Artist", "Jane Doe"),
            TagRow::scalar("Exif.Image.Orientation", "6"),
            TagRow::scalar("Exif.Image.XResolution", "72/1"),
            TagRow::scalar("Exif.Photo.DateTimeOriginal", "2019:06:23 19:45:17"),
            TagRow::scalar("Exif.GPSInfo.GPSLatitudeRef", "N"),
        ],
        "utf-8",
    )
    .unwrap();

    let mut img = reopen(&img);
    let rows = img.read_exif().unwrap();
    assert_eq!(value_of(&rows, "Exif.Image.Artist").as_deref(), Some("Jane Doe"));
    assert_eq!(value_of(&rows, "Exif.Image.Orientation").as_deref(), Some("6"));
    assert_eq!(value_of(&rows, "Exif.Image.XResolution").as_deref(), Some("72/1"));
    assert_eq!(
        value_of(&rows, "Exif.Photo.DateTimeOriginal").as_deref(),
        Some("2019:06:23 19:45:17")
    );
    assert_eq!(value_of(&rows, "Exif.GPSInfo.GPSLatitudeRef").as_deref(), Some("N"));

    let artist = rows.iter().find(|r| r.key_str() == "Exif.Image.Artist").unwrap();
    assert_eq!(artist.type_name, "Ascii");
}

#[test]
fn exif_empty_value_deletes() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "Jane")], "utf-8").unwrap();
    img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "")], "utf-8").unwrap();

    let mut img = reopen(&img);
    assert!(value_of(&img.read_exif().unwrap(), "Exif.Image.Artist").is_none());
}

#[test]
fn exif_keys_stay_unique() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(&[TagRow::scalar("Exif.Image.Software", "one")], "utf-8").unwrap();
    img.modify_exif(&[TagRow::scalar("Exif.Image.Software", "two")], "utf-8").unwrap();

    let rows = img.read_exif().unwrap();
    let software: Vec<_> = pairs(&rows)
        .into_iter()
        .filter(|(k, _)| k == "Exif.Image.Software")
        .collect();
    assert_eq!(software, vec![("Exif.Image.Software".to_string(), "two".to_string())]);
}

#[test]
fn exif_on_webp() {
    let mut img = open(&encoded(ImageFormat::WebP));
    img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "webp")], "utf-8").unwrap();

    let mut img = reopen(&img);
    assert_eq!(value_of(&img.read_exif().unwrap(), "Exif.Image.Artist").as_deref(), Some("webp"));
}

// ── IPTC ─────────────────────────────────────────────────────────────

#[test]
fn iptc_array_gives_one_dataset_per_piece() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_iptc(
        &[
            TagRow::array("Iptc.Application2.Keywords", &["a", "b", "c"]),
            TagRow::scalar("Iptc.Application2.Caption", "lake at dusk"),
        ],
        "utf-8",
    )
    .unwrap();

    let mut img = reopen(&img);
    let rows = img.read_iptc().unwrap();
    let keywords: Vec<_> = pairs(&rows)
        .into_iter()
        .filter(|(k, _)| k == "Iptc.Application2.Keywords")
        .map(|(_, v)| v)
        .collect();
    assert_eq!(keywords, vec!["a", "b", "c"]);
    assert_eq!(
        value_of(&rows, "Iptc.Application2.Caption").as_deref(),
        Some("lake at dusk")
    );
}

#[test]
fn iptc_rewrite_replaces_every_dataset() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    let key = "Iptc.Application2.Keywords";
    img.modify_iptc(&[TagRow::array(key, &["a", "b", "c"])], "utf-8").unwrap();
    img.modify_iptc(&[TagRow::array(key, &["x", "y"])], "utf-8").unwrap();

    let rows = img.read_iptc().unwrap();
    let keywords: Vec<_> = pairs(&rows).into_iter().filter(|(k, _)| k == key).collect();
    assert_eq!(keywords.len(), 2);
    assert_eq!(keywords[0].1, "x");

    img.modify_iptc(&[TagRow::scalar(key, "")], "utf-8").unwrap();
    let mut img = reopen(&img);
    assert!(img.read_iptc().unwrap().is_empty());
}

#[test]
fn iptc_array_keeps_empty_pieces() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_iptc(
        &[TagRow::new("Iptc.Application2.Keywords", "a, , b", "array")],
        "utf-8",
    )
    .unwrap();
    let values: Vec<_> = pairs(&img.read_iptc().unwrap()).into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec!["a", "", "b"]);
}

#[test]
fn iptc_dates_and_times() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_iptc(
        &[
            TagRow::scalar("Iptc.Application2.DateCreated", "2019-06-23"),
            TagRow::scalar("Iptc.Application2.TimeCreated", "19:45:17+08:00"),
        ],
        "utf-8",
    )
    .unwrap();

    let mut img = reopen(&img);
    let rows = img.read_iptc().unwrap();
    assert_eq!(value_of(&rows, "Iptc.Application2.DateCreated").as_deref(), Some("2019-06-23"));
    assert_eq!(
        value_of(&rows, "Iptc.Application2.TimeCreated").as_deref(),
        Some("19:45:17+08:00")
    );
}

#[test]
fn iptc_malformed_date_is_a_store_error() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    for bad in ["2019-06-2-", "2019--0623", "06/23/2019"] {
        let err = img
            .modify_iptc(&[TagRow::scalar("Iptc.Application2.DateCreated", bad)], "utf-8")
            .unwrap_err();
        assert!(matches!(err, Error::Store(ref m) if m.contains(bad)), "{bad}: {err:?}");
    }
    assert!(img.read_iptc().unwrap().is_empty());
}

#[test]
fn iptc_in_png_is_refused() {
    let mut img = open(&encoded(ImageFormat::Png));
    let err = img
        .modify_iptc(&[TagRow::scalar("Iptc.Application2.Caption", "x")], "utf-8")
        .unwrap_err();
    match err {
        Error::Store(msg) => assert_eq!(msg, "Setting IPTC metadata in PNG images is not supported"),
        other => panic!("unexpected: {other:?}"),
    }
}

// ── XMP ──────────────────────────────────────────────────────────────

#[test]
fn xmp_values_survive_reopen() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_xmp(
        &[
            TagRow::scalar("Xmp.xmp.Rating", "5"),
            TagRow::array("Xmp.dc.subject", &["tree", "sky"]),
            TagRow::array("Xmp.dc.creator", &["Jane"]),
            TagRow::scalar("Xmp.dc.title", "lang=\"x-default\" Lake"),
        ],
        "utf-8",
    )
    .unwrap();

    let mut img = reopen(&img);
    let rows = img.read_xmp().unwrap();
    assert_eq!(value_of(&rows, "Xmp.xmp.Rating").as_deref(), Some("5"));
    assert_eq!(value_of(&rows, "Xmp.dc.subject").as_deref(), Some("tree, sky"));
    assert_eq!(value_of(&rows, "Xmp.dc.creator").as_deref(), Some("Jane"));
    assert_eq!(value_of(&rows, "Xmp.dc.title").as_deref(), Some("lang=\"x-default\" Lake"));

    let subject = rows.iter().find(|r| r.key_str() == "Xmp.dc.subject").unwrap();
    assert_eq!(subject.type_name, "XmpBag");
}

#[test]
fn xmp_in_png() {
    let mut img = open(&encoded(ImageFormat::Png));
    img.modify_xmp(&[TagRow::scalar("Xmp.xmp.Label", "red")], "utf-8").unwrap();

    let mut img = reopen(&img);
    assert_eq!(value_of(&img.read_xmp().unwrap(), "Xmp.xmp.Label").as_deref(), Some("red"));
    assert!(img.read_raw_xmp().unwrap().contains("red"));
}

#[test]
fn raw_xmp_is_fixed_at_open() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_xmp(&[TagRow::scalar("Xmp.xmp.Label", "first")], "utf-8").unwrap();

    let mut img = reopen(&img);
    let packet = img.read_raw_xmp().unwrap();
    assert!(packet.contains("first"));

    img.modify_xmp(&[TagRow::scalar("Xmp.xmp.Label", "second")], "utf-8").unwrap();
    assert_eq!(img.read_raw_xmp().unwrap(), packet);
}

#[test]
fn xmp_unknown_prefix_is_reported() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    let err = img
        .modify_xmp(&[TagRow::scalar("Xmp.nosuch.Thing", "x")], "utf-8")
        .unwrap_err();
    assert!(matches!(err, Error::Store(ref m) if m.contains("nosuch")));
}

#[test]
fn resetting_a_struct_array_fails_until_muted() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_xmp(
        &[
            TagRow::scalar("Xmp.xmpMM.History", "type=\"Seq\""),
            TagRow::scalar("Xmp.xmpMM.History[1]/stEvt:action", "saved"),
        ],
        "utf-8",
    )
    .unwrap();
    let mut img = reopen(&img);
    assert_eq!(
        value_of(&img.read_xmp().unwrap(), "Xmp.xmpMM.History[1]/stEvt:action").as_deref(),
        Some("saved")
    );

    // The container moves behind its own fields.
    let history = [TagRow::scalar("Xmp.xmpMM.History", "type=\"Seq\"")];
    let err = img.modify_xmp(&history, "utf-8").unwrap_err();
    match err {
        Error::Store(msg) => assert_eq!(
            msg,
            "XMP Toolkit error 102: Indexing applied to non-array\nFailed to encode XMP metadata."
        ),
        other => panic!("unexpected: {other:?}"),
    }

    // The failure was drained; reads work again.
    assert!(img.read_xmp().is_ok());

    img.set_log_level(LogLevel::Mute);
    assert!(img.modify_xmp(&history, "utf-8").is_ok());
}

// ── Encodings ────────────────────────────────────────────────────────

#[test]
fn gbk_text_round_trips() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(&[TagRow::scalar("Exif.Image.ImageDescription", "湖光山色")], "gbk")
        .unwrap();
    img.modify_iptc(&[TagRow::array("Iptc.Application2.Keywords", &["湖", "山"])], "gbk")
        .unwrap();

    let mut img = reopen(&img);
    let exif = img.read_exif().unwrap();
    let desc = exif
        .iter()
        .find(|r| r.key_str() == "Exif.Image.ImageDescription")
        .unwrap();
    assert_ne!(desc.value, "湖光山色".as_bytes().to_vec());
    assert_eq!(desc.decode_value("gbk").unwrap(), "湖光山色");

    let keywords: Vec<String> = img
        .read_iptc()
        .unwrap()
        .iter()
        .map(|r| r.decode_value("gbk").unwrap())
        .collect();
    assert_eq!(keywords, vec!["湖", "山"]);
}

#[test]
fn user_comment_in_gbk() {
    let key = "Exif.Photo.UserComment";
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(&[TagRow::scalar(key, "charset=Ascii 中文")], "gbk").unwrap();

    let mut img = reopen(&img);
    let exif = img.read_exif().unwrap();
    let comment = exif.iter().find(|r| r.key_str() == key).unwrap();
    assert_eq!(comment.decode_value("gbk").unwrap(), "charset=Ascii 中文");

    // UCS-2 comments are built from UTF-8 text; GBK bytes cannot be converted.
    let err = img
        .modify_exif(&[TagRow::scalar(key, "charset=Unicode 中文")], "gbk")
        .unwrap_err();
    assert!(matches!(err, Error::Store(ref m) if m.contains("Comment")));

    img.modify_exif(&[TagRow::scalar(key, "charset=Unicode 中文")], "utf-8").unwrap();
    let mut img = reopen(&img);
    assert_eq!(
        value_of(&img.read_exif().unwrap(), key).as_deref(),
        Some("charset=Unicode 中文")
    );
}

#[test]
fn unmappable_text_is_an_encoding_error() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    let err = img
        .modify_exif(&[TagRow::scalar("Exif.Image.Artist", "😀")], "gbk")
        .unwrap_err();
    assert!(matches!(err, Error::Encoding(_)));
}

// ── Comment and ICC ──────────────────────────────────────────────────

#[test]
fn comment_round_trip_and_clear() {
    for format in [ImageFormat::Jpeg, ImageFormat::Png] {
        let mut img = open(&encoded(format));
        img.modify_comment("Hello there", "utf-8").unwrap();

        let mut img = reopen(&img);
        assert_eq!(img.read_comment().unwrap(), b"Hello there".to_vec());

        img.clear_comment().unwrap();
        let mut img = reopen(&img);
        assert!(img.read_comment().unwrap().is_empty());
    }
}

#[test]
fn icc_profile_lifecycle() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    assert!(matches!(img.read_icc(), Err(Error::NotPresent(_))));

    let profile: Vec<u8> = (0..=255u8).cycle().take(600).collect();
    img.modify_icc(&profile).unwrap();
    let mut img = reopen(&img);
    assert_eq!(img.read_icc().unwrap(), profile);

    img.clear_icc().unwrap();
    let mut img = reopen(&img);
    assert!(matches!(img.read_icc(), Err(Error::NotPresent(_))));
}

// ── Clearing ─────────────────────────────────────────────────────────

#[test]
fn clear_each_domain() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "a")], "utf-8").unwrap();
    img.modify_iptc(&[TagRow::scalar("Iptc.Application2.Caption", "b")], "utf-8").unwrap();
    img.modify_xmp(&[TagRow::scalar("Xmp.xmp.Label", "c")], "utf-8").unwrap();

    img.clear_exif().unwrap();
    img.clear_iptc().unwrap();
    img.clear_xmp().unwrap();

    let mut img = reopen(&img);
    assert!(img.read_exif().unwrap().is_empty());
    assert!(img.read_iptc().unwrap().is_empty());
    assert!(img.read_xmp().unwrap().is_empty());
    assert_eq!(img.read_raw_xmp().unwrap(), "");
}

// ── Damaged metadata ─────────────────────────────────────────────────

/// Insert a segment right after the JPEG start-of-image marker.
fn with_segment(jpeg: &[u8], marker: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((contents.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(contents);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn exif_segment(tiff: &[u8]) -> Vec<u8> {
    [&b"Exif\0\0"[..], tiff].concat()
}

fn iptc_segment(iim: &[u8]) -> Vec<u8> {
    let mut block = b"Photoshop 3.0\08BIM\x04\x04\0\0".to_vec();
    block.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    block.extend_from_slice(iim);
    if iim.len() % 2 == 1 {
        block.push(0);
    }
    block
}

fn xmp_segment(packet: &[u8]) -> Vec<u8> {
    [&b"http://ns.adobe.com/xap/1.0/\0"[..], packet].concat()
}

#[test]
fn damaged_exif_reads_as_empty() {
    let jpeg = encoded(ImageFormat::Jpeg);

    // IFD0 claims 0xffff entries but the block ends after the count.
    let mut truncated = b"II*\0".to_vec();
    truncated.extend_from_slice(&8u32.to_le_bytes());
    truncated.extend_from_slice(&0xffffu16.to_le_bytes());

    // IFD0 holds an Exif pointer back to itself and links to itself as the next IFD.
    let mut looping = b"II*\0".to_vec();
    looping.extend_from_slice(&8u32.to_le_bytes());
    looping.extend_from_slice(&1u16.to_le_bytes());
    looping.extend_from_slice(&0x8769u16.to_le_bytes());
    looping.extend_from_slice(&4u16.to_le_bytes());
    looping.extend_from_slice(&1u32.to_le_bytes());
    looping.extend_from_slice(&8u32.to_le_bytes());
    looping.extend_from_slice(&8u32.to_le_bytes());

    // An entry whose data area lies far outside the block.
    let mut out_of_range = b"MM\0*".to_vec();
    out_of_range.extend_from_slice(&8u32.to_be_bytes());
    out_of_range.extend_from_slice(&1u16.to_be_bytes());
    out_of_range.extend_from_slice(&0x013bu16.to_be_bytes());
    out_of_range.extend_from_slice(&2u16.to_be_bytes());
    out_of_range.extend_from_slice(&64u32.to_be_bytes());
    out_of_range.extend_from_slice(&0x00ff_0000u32.to_be_bytes());
    out_of_range.extend_from_slice(&0u32.to_be_bytes());

    for tiff in [truncated, looping, out_of_range, b"not tiff at all".to_vec()] {
        let mut img = open(&with_segment(&jpeg, 0xE1, &exif_segment(&tiff)));
        assert!(img.read_exif().unwrap().is_empty());

        img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "fixed")], "utf-8").unwrap();
        let mut img = reopen(&img);
        assert_eq!(value_of(&img.read_exif().unwrap(), "Exif.Image.Artist").as_deref(), Some("fixed"));
    }
}

#[test]
fn damaged_iptc_reads_as_empty_or_raw() {
    let jpeg = encoded(ImageFormat::Jpeg);

    // Caption announces 80 bytes but carries one.
    let mut img = open(&with_segment(&jpeg, 0xED, &iptc_segment(b"\x1c\x02\x78\x00\x50a")));
    assert!(img.read_iptc().unwrap().is_empty());

    // Extended length with an oversized size field.
    let mut img = open(&with_segment(&jpeg, 0xED, &iptc_segment(b"\x1c\x02\x78\x80\x09")));
    assert!(img.read_iptc().unwrap().is_empty());

    // A DateCreated that is not a date is kept as the stored text.
    let mut iim = b"\x1c\x02\x37\x00\x0a".to_vec();
    iim.extend_from_slice(b"2019-06-2-");
    let mut img = open(&with_segment(&jpeg, 0xED, &iptc_segment(&iim)));
    assert_eq!(
        value_of(&img.read_iptc().unwrap(), "Iptc.Application2.DateCreated").as_deref(),
        Some("2019-06-2-")
    );

    // A resource whose size runs past the block is not IPTC data.
    let mut block = b"Photoshop 3.0\08BIM\x04\x04\0\0".to_vec();
    block.extend_from_slice(&1000u32.to_be_bytes());
    block.extend_from_slice(b"\x1c\x02");
    let mut img = open(&with_segment(&jpeg, 0xED, &block));
    assert!(img.read_iptc().unwrap().is_empty());
}

#[test]
fn damaged_xmp_reads_as_empty() {
    let jpeg = encoded(ImageFormat::Jpeg);

    let broken = b"<x:xmpmeta><rdf:RDF></x:xmpmeta>";
    let mut img = open(&with_segment(&jpeg, 0xE1, &xmp_segment(broken)));
    assert!(img.read_xmp().unwrap().is_empty());
    assert_eq!(img.read_raw_xmp().unwrap().as_bytes(), broken);

    let mut img = open(&with_segment(&jpeg, 0xE1, &xmp_segment(b"\xff\xfe<x:xmpmeta/>")));
    assert!(img.read_xmp().unwrap().is_empty());
    assert_eq!(img.read_raw_xmp().unwrap(), "");

    let mut img = open(&with_segment(&jpeg, 0xE1, &xmp_segment(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>")));
    assert!(img.read_xmp().unwrap().is_empty());
    img.modify_xmp(&[TagRow::scalar("Xmp.xmp.Label", "ok")], "utf-8").unwrap();
    assert_eq!(value_of(&img.read_xmp().unwrap(), "Xmp.xmp.Label").as_deref(), Some("ok"));
}

// ── Session lifecycle ────────────────────────────────────────────────

#[test]
fn non_images_fail_to_open() {
    let buffer = ByteBuffer::from_slice(b"definitely not an image").unwrap();
    assert!(matches!(Image::from_buffer(&buffer), Err(Error::Open(_))));

    let dir = TempDir::new().unwrap();
    assert!(matches!(Image::open(dir.path().join("missing.jpg")), Err(Error::Open(_))));
}

#[test]
fn operations_after_close_fail() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.close();
    img.close();

    assert!(matches!(img.read_iptc(), Err(Error::UseAfterClose)));
    assert!(matches!(img.read_comment(), Err(Error::UseAfterClose)));
    assert!(matches!(
        img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "a")], "utf-8"),
        Err(Error::UseAfterClose)
    ));
}

#[test]
fn errors_do_not_leak_into_the_next_call() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    assert!(img
        .modify_exif(&[TagRow::scalar("Exif.Image.NoSuchTag", "x")], "utf-8")
        .is_err());
    assert!(img.read_exif().is_ok());
    assert!(img
        .modify_exif(&[TagRow::scalar("Exif.Image.Artist", "fine")], "utf-8")
        .is_ok());
}

#[test]
fn muted_session_swallows_store_errors() {
    let mut img = open(&encoded(ImageFormat::Jpeg));
    img.set_log_level(LogLevel::Mute);
    assert!(img
        .modify_exif(&[TagRow::scalar("Exif.Image.NoSuchTag", "x")], "utf-8")
        .is_ok());
}

// ── Files ────────────────────────────────────────────────────────────

#[test]
fn changes_are_written_to_disk_with_backup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    let original = encoded(ImageFormat::Jpeg);
    std::fs::write(&path, &original).unwrap();

    let config = Config {
        backup_originals: true,
        ..Config::default()
    };
    {
        let mut img = Image::open_with(&path, &config).unwrap();
        img.modify_exif(&[TagRow::scalar("Exif.Image.Artist", "disk")], "utf-8").unwrap();
        img.modify_comment("second write", "utf-8").unwrap();
    }

    let backup = dir.path().join("photo.jpg.bak");
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let mut img = Image::open(&path).unwrap();
    assert_eq!(value_of(&img.read_exif().unwrap(), "Exif.Image.Artist").as_deref(), Some("disk"));
    assert_eq!(img.read_comment().unwrap(), b"second write".to_vec());
    assert_eq!(std::fs::read(&path).unwrap(), img.raw_bytes().unwrap());
}

#[test]
fn memory_images_update_raw_bytes() {
    let data = encoded(ImageFormat::Png);
    let mut img = open(&data);
    img.modify_comment("in memory", "utf-8").unwrap();
    assert_ne!(img.raw_bytes().unwrap(), data);
}
