use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Look up an encoding by its WHATWG label (`"utf-8"`, `"gbk"`, `"shift_jis"`, ...).
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Encoding(format!("unknown encoding '{label}'")))
}

/// Encode UTF-8 text into `label`'s byte representation.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>> {
    let encoding = lookup(label)?;
    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(Error::Encoding(format!(
            "'{text}' cannot be represented in {}",
            used.name()
        )));
    }
    Ok(bytes.into_owned())
}

/// Re-encode raw UTF-8 bytes (as carried by a [`TagRow`](super::TagRow)) into `label`.
pub fn transcode(utf8: &[u8], label: &str) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(utf8)
        .map_err(|e| Error::Encoding(format!("row text is not valid UTF-8: {e}")))?;
    encode(text, label)
}

/// Decode bytes stored in `label` back into text.
pub fn decode(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = lookup(label)?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(Error::Encoding(format!(
            "bytes are not valid {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_identity() {
        assert_eq!(encode("test-中文-", "utf-8").unwrap(), "test-中文-".as_bytes());
    }

    #[test]
    fn gbk_round_trip() {
        let bytes = encode("test-中文-", "gbk").unwrap();
        assert_ne!(bytes, "test-中文-".as_bytes());
        assert_eq!(decode(&bytes, "gbk").unwrap(), "test-中文-");
    }

    #[test]
    fn latin1_round_trip() {
        let bytes = encode("café", "windows-1252").unwrap();
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode(&bytes, "latin1").unwrap(), "café");
    }

    #[test]
    fn unknown_label() {
        assert!(matches!(lookup("klingon"), Err(Error::Encoding(_))));
    }

    #[test]
    fn unmappable_text() {
        assert!(matches!(encode("中", "windows-1252"), Err(Error::Encoding(_))));
    }

    #[test]
    fn transcode_rejects_invalid_utf8() {
        assert!(transcode(&[0xFF, 0xFE], "utf-8").is_err());
    }
}
