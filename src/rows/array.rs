/// Separator between the pieces of a multi-value field on the wire.
pub const ARRAY_SEPARATOR: &[u8] = b", ";

/// Split `value` on every occurrence of `separator`.
///
/// Empty pieces are kept, so `"a, , b"` yields three pieces and `"a, "`
/// yields two, the last one empty.
pub fn split(value: &[u8], separator: &[u8]) -> Vec<Vec<u8>> {
    if separator.is_empty() {
        return vec![value.to_vec()];
    }

    let mut pieces = Vec::new();
    let mut pos = 0;
    while let Some(found) = find(&value[pos..], separator) {
        pieces.push(value[pos..pos + found].to_vec());
        pos += found + separator.len();
    }
    pieces.push(value[pos..].to_vec());
    pieces
}

/// Join `pieces` with `separator`; the inverse of [`split`].
pub fn join<P: AsRef<[u8]>>(pieces: &[P], separator: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(separator);
        }
        out.extend_from_slice(piece.as_ref());
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_str(s: &str) -> Vec<String> {
        split(s.as_bytes(), ARRAY_SEPARATOR)
            .into_iter()
            .map(|p| String::from_utf8(p).unwrap())
            .collect()
    }

    #[test]
    fn split_plain() {
        assert_eq!(split_str("a, b, c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_keeps_empty_middle() {
        assert_eq!(split_str("a, , b"), vec!["a", "", "b"]);
    }

    #[test]
    fn split_keeps_empty_tail() {
        assert_eq!(split_str("a, "), vec!["a", ""]);
    }

    #[test]
    fn split_single() {
        assert_eq!(split_str("a"), vec!["a"]);
        assert_eq!(split_str(""), vec![""]);
    }

    #[test]
    fn split_comma_without_space_is_not_a_separator() {
        assert_eq!(split_str("a,b, c"), vec!["a,b", "c"]);
    }

    #[test]
    fn join_matches_std_split() {
        for s in ["a, b", "a, , b", ", ", "x"] {
            let pieces = split(s.as_bytes(), ARRAY_SEPARATOR);
            assert_eq!(join(&pieces, ARRAY_SEPARATOR), s.as_bytes());
            let std_pieces: Vec<&str> = s.split(", ").collect();
            assert_eq!(split_str(s), std_pieces);
        }
    }
}
