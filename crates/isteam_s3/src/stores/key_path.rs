//! Storage key naming for cached images
//!
//! Derived images live under `isteam/<original path>/<steps hash>`, so every
//! variant of one original shares the virtual directory
//! `isteam/<original path>/`. Raw originals are addressed by their path alone.
//!
//! Paths arrive from the host percent-encoded. Each `/`-separated segment is
//! decoded on its own before it is used as a key. Segments that do not decode
//! cleanly are used verbatim, since keys written before encoding was
//! introduced still have to resolve.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Root prefix of every derived image.
pub const CACHE_ROOT: &str = "isteam";

/// Characters left unescaped when encoding a single URI component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Like `COMPONENT` but keeps the path separator.
const PATH: &AsciiSet = &COMPONENT.remove(b'/');

/// Outcome of decoding one path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentDecode<'a> {
    Decoded(String),
    /// Malformed escape or invalid UTF-8; the input is kept as-is.
    Raw(&'a str),
}

impl SegmentDecode<'_> {
    pub fn into_string(self) -> String {
        match self {
            SegmentDecode::Decoded(s) => s,
            SegmentDecode::Raw(s) => s.to_string(),
        }
    }
}

pub fn decode_segment(segment: &str) -> SegmentDecode<'_> {
    if !has_well_formed_escapes(segment) {
        return SegmentDecode::Raw(segment);
    }
    match percent_decode_str(segment).decode_utf8() {
        Ok(decoded) => SegmentDecode::Decoded(decoded.into_owned()),
        Err(_) => SegmentDecode::Raw(segment),
    }
}

// every '%' must be followed by two hex digits
fn has_well_formed_escapes(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1..i + 3) {
            Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
            _ => return false,
        }
    }
    true
}

/// Decode each segment of `path` independently and rejoin with `/`.
pub fn decode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| decode_segment(segment).into_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode a key as returned by a URL-encoded listing, where spaces come back as `+`.
pub fn decode_listed_key(key: &str) -> String {
    decode_path(&key.replace('+', " "))
}

/// Image path before decoding: the variant form when a steps hash is given,
/// the original path otherwise.
pub fn image_path(original_path: &str, steps_hash: Option<&str>) -> String {
    match steps_hash {
        Some(hash) => format!("{}/{}/{}", CACHE_ROOT, original_path, hash),
        None => original_path.to_string(),
    }
}

/// Store key for an original path and optional steps hash.
pub fn object_key(original_path: &str, steps_hash: Option<&str>) -> String {
    decode_path(&image_path(original_path, steps_hash))
}

/// Virtual directory holding every variant of `original_path`.
pub fn cache_directory(original_path: &str) -> String {
    format!("{}/{}", CACHE_ROOT, original_path)
}

/// Listing prefix for the direct children of `directory`.
pub fn directory_prefix(directory: &str) -> String {
    format!("{}/", decode_path(directory))
}

/// Path handed back to the host in the info record.
pub fn encode_original_path(original_path: &str) -> String {
    utf8_percent_encode(original_path, COMPONENT).to_string()
}

/// `x-amz-copy-source` value for copying `key` within `bucket`.
pub fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, PATH))
}

/// Encode a key the way a URL-encoded listing reports it.
pub fn encode_listed_key(key: &str) -> String {
    utf8_percent_encode(key, PATH).to_string().replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn variant_key_lives_under_cache_root() {
        assert_eq!(
            object_key("photos/cat.jpg", Some("abc123")),
            "isteam/photos/cat.jpg/abc123"
        );
    }

    #[test]
    fn raw_key_is_the_original_path() {
        assert_eq!(image_path("photos/cat.jpg", None), "photos/cat.jpg");
        assert_eq!(object_key("photos/my%20cat.jpg", None), "photos/my cat.jpg");
    }

    #[rstest]
    #[case::space("my%20cat.jpg", "my cat.jpg")]
    #[case::unicode("caf%C3%A9.png", "café.png")]
    #[case::encoded_slash("a%2Fb", "a/b")]
    #[case::plain("cat.jpg", "cat.jpg")]
    fn segments_decode(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            decode_segment(input),
            SegmentDecode::Decoded(expected.to_string())
        );
    }

    #[rstest]
    #[case::truncated_escape("100%")]
    #[case::bad_hex("50%zz.jpg")]
    #[case::short_escape("x%4")]
    #[case::invalid_utf8("%C3%28")]
    fn malformed_segments_pass_through(#[case] input: &str) {
        assert_eq!(decode_segment(input), SegmentDecode::Raw(input));
    }

    #[test]
    fn one_bad_segment_does_not_spoil_the_rest() {
        assert_eq!(
            object_key("100%/my%20cat.jpg", Some("h")),
            "isteam/100%/my cat.jpg/h"
        );
    }

    #[test]
    fn listed_keys_treat_plus_as_space() {
        assert_eq!(
            decode_listed_key("isteam/my+cat%2B1.jpg/h"),
            "isteam/my cat+1.jpg/h"
        );
    }

    #[test]
    fn listed_key_encoding_inverts() {
        let key = "isteam/my cat+1%.jpg/h";
        assert_eq!(decode_listed_key(&encode_listed_key(key)), key);
    }

    #[rstest]
    #[case("photos/cat.jpg")]
    #[case("photos/my%20cat.jpg")]
    #[case("a%2Fb/c%C3%A9")]
    #[case("broken%zz/ok%20segment")]
    fn decoding_the_built_key_matches_per_segment_decode(#[case] original: &str) {
        let key = object_key(original, Some("hash"));
        let expected: Vec<String> = original
            .split('/')
            .map(|s| decode_segment(s).into_string())
            .collect();
        let expected = format!("isteam/{}/hash", expected.join("/"));
        assert_eq!(key, expected);
    }

    #[test]
    fn original_path_is_returned_encoded() {
        assert_eq!(encode_original_path("photos/cat 1.jpg"), "photos%2Fcat%201.jpg");
        assert_eq!(encode_original_path("it's(1)~.jpg"), "it's(1)~.jpg");
    }

    #[test]
    fn copy_source_keeps_separators() {
        assert_eq!(
            copy_source("bucket", "isteam/my cat.jpg/h"),
            "bucket/isteam/my%20cat.jpg/h"
        );
    }

    #[test]
    fn directory_prefix_is_decoded_with_trailing_slash() {
        assert_eq!(
            directory_prefix(&cache_directory("my%20cat.jpg")),
            "isteam/my cat.jpg/"
        );
    }
}
