//! Decoding of CDDB response bodies and saved records.
//!
//! gnudb answers protocol level 6 in UTF-8, but older records and lower
//! protocol levels come back as ISO-8859-1. A charset from the
//! `Content-Type` header wins; otherwise BOM, then UTF-8, then chardetng.

use std::path::Path;

/// Decode raw bytes to a String, detecting encoding automatically.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}

/// Decode an HTTP body, honoring `charset=` in the content type when it
/// names an encoding we know.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(|ct| {
            ct.split(';')
                .map(str::trim)
                .find_map(|param| param.strip_prefix("charset="))
        })
        .map(|label| label.trim_matches('"'))
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()));
    match declared {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => decode_text(bytes),
    }
}

/// Read a saved record from disk, detecting encoding automatically.
pub fn read_text_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_text(&bytes))
}
