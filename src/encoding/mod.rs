//! Encoding detection and transcoding.
//!
//! Input side: BOM sniffing and XML declaration encoding detection per
//! XML 1.0 Section 4.3.3 and Appendix F, bridging to `encoding_rs` for the
//! actual conversion. A caller-supplied label takes precedence over both.
//!
//! Output side: [`OutputEncoder`] turns serialized UTF-8 text into the
//! requested encoding, writing characters the encoding cannot represent as
//! numeric character references.

use std::fmt;

use encoding_rs::{CoderResult, Encoding, UTF_8};

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Detects the encoding of an XML byte stream by inspecting the Byte Order Mark.
///
/// Returns a tuple of (encoding name, number of BOM bytes to skip).
///
/// # Examples
///
/// ```
/// use xmlbridge::encoding::detect_encoding;
///
/// let (enc, skip) = detect_encoding(b"\xEF\xBB\xBFhello");
/// assert_eq!(enc, "UTF-8");
/// assert_eq!(skip, 3);
///
/// let (enc, skip) = detect_encoding(b"<root/>");
/// assert_eq!(enc, "UTF-8");
/// assert_eq!(skip, 0);
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes a byte slice from the named encoding into a UTF-8 `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the encoding name is not recognized or if
/// the input contains malformed byte sequences.
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = lookup(encoding_name)?;
    let (result, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {encoding_name}"
        )));
    }
    Ok(result.into_owned())
}

fn lookup(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))
}

/// Extracts the `encoding` pseudo-attribute from a leading XML declaration.
///
/// Works on raw bytes: the declaration is ASCII in every encoding this
/// function is asked about.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(200)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];
    let needle = b"encoding";
    let at = decl.windows(needle.len()).position(|w| w == needle)?;

    let rest = skip_ascii_whitespace(&decl[at + needle.len()..]);
    let rest = skip_ascii_whitespace(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..end];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn is_utf8_label(label: &str) -> bool {
    lookup(label).is_ok_and(|e| e == UTF_8)
}

/// Decodes raw XML bytes into a UTF-8 string.
///
/// With `explicit` set, that label is used (a matching BOM is still
/// skipped). Otherwise the BOM decides, and an XML declaration naming a
/// different encoding wins over a BOM-less UTF-8 guess.
///
/// # Errors
///
/// Returns `EncodingError` for unknown labels and malformed input.
///
/// # Examples
///
/// ```
/// use xmlbridge::encoding::decode_to_utf8;
///
/// let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>\xE9</r>";
/// let text = decode_to_utf8(xml, None).unwrap();
/// assert!(text.ends_with("<r>\u{e9}</r>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8], explicit: Option<&str>) -> Result<String, EncodingError> {
    let (bom_encoding, bom_skip) = detect_encoding(bytes);

    if let Some(label) = explicit {
        let encoding = lookup(label)?;
        let skip = if lookup(bom_encoding).is_ok_and(|e| e == encoding) {
            bom_skip
        } else {
            0
        };
        return transcode(&bytes[skip..], label);
    }

    let content = &bytes[bom_skip..];
    if bom_encoding == "UTF-8" {
        if let Some(declared) = declared_encoding(content) {
            if !is_utf8_label(&declared) && bom_skip == 0 {
                return transcode(content, &declared);
            }
        }
        return std::str::from_utf8(content)
            .map(str::to_string)
            .map_err(|e| EncodingError::new(format!("input is not valid UTF-8: {e}")));
    }
    transcode(content, bom_encoding)
}

// -------------------------------------------------------------------------
// Output
// -------------------------------------------------------------------------

enum Target {
    Utf8,
    Utf16 { big_endian: bool },
    Other(encoding_rs::Encoder),
}

/// Converts serialized UTF-8 text to an output encoding.
///
/// Characters the target encoding cannot represent become decimal numeric
/// character references (`&#256;`), which every XML consumer decodes back
/// to the original character.
pub struct OutputEncoder {
    name: &'static str,
    target: Target,
    wrote_bom: bool,
}

impl OutputEncoder {
    /// Creates an encoder for an `encoding_rs` label (`"UTF-8"`,
    /// `"ISO-8859-1"`, `"UTF-16LE"`, ...).
    ///
    /// # Errors
    ///
    /// Returns `EncodingError` if the label is unknown.
    pub fn for_label(label: &str) -> Result<Self, EncodingError> {
        let encoding = lookup(label)?;
        let target = if encoding == UTF_8 {
            Target::Utf8
        } else if encoding == encoding_rs::UTF_16BE {
            Target::Utf16 { big_endian: true }
        } else if encoding == encoding_rs::UTF_16LE {
            Target::Utf16 { big_endian: false }
        } else {
            Target::Other(encoding.new_encoder())
        };
        Ok(Self {
            name: encoding.name(),
            target,
            wrote_bom: false,
        })
    }

    /// A UTF-8 encoder.
    #[must_use]
    pub fn utf8() -> Self {
        Self {
            name: UTF_8.name(),
            target: Target::Utf8,
            wrote_bom: false,
        }
    }

    /// The canonical name of the target encoding.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends the encoded form of `text` to `out`.
    pub fn encode(&mut self, text: &str, out: &mut Vec<u8>) {
        match &mut self.target {
            Target::Utf8 => out.extend_from_slice(text.as_bytes()),
            Target::Utf16 { big_endian } => {
                if !self.wrote_bom {
                    self.wrote_bom = true;
                    out.extend_from_slice(&unit_bytes(0xFEFF, *big_endian));
                }
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit_bytes(unit, *big_endian));
                }
            }
            Target::Other(encoder) => encode_with(encoder, text, out, false),
        }
    }

    /// Flushes any state held by a stateful encoding.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if let Target::Other(encoder) = &mut self.target {
            encode_with(encoder, "", out, true);
        }
    }
}

fn unit_bytes(unit: u16, big_endian: bool) -> [u8; 2] {
    if big_endian {
        unit.to_be_bytes()
    } else {
        unit.to_le_bytes()
    }
}

fn encode_with(encoder: &mut encoding_rs::Encoder, text: &str, out: &mut Vec<u8>, last: bool) {
    let mut src = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_if_no_unmappables(src.len())
            .unwrap_or(src.len() * 4)
            + 16;
        out.reserve(needed);
        let (result, read, _) = encoder.encode_from_utf8_to_vec(src, out, last);
        src = &src[read..];
        if let CoderResult::InputEmpty = result {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_utf16le_bom() {
        let (encoding, skip) = detect_encoding(b"\xFF\xFE<\x00");
        assert_eq!(encoding, "UTF-16LE");
        assert_eq!(skip, 2);
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let bytes = b"\xFF\xFE<\x00a\x00/\x00>\x00";
        assert_eq!(decode_to_utf8(bytes, None).unwrap(), "<a/>");
    }

    #[test]
    fn test_explicit_label_overrides_detection() {
        let bytes = b"<r>\xE9</r>";
        assert!(decode_to_utf8(bytes, None).is_err());
        assert_eq!(
            decode_to_utf8(bytes, Some("windows-1252")).unwrap(),
            "<r>\u{e9}</r>"
        );
    }

    #[test]
    fn test_unknown_label_is_error() {
        let err = decode_to_utf8(b"<a/>", Some("x-no-such")).unwrap_err();
        assert!(err.message.contains("unsupported encoding"));
    }

    #[test]
    fn test_declared_encoding_scan() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'latin1' ?>").as_deref(),
            Some("latin1")
        );
        assert_eq!(declared_encoding(b"<root/>"), None);
    }

    #[test]
    fn test_output_encoder_uses_char_refs_for_unmappable() {
        let mut enc = OutputEncoder::for_label("ISO-8859-1").unwrap();
        let mut out = Vec::new();
        enc.encode("\u{e9}\u{100}", &mut out);
        enc.finish(&mut out);
        assert_eq!(out, b"\xE9&#256;");
    }

    #[test]
    fn test_output_encoder_utf16_writes_bom_once() {
        let mut enc = OutputEncoder::for_label("UTF-16BE").unwrap();
        let mut out = Vec::new();
        enc.encode("a", &mut out);
        enc.encode("b", &mut out);
        assert_eq!(out, b"\xFE\xFF\x00a\x00b");
    }
}
