//! Low-level input handling for the streaming reader.
//!
//! [`ParserInput`] owns the decoded document text and tracks position (line,
//! column, byte offset, character offset). It provides the lexical
//! primitives the reader is built from: peeking, advancing, name parsing,
//! reference parsing and the small fixed constructs (comments, CDATA, PIs,
//! the XML declaration).
//!
//! # Security
//!
//! Nothing here expands a user-declared entity. [`ParserInput::parse_reference`]
//! resolves character references and the five predefined entities only;
//! any other name is handed back to the caller, which decides between
//! surfacing it, rejecting it as external, or failing the parse.

use crate::error::{ParseError, Result, SourceLocation, XmlError};

use super::dtd::{EntityDef, EntityTable};

// -------------------------------------------------------------------------
// XML Name character classes (XML 1.0 §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2 `[2]`.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 `[4a]`.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Maps a predefined entity name to its character.
pub(crate) fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// The result of parsing `&...;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference {
    /// A character reference or one of the predefined entities.
    Char(char),
    /// Any other general entity, by name.
    Entity(String),
}

/// A snapshot of the input position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) pos: usize,
    pub(crate) char_offset: usize,
}

impl Mark {
    pub(crate) fn source_location(self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }
}

// -------------------------------------------------------------------------
// ParserInput
// -------------------------------------------------------------------------

/// Owned input text plus cursor.
pub(crate) struct ParserInput {
    text: String,
    pos: usize,
    line: u32,
    column: u32,
    char_offset: usize,
}

impl ParserInput {
    /// Creates an input positioned at the start of `text`.
    pub fn new(text: String) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 1,
            char_offset: 0,
        }
    }

    // -- Position queries --

    /// Returns the current source location.
    pub fn location(&self) -> SourceLocation {
        self.mark().source_location()
    }

    /// Captures the current position.
    pub fn mark(&self) -> Mark {
        Mark {
            line: self.line,
            column: self.column,
            pos: self.pos,
            char_offset: self.char_offset,
        }
    }

    /// Returns `true` if all input has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Returns the current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the text between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.text.get(start..end).unwrap_or("")
    }

    // -- Peek operations --

    /// Returns the byte at the current position without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    /// Returns the byte at `current_position + offset` without consuming.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    /// Returns the character at the current position without consuming it.
    pub fn peek_char(&self) -> Option<char> {
        self.text.get(self.pos..).and_then(|s| s.chars().next())
    }

    // -- Advance operations --

    /// Advances by `count` bytes, updating line/column. Continuation bytes
    /// of multi-byte characters do not move the column.
    pub fn advance(&mut self, count: usize) {
        let bytes = self.text.as_bytes();
        for _ in 0..count {
            let Some(&b) = bytes.get(self.pos) else {
                break;
            };
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
                self.char_offset += 1;
            } else if b & 0xC0 != 0x80 {
                self.column += 1;
                self.char_offset += 1;
            }
            self.pos += 1;
        }
    }

    /// Advances past one character, updating line/column.
    pub fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.char_offset += 1;
        self.pos += ch.len_utf8();
    }

    /// Consumes and returns the next character, normalizing `\r\n` and
    /// lone `\r` to `\n` (XML 1.0 §2.11) and rejecting non-`Char`s.
    pub fn next_char(&mut self) -> std::result::Result<char, ParseError> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        if !is_xml_char(ch) {
            return Err(self.fatal(format!("invalid XML character: U+{:04X}", ch as u32)));
        }
        self.advance_char(ch);
        if ch == '\r' {
            if self.peek() == Some(b'\n') {
                self.advance(1);
            }
            return Ok('\n');
        }
        Ok(ch)
    }

    // -- Expect operations --

    /// Consumes the next byte and asserts it matches `expected`.
    pub fn expect_byte(&mut self, expected: u8) -> std::result::Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(_) => Err(self.fatal(format!(
                "expected '{}', found '{}'",
                expected as char,
                self.peek_char().unwrap_or('?')
            ))),
            None => Err(self.fatal(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    /// Consumes bytes and asserts they match the `expected` sequence.
    pub fn expect_str(&mut self, expected: &[u8]) -> std::result::Result<(), ParseError> {
        if !self.looking_at(expected) {
            return Err(self.fatal(format!(
                "expected '{}'",
                String::from_utf8_lossy(expected)
            )));
        }
        self.advance(expected.len());
        Ok(())
    }

    /// Returns `true` if the remaining input starts with `s`.
    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.text.as_bytes()[self.pos.min(self.text.len())..].starts_with(s)
    }

    // -- Whitespace --

    /// Skips whitespace characters. Returns `true` if any were consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.advance(1);
        }
        self.pos > start
    }

    /// Skips whitespace, returning an error if none is found.
    pub fn skip_whitespace_required(&mut self) -> std::result::Result<(), ParseError> {
        if !self.skip_whitespace() {
            return Err(self.fatal("whitespace required"));
        }
        Ok(())
    }

    /// Consumes ASCII bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !b.is_ascii() || !pred(b) {
                break;
            }
            self.advance(1);
        }
        self.slice(start, self.pos).to_string()
    }

    // -- Names and references --

    /// Parses an XML `Name` per XML 1.0 §2.3 production `[5]`.
    pub fn parse_name(&mut self) -> std::result::Result<String, ParseError> {
        let start = self.pos;
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first) {
            return Err(self.fatal(format!("invalid name start character: '{first}'")));
        }
        self.advance_char(first);
        while let Some(ch) = self.peek_char() {
            if !is_name_char(ch) {
                break;
            }
            self.advance_char(ch);
        }
        Ok(self.slice(start, self.pos).to_string())
    }

    /// Parses `&name;`, `&#N;` or `&#xH;`.
    ///
    /// Character references and the predefined entities come back as
    /// [`Reference::Char`]; every other name is returned unexpanded.
    pub fn parse_reference(&mut self) -> std::result::Result<Reference, ParseError> {
        self.expect_byte(b'&')?;

        if self.peek() != Some(b'#') {
            let name = self.parse_name()?;
            self.expect_byte(b';')?;
            return Ok(match predefined_entity(&name) {
                Some(ch) => Reference::Char(ch),
                None => Reference::Entity(name),
            });
        }

        self.advance(1);
        let value = if self.peek() == Some(b'x') {
            self.advance(1);
            let hex = self.take_while(|b| b.is_ascii_hexdigit());
            u32::from_str_radix(&hex, 16)
                .map_err(|_| self.fatal("invalid hex character reference"))?
        } else {
            let dec = self.take_while(|b| b.is_ascii_digit());
            dec.parse::<u32>()
                .map_err(|_| self.fatal("invalid decimal character reference"))?
        };
        self.expect_byte(b';')?;

        match char::from_u32(value) {
            Some(ch) if is_xml_char(ch) => Ok(Reference::Char(ch)),
            _ => Err(self.fatal(format!(
                "character reference &#x{value:X}; does not refer to a valid XML character"
            ))),
        }
    }

    /// Parses a quoted attribute value, resolving character references and
    /// predefined entities and normalizing whitespace (XML 1.0 §3.3.3).
    ///
    /// Other entity references cannot be represented unexpanded inside an
    /// attribute: an external one is a security rejection, any other one a
    /// parse failure.
    pub fn parse_attribute_value(&mut self, entities: &EntityTable) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.fatal("unexpected end of input"))?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.fatal("attribute value must be quoted").into());
        }
        self.advance(1);

        let mut value = String::new();
        loop {
            let mark = self.mark();
            match self.peek() {
                None => {
                    return Err(self
                        .fatal("unexpected end of input in attribute value")
                        .into())
                }
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(b'<') => return Err(self.fatal("'<' not allowed in attribute values").into()),
                Some(b'&') => match self.parse_reference()? {
                    Reference::Char(ch) => value.push(ch),
                    Reference::Entity(name) => {
                        return Err(match entities.general(&name) {
                            Some(def @ EntityDef::External { .. }) => {
                                def.rejection(&name, mark.source_location())
                            }
                            _ => ParseError::new(
                                format!("entity reference '&{name};' not allowed in attribute value"),
                                mark.source_location(),
                            )
                            .into(),
                        })
                    }
                },
                Some(_) => match self.next_char()? {
                    '\n' | '\t' => value.push(' '),
                    ch => value.push(ch),
                },
            }
        }
    }

    /// Parses a quoted value with no reference resolution.
    pub fn parse_quoted_value(&mut self) -> std::result::Result<String, ParseError> {
        let quote = self.peek().ok_or_else(|| self.fatal("expected quoted value"))?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.fatal("expected quoted value"));
        }
        self.advance(1);
        let start = self.pos;
        while !self.at_end() && self.peek() != Some(quote) {
            self.advance(1);
        }
        let value = self.slice(start, self.pos).to_string();
        self.expect_byte(quote)?;
        Ok(value)
    }

    /// Creates a fatal `ParseError` at the current location.
    pub fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.location())
    }
}

// -------------------------------------------------------------------------
// Common constructs
// -------------------------------------------------------------------------

/// Parses a comment (`<!-- ... -->`), returning its text.
///
/// See XML 1.0 §2.5 production `[15]`.
pub(crate) fn parse_comment_content(
    input: &mut ParserInput,
) -> std::result::Result<String, ParseError> {
    input.expect_str(b"<!--")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in comment"));
        }
        if input.looking_at(b"-->") {
            input.advance(3);
            return Ok(content);
        }
        if input.looking_at(b"--") {
            return Err(input.fatal("'--' not allowed inside comments"));
        }
        content.push(input.next_char()?);
    }
}

/// Parses a CDATA section (`<![CDATA[ ... ]]>`), returning its text.
///
/// See XML 1.0 §2.7 production `[18]`.
pub(crate) fn parse_cdata_content(
    input: &mut ParserInput,
) -> std::result::Result<String, ParseError> {
    input.expect_str(b"<![CDATA[")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in CDATA section"));
        }
        if input.looking_at(b"]]>") {
            input.advance(3);
            return Ok(content);
        }
        content.push(input.next_char()?);
    }
}

/// Parses a processing instruction (`<?target data?>`).
///
/// See XML 1.0 §2.6 production `[16]`.
pub(crate) fn parse_pi_content(
    input: &mut ParserInput,
) -> std::result::Result<(String, Option<String>), ParseError> {
    input.expect_str(b"<?")?;
    let target = input.parse_name()?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(input.fatal("PI target 'xml' is reserved"));
    }
    if target.contains(':') {
        return Err(input.fatal("PI target must not contain a colon"));
    }

    if !input.skip_whitespace() {
        input.expect_str(b"?>")?;
        return Ok((target, None));
    }
    let mut data = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in processing instruction"));
        }
        if input.looking_at(b"?>") {
            input.advance(2);
            break;
        }
        data.push(input.next_char()?);
    }
    Ok((target, (!data.is_empty()).then_some(data)))
}

/// Values from `<?xml version="1.0" ...?>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// Returns `true` if the input is at an XML declaration (as opposed to a PI
/// whose target merely starts with `xml`).
pub(crate) fn at_xml_decl(input: &ParserInput) -> bool {
    input.looking_at(b"<?xml")
        && matches!(input.peek_at(5), Some(b' ' | b'\t' | b'\r' | b'\n'))
}

/// Parses the XML declaration.
///
/// See XML 1.0 §2.8 production `[23]`.
pub(crate) fn parse_xml_decl(
    input: &mut ParserInput,
) -> std::result::Result<XmlDeclaration, ParseError> {
    input.expect_str(b"<?xml")?;
    input.skip_whitespace_required()?;

    input.expect_str(b"version")?;
    let version = parse_pseudo_attribute_value(input)?;
    if !is_valid_version_num(&version) {
        return Err(input.fatal(format!("invalid version number: '{version}'")));
    }

    let mut had_ws = input.skip_whitespace();
    let encoding = if input.looking_at(b"encoding") {
        if !had_ws {
            return Err(input.fatal("whitespace required before encoding"));
        }
        input.expect_str(b"encoding")?;
        let enc = parse_pseudo_attribute_value(input)?;
        if !is_valid_encoding_name(&enc) {
            return Err(input.fatal(format!("invalid encoding name: '{enc}'")));
        }
        had_ws = input.skip_whitespace();
        Some(enc)
    } else {
        None
    };

    let standalone = if input.looking_at(b"standalone") {
        if !had_ws {
            return Err(input.fatal("whitespace required before standalone"));
        }
        input.expect_str(b"standalone")?;
        let value = parse_pseudo_attribute_value(input)?;
        input.skip_whitespace();
        match value.as_str() {
            "yes" => Some(true),
            "no" => Some(false),
            _ => return Err(input.fatal("standalone must be 'yes' or 'no'")),
        }
    } else {
        None
    };

    input.expect_str(b"?>")?;
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn parse_pseudo_attribute_value(
    input: &mut ParserInput,
) -> std::result::Result<String, ParseError> {
    input.skip_whitespace();
    input.expect_byte(b'=')?;
    input.skip_whitespace();
    input.parse_quoted_value()
}

/// `VersionNum ::= '1.' [0-9]+`
fn is_valid_version_num(s: &str) -> bool {
    s.strip_prefix("1.")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
fn is_valid_encoding_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Builds the error for a reference that would need external resolution.
pub(crate) fn external_rejection(
    entity: &str,
    system_id: &str,
    location: SourceLocation,
) -> XmlError {
    XmlError::Security {
        entity: entity.to_string(),
        reason: format!("resolving external entity '{system_id}' is disabled"),
        location,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(s: &str) -> ParserInput {
        ParserInput::new(s.to_string())
    }

    #[test]
    fn test_line_column_tracking() {
        let mut inp = input("ab\ncd");
        inp.advance(3);
        let loc = inp.location();
        assert_eq!((loc.line, loc.column, loc.byte_offset), (2, 1, 3));
    }

    #[test]
    fn test_multibyte_counts_one_column() {
        let mut inp = input("\u{e9}x");
        let ch = inp.next_char().unwrap();
        assert_eq!(ch, '\u{e9}');
        assert_eq!(inp.location().column, 2);
        assert_eq!(inp.mark().char_offset, 1);
        assert_eq!(inp.location().byte_offset, 2);
    }

    #[test]
    fn test_next_char_cr_normalization() {
        let mut inp = input("\r\nx\ry");
        assert_eq!(inp.next_char().unwrap(), '\n');
        assert_eq!(inp.next_char().unwrap(), 'x');
        assert_eq!(inp.next_char().unwrap(), '\n');
        assert_eq!(inp.next_char().unwrap(), 'y');
    }

    #[test]
    fn test_parse_reference_kinds() {
        assert_eq!(input("&amp;").parse_reference().unwrap(), Reference::Char('&'));
        assert_eq!(input("&#65;").parse_reference().unwrap(), Reference::Char('A'));
        assert_eq!(input("&#x42;").parse_reference().unwrap(), Reference::Char('B'));
        assert_eq!(
            input("&co;").parse_reference().unwrap(),
            Reference::Entity("co".to_string())
        );
        assert!(input("&#0;").parse_reference().is_err());
    }

    #[test]
    fn test_attribute_value_normalizes_whitespace() {
        let table = EntityTable::default();
        let mut inp = input("\"a\tb\nc &lt;\"");
        assert_eq!(inp.parse_attribute_value(&table).unwrap(), "a b c <");
    }

    #[test]
    fn test_attribute_value_rejects_custom_entity() {
        let table = EntityTable::default();
        let err = input("'&co;'").parse_attribute_value(&table).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_xml_decl() {
        let mut inp = input("<?xml version=\"1.0\" encoding='UTF-8' standalone=\"yes\"?>");
        let decl = parse_xml_decl(&mut inp).unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(decl.standalone, Some(true));
        assert!(inp.at_end());
    }

    #[test]
    fn test_xml_decl_detection() {
        assert!(at_xml_decl(&input("<?xml version='1.0'?>")));
        assert!(!at_xml_decl(&input("<?xml-stylesheet href='a'?>")));
    }

    #[test]
    fn test_comment_rejects_double_dash() {
        assert!(parse_comment_content(&mut input("<!-- a -- b -->")).is_err());
        assert_eq!(
            parse_comment_content(&mut input("<!-- ok -->")).unwrap(),
            " ok "
        );
    }

    #[test]
    fn test_pi_content() {
        let (target, data) = parse_pi_content(&mut input("<?t  some data?>")).unwrap();
        assert_eq!(target, "t");
        assert_eq!(data.as_deref(), Some("some data"));
        let (_, none) = parse_pi_content(&mut input("<?t?>")).unwrap();
        assert_eq!(none, None);
    }
}
