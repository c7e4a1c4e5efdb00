//! Internal DTD subset scanning.
//!
//! The reader never applies a DTD. It only needs to know, for each entity
//! name the document declares, whether the entity is internal (so a
//! reference can be surfaced with its replacement text) or external (so a
//! reference must be refused). [`scan_internal_subset`] walks the subset,
//! records `<!ENTITY>` declarations and skips every other declaration.

use std::collections::HashMap;

use crate::error::{Result, SourceLocation, XmlError};

use super::input::{
    external_rejection, parse_comment_content, parse_pi_content, ParserInput,
};

/// A declared entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntityDef {
    /// Literal replacement text (character references already expanded).
    Internal(String),
    /// Identified by a SYSTEM (and optional PUBLIC) identifier.
    External {
        system_id: String,
        public_id: Option<String>,
    },
}

impl EntityDef {
    /// The error reported when a reference to this entity is reached.
    pub(crate) fn rejection(&self, name: &str, location: SourceLocation) -> XmlError {
        match self {
            Self::External { system_id, .. } => external_rejection(name, system_id, location),
            Self::Internal(_) => XmlError::Unsupported(format!("expansion of entity '{name}'")),
        }
    }
}

/// Entity declarations seen in the DOCTYPE.
#[derive(Debug, Default)]
pub(crate) struct EntityTable {
    general: HashMap<String, EntityDef>,
    parameter: HashMap<String, EntityDef>,
    /// The DOCTYPE names an external subset, which is never loaded; entities
    /// declared only there are unknown to the reader.
    pub(crate) has_external_subset: bool,
}

impl EntityTable {
    /// Looks up a general entity.
    pub(crate) fn general(&self, name: &str) -> Option<&EntityDef> {
        self.general.get(name)
    }

    /// Looks up a parameter entity.
    pub(crate) fn parameter(&self, name: &str) -> Option<&EntityDef> {
        self.parameter.get(name)
    }

    /// Records a declaration. Per XML 1.0 §4.2 the first declaration of a
    /// name is binding.
    fn declare(&mut self, parameter: bool, name: String, def: EntityDef) {
        let map = if parameter {
            &mut self.parameter
        } else {
            &mut self.general
        };
        map.entry(name).or_insert(def);
    }
}

/// Scans an internal subset. The opening `[` must already be consumed;
/// on success the closing `]` has been consumed and the raw subset text is
/// returned.
///
/// # Errors
///
/// Malformed declarations are parse errors. A reference to an external
/// parameter entity is a security rejection.
pub(crate) fn scan_internal_subset(
    input: &mut ParserInput,
    table: &mut EntityTable,
) -> Result<String> {
    let start = input.pos();
    loop {
        input.skip_whitespace();
        if input.at_end() {
            return Err(input.fatal("unterminated DOCTYPE internal subset").into());
        }
        if input.peek() == Some(b']') {
            let subset = input.slice(start, input.pos()).to_string();
            input.advance(1);
            return Ok(subset);
        }

        if input.looking_at(b"<!--") {
            parse_comment_content(input)?;
        } else if input.looking_at(b"<?") {
            parse_pi_content(input)?;
        } else if input.looking_at(b"<!ENTITY") {
            parse_entity_decl(input, table)?;
        } else if input.looking_at(b"<!") {
            skip_markup_decl(input)?;
        } else if input.peek() == Some(b'%') {
            let location = input.location();
            input.advance(1);
            let name = input.parse_name()?;
            input.expect_byte(b';')?;
            if let Some(def @ EntityDef::External { .. }) = table.parameter(&name) {
                return Err(def.rejection(&name, location));
            }
        } else {
            return Err(input
                .fatal(format!(
                    "unexpected character '{}' in DTD",
                    input.peek_char().unwrap_or('?')
                ))
                .into());
        }
    }
}

/// See XML 1.0 §4.2: `[70] EntityDecl`.
fn parse_entity_decl(input: &mut ParserInput, table: &mut EntityTable) -> Result<()> {
    input.expect_str(b"<!ENTITY")?;
    input.skip_whitespace_required()?;

    let parameter = input.peek() == Some(b'%');
    if parameter {
        input.advance(1);
        input.skip_whitespace_required()?;
    }
    let name = input.parse_name()?;
    if name.contains(':') {
        return Err(input
            .fatal(format!("entity name '{name}' must not contain a colon"))
            .into());
    }
    input.skip_whitespace_required()?;

    let def = if matches!(input.peek(), Some(b'"' | b'\'')) {
        EntityDef::Internal(expand_char_refs(&input.parse_quoted_value()?))
    } else if input.looking_at(b"SYSTEM") {
        input.expect_str(b"SYSTEM")?;
        input.skip_whitespace_required()?;
        EntityDef::External {
            system_id: input.parse_quoted_value()?,
            public_id: None,
        }
    } else if input.looking_at(b"PUBLIC") {
        input.expect_str(b"PUBLIC")?;
        input.skip_whitespace_required()?;
        let public_id = input.parse_quoted_value()?;
        input.skip_whitespace_required()?;
        EntityDef::External {
            system_id: input.parse_quoted_value()?,
            public_id: Some(public_id),
        }
    } else {
        return Err(input.fatal("expected entity value or external ID").into());
    };

    input.skip_whitespace();
    if input.looking_at(b"NDATA") {
        if parameter || matches!(def, EntityDef::Internal(_)) {
            return Err(input
                .fatal("NDATA annotation is only allowed on external general entities")
                .into());
        }
        input.expect_str(b"NDATA")?;
        input.skip_whitespace_required()?;
        input.parse_name()?;
        input.skip_whitespace();
    }
    input.expect_byte(b'>')?;

    log::trace!("declared {} entity '{name}'", if parameter { "parameter" } else { "general" });
    table.declare(parameter, name, def);
    Ok(())
}

/// Skips `<!ELEMENT ...>`, `<!ATTLIST ...>` or `<!NOTATION ...>`, honoring
/// quoted literals.
fn skip_markup_decl(input: &mut ParserInput) -> Result<()> {
    input.advance(2);
    loop {
        match input.peek() {
            None => return Err(input.fatal("unterminated markup declaration").into()),
            Some(b'>') => {
                input.advance(1);
                return Ok(());
            }
            Some(b'"' | b'\'') => {
                input.parse_quoted_value()?;
            }
            Some(_) => input.advance(1),
        }
    }
}

/// Expands `&#N;` / `&#xH;` in an entity literal, leaving entity references
/// untouched.
pub(crate) fn expand_char_refs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(at) = rest.find("&#") {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 2..];
        let decoded = tail.find(';').and_then(|end| {
            let digits = &tail[..end];
            let code = match digits.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse().ok(),
            };
            code.and_then(char::from_u32).map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str("&#");
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(subset: &str) -> Result<(EntityTable, String)> {
        let mut input = ParserInput::new(format!("{subset}]"));
        let mut table = EntityTable::default();
        let raw = scan_internal_subset(&mut input, &mut table)?;
        Ok((table, raw))
    }

    #[test]
    fn test_records_internal_and_external_entities() {
        let (table, raw) = scan(
            "<!ENTITY co 'ACME &#38; Sons'>\n\
             <!ENTITY ext SYSTEM \"file:///etc/passwd\">\n\
             <!ELEMENT root (#PCDATA)>\n\
             <!ATTLIST root a CDATA \"x>y\">",
        )
        .unwrap();
        assert_eq!(
            table.general("co"),
            Some(&EntityDef::Internal("ACME & Sons".to_string()))
        );
        assert!(matches!(
            table.general("ext"),
            Some(EntityDef::External { system_id, .. }) if system_id == "file:///etc/passwd"
        ));
        assert!(raw.starts_with("<!ENTITY co"));
    }

    #[test]
    fn test_first_declaration_wins() {
        let (table, _) = scan("<!ENTITY a 'one'><!ENTITY a 'two'>").unwrap();
        assert_eq!(table.general("a"), Some(&EntityDef::Internal("one".to_string())));
    }

    #[test]
    fn test_external_parameter_entity_reference_is_rejected() {
        let err = scan("<!ENTITY % remote SYSTEM 'http://evil.example/x.dtd'> %remote;")
            .unwrap_err();
        assert!(err.is_security());
    }

    #[test]
    fn test_internal_parameter_entity_reference_is_ignored() {
        let (table, _) = scan("<!ENTITY % p '<!ENTITY q \"v\">'> %p;").unwrap();
        assert!(table.parameter("p").is_some());
        assert_eq!(table.general("q"), None);
    }

    #[test]
    fn test_unterminated_subset() {
        let mut input = ParserInput::new("<!ENTITY a 'b'>".to_string());
        let mut table = EntityTable::default();
        assert!(scan_internal_subset(&mut input, &mut table)
            .unwrap_err()
            .is_parse());
    }

    #[test]
    fn test_expand_char_refs() {
        assert_eq!(expand_char_refs("a&#x41;b&#66;&amp;"), "aAbB&amp;");
        assert_eq!(expand_char_refs("&#zz;"), "&#zz;");
    }
}
