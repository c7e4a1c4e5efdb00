//! Security-focused tests for xmlbridge.
//!
//! These tests verify that the reader refuses external entities and that
//! the materializer's threshold guards reject pathologically deep or wide
//! input.

#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;

use xmlbridge::engine::{Engine, EngineConfig};
use xmlbridge::error::LimitKind;
use xmlbridge::materialize::{MaterializeOptions, Materializer, ThresholdLimits};
use xmlbridge::source::{Destination, Source};
use xmlbridge::{EventSource, XmlError, XmlStreamReader};

fn nested(depth: usize) -> String {
    let open: String = (0..depth).map(|_| "<a>").collect();
    let close: String = (0..depth).map(|_| "</a>").collect();
    format!("{open}{close}")
}

fn siblings(count: usize) -> String {
    let children: String = (0..count.saturating_sub(1)).map(|_| "<c/>").collect();
    format!("<r>{children}</r>")
}

fn drain(input: &str) -> Result<usize, XmlError> {
    let mut reader = XmlStreamReader::new(input);
    let mut n = 0;
    while reader.next_event()?.is_some() {
        n += 1;
    }
    Ok(n)
}

// ---------------------------------------------------------------------------
// Depth guard
// ---------------------------------------------------------------------------

#[test]
fn test_depth_limit_exact_boundary() {
    let engine = Engine::new(EngineConfig::default().max_depth(3));
    let doc = engine.materialize(Source::text(nested(3))).unwrap();
    assert!(doc.root_element().is_some());
}

#[test]
fn test_depth_limit_one_over() {
    let engine = Engine::new(EngineConfig::default().max_depth(3));
    let err = engine.materialize(Source::text(nested(4))).unwrap_err();
    match err {
        XmlError::LimitExceeded {
            kind,
            limit,
            actual,
        } => {
            assert_eq!(kind, LimitKind::Depth);
            assert_eq!(limit, 3);
            assert_eq!(actual, 4);
        }
        other => panic!("expected a limit failure, got {other:?}"),
    }
}

#[test]
fn test_depth_limit_aborts_before_input_is_consumed() {
    let limits = ThresholdLimits::unlimited().with_max_depth(2);
    let materializer = Materializer::new(MaterializeOptions::default(), limits);
    let mut reader = XmlStreamReader::new(nested(50));
    assert!(materializer
        .read_document(&mut reader)
        .unwrap_err()
        .is_limit_exceeded());
    // The rest of the document is still unread.
    assert!(reader.next_event().unwrap().is_some());
}

#[test]
fn test_deep_document_allowed_without_limits() {
    let engine = Engine::default();
    assert!(engine.materialize(Source::text(nested(500))).is_ok());
}

// ---------------------------------------------------------------------------
// Element-count guard
// ---------------------------------------------------------------------------

#[test]
fn test_count_limit_exact_boundary() {
    let engine = Engine::new(EngineConfig::default().max_element_count(10));
    let doc = engine.materialize(Source::text(siblings(10))).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.children(root).count(), 9);
}

#[test]
fn test_count_limit_one_over() {
    let engine = Engine::new(EngineConfig::default().max_element_count(10));
    let err = engine.materialize(Source::text(siblings(11))).unwrap_err();
    assert!(matches!(
        err,
        XmlError::LimitExceeded {
            kind: LimitKind::ElementCount,
            limit: 10,
            actual: 11,
        }
    ));
}

#[test]
fn test_limits_from_environment_lookup() {
    let config = EngineConfig::from_lookup(|name| match name {
        "XMLBRIDGE_MAX_ELEMENT_DEPTH" => Some("2".to_string()),
        _ => None,
    });
    let engine = Engine::new(config);
    assert!(engine
        .materialize(Source::text(nested(3)))
        .unwrap_err()
        .is_limit_exceeded());
}

#[test]
fn test_limits_do_not_apply_to_copy() {
    let engine = Engine::new(EngineConfig::default().max_depth(1));
    let mut out = String::new();
    engine
        .copy(Source::text(nested(5)), Destination::Chars(&mut out), false)
        .unwrap();
    assert_eq!(out, "<a><a><a><a><a/></a></a></a></a>");
}

// ---------------------------------------------------------------------------
// External entities
// ---------------------------------------------------------------------------

#[test]
fn test_external_system_entity_rejected() {
    let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"file:///etc/passwd\">]><r>&ext;</r>";
    assert!(drain(xml).unwrap_err().is_security());
}

#[test]
fn test_external_public_entity_rejected() {
    let xml = "<!DOCTYPE r [<!ENTITY ext PUBLIC \"-//X//EN\" \"http://example.com/x\">]><r>&ext;</r>";
    assert!(drain(xml).unwrap_err().is_security());
}

#[test]
fn test_external_entity_in_attribute_rejected() {
    let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"x.txt\">]><r v=\"&ext;\"/>";
    assert!(drain(xml).unwrap_err().is_security());
}

#[test]
fn test_external_entity_rejected_through_every_path() {
    let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"x.txt\">]><r>&ext;</r>";
    let engine = Engine::new(EngineConfig::default().shared_reader_factory(true));

    let mut out = String::new();
    let err = engine
        .copy(Source::text(xml), Destination::Chars(&mut out), true)
        .unwrap_err();
    assert!(err.is_security());
    assert!(engine.materialize(Source::text(xml)).unwrap_err().is_security());
    assert!(engine
        .materialize(Source::bytes(xml.as_bytes()))
        .unwrap_err()
        .is_security());
}

#[test]
fn test_internal_entities_are_not_expanded() {
    let xml = "<!DOCTYPE r [<!ENTITY a \"&b;&b;\"><!ENTITY b \"xxxxxxxx\">]><r>&a;</r>";
    let engine = Engine::default();
    let mut out = String::new();
    engine
        .copy(Source::text(xml), Destination::Chars(&mut out), false)
        .unwrap();
    assert!(out.ends_with("<r>&a;</r>"), "{out}");
}

#[test]
fn test_declaring_external_entity_without_use_is_allowed() {
    let xml = "<!DOCTYPE r [<!ENTITY ext SYSTEM \"x.txt\">]><r/>";
    assert!(drain(xml).is_ok());
}

#[test]
fn test_factory_posture_is_fixed() {
    let engine = Engine::default();
    let factory = engine.pool().acquire_reader_factory();
    let settings = factory.settings();
    assert!(!settings.resolve_external_entities());
    assert!(!settings.expand_entity_references());
    assert!(!settings.dtd_processing());
}
