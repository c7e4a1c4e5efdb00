#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlbridge::copy::{copy_events, document_to_string, node_to_string_streamed};
use xmlbridge::engine::{Engine, EngineConfig};
use xmlbridge::materialize::Materializer;
use xmlbridge::sax::{parse_sax, DefaultHandler};
use xmlbridge::source::{Destination, Source};
use xmlbridge::{Document, EventSource, XmlStreamReader, XmlStreamWriter};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a medium XML document with approximately 400 elements.
fn make_medium_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog>\n");
    for i in 0..100 {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\"><title>Title {i}</title>\
             <author>Author {i}</author>\
             <price>{}.99</price></book>",
            10 + i
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// Generates a deeply nested XML document with the given nesting depth.
fn make_nested_xml(depth: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n");
    for i in 0..depth {
        let _ = write!(xml, "<level{i}>");
    }
    xml.push_str("leaf");
    for i in (0..depth).rev() {
        let _ = write!(xml, "</level{i}>");
    }
    xml.push('\n');
    xml
}

/// Generates an XML document with many namespace declarations and prefixed
/// elements, some redeclaring bindings already in scope.
fn make_namespace_heavy_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<root");
    for i in 0..20 {
        let _ = write!(xml, " xmlns:ns{i}=\"http://example.com/ns{i}\"");
    }
    xml.push_str(">\n");
    for i in 0..100 {
        let ns = i % 20;
        let _ = writeln!(
            xml,
            "  <ns{ns}:item xmlns:ns{ns}=\"http://example.com/ns{ns}\" ns{ns}:id=\"{i}\">Content {i}</ns{ns}:item>"
        );
    }
    xml.push_str("</root>\n");
    xml
}

// ---------------------------------------------------------------------------
// Pull parsing
// ---------------------------------------------------------------------------

fn bench_pull_parse(c: &mut Criterion) {
    let xml = make_medium_xml();
    c.bench_function("pull_parse", |b| {
        b.iter(|| {
            let mut reader = XmlStreamReader::new(black_box(xml.as_str()));
            let mut count: u64 = 0;
            while reader.next_event().expect("reader failed").is_some() {
                count += 1;
            }
            black_box(count);
        });
    });
}

fn bench_sax_parse(c: &mut Criterion) {
    let xml = make_medium_xml();
    c.bench_function("sax_parse", |b| {
        b.iter(|| parse_sax(black_box(&xml), &mut DefaultHandler).expect("SAX parse failed"));
    });
}

// ---------------------------------------------------------------------------
// Copy benchmarks
// ---------------------------------------------------------------------------

fn bench_copy_events(c: &mut Criterion) {
    let xml = make_medium_xml();
    c.bench_function("copy_events", |b| {
        b.iter(|| {
            let mut reader = XmlStreamReader::new(black_box(xml.as_str()));
            let mut writer = XmlStreamWriter::new(Vec::new());
            copy_events(&mut reader, &mut writer, false).expect("copy failed");
            black_box(writer.into_inner().expect("close failed"));
        });
    });
}

fn bench_copy_namespace_heavy(c: &mut Criterion) {
    let xml = make_namespace_heavy_xml();
    c.bench_function("copy_namespace_heavy", |b| {
        b.iter(|| {
            let mut reader = XmlStreamReader::new(black_box(xml.as_str()));
            let mut writer = XmlStreamWriter::new(Vec::new());
            copy_events(&mut reader, &mut writer, false).expect("copy failed");
            black_box(writer.into_inner().expect("close failed"));
        });
    });
}

fn bench_copy_tree(c: &mut Criterion) {
    let doc = Document::parse_str(&make_medium_xml()).expect("failed to parse medium XML");
    c.bench_function("copy_tree", |b| {
        b.iter(|| document_to_string(black_box(&doc)).expect("serialize failed"));
    });
}

fn bench_tree_as_stream(c: &mut Criterion) {
    let doc = Document::parse_str(&make_medium_xml()).expect("failed to parse medium XML");
    c.bench_function("tree_as_stream", |b| {
        b.iter(|| node_to_string_streamed(black_box(&doc), doc.root()).expect("copy failed"));
    });
}

fn bench_engine_copy(c: &mut Criterion) {
    let xml = make_medium_xml();
    let engine = Engine::default();
    c.bench_function("engine_copy", |b| {
        b.iter(|| {
            let mut out = String::new();
            engine
                .copy(
                    Source::text(black_box(xml.as_str())),
                    Destination::Chars(&mut out),
                    false,
                )
                .expect("copy failed");
            black_box(out);
        });
    });
}

// ---------------------------------------------------------------------------
// Materializer benchmarks
// ---------------------------------------------------------------------------

fn bench_materialize(c: &mut Criterion) {
    let xml = make_medium_xml();
    let materializer = Materializer::default();
    c.bench_function("materialize", |b| {
        b.iter(|| {
            let mut reader = XmlStreamReader::new(black_box(xml.as_str()));
            materializer.read_document(&mut reader).expect("materialize failed")
        });
    });
}

fn bench_materialize_guarded(c: &mut Criterion) {
    let xml = make_nested_xml(200);
    let engine = Engine::new(
        EngineConfig::default()
            .max_depth(1_000)
            .max_element_count(10_000)
            .record_locations(true),
    );
    c.bench_function("materialize_guarded", |b| {
        b.iter(|| {
            engine
                .materialize(Source::text(black_box(xml.as_str())))
                .expect("materialize failed")
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(parsing, bench_pull_parse, bench_sax_parse);

criterion_group!(
    copying,
    bench_copy_events,
    bench_copy_namespace_heavy,
    bench_copy_tree,
    bench_tree_as_stream,
    bench_engine_copy,
);

criterion_group!(materializing, bench_materialize, bench_materialize_guarded);

criterion_main!(parsing, copying, materializing);
