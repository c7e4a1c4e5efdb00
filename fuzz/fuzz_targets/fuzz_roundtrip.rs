#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlbridge::copy::document_to_string;
use xmlbridge::engine::{Engine, EngineConfig};
use xmlbridge::source::{Destination, Source};

fuzz_target!(|data: &[u8]| {
    let engine = Engine::new(
        EngineConfig::default()
            .max_depth(256)
            .max_element_count(10_000),
    );
    // Stream copy, materialize and tree copy should never panic
    let mut copied = String::new();
    if engine
        .copy(Source::bytes(data), Destination::Chars(&mut copied), true)
        .is_ok()
    {
        let _ = engine.materialize_fragment(Source::text(copied.as_str()));
    }
    if let Ok(doc) = engine.materialize(Source::bytes(data)) {
        if let Ok(output) = document_to_string(&doc) {
            let _ = engine.materialize(Source::text(output));
        }
    }
});
