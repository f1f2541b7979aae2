#![no_main]

use std::path::Path;

use kgraph_memory::{decode_graph, encode_graph, SearchIndex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(graph) = decode_graph(&raw, Path::new("fuzz.jsonl")) else {
        return;
    };
    let encoded = encode_graph(&graph).expect("decoded graph must encode");
    let decoded = decode_graph(&encoded, Path::new("fuzz.jsonl")).expect("encoded graph must decode");
    assert_eq!(decoded, graph);

    let index = SearchIndex::build(&graph);
    assert_eq!(index.entity_count(), graph.entities.len());
});
