#![no_main]

use kgraph_memory::{similarity, MatchMode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let midpoint = raw
        .char_indices()
        .map(|(offset, _)| offset)
        .nth(raw.chars().count() / 2)
        .unwrap_or(raw.len());
    let (left, right) = raw.split_at(midpoint);
    for mode in [MatchMode::Literal, MatchMode::Semantic] {
        let forward = similarity(left, right, mode);
        assert!((0.0..=1.0).contains(&forward), "score {forward} out of range");
        assert_eq!(similarity(left, left, mode), 1.0);
    }
});
