use super::*;

#[test]
fn short_text_passthrough() {
    assert_eq!(chunk_text("hello world", 500, 50), vec!["hello world"]);
}

#[test]
fn empty_text_single_chunk() {
    assert_eq!(chunk_text("", 500, 50), vec![String::new()]);
}

#[test]
fn long_text_splits() {
    let text = "One sentence here. ".repeat(100);
    let chunks = chunk_text(&text, 200, 20);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.len() <= 200, "chunk exceeds size: {}", chunk.len());
        assert!(!chunk.is_empty());
    }
}

#[test]
fn deterministic() {
    let text = "Alpha beta gamma. Delta epsilon zeta. ".repeat(50);
    let first = chunk_text(&text, 150, 30);
    let second = chunk_text(&text, 150, 30);
    assert_eq!(first, second);
}

#[test]
fn prefers_sentence_boundaries() {
    // A terminator sits well past the halfway point of the first chunk,
    // so the cut should land right after it instead of mid-word.
    let text = format!("{}. {}", "a".repeat(80), "b".repeat(200));
    let chunks = chunk_text(&text, 100, 10);

    assert!(chunks[0].ends_with('.'), "first chunk: {:?}", chunks[0]);
}

#[test]
fn ignores_early_terminators() {
    // The only terminator is in the first half of the chunk; the cut
    // should stay at the raw boundary.
    let text = format!("ab. {}", "c".repeat(300));
    let chunks = chunk_text(&text, 100, 10);

    assert_eq!(chunks[0].len(), 100);
}

#[test]
fn overlap_repeats_boundary_text() {
    let text = "x".repeat(250);
    let chunks = chunk_text(&text, 100, 20);

    // Without terminators every chunk advances by size - overlap, so the
    // pieces cover the text with 20 chars repeated at each seam.
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].len(), 100);
    assert_eq!(chunks[1].len(), 100);
    assert_eq!(chunks[2].len(), 90);
}

#[test]
fn covers_original_text() {
    let text = (0..60)
        .map(|i| format!("Sentence number {} tells part of the story.", i))
        .collect::<Vec<_>>()
        .join(" ");
    let chunks = chunk_text(&text, 120, 25);

    // Every chunk must appear in the source, and walking the chunks in
    // order must reach the end of the text with no gaps.
    let mut covered_to = 0;
    for chunk in &chunks {
        let at = text.find(chunk.as_str()).expect("chunk not found in text");
        assert!(at <= covered_to, "gap before chunk at {}", at);
        covered_to = covered_to.max(at + chunk.len());
    }
    assert!(covered_to >= text.trim_end().len());
}

#[test]
fn terminates_with_oversized_overlap() {
    // Misconfigured overlap >= chunk_size must not loop forever.
    let text = "word ".repeat(100);
    let chunks = chunk_text(&text, 50, 50);
    assert!(!chunks.is_empty());
}

#[test]
fn multibyte_input_does_not_panic() {
    let text = "Überraschung für alle Studenten. ".repeat(40);
    let chunks = chunk_text(&text, 100, 20);
    assert!(chunks.len() > 1);
}

#[test]
fn skips_whitespace_only_chunks() {
    let text = format!("{}\n{}", "a".repeat(90), " ".repeat(600));
    let chunks = chunk_text(&text, 500, 10);

    assert_eq!(chunks, vec!["a".repeat(90)]);
}
