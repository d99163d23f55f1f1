//! Extractive summary fallback.
//!
//! Deterministic sentence scoring and selection; no upstream dependency. The
//! same input always renders the same summary, which is what makes the
//! strategy testable.

/// Sentence-ending delimiters.
const DELIMITERS: [char; 3] = ['.', '?', '!'];

/// Fragments at or below this length (in chars, trimmed) are discarded.
const FRAGMENT_MAX_LEN: usize = 15;

/// Upper bound on selected sentences.
const MAX_SENTENCES: usize = 8;

/// Sentences between these lengths (exclusive) earn a readability point.
const SWEET_SPOT_MIN: usize = 30;
const SWEET_SPOT_MAX: usize = 300;

/// Terms whose presence marks a sentence as likely load-bearing.
const IMPORTANCE_KEYWORDS: [&str; 16] = [
    "important",
    "significant",
    "key",
    "main",
    "primary",
    "essential",
    "critical",
    "fundamental",
    "conclusion",
    "therefore",
    "result",
    "definition",
    "defined",
    "because",
    "means",
    "example",
];

/// Produce a numbered extractive summary of `text`.
///
/// With at most [`MAX_SENTENCES`] qualifying sentences the output preserves
/// the original order; beyond that, the highest-scored sentences come first,
/// ties broken by original position (stable sort).
pub fn generate(text: &str) -> String {
    let sentences = split_sentences(text);

    let selected: Vec<&str> = if sentences.is_empty() {
        // Nothing qualifies; fall back to the raw text as a single entry so
        // the caller still receives usable output.
        vec![text.trim()]
    } else if sentences.len() <= MAX_SENTENCES {
        sentences.iter().map(String::as_str).collect()
    } else {
        let mut ranked: Vec<(usize, u32)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, score_sentence(s, i, sentences.len())))
            .collect();
        // Stable sort keeps original order among equal scores.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(MAX_SENTENCES)
            .map(|(i, _)| sentences[i].as_str())
            .collect()
    };

    render(&selected)
}

/// Split `text` into trimmed sentences, discarding short fragments.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if DELIMITERS.contains(&ch) {
            push_sentence(&mut sentences, &current);
            current.clear();
        } else {
            current.push(ch);
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.chars().count() > FRAGMENT_MAX_LEN {
        sentences.push(trimmed.to_string());
    }
}

/// Score one sentence: +2 for document boundaries, +1 per importance-keyword
/// occurrence, +1 for a readable length.
fn score_sentence(sentence: &str, index: usize, total: usize) -> u32 {
    let mut score = 0u32;

    if index == 0 || index + 1 == total {
        score += 2;
    }

    let lowered = sentence.to_lowercase();
    for keyword in IMPORTANCE_KEYWORDS {
        score += lowered.matches(keyword).count() as u32;
    }

    let len = sentence.chars().count();
    if len > SWEET_SPOT_MIN && len < SWEET_SPOT_MAX {
        score += 1;
    }

    score
}

fn render(sentences: &[&str]) -> String {
    let mut out = String::from("## Summary\n");
    for (i, sentence) in sentences.iter().enumerate() {
        out.push_str(&format!("\n{}. {}.", i + 1, sentence.trim_end_matches(DELIMITERS)));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
