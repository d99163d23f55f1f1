//! Quiz fallback.
//!
//! Always emits a full quiz regardless of input richness. Question type and
//! prompt selection follow fixed index-derived rules (never randomness) so
//! the output count and shape are guaranteed and reproducible.

use crate::generator::types::{Difficulty, QuestionKind, QuizQuestion};

/// Every fallback quiz has exactly this many questions.
pub const QUESTION_COUNT: usize = 10;

/// Question `i` is short-answer iff `i % 3 == 0`; the rest are multiple
/// choice.
const SHORT_ANSWER_STRIDE: usize = 3;

/// Prompt starters are cycled by `i % 4` within each difficulty set.
const STARTER_CYCLE: usize = 4;

const EASY_STARTERS: [&str; STARTER_CYCLE] = [
    "What does the material say about \"{}\"?",
    "Which statement best matches \"{}\"?",
    "Recall one fact about \"{}\" from the material.",
    "What is \"{}\" in this context?",
];

const MEDIUM_STARTERS: [&str; STARTER_CYCLE] = [
    "Explain the role of \"{}\" in the material.",
    "How does \"{}\" relate to the main topic?",
    "Why does the material bring up \"{}\"?",
    "Summarize what the material says about \"{}\".",
];

const HARD_STARTERS: [&str; STARTER_CYCLE] = [
    "Evaluate how well the material supports its claims about \"{}\".",
    "What would change if \"{}\" were left out of the argument?",
    "Compare \"{}\" with another idea from the material.",
    "What assumption links \"{}\" to the overall conclusion?",
];

/// Stand-ins when the input yields fewer than three distinct distractors.
const FILLER_OPTIONS: [&str; 3] = [
    "A topic not covered in the material",
    "An unrelated supporting detail",
    "A term from a different subject",
];

/// Focus term used when the input has no usable vocabulary at all.
const FALLBACK_TERM: &str = "the main topic";

/// Minimum word length (in chars) to qualify as a key term.
const MIN_TERM_LEN: usize = 5;

/// Cap on extracted terms; enough to cycle without scanning huge inputs.
const MAX_TERMS: usize = 40;

/// Build a complete fallback quiz over `text`.
pub fn generate(text: &str, difficulty: Difficulty) -> Vec<QuizQuestion> {
    let terms = key_terms(text);

    (0..QUESTION_COUNT)
        .map(|i| build_question(i, &terms, difficulty))
        .collect()
}

fn build_question(i: usize, terms: &[String], difficulty: Difficulty) -> QuizQuestion {
    let term = &terms[i % terms.len()];
    let prompt = starters(difficulty)[i % STARTER_CYCLE].replace("{}", term);

    if i % SHORT_ANSWER_STRIDE == 0 {
        QuizQuestion {
            kind: QuestionKind::ShortAnswer,
            prompt,
            options: None,
            model_answer: term.clone(),
            difficulty,
        }
    } else {
        let (options, correct) = build_options(i, terms);
        QuizQuestion {
            kind: QuestionKind::MultipleChoice,
            prompt,
            options: Some(options),
            model_answer: correct,
            difficulty,
        }
    }
}

fn starters(difficulty: Difficulty) -> &'static [&'static str; STARTER_CYCLE] {
    match difficulty {
        Difficulty::Easy => &EASY_STARTERS,
        Difficulty::Medium => &MEDIUM_STARTERS,
        Difficulty::Hard => &HARD_STARTERS,
    }
}

/// Assemble four options with exactly one designated correct entry.
///
/// The correct option is the question's focus term, placed at index `i % 4`;
/// distractors are the next distinct terms in extraction order, padded from
/// the fixed filler pool on sparse input. The answer is returned by value so
/// downstream scoring can compare strings directly.
fn build_options(i: usize, terms: &[String]) -> (Vec<String>, String) {
    let correct = terms[i % terms.len()].clone();

    let mut distractors: Vec<String> = Vec::with_capacity(3);
    let mut offset = 1;
    while distractors.len() < 3 && offset < terms.len() {
        let candidate = &terms[(i + offset) % terms.len()];
        if *candidate != correct && !distractors.contains(candidate) {
            distractors.push(candidate.clone());
        }
        offset += 1;
    }
    while distractors.len() < 3 {
        distractors.push(FILLER_OPTIONS[distractors.len()].to_string());
    }

    let mut options = distractors;
    options.insert(i % STARTER_CYCLE, correct.clone());
    (options, correct)
}

/// Extract candidate focus terms: words of at least [`MIN_TERM_LEN`] chars,
/// deduplicated case-insensitively in first-seen order.
fn key_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if terms.len() >= MAX_TERMS {
            break;
        }
        if word.chars().count() < MIN_TERM_LEN {
            continue;
        }
        let lowered = word.to_lowercase();
        if !seen.contains(&lowered) {
            seen.push(lowered);
            terms.push(word.to_string());
        }
    }

    if terms.is_empty() {
        terms.push(FALLBACK_TERM.to_string());
    }
    terms
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
