//! Deterministic fallback generators.
//!
//! Invoked when the primary generator's attempts are exhausted or its result
//! cannot be parsed into the expected shape. Each strategy is deterministic
//! given its input and produces complete, usable content on its own.

pub mod homework;
pub mod quiz;
pub mod summary;

use crate::generator::types::{ContentKind, GeneratedContent, GenerationRequest};

/// Dispatch to the strategy for the request's content kind.
pub fn generate(request: &GenerationRequest) -> GeneratedContent {
    match request.kind {
        ContentKind::Summary => GeneratedContent::Text(summary::generate(&request.raw_text)),
        ContentKind::Quiz => {
            GeneratedContent::Quiz(quiz::generate(&request.raw_text, request.difficulty))
        }
        ContentKind::Homework => {
            GeneratedContent::Text(homework::generate(&request.raw_text, request.subject))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::types::{Difficulty, Subject};

    fn request(kind: ContentKind) -> GenerationRequest {
        GenerationRequest {
            kind,
            raw_text: "The water cycle moves water between oceans, atmosphere and land. \
                       Evaporation lifts moisture into the air where it condenses into clouds."
                .into(),
            difficulty: Difficulty::Medium,
            subject: Subject::Science,
        }
    }

    #[test]
    fn test_dispatch_summary() {
        match generate(&request(ContentKind::Summary)) {
            GeneratedContent::Text(text) => assert!(text.starts_with("## Summary")),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_quiz() {
        match generate(&request(ContentKind::Quiz)) {
            GeneratedContent::Quiz(questions) => assert_eq!(questions.len(), quiz::QUESTION_COUNT),
            other => panic!("expected quiz, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_homework() {
        match generate(&request(ContentKind::Homework)) {
            GeneratedContent::Text(text) => {
                assert!(text.contains("### Problem restatement"));
                assert!(text.contains("water cycle"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }
}
