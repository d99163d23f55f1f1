//! Request and content types shared by the pipeline, the upstream generator
//! client, and the fallback strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// The three content kinds the service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Summary,
    Quiz,
    Homework,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Quiz => write!(f, "quiz"),
            Self::Homework => write!(f, "homework"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "quiz" => Ok(Self::Quiz),
            "homework" => Ok(Self::Homework),
            _ => Err(format!("Unknown content kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Subject hint for homework explanations. Anything the service does not
/// recognize deserializes as `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Mathematics,
    Science,
    Essay,
    #[default]
    #[serde(other)]
    General,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mathematics => write!(f, "mathematics"),
            Self::Science => write!(f, "science"),
            Self::Essay => write!(f, "essay"),
            Self::General => write!(f, "general"),
        }
    }
}

/// A single generation request as seen by the pipeline. Transient; owned by
/// the call stack of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: ContentKind,
    pub raw_text: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub subject: Subject,
}

// ---------------------------------------------------------------------------
// Quiz content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
}

/// One quiz question. `options` is present iff the question is multiple
/// choice, in which case it holds exactly four entries and `model_answer`
/// equals one of them by value (downstream scoring is string equality).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub model_answer: String,
    pub difficulty: Difficulty,
}

impl QuizQuestion {
    /// Check the structural invariants for this question.
    pub fn is_well_formed(&self) -> bool {
        if self.prompt.trim().is_empty() || self.model_answer.trim().is_empty() {
            return false;
        }
        match self.kind {
            QuestionKind::ShortAnswer => self.options.is_none(),
            QuestionKind::MultipleChoice => self
                .options
                .as_ref()
                .is_some_and(|opts| opts.len() == 4 && opts.contains(&self.model_answer)),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Which generator produced the final content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Primary,
    Fallback,
}

impl fmt::Display for OutcomeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Generated content: free text for summaries and homework explanations, an
/// ordered question list for quizzes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedContent {
    Text(String),
    Quiz(Vec<QuizQuestion>),
}

/// Final result of one pipeline invocation. Created per request; persistence
/// is a collaborator concern, not handled here.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub content: GeneratedContent,
    pub source: OutcomeSource,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
