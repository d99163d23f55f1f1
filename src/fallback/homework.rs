//! Homework-help fallback.
//!
//! Subject-templated explanations with a fixed section layout. The original
//! question is embedded verbatim so the student can see exactly what the
//! guidance refers to.

use crate::generator::types::Subject;

/// Per-subject guidance bodies for the methodology and study-tip sections.
struct SubjectTemplate {
    heading: &'static str,
    methodology: &'static str,
    study_tips: &'static str,
}

const MATHEMATICS: SubjectTemplate = SubjectTemplate {
    heading: "Working through a mathematics problem",
    methodology: "Start by writing down every quantity the problem gives you and what it \
asks for. Identify which formula or theorem connects the knowns to the unknown, then solve \
step by step, keeping units and signs explicit at each line. Substitute your result back \
into the original statement to confirm it satisfies the conditions.",
    study_tips: "Rework this problem from a blank page tomorrow without looking at your \
notes. If you get stuck at the same step, that step is the concept to revise. Collect \
similar problems and practice until the setup feels mechanical.",
};

const SCIENCE: SubjectTemplate = SubjectTemplate {
    heading: "Working through a science question",
    methodology: "Name the principle or process the question is probing, then describe the \
mechanism behind it: what causes what, and in which order. Tie each claim back to evidence \
or to a definition from your course material, and watch for cause-versus-correlation traps \
in how the question is phrased.",
    study_tips: "Draw the process as a diagram with arrows for cause and effect. Explaining \
the mechanism aloud, as if teaching a classmate, quickly reveals which links in the chain \
you cannot yet justify.",
};

const ESSAY: SubjectTemplate = SubjectTemplate {
    heading: "Working through an essay prompt",
    methodology: "Turn the prompt into a single arguable claim and make that your thesis. \
Plan one paragraph per supporting point, each opening with a topic sentence and backed by a \
concrete example or quotation. Address the strongest counterargument before the conclusion \
so the essay reads as considered rather than one-sided.",
    study_tips: "Write the outline before any prose; a weak outline produces a weak draft \
no matter how polished the sentences are. Read your draft aloud to catch paragraphs that \
drift away from the thesis.",
};

const GENERAL: SubjectTemplate = SubjectTemplate {
    heading: "Working through the question",
    methodology: "Restate the question in your own words to make sure you are answering \
what is actually asked. Break it into smaller parts, answer each part from your course \
material, then combine the parts into one coherent response and check it against the \
original wording.",
    study_tips: "Note which part of the question felt hardest and revisit that topic in \
your materials first. Spaced repetition beats rereading: quiz yourself on this question \
again in a few days.",
};

/// Produce a structured explanation for `question`, templated by `subject`.
/// Subjects outside the known set use the general template.
pub fn generate(question: &str, subject: Subject) -> String {
    let template = template_for(subject);

    format!(
        "## {heading}\n\n\
         ### Problem restatement\n\n\
         > {question}\n\n\
         ### Methodology\n\n\
         {methodology}\n\n\
         ### Study tips\n\n\
         {study_tips}",
        heading = template.heading,
        question = question.trim(),
        methodology = template.methodology,
        study_tips = template.study_tips,
    )
}

fn template_for(subject: Subject) -> &'static SubjectTemplate {
    match subject {
        Subject::Mathematics => &MATHEMATICS,
        Subject::Science => &SCIENCE,
        Subject::Essay => &ESSAY,
        Subject::General => &GENERAL,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
