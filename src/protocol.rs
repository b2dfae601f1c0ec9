//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{DrawSignal, TestDraw};
use crate::format::{format_question, FormattedQuestion};
use crate::grade::SubmittedAnswer;

#[derive(Deserialize)]
pub struct DocumentIn {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolIn {
    pub kind: String,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

fn default_count() -> usize {
    10
}

/// Defaults mirror the upload page: ten questions, no repeats.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestIn {
    pub kind: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub allow_repeats: bool,
}

#[derive(Deserialize)]
pub struct GradeIn {
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub text: String,
    #[serde(flatten)]
    pub formatted: FormattedQuestion,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOut {
    pub kind: String,
    pub requested: usize,
    pub questions: Vec<QuestionOut>,
    pub signals: Vec<DrawSignal>,
}

/// Convert an internal draw to the public DTO.
pub fn to_test_out(requested: usize, draw: TestDraw) -> TestOut {
    TestOut {
        kind: draw.kind.to_string(),
        requested,
        questions: draw
            .questions
            .into_iter()
            .map(|text| QuestionOut { formatted: format_question(&text), text })
            .collect(),
        signals: draw.signals,
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generator: String,
    pub sessions: usize,
}
