use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, AppState};
use crate::models::{IntegerField, ModelError, Question};

/// Category selector as sent by clients: a bare id, or the `{id, type}`
/// object the web client posts. Id 0 and null both mean "all categories".
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum QuizCategory {
    Id(IntegerField),
    Selector {
        #[serde(default)]
        id: Option<IntegerField>,
    },
}

impl QuizCategory {
    pub fn category_id(&self) -> Result<Option<u64>, ModelError> {
        let id = match self {
            QuizCategory::Id(id) => Some(id),
            QuizCategory::Selector { id } => id.as_ref(),
        };
        match id {
            Some(id) => Ok(Some(id.to_id("quiz_category")?).filter(|id| *id != 0)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    #[serde(default)]
    pub quiz_category: Option<QuizCategory>,
    #[serde(default)]
    pub previous_questions: Option<Vec<u64>>,
}

/// `question` is `null` once every eligible question has been asked.
#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub success: bool,
    pub question: Option<Question>,
}

pub async fn next_question(
    State(state): State<AppState>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<Json<QuizResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let category_id = match &request.quiz_category {
        Some(selector) => selector.category_id()?,
        None => None,
    };
    let previous = request.previous_questions.unwrap_or_default();

    if let Some(id) = category_id {
        state
            .run(move |storage| storage.category(id))
            .await?
            .ok_or(ApiError::NotFound)?;
    }

    let candidates = state
        .run(move |storage| storage.quiz_candidates(category_id, &previous))
        .await?;

    let question = candidates.choose(&mut rand::thread_rng()).cloned();
    if question.is_none() {
        debug!(?category_id, "Quiz complete, no questions left");
    }

    Ok(Json(QuizResponse {
        success: true,
        question,
    }))
}
