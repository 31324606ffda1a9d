use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::categories::{category_map, CategoryMap};
use super::{ApiError, AppState};
use crate::models::{IntegerField, ModelError, NewQuestion, Question};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionListResponse {
    pub success: bool,
    pub questions: Vec<Question>,
    pub total_questions: u64,
    pub current_category: Option<String>,
    pub categories: CategoryMap,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub category: Option<IntegerField>,
    #[serde(default)]
    pub difficulty: Option<IntegerField>,
}

impl CreateQuestionRequest {
    pub fn into_new_question(self) -> Result<NewQuestion, ModelError> {
        let question = self.question.ok_or(ModelError::MissingField("question"))?;
        let answer = self.answer.ok_or(ModelError::MissingField("answer"))?;
        let category = self
            .category
            .ok_or(ModelError::MissingField("category"))?
            .to_id("category")?;
        let difficulty = self
            .difficulty
            .ok_or(ModelError::MissingField("difficulty"))?
            .to_difficulty()?;

        NewQuestion::new(question, answer, category, difficulty)
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub created: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default, rename = "searchTerm")]
    pub search_term: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub questions: Vec<Question>,
    pub total_questions: usize,
    pub current_category: Option<String>,
}

/// Page number from the query string. Missing, non-numeric or zero pages read as 1.
pub fn page_number(params: &HashMap<String, String>) -> u64 {
    params
        .get("page")
        .and_then(|p| p.trim().parse::<u64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

pub async fn list_questions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let per_page = state.questions_per_page() as u64;
    let offset = (page_number(&params) - 1)
        .saturating_mul(per_page)
        .min(i64::MAX as u64);

    let (page, categories) = state
        .run(move |storage| {
            let page = storage.questions_page(offset, per_page)?;
            Ok((page, storage.categories()?))
        })
        .await?;

    Ok(Json(QuestionListResponse {
        success: true,
        questions: page.questions,
        total_questions: page.total,
        current_category: None,
        categories: category_map(categories),
    }))
}

pub async fn create_question(
    State(state): State<AppState>,
    payload: Result<Json<CreateQuestionRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let new_question = request.into_new_question()?;

    let created = state
        .run(move |storage| storage.insert_question(&new_question))
        .await?;
    info!(id = created.id, category = created.category, "Created question");

    Ok(Json(CreatedResponse {
        success: true,
        created: created.id,
    }))
}

pub async fn delete_question(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;

    if !state.run(move |storage| storage.delete_question(id)).await? {
        return Err(ApiError::NotFound);
    }
    info!(id, "Deleted question");

    Ok(Json(DeletedResponse {
        success: true,
        deleted: id,
    }))
}

/// An empty or missing search term matches every question.
pub async fn search_questions(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let term = request.search_term.unwrap_or_default();

    let questions = state
        .run(move |storage| storage.search_questions(&term))
        .await?;

    Ok(Json(SearchResponse {
        success: true,
        total_questions: questions.len(),
        questions,
        current_category: None,
    }))
}
