use std::collections::BTreeMap;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use serde::Serialize;

use super::{ApiError, AppState};
use crate::models::{Category, Question};

/// Category id to type label, e.g. `{"1": "Science"}`.
pub type CategoryMap = BTreeMap<u64, String>;

pub fn category_map(categories: Vec<Category>) -> CategoryMap {
    categories.into_iter().map(|c| (c.id, c.kind)).collect()
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: CategoryMap,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuestionsResponse {
    pub success: bool,
    pub questions: Vec<Question>,
    pub total_questions: usize,
    pub current_category: String,
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state.run(|storage| storage.categories()).await?;

    Ok(Json(CategoriesResponse {
        success: true,
        categories: category_map(categories),
    }))
}

pub async fn category_questions(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<CategoryQuestionsResponse>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;

    let (category, questions) = state
        .run(move |storage| match storage.category(id)? {
            Some(category) => Ok(Some((category, storage.questions_in_category(id)?))),
            None => Ok(None),
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(CategoryQuestionsResponse {
        success: true,
        total_questions: questions.len(),
        questions,
        current_category: category.kind,
    }))
}
