//! HTTP surface of the trivia store.
//!
//! | Method | Path                         |
//! |--------|------------------------------|
//! | GET    | `/categories`                |
//! | GET    | `/categories/:id/questions`  |
//! | GET    | `/questions?page=N`          |
//! | POST   | `/questions`                 |
//! | DELETE | `/questions/:id`             |
//! | POST   | `/questions/search`          |
//! | POST   | `/quizzes`                   |
//!
//! Successful responses carry `"success": true`; failures use the envelope in
//! [`error::ErrorResponse`].

use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::storage::{Storage, StorageError};

pub mod categories;
pub mod error;
pub mod questions;
pub mod quizzes;
pub mod server;

pub use error::{ApiError, ErrorResponse};

/// Shared handler state: the injected store handle plus request-independent settings.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<dyn Storage>,
    questions_per_page: usize,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, questions_per_page: usize) -> Self {
        Self {
            storage,
            questions_per_page: questions_per_page.max(1),
        }
    }

    pub fn questions_per_page(&self) -> usize {
        self.questions_per_page
    }

    /// Runs a blocking store operation off the async executor.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&dyn Storage) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .map_err(|e| ApiError::Internal(format!("Store task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
}

/// Builds the application router around `state`.
pub fn router(state: AppState) -> Router {
    use error::method_not_allowed;

    Router::new()
        .route(
            "/categories",
            get(categories::list_categories).fallback(method_not_allowed),
        )
        .route(
            "/categories/:id/questions",
            get(categories::category_questions).fallback(method_not_allowed),
        )
        .route(
            "/questions",
            get(questions::list_questions)
                .post(questions::create_question)
                .fallback(method_not_allowed),
        )
        .route(
            "/questions/search",
            post(questions::search_questions).fallback(method_not_allowed),
        )
        .route(
            "/questions/:id",
            delete(questions::delete_question).fallback(method_not_allowed),
        )
        .route(
            "/quizzes",
            post(quizzes::next_question).fallback(method_not_allowed),
        )
        .fallback(error::not_found)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
