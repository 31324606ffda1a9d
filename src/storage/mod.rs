use crate::models::{Category, ModelError, NewQuestion, Question};
use std::path::Path;
use thiserror::Error;

#[cfg(test)]
pub(crate) mod test_utils;

pub mod migrations;
pub mod sqlite;
pub use sqlite::SqliteStorage;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Category {0} does not exist")]
    MissingCategory(u64),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// One window of the question list plus the size of the whole list.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPage {
    pub questions: Vec<Question>,
    pub total: u64,
}

/// Relational store for questions and categories.
///
/// Every mutating method runs inside its own transaction: it commits on
/// success and rolls back on any error before returning it.
pub trait Storage: Send + Sync {
    fn categories(&self) -> Result<Vec<Category>, StorageError>;
    fn category(&self, id: u64) -> Result<Option<Category>, StorageError>;
    fn insert_category(&self, kind: &str) -> Result<Category, StorageError>;

    /// Questions ordered by id, skipping `offset` and returning at most `limit`.
    fn questions_page(&self, offset: u64, limit: u64) -> Result<QuestionPage, StorageError>;
    fn question(&self, id: u64) -> Result<Option<Question>, StorageError>;
    /// Fails with `MissingCategory` (and stores nothing) if the category is unknown.
    fn insert_question(&self, question: &NewQuestion) -> Result<Question, StorageError>;
    /// Returns `false` if no question had this id.
    fn delete_question(&self, id: u64) -> Result<bool, StorageError>;

    /// Case-insensitive substring match on the question text.
    fn search_questions(&self, term: &str) -> Result<Vec<Question>, StorageError>;
    fn questions_in_category(&self, category_id: u64) -> Result<Vec<Question>, StorageError>;
    /// Questions in `category_id` (or any category when `None`) whose ids are
    /// not in `excluded`.
    fn quiz_candidates(
        &self,
        category_id: Option<u64>,
        excluded: &[u64],
    ) -> Result<Vec<Question>, StorageError>;

    /// Removes every question and category, then seeds `categories` in order.
    fn reset(&self, categories: &[&str]) -> Result<Vec<Category>, StorageError>;
}

/// Opens the SQLite store at `path`, or an in-memory one for `:memory:`.
pub fn open_storage(path: &Path) -> Result<SqliteStorage, StorageError> {
    if path.as_os_str() == IN_MEMORY_PATH {
        return SqliteStorage::in_memory();
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::open(path)
}
