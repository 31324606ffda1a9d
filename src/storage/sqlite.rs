use super::migrations;
use super::{QuestionPage, Storage, StorageError};
use crate::models::{Category, NewQuestion, Question};
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const QUESTION_COLUMNS: &str = "id, question, answer, category, difficulty, created_at";

/// SQL name of the Unicode-aware lowercase function registered on every connection.
const FOLD_FUNCTION: &str = "fold_case";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        info!(path = %path.display(), "Opened SQLite store");
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Storage(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        // SQLite's own LIKE and lower() only fold ASCII.
        conn.create_scalar_function(
            FOLD_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
        )?;
        let version = migrations::apply_migrations(&mut conn)?;
        debug!(version, "Schema is up to date");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current schema version of the underlying database.
    pub fn schema_version(&self) -> Result<i32, StorageError> {
        let conn = self.get_connection()?;
        migrations::get_current_version(&conn)
    }

    /// Moves the schema to `version` in either direction.
    pub fn migrate_to(&self, version: i32) -> Result<i32, StorageError> {
        let mut conn = self.get_connection()?;
        migrations::migrate_to(&mut conn, version)
    }

    fn get_connection(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Storage(format!("Failed to lock connection: {}", e)))
    }

    fn row_to_question(row: &Row<'_>) -> rusqlite::Result<Question> {
        Ok(Question {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
            category: row.get(3)?,
            difficulty: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(5)?)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Utc),
        })
    }

    fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            kind: row.get(1)?,
        })
    }

    fn query_questions<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<Question>, StorageError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_question)?;
        let mut questions = Vec::new();
        for question in rows {
            questions.push(question?);
        }
        Ok(questions)
    }

    fn category_exists(conn: &Connection, id: u64) -> Result<bool, StorageError> {
        let Some(id) = row_id(id) else {
            return Ok(false);
        };
        let found: Option<u64> = conn
            .query_row("SELECT id FROM categories WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

/// Rowids are signed, so an id past `i64::MAX` never names a stored row.
fn row_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

/// Escapes `\`, `%` and `_` so the term matches literally inside `LIKE ... ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Storage for SqliteStorage {
    fn categories(&self) -> Result<Vec<Category>, StorageError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT id, type FROM categories ORDER BY id")?;
        let rows = stmt.query_map([], Self::row_to_category)?;
        let mut categories = Vec::new();
        for category in rows {
            categories.push(category?);
        }
        Ok(categories)
    }

    fn category(&self, id: u64) -> Result<Option<Category>, StorageError> {
        let Some(id) = row_id(id) else {
            return Ok(None);
        };
        let conn = self.get_connection()?;
        let category = conn
            .query_row(
                "SELECT id, type FROM categories WHERE id = ?1",
                [id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    fn insert_category(&self, kind: &str) -> Result<Category, StorageError> {
        Category::validate_kind(kind)?;
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute("INSERT INTO categories (type) VALUES (?1)", [kind])?;
        let id = tx.last_insert_rowid() as u64;
        tx.commit()?;

        Ok(Category {
            id,
            kind: kind.to_string(),
        })
    }

    fn questions_page(&self, offset: u64, limit: u64) -> Result<QuestionPage, StorageError> {
        let conn = self.get_connection()?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
        let questions = Self::query_questions(
            &conn,
            &format!(
                "SELECT {} FROM questions ORDER BY id LIMIT ?1 OFFSET ?2",
                QUESTION_COLUMNS
            ),
            params![limit, offset],
        )?;
        Ok(QuestionPage { questions, total })
    }

    fn question(&self, id: u64) -> Result<Option<Question>, StorageError> {
        let Some(id) = row_id(id) else {
            return Ok(None);
        };
        let conn = self.get_connection()?;
        let question = conn
            .query_row(
                &format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS),
                [id],
                Self::row_to_question,
            )
            .optional()?;
        Ok(question)
    }

    fn insert_question(&self, question: &NewQuestion) -> Result<Question, StorageError> {
        let mut conn = self.get_connection()?;
        // Dropping `tx` without commit rolls back, so every early return below is clean.
        let tx = conn.transaction()?;

        if !Self::category_exists(&tx, question.category)? {
            return Err(StorageError::MissingCategory(question.category));
        }

        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO questions (question, answer, category, difficulty, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                question.question,
                question.answer,
                question.category,
                question.difficulty,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid() as u64;
        tx.commit()?;

        Ok(Question {
            id,
            question: question.question.clone(),
            answer: question.answer.clone(),
            category: question.category,
            difficulty: question.difficulty,
            created_at,
        })
    }

    fn delete_question(&self, id: u64) -> Result<bool, StorageError> {
        let Some(id) = row_id(id) else {
            return Ok(false);
        };
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM questions WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn search_questions(&self, term: &str) -> Result<Vec<Question>, StorageError> {
        let conn = self.get_connection()?;
        Self::query_questions(
            &conn,
            &format!(
                "SELECT {} FROM questions WHERE {}(question) LIKE ?1 ESCAPE '\\' ORDER BY id",
                QUESTION_COLUMNS, FOLD_FUNCTION
            ),
            [like_pattern(&term.to_lowercase())],
        )
    }

    fn questions_in_category(&self, category_id: u64) -> Result<Vec<Question>, StorageError> {
        let Some(category_id) = row_id(category_id) else {
            return Ok(Vec::new());
        };
        let conn = self.get_connection()?;
        Self::query_questions(
            &conn,
            &format!(
                "SELECT {} FROM questions WHERE category = ?1 ORDER BY id",
                QUESTION_COLUMNS
            ),
            [category_id],
        )
    }

    fn quiz_candidates(
        &self,
        category_id: Option<u64>,
        excluded: &[u64],
    ) -> Result<Vec<Question>, StorageError> {
        let questions = match category_id {
            Some(id) => self.questions_in_category(id)?,
            None => {
                let conn = self.get_connection()?;
                Self::query_questions(
                    &conn,
                    &format!("SELECT {} FROM questions ORDER BY id", QUESTION_COLUMNS),
                    [],
                )?
            }
        };

        let excluded: HashSet<u64> = excluded.iter().copied().collect();
        Ok(questions
            .into_iter()
            .filter(|q| !excluded.contains(&q.id))
            .collect())
    }

    fn reset(&self, categories: &[&str]) -> Result<Vec<Category>, StorageError> {
        for kind in categories {
            Category::validate_kind(kind)?;
        }

        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM questions", [])?;
        tx.execute("DELETE FROM categories", [])?;

        let mut seeded = Vec::with_capacity(categories.len());
        for kind in categories {
            tx.execute("INSERT INTO categories (type) VALUES (?1)", [kind])?;
            seeded.push(Category {
                id: tx.last_insert_rowid() as u64,
                kind: kind.to_string(),
            });
        }
        tx.commit()?;

        info!(categories = seeded.len(), "Store reset");
        Ok(seeded)
    }
}
