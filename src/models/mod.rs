use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_DIFFICULTY: u32 = 1;
pub const MAX_DIFFICULTY: u32 = 5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Question {
    pub id: u64,
    pub question: String,
    pub answer: String,
    pub category: u64,
    pub difficulty: u32,
    pub created_at: DateTime<Utc>,
}

/// A validated question that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    pub category: u64,
    pub difficulty: u32,
}

impl NewQuestion {
    pub fn new(
        question: String,
        answer: String,
        category: u64,
        difficulty: u32,
    ) -> Result<Self, ModelError> {
        if question.trim().is_empty() {
            return Err(ModelError::EmptyQuestion);
        }
        if answer.trim().is_empty() {
            return Err(ModelError::EmptyAnswer);
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(ModelError::InvalidDifficulty(difficulty as i64));
        }

        Ok(Self {
            question: question.trim().to_string(),
            answer: answer.trim().to_string(),
            category,
            difficulty,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Category {
    pub fn validate_kind(kind: &str) -> Result<(), ModelError> {
        if kind.trim().is_empty() {
            return Err(ModelError::EmptyCategoryType);
        }
        Ok(())
    }
}

/// Categories seeded by `db reset`.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Science",
    "Art",
    "Geography",
    "History",
    "Entertainment",
    "Sports",
];

/// An integer that clients may send either as a JSON number or as a string of
/// digits (form `<select>` values arrive as strings).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum IntegerField {
    Number(i64),
    Text(String),
}

impl IntegerField {
    pub fn to_i64(&self, field: &'static str) -> Result<i64, ModelError> {
        match self {
            IntegerField::Number(n) => Ok(*n),
            IntegerField::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ModelError::NotAnInteger(field, s.clone())),
        }
    }

    pub fn to_id(&self, field: &'static str) -> Result<u64, ModelError> {
        let value = self.to_i64(field)?;
        u64::try_from(value).map_err(|_| ModelError::NotAnInteger(field, value.to_string()))
    }

    pub fn to_difficulty(&self) -> Result<u32, ModelError> {
        let value = self.to_i64("difficulty")?;
        u32::try_from(value)
            .ok()
            .filter(|d| (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(d))
            .ok_or(ModelError::InvalidDifficulty(value))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Question text cannot be empty")]
    EmptyQuestion,
    #[error("Answer text cannot be empty")]
    EmptyAnswer,
    #[error("Category type cannot be empty")]
    EmptyCategoryType,
    #[error("Difficulty must be between 1 and 5, got {0}")]
    InvalidDifficulty(i64),
    #[error("Field {0} is not an integer: {1}")]
    NotAnInteger(&'static str, String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}
