use crate::models::{NewQuestion, DEFAULT_CATEGORIES};
use crate::storage::{SqliteStorage, Storage};

pub fn new_question(text: &str, category: u64) -> NewQuestion {
    NewQuestion::new(text.to_string(), "An answer".to_string(), category, 1)
        .expect("Failed to build test question")
}

/// In-memory store with the default categories and `questions` questions
/// spread round-robin over categories 1 to 3.
pub fn seeded_storage(questions: usize) -> SqliteStorage {
    let storage = SqliteStorage::in_memory().expect("Failed to open test storage");
    storage
        .reset(DEFAULT_CATEGORIES)
        .expect("Failed to seed categories");

    for i in 0..questions {
        let category = (i % 3) as u64 + 1;
        storage
            .insert_question(&new_question(&format!("Question number {}", i + 1), category))
            .expect("Failed to insert test question");
    }

    storage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_storage() {
        let storage = seeded_storage(5);
        assert_eq!(storage.categories().unwrap().len(), DEFAULT_CATEGORIES.len());
        assert_eq!(storage.questions_page(0, 100).unwrap().total, 5);
        assert_eq!(storage.questions_in_category(3).unwrap().len(), 1);
    }
}
