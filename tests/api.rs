use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use trivia_api::api::{router, AppState};
use trivia_api::models::NewQuestion;
use trivia_api::storage::{SqliteStorage, Storage};

struct TestApp {
    router: Router,
    storage: Arc<SqliteStorage>,
}

impl TestApp {
    fn new(categories: &[&str], questions: &[(&str, u64)]) -> Self {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Failed to open test storage"));
        storage.reset(categories).expect("Failed to seed categories");
        for (text, category) in questions {
            let question = NewQuestion::new(text.to_string(), "Answer".to_string(), *category, 2)
                .expect("Invalid test question");
            storage
                .insert_question(&question)
                .expect("Failed to insert test question");
        }

        let state = AppState::new(storage.clone(), 10);
        Self {
            router: router(state),
            storage,
        }
    }

    /// Categories Science (1) and Art (2) with `count` questions alternating between them.
    fn with_questions(count: usize) -> Self {
        let texts: Vec<String> = (1..=count).map(|i| format!("Question {}", i)).collect();
        let questions: Vec<(&str, u64)> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), (i % 2) as u64 + 1))
            .collect();
        Self::new(&["Science", "Art"], &questions)
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    fn question_count(&self) -> u64 {
        self.storage.questions_page(0, 1).unwrap().total
    }
}

fn ids(questions: &Value) -> Vec<u64> {
    questions
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_u64().unwrap())
        .collect()
}

fn assert_error(status: StatusCode, body: &Value, code: u16, message: &str) {
    assert_eq!(status.as_u16(), code);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], code);
    assert_eq!(body["message"], message);
}

#[tokio::test]
async fn test_get_categories() {
    let app = TestApp::new(&["Science", "Art"], &[]);
    let (status, body) = app.get("/categories").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["categories"], json!({"1": "Science", "2": "Art"}));
}

#[tokio::test]
async fn test_get_categories_empty_store() {
    let app = TestApp::new(&[], &[]);
    let (status, body) = app.get("/categories").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], json!({}));
}

#[tokio::test]
async fn test_get_paginated_questions() {
    let app = TestApp::with_questions(12);

    let (status, body) = app.get("/questions?page=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["questions"].as_array().unwrap().len(), 10);
    assert_eq!(body["totalQuestions"], 12);
    assert_eq!(body["currentCategory"], Value::Null);
    assert_eq!(body["categories"], json!({"1": "Science", "2": "Art"}));

    let (status, body) = app.get("/questions?page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["questions"]), vec![11, 12]);
    assert_eq!(body["totalQuestions"], 12);

    // Missing page reads as page 1
    let (_, body) = app.get("/questions").await;
    assert_eq!(ids(&body["questions"]), (1..=10).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_get_questions_beyond_last_page_is_empty() {
    let app = TestApp::with_questions(12);
    let (status, body) = app.get("/questions?page=100").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["questions"].as_array().unwrap().is_empty());
    assert_eq!(body["totalQuestions"], 12);
}

#[tokio::test]
async fn test_question_shape() {
    let app = TestApp::new(&["Science"], &[("What is H2O?", 1)]);
    let (_, body) = app.get("/questions").await;
    let question = &body["questions"][0];

    assert_eq!(question["id"], 1);
    assert_eq!(question["question"], "What is H2O?");
    assert_eq!(question["answer"], "Answer");
    assert_eq!(question["category"], 1);
    assert_eq!(question["difficulty"], 2);
}

#[tokio::test]
async fn test_delete_question() {
    let app = TestApp::with_questions(3);

    let (status, body) = app.request(Method::DELETE, "/questions/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "deleted": 2}));

    let (_, body) = app.get("/questions").await;
    assert_eq!(ids(&body["questions"]), vec![1, 3]);
    assert_eq!(body["totalQuestions"], 2);

    let (status, body) = app.request(Method::DELETE, "/questions/2", None).await;
    assert_error(status, &body, 404, "resource not found");
}

#[tokio::test]
async fn test_delete_question_not_found() {
    let app = TestApp::with_questions(1);

    let (status, body) = app.request(Method::DELETE, "/questions/1000", None).await;
    assert_error(status, &body, 404, "resource not found");

    let (status, body) = app.request(Method::DELETE, "/questions/abc", None).await;
    assert_error(status, &body, 404, "resource not found");
    assert_eq!(app.question_count(), 1);
}

#[tokio::test]
async fn test_create_question() {
    let app = TestApp::with_questions(2);

    let (status, body) = app
        .post(
            "/questions",
            json!({
                "question": "Who wrote Hamlet?",
                "answer": "Shakespeare",
                "category": 2,
                "difficulty": 3
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.question_count(), 3);

    let created = app
        .storage
        .question(body["created"].as_u64().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(created.question, "Who wrote Hamlet?");
    assert_eq!(created.answer, "Shakespeare");
    assert_eq!(created.category, 2);
    assert_eq!(created.difficulty, 3);
}

#[tokio::test]
async fn test_create_question_with_string_fields() {
    let app = TestApp::with_questions(0);

    let (status, _) = app
        .post(
            "/questions",
            json!({"question": "Q?", "answer": "A", "category": "1", "difficulty": "5"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.question_count(), 1);
}

#[tokio::test]
async fn test_create_question_unprocessable() {
    let app = TestApp::with_questions(2);

    let bad_bodies = [
        json!({"question": "Q?", "answer": "A", "category": 1, "difficulty": "hard"}),
        json!({"question": "Q?", "answer": "A", "category": 1, "difficulty": 2.5}),
        json!({"question": "Q?", "answer": "A", "category": 1, "difficulty": 9}),
        json!({"question": "Q?", "answer": "A", "category": 99, "difficulty": 1}),
        json!({"question": "", "answer": "A", "category": 1, "difficulty": 1}),
        json!({"answer": "A", "category": 1, "difficulty": 1}),
        json!([1, 2, 3]),
    ];

    for body in bad_bodies {
        let (status, response) = app.post("/questions", body.clone()).await;
        assert_error(status, &response, 422, "unprocessable");
    }
    assert_eq!(app.question_count(), 2);
}

#[tokio::test]
async fn test_create_question_without_json_body() {
    let app = TestApp::with_questions(0);
    let (status, body) = app.request(Method::POST, "/questions", None).await;
    assert_error(status, &body, 422, "unprocessable");
}

#[tokio::test]
async fn test_questions_method_not_allowed() {
    let app = TestApp::with_questions(1);

    let (status, body) = app
        .request(Method::PUT, "/questions", Some(json!({"question": "Q?"})))
        .await;
    assert_error(status, &body, 405, "method not allowed");

    let (status, body) = app.request(Method::PATCH, "/questions/1", None).await;
    assert_error(status, &body, 405, "method not allowed");

    let (status, body) = app.get("/questions/search").await;
    assert_error(status, &body, 405, "method not allowed");
}

#[tokio::test]
async fn test_search_questions() {
    let app = TestApp::new(
        &["Science", "Art"],
        &[
            ("What was the TITLE of the first Star Wars film?", 2),
            ("Which title did Napoleon crown himself with?", 1),
            ("How many moons does Mars have?", 1),
        ],
    );

    let (status, body) = app.post("/questions/search", json!({"searchTerm": "title"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(ids(&body["questions"]), vec![1, 2]);
    assert_eq!(body["totalQuestions"], 2);

    let (_, again) = app.post("/questions/search", json!({"searchTerm": "title"})).await;
    assert_eq!(again, body);

    let (_, none) = app.post("/questions/search", json!({"searchTerm": "xyzzy"})).await;
    assert!(none["questions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_with_empty_term_matches_everything() {
    let app = TestApp::with_questions(4);

    for body in [json!({"searchTerm": ""}), json!({"searchTerm": null}), json!({})] {
        let (status, response) = app.post("/questions/search", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&response["questions"]), vec![1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn test_get_questions_by_category() {
    let app = TestApp::with_questions(5);

    let (status, body) = app.get("/categories/2/questions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(ids(&body["questions"]), vec![2, 4]);
    assert_eq!(body["totalQuestions"], 2);
    assert_eq!(body["currentCategory"], "Art");
}

#[tokio::test]
async fn test_get_questions_by_unknown_category() {
    let app = TestApp::with_questions(5);

    let (status, body) = app.get("/categories/99/questions").await;
    assert_error(status, &body, 404, "resource not found");

    let (status, body) = app.get("/categories/science/questions").await;
    assert_error(status, &body, 404, "resource not found");
}

#[tokio::test]
async fn test_quiz_returns_question_from_category() {
    let app = TestApp::with_questions(6);

    for _ in 0..10 {
        let (status, body) = app
            .post("/quizzes", json!({"quiz_category": 1, "previous_questions": []}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["question"].is_object());
        assert_eq!(body["question"]["category"], 1);
    }
}

#[tokio::test]
async fn test_quiz_never_repeats_previous_questions() {
    let app = TestApp::with_questions(6);

    for _ in 0..10 {
        let (_, body) = app
            .post(
                "/quizzes",
                json!({"quiz_category": {"type": "Science", "id": "1"}, "previous_questions": [1, 3]}),
            )
            .await;
        assert_eq!(body["question"]["id"], 5);
    }
}

#[tokio::test]
async fn test_quiz_complete_returns_null_question() {
    let app = TestApp::with_questions(6);

    let (status, body) = app
        .post("/quizzes", json!({"quiz_category": 1, "previous_questions": [1, 3, 5]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "question": null}));
}

#[tokio::test]
async fn test_quiz_across_all_categories() {
    let app = TestApp::with_questions(4);

    let (status, body) = app
        .post(
            "/quizzes",
            json!({"quiz_category": {"type": "click", "id": 0}, "previous_questions": [1, 2, 3]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"]["id"], 4);

    let (_, body) = app.post("/quizzes", json!({"previous_questions": [1, 2, 3, 4]})).await;
    assert_eq!(body["question"], Value::Null);
}

#[tokio::test]
async fn test_quiz_errors() {
    let app = TestApp::with_questions(4);

    let (status, body) = app
        .post("/quizzes", json!({"quiz_category": 42, "previous_questions": []}))
        .await;
    assert_error(status, &body, 404, "resource not found");

    let (status, body) = app
        .post("/quizzes", json!({"quiz_category": 1, "previous_questions": "all"}))
        .await;
    assert_error(status, &body, 422, "unprocessable");

    let (status, body) = app.get("/quizzes").await;
    assert_error(status, &body, 405, "method not allowed");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::with_questions(0);
    let (status, body) = app.get("/answers").await;
    assert_error(status, &body, 404, "resource not found");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::with_questions(0);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/questions")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type, authorization")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "missing {} in {}", method, methods);
    }

    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    for name in ["content-type", "authorization"] {
        assert!(allowed.contains(name), "missing {} in {}", name, allowed);
    }
}

#[tokio::test]
async fn test_ids_beyond_storage_range_are_not_found() {
    let app = TestApp::with_questions(2);

    let (status, body) = app
        .request(Method::DELETE, "/questions/18446744073709551615", None)
        .await;
    assert_error(status, &body, 404, "resource not found");

    let (status, body) = app.get("/categories/9223372036854775808/questions").await;
    assert_error(status, &body, 404, "resource not found");
    assert_eq!(app.question_count(), 2);
}

#[tokio::test]
async fn test_search_folds_non_ascii_case() {
    let app = TestApp::new(
        &["Geography"],
        &[
            ("Who built the ÉCOLE in Paris?", 1),
            ("Which river flows through Paris?", 1),
        ],
    );

    let (status, body) = app.post("/questions/search", json!({"searchTerm": "école"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["questions"]), vec![1]);
    assert_eq!(body["totalQuestions"], 1);
}
