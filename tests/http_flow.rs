use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use bible_games_back::{
    config::AppConfig,
    dao::game_store::{GameStore, sqlite::SqliteGameStore},
    generation::pool::builtin_pool,
    routes,
    state::{AppState, SharedState},
};

async fn app() -> (Router, SharedState) {
    let store = SqliteGameStore::open_in_memory().unwrap();
    store.seed_pool(builtin_pool()).await.unwrap();
    let state = AppState::new(Arc::new(store), None, AppConfig::default());
    (routes::router(state.clone()), state)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_quiz(app: &Router, max_players: u32) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/bible-games/create",
        None,
        Some(json!({
            "name": "Quiz A",
            "difficulty": "easy",
            "maxPlayers": max_players,
            "questionsPerGame": 5,
            "timePerQuestion": 30,
            "playerName": "Ann"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    body["game"]["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn single_guest_plays_a_full_game() {
    let (app, state) = app().await;
    let game_id = create_quiz(&app, 1).await;

    let (status, started) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/start-guest"),
        None,
        Some(json!({ "guestId": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{started}");
    assert_eq!(started["questionCount"], 5);
    assert_eq!(started["game"]["status"], "starting");

    let questions = state
        .store()
        .list_questions(Uuid::parse_str(&game_id).unwrap())
        .await
        .unwrap();
    assert_eq!(questions.len(), 5);

    for question in &questions {
        let (status, answered) = call(
            &app,
            Method::POST,
            &format!(
                "/bible-games/{game_id}/questions/{}/answer-guest",
                question.id
            ),
            None,
            Some(json!({
                "selectedAnswer": question.correct_answer,
                "timeTaken": 3,
                "guestId": 0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{answered}");
        assert_eq!(answered["answer"]["isCorrect"], true);
    }

    let (status, registered) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/register-finished"),
        None,
        Some(json!({ "guestId": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{registered}");
    assert_eq!(registered["completedByThisCall"], true);

    let (status, finished) = call(
        &app,
        Method::GET,
        &format!("/bible-games/{game_id}/check-finished"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finished["allFinished"], true);
    assert_eq!(finished["finishedCount"], 1);
    assert_eq!(finished["totalPlayers"], 1);
    assert_eq!(finished["status"], "completed");

    let (_, results) = call(
        &app,
        Method::GET,
        &format!("/bible-games/{game_id}/results"),
        None,
        None,
    )
    .await;
    assert_eq!(results["results"][0]["participant"]["score"], 50);

    let (_, board) = call(&app, Method::GET, "/bible-games/leaderboard", None, None).await;
    assert_eq!(board["leaderboard"]["easy"][0]["score"], 50);
}

#[tokio::test]
async fn anonymous_creator_leaving_removes_the_game() {
    let (app, _) = app().await;
    let game_id = create_quiz(&app, 1).await;

    let (status, left) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/leave"),
        None,
        Some(json!({ "guestId": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(left["gameDeleted"], true);

    let (status, missing) = call(
        &app,
        Method::GET,
        &format!("/bible-games/{game_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["success"], false);
    assert_eq!(missing["code"], "not_found");
}

#[tokio::test]
async fn authenticated_routes_reject_anonymous_callers() {
    let (app, _) = app().await;
    let game_id = create_quiz(&app, 2).await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/join"),
        None,
        Some(json!({ "playerName": "Ben" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, joined) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/join"),
        Some(7),
        Some(json!({ "playerName": "Ben" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{joined}");
    assert_eq!(joined["participant"]["userId"], 7);
    assert_eq!(joined["alreadyJoined"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/start"),
        Some(7),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_games_and_bad_payloads_are_client_errors() {
    let (app, _) = app().await;
    let game_id = create_quiz(&app, 1).await;

    let (status, full) = call(
        &app,
        Method::POST,
        &format!("/bible-games/{game_id}/join-guest"),
        None,
        Some(json!({ "playerName": "Ben" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(full["code"], "game_full");

    let (status, invalid) = call(
        &app,
        Method::POST,
        "/bible-games/create",
        None,
        Some(json!({
            "name": "Quiz B",
            "difficulty": "easy",
            "maxPlayers": 0,
            "questionsPerGame": 5,
            "playerName": "Ann"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid["code"], "validation_error");
}

#[tokio::test]
async fn cleanup_status_and_health_respond() {
    let (app, _) = app().await;
    create_quiz(&app, 1).await;

    let (status, cleanup) = call(&app, Method::GET, "/bible-games/cleanup-status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleanup["counts"]["total"], 0);

    let (status, health) = call(&app, Method::GET, "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}
