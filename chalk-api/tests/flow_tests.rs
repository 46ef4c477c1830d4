/// End-to-end HTTP flows against PostgreSQL
///
/// Run with: cargo test -p chalk-api --test flow_tests -- --ignored

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

fn names(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}

async fn create_account(app: &TestApp, token: &str) -> String {
    let (status, body) = app
        .request(
            Method::POST,
            "/v1/accounts",
            Some(token),
            Some(json!({ "name": format!("account-{}", Uuid::new_v4().simple()) })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    body["id"].as_str().unwrap().to_string()
}

async fn create_course(app: &TestApp, token: &str) -> String {
    let account_id = create_account(app, token).await;
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/v1/accounts/{account_id}/courses"),
            Some(token),
            Some(json!({ "name": "Rust" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_session_lifecycle_over_http() {
    let app = TestApp::online().await;
    let (_, token) = app.sign_in_new_user().await;

    let (status, _) = app.request(Method::GET, "/v1/accounts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::POST, "/v1/auth/signout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.request(Method::GET, "/v1/accounts", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 10);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_module_reordering_over_http() {
    let app = TestApp::online().await;
    let (_, token) = app.sign_in_new_user().await;
    let course_id = create_course(&app, &token).await;

    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let (status, body) = app
            .request(
                Method::POST,
                &format!("/v1/courses/{course_id}/modules"),
                Some(&token),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/v1/modules/{}/move", ids[3]),
            Some(&token),
            Some(json!({ "order_idx": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["from"], 4);
    assert_eq!(body["to"], 2);

    let (_, modules) = app
        .request(
            Method::GET,
            &format!("/v1/courses/{course_id}/modules"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(names(&modules), ["A", "D", "B", "C"]);

    // Delete B and compact the rest
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/v1/modules/{}?compact=true", ids[1]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, modules) = app
        .request(
            Method::GET,
            &format!("/v1/courses/{course_id}/modules"),
            Some(&token),
            None,
        )
        .await;
    let order: Vec<i64> = modules
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["order_idx"].as_i64().unwrap())
        .collect();
    assert_eq!(names(&modules), ["A", "D", "C"]);
    assert_eq!(order, [1, 2, 3]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_video_block_from_upload() {
    let app = TestApp::online().await;
    let (_, token) = app.sign_in_new_user().await;
    let course_id = create_course(&app, &token).await;

    let (_, module) = app
        .request(
            Method::POST,
            &format!("/v1/courses/{course_id}/modules"),
            Some(&token),
            Some(json!({ "name": "Basics" })),
        )
        .await;
    let (_, lesson) = app
        .request(
            Method::POST,
            &format!("/v1/modules/{}/lessons", module["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "name": "Ownership" })),
        )
        .await;
    let lesson_id = lesson["id"].as_str().unwrap();

    let upload = Request::builder()
        .method(Method::POST)
        .uri("/v1/files?name=intro.mp4")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from(&b"not really a video"[..]))
        .unwrap();
    let (status, file) = app.send(upload).await;
    assert_eq!(status, StatusCode::CREATED, "{file}");
    assert_eq!(file["size"], 18);
    assert!(file.get("key").is_none());
    let file_id = file["id"].as_str().unwrap();

    let (status, block) = app
        .request(
            Method::POST,
            &format!("/v1/lessons/{lesson_id}/blocks"),
            Some(&token),
            Some(json!({ "type": "video", "file_id": file_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{block}");
    assert_eq!(block["type"], "video");
    assert_eq!(block["order_idx"], 1);

    // Unknown file
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/v1/lessons/{lesson_id}/blocks"),
            Some(&token),
            Some(json!({ "type": "video", "file_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, text) = app
        .request(
            Method::POST,
            &format!("/v1/lessons/{lesson_id}/blocks"),
            Some(&token),
            Some(json!({ "type": "text", "content": "Intro", "order_idx": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{text}");

    let (status, updated) = app
        .request(
            Method::PATCH,
            &format!("/v1/blocks/{}", text["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "content": "Welcome" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "Welcome");

    let (_, blocks) = app
        .request(
            Method::GET,
            &format!("/v1/lessons/{lesson_id}/blocks"),
            Some(&token),
            None,
        )
        .await;
    let kinds: Vec<&str> = blocks
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["text", "video"]);

    let download = Request::builder()
        .method(Method::GET)
        .uri(format!("/v1/files/{file_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(download).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("not really a video".to_string()));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_membership_guards_over_http() {
    let app = TestApp::online().await;
    let (owner_id, owner) = app.sign_in_new_user().await;
    let (member_id, member) = app.sign_in_new_user().await;
    let account_id = create_account(&app, &owner).await;

    // Outsiders cannot read the account
    let (status, body) = app
        .request(Method::GET, &format!("/v1/accounts/{account_id}"), Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 41);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/v1/accounts/{account_id}/members"),
            Some(&owner),
            Some(json!({ "user_id": member_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/v1/accounts/{account_id}/members"),
            Some(&owner),
            Some(json!({ "user_id": member_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 42);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/v1/accounts/{account_id}/members"),
            Some(&owner),
            Some(json!({ "user_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 31);

    // Plain members cannot manage
    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/v1/accounts/{account_id}/members/{owner_id}"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 41);

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/v1/accounts/{account_id}/members/{owner_id}"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 43);

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/v1/accounts/{account_id}/members/{member_id}"),
            Some(&owner),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/v1/accounts/{account_id}/members/{owner_id}"),
            Some(&member),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 45);

    let (status, members) = app
        .request(
            Method::GET,
            &format!("/v1/accounts/{account_id}/members"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_enrollment_over_http() {
    let app = TestApp::online().await;
    let (owner_id, owner) = app.sign_in_new_user().await;
    let (outsider_id, _) = app.sign_in_new_user().await;
    let course_id = create_course(&app, &owner).await;
    let participants = format!("/v1/courses/{course_id}/participants");

    let (status, _) = app
        .request(Method::POST, &participants, Some(&owner), Some(json!({ "user_id": owner_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request(Method::POST, &participants, Some(&owner), Some(json!({ "user_id": owner_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::POST,
            &participants,
            Some(&owner),
            Some(json!({ "user_id": outsider_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.request(Method::GET, &participants, Some(&owner), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("{participants}/{owner_id}"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("{participants}/{owner_id}"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_block_missing_its_payload_can_be_deleted() {
    let app = TestApp::online().await;
    let (_, token) = app.sign_in_new_user().await;
    let course_id = create_course(&app, &token).await;

    let (_, module) = app
        .request(
            Method::POST,
            &format!("/v1/courses/{course_id}/modules"),
            Some(&token),
            Some(json!({ "name": "Basics" })),
        )
        .await;
    let (_, lesson) = app
        .request(
            Method::POST,
            &format!("/v1/modules/{}/lessons", module["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "name": "Ownership" })),
        )
        .await;
    let blocks = format!("/v1/lessons/{}/blocks", lesson["id"].as_str().unwrap());

    let mut ids = Vec::new();
    for content in ["broken", "kept"] {
        let (status, block) = app
            .request(
                Method::POST,
                &blocks,
                Some(&token),
                Some(json!({ "type": "text", "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{block}");
        ids.push(block["id"].as_str().unwrap().parse::<Uuid>().unwrap());
    }

    sqlx::query("DELETE FROM text_blocks WHERE id = $1")
        .bind(ids[0])
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, _) = app.request(Method::GET, &blocks, Some(&token), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/v1/blocks/{}?compact=true", ids[0]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, listed) = app.request(Method::GET, &blocks, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["content"], "kept");
    assert_eq!(listed[0]["order_idx"], 1);
}
