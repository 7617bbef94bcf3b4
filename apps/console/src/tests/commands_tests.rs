use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use client_core::Connection;
use serde_json::{json, Value};
use shared::domain::Language;
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

type Seen = Arc<Mutex<Vec<(String, Option<Value>)>>>;

fn anything() -> Value {
    json!({
        "id": "http://rdfh.ch/projects/0001",
        "shortcode": "0001",
        "shortname": "anything",
        "longname": "Anything Project",
        "description": [{ "language": "en", "value": "Anything" }],
        "keywords": ["things"],
        "ontologies": ["http://0.0.0.0:3333/ontology/0001/anything/v2"],
        "selfjoin": false,
        "status": true
    })
}

async fn handle_project(State(seen): State<Seen>, Path(code): Path<String>) -> Json<Value> {
    seen.lock().await.push((format!("GET shortcode/{code}"), None));
    Json(json!({ "project": anything() }))
}

async fn handle_permissions(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().await.push(("POST permissions".into(), Some(body)));
    Json(json!({ "administrative_permission": {} }))
}

async fn handle_logout(State(seen): State<Seen>) -> (StatusCode, Json<Value>) {
    seen.lock().await.push(("DELETE authentication".into(), None));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "session store unavailable" })),
    )
}

async fn spawn_dsp_server() -> (String, Seen) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let seen = Seen::default();
    let app = Router::new()
        .route("/admin/projects/shortcode/:code", get(handle_project))
        .route("/admin/permissions/ap", post(handle_permissions))
        .route("/v2/authentication", delete(handle_logout))
        .with_state(seen.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), seen)
}

fn no_changes(key: &str) -> ProjectChanges {
    ProjectChanges {
        key: key.into(),
        longname: None,
        description: None,
        lang: Language::En,
        add_keywords: Vec::new(),
        remove_keywords: Vec::new(),
        selfjoin: None,
        status: None,
        default_permissions: false,
    }
}

#[tokio::test]
async fn show_project_by_shortcode() {
    let (server, seen) = spawn_dsp_server().await;
    let connection = Connection::new(server).expect("connection");
    run(
        &connection,
        Command::Projects(ProjectCommand::Show { key: "0001".into() }),
    )
    .await
    .expect("show");
    assert_eq!(seen.lock().await[0].0, "GET shortcode/0001");
}

#[tokio::test]
async fn unchanged_project_only_sets_permissions() {
    let (server, seen) = spawn_dsp_server().await;
    let connection = Connection::new(server).expect("connection");
    let changes = ProjectChanges {
        default_permissions: true,
        ..no_changes("0001")
    };
    run(&connection, Command::Projects(ProjectCommand::Set(changes)))
        .await
        .expect("set");

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 2);
    let (call, body) = &seen[1];
    assert_eq!(call, "POST permissions");
    let body = body.as_ref().expect("permission body");
    assert_eq!(body["forProject"], json!("http://rdfh.ch/projects/0001"));
    assert_eq!(
        body["hasPermissions"][0]["name"],
        json!("ProjectResourceCreateAllPermission")
    );
}

#[tokio::test]
async fn removing_an_unknown_keyword_fails_before_update() {
    let (server, seen) = spawn_dsp_server().await;
    let connection = Connection::new(server).expect("connection");
    let changes = ProjectChanges {
        remove_keywords: vec!["missing".into()],
        ..no_changes("0001")
    };
    let result = run(&connection, Command::Projects(ProjectCommand::Set(changes))).await;
    assert!(result.is_err());
    assert_eq!(seen.lock().await.len(), 1);
}

#[tokio::test]
async fn failed_logout_keeps_command_error() {
    let (server, seen) = spawn_dsp_server().await;
    let mut connection = Connection::new(server).expect("connection");
    connection.set_token("session-token");
    let err = run_session(
        &mut connection,
        Command::Projects(ProjectCommand::Show { key: "anything".into() }),
    )
    .await
    .expect_err("no shortname route");
    assert!(err.to_string().contains("not found"), "{err:#}");
    let seen = seen.lock().await;
    assert_eq!(
        seen.last().map(|(call, _)| call.as_str()),
        Some("DELETE authentication")
    );
}

#[tokio::test]
async fn failed_logout_keeps_command_success() {
    let (server, seen) = spawn_dsp_server().await;
    let mut connection = Connection::new(server).expect("connection");
    connection.set_token("session-token");
    run_session(
        &mut connection,
        Command::Projects(ProjectCommand::Show { key: "0001".into() }),
    )
    .await
    .expect("logout failure is only logged");
    assert_eq!(seen.lock().await.len(), 2);
}

#[test]
fn context_prefix_needs_an_iri() {
    let result = context(ContextCommand::Compact {
        iri: "http://example.org/onto#thing".into(),
        prefixes: vec!["ex".into()],
    });
    assert!(result.is_err());
}

#[test]
fn context_expands_known_prefixes() {
    context(ContextCommand::Expand {
        value: "rdfs:label".into(),
        prefixes: Vec::new(),
    })
    .expect("expand");
}
