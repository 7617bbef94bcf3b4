use std::{collections::HashMap, sync::Arc};

use super::*;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode as AxumStatus},
    routing::{get, post, put},
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, Default)]
struct Seen {
    authorization: Option<String>,
    content_type: Option<String>,
    query: HashMap<String, String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl ServerState {
    async fn record(&self, headers: &HeaderMap, query: HashMap<String, String>, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().await.push(Seen {
            authorization: header("authorization"),
            content_type: header("content-type"),
            query,
            body,
        });
    }
}

async fn handle_login(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (AxumStatus, Json<Value>) {
    state.record(&headers, HashMap::new(), Some(body.clone())).await;
    if body["password"] == "test" {
        (AxumStatus::OK, Json(json!({ "token": "session-token" })))
    } else {
        (
            AxumStatus::UNAUTHORIZED,
            Json(json!({ "error": "wrong credentials" })),
        )
    }
}

async fn handle_logout(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record(&headers, HashMap::new(), None).await;
    Json(json!({ "status": 0, "message": "Logout OK" }))
}

async fn handle_projects(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.record(&headers, HashMap::new(), None).await;
    Json(json!({ "projects": [] }))
}

async fn handle_soft_error(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.record(&headers, HashMap::new(), None).await;
    Json(json!({ "error": "dsp.errors.NotFoundException: nothing here" }))
}

async fn handle_unavailable() -> (AxumStatus, &'static str) {
    (AxumStatus::SERVICE_UNAVAILABLE, "try again later")
}

async fn handle_metadata(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&headers, HashMap::new(), Some(body)).await;
    Json(json!({ "@id": "http://0.0.0.0:3333/ontology/0001/anything/v2" }))
}

async fn handle_delete_ontology(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.record(&headers, query, None).await;
    Json(json!({ "knora-api:result": "Ontology deleted" }))
}

async fn handle_reset(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&headers, query, Some(body)).await;
    Json(json!({ "message": "success" }))
}

async fn spawn_dsp_server() -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let state = ServerState::default();
    let app = Router::new()
        .route("/v2/authentication", post(handle_login).delete(handle_logout))
        .route("/admin/projects", get(handle_projects))
        .route("/admin/broken", get(handle_soft_error))
        .route("/admin/unavailable", get(handle_unavailable))
        .route("/v2/ontologies/metadata", put(handle_metadata))
        .route("/admin/store/ResetTriplestoreContent", post(handle_reset))
        .route(
            "/v2/ontologies/:iri",
            axum::routing::delete(handle_delete_ontology),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn login_stores_token_and_sends_it_as_bearer() {
    let (server, state) = spawn_dsp_server().await;
    let mut conn = Connection::new(&server).expect("connection");
    conn.login("root@example.com", "test").await.expect("login");
    assert_eq!(conn.token(), Some("session-token"));

    let projects = conn.get("admin/projects").await.expect("projects");
    assert_eq!(projects, json!({ "projects": [] }));

    let seen = state.seen.lock().await;
    assert_eq!(seen[0].body.as_ref().expect("login body")["email"], "root@example.com");
    assert_eq!(
        seen[0].content_type.as_deref(),
        Some("application/json; charset=UTF-8")
    );
    assert_eq!(seen[0].authorization, None);
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer session-token"));
}

#[tokio::test]
async fn failed_login_is_an_api_error() {
    let (server, _state) = spawn_dsp_server().await;
    let mut conn = Connection::new(&server).expect("connection");
    let err = conn.login("root@example.com", "wrong").await.expect_err("login fails");
    match err {
        DspError::Api(api) => {
            assert_eq!(api.status, 401);
            assert_eq!(api.code, ErrorCode::Unauthorized);
            assert_eq!(api.message, "wrong credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(conn.token(), None);
}

#[tokio::test]
async fn error_member_in_ok_answer_is_an_api_error() {
    let (server, _state) = spawn_dsp_server().await;
    let conn = Connection::new(&server).expect("connection");
    let err = conn.get("/admin/broken").await.expect_err("soft error");
    assert!(matches!(err, DspError::Api(ref api) if api.status == 200));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unavailable_server_is_transient() {
    let (server, _state) = spawn_dsp_server().await;
    let conn = Connection::new(&server).expect("connection");
    let err = conn.get("/admin/unavailable").await.expect_err("503");
    assert_eq!(err.api_code(), Some(ErrorCode::ServiceUnavailable));
    assert!(err.is_transient());
}

#[tokio::test]
async fn put_honours_content_type_override() {
    let (server, state) = spawn_dsp_server().await;
    let mut conn = Connection::new(&server).expect("connection");
    conn.set_token("abc");
    conn.put(
        "/v2/ontologies/metadata",
        Some(&json!({ "rdfs:label": "x" })),
        Some(JSONLD_CONTENT_TYPE),
    )
    .await
    .expect("put");
    let seen = state.seen.lock().await;
    assert_eq!(seen[0].content_type.as_deref(), Some("application/ld+json"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn delete_sends_query_parameters() {
    let (server, state) = spawn_dsp_server().await;
    let conn = Connection::new(&server).expect("connection");
    let iri = encode("http://0.0.0.0:3333/ontology/0001/anything/v2");
    let answer = conn
        .delete(
            &format!("/v2/ontologies/{iri}"),
            &[("lastModificationDate", "2021-03-12T09:47:04Z".to_string())],
        )
        .await
        .expect("delete");
    assert_eq!(answer["knora-api:result"], "Ontology deleted");
    let seen = state.seen.lock().await;
    assert_eq!(
        seen[0].query.get("lastModificationDate").map(String::as_str),
        Some("2021-03-12T09:47:04Z")
    );
}

#[tokio::test]
async fn logout_clears_token() {
    let (server, state) = spawn_dsp_server().await;
    let mut conn = Connection::new(&server).expect("connection");
    conn.login("root@example.com", "test").await.expect("login");
    conn.logout().await.expect("logout");
    assert_eq!(conn.token(), None);
    conn.logout().await.expect("second logout is a no-op");
    assert_eq!(state.seen.lock().await.len(), 2);
}

#[test]
fn invalid_server_url_is_rejected() {
    assert!(matches!(
        Connection::new("not a url"),
        Err(DspError::Url(_))
    ));
}

#[test]
fn iris_are_encoded_as_single_segment() {
    assert_eq!(
        encode("http://rdfh.ch/projects/0001"),
        "http%3A%2F%2Frdfh.ch%2Fprojects%2F0001"
    );
}

#[test]
fn take_field_reports_missing_member() {
    let err = take_field::<Vec<Value>>(json!({ "other": [] }), "projects").expect_err("missing");
    assert!(matches!(err, DspError::MissingField(ref field) if field == "projects"));
}

#[test]
fn parse_record_names_the_absent_member() {
    let err = parse_record::<LoginResponse>(json!({})).expect_err("no token");
    assert!(matches!(err, DspError::MissingField(ref field) if field == "token"));
    let err = parse_record::<LoginResponse>(json!({ "token": 7 })).expect_err("bad token");
    assert!(matches!(err, DspError::Json(_)));
}

#[tokio::test]
async fn reset_posts_default_graphs() {
    let (server, state) = spawn_dsp_server().await;
    let mut conn = Connection::new(&server).expect("connection");
    conn.login("root@example.com", "test").await.expect("login");
    let answer = conn.reset_triplestore_content().await.expect("reset");
    assert_eq!(answer["message"], "success");

    let seen = state.seen.lock().await;
    let reset = &seen[1];
    assert_eq!(reset.authorization.as_deref(), Some("Bearer session-token"));
    assert_eq!(
        reset.query.get("prependdefaults").map(String::as_str),
        Some("false")
    );
    let graphs = reset
        .body
        .as_ref()
        .and_then(Value::as_array)
        .expect("graph list");
    assert_eq!(graphs.len(), 8);
    assert_eq!(
        graphs[0],
        json!({
            "path": "./knora-ontologies/knora-admin.ttl",
            "name": "http://www.knora.org/ontology/knora-admin"
        })
    );
    assert!(graphs
        .iter()
        .all(|graph| graph["path"].is_string() && graph["name"].is_string()));
}
