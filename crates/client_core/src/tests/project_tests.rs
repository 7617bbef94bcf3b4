use super::*;
use crate::test_support::FakeTransport;

fn anything_json() -> Value {
    json!({
        "id": "http://rdfh.ch/projects/0001",
        "shortcode": "0001",
        "shortname": "anything",
        "longname": "Anything Project",
        "description": [{"language": "en", "value": "Anything"}],
        "keywords": ["arbitrary", "things"],
        "ontologies": ["http://0.0.0.0:3333/ontology/0001/anything/v2"],
        "selfjoin": false,
        "status": true
    })
}

fn anything() -> Project {
    Project::from_json(anything_json()).expect("project")
}

#[test]
fn new_rejects_malformed_shortcode() {
    let err = Project::new("XYZ", "x", "x", LangString::plain("x")).expect_err("shortcode");
    assert!(matches!(err, DspError::Validation(_)));
}

#[tokio::test]
async fn create_posts_required_fields() {
    let transport = FakeTransport::new().answer(json!({ "project": anything_json() }));
    let mut project = Project::new(
        "0001",
        "anything",
        "Anything Project",
        LangString::new().with(Language::En, "Anything"),
    )
    .expect("new");
    project.add_keyword("things");

    let created = project.create(&transport).await.expect("create");
    assert_eq!(created.id().map(ProjectIri::as_str), Some("http://rdfh.ch/projects/0001"));

    let calls = transport.calls();
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].path, "/admin/projects");
    assert_eq!(
        calls[0].body,
        Some(json!({
            "shortcode": "0001",
            "shortname": "anything",
            "longname": "Anything Project",
            "description": [{"language": "en", "value": "Anything"}],
            "keywords": ["things"],
            "selfjoin": false,
            "status": true
        }))
    );
}

#[tokio::test]
async fn create_requires_description() {
    let transport = FakeTransport::new();
    let project = Project::new("0002", "p", "Project", LangString::new()).expect("new");
    let err = project.create(&transport).await.expect_err("no description");
    assert!(matches!(err, DspError::Validation(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn update_sends_only_changed_fields() {
    let transport = FakeTransport::new().answer(json!({ "project": anything_json() }));
    let mut project = anything();
    project.fields_mut().longname = Some("Renamed".into());
    project.remove_keyword("arbitrary").expect("keyword present");

    project
        .update(&transport)
        .await
        .expect("update")
        .expect("something changed");
    let calls = transport.calls();
    assert_eq!(calls[0].method, "PUT");
    assert_eq!(
        calls[0].path,
        "/admin/projects/iri/http%3A%2F%2Frdfh.ch%2Fprojects%2F0001"
    );
    assert_eq!(
        calls[0].body,
        Some(json!({ "longname": "Renamed", "keywords": ["things"] }))
    );
}

#[tokio::test]
async fn unchanged_project_is_not_sent() {
    let transport = FakeTransport::new();
    let project = anything();
    assert!(!project.has_changes());
    assert!(project.update(&transport).await.expect("update").is_none());
    assert!(transport.calls().is_empty());
}

#[test]
fn removing_absent_keyword_or_language_fails() {
    let mut project = anything();
    assert!(matches!(
        project.remove_keyword("missing"),
        Err(DspError::Validation(_))
    ));
    assert!(matches!(
        project.remove_description(Language::Fr),
        Err(DspError::Validation(_))
    ));
    project.add_description(Language::Fr, "N'importe quoi");
    project.remove_description(Language::Fr).expect("present");
}

#[tokio::test]
async fn read_prefers_iri_then_shortcode() {
    let transport = FakeTransport::new()
        .answer(json!({ "project": anything_json() }))
        .answer(json!({ "project": anything_json() }))
        .answer(json!({ "project": anything_json() }));
    anything().read(&transport).await.expect("by iri");
    Project::new("0001", "anything", "Anything", LangString::plain("x"))
        .expect("new")
        .read(&transport)
        .await
        .expect("by shortcode");
    Project::fetch(&transport, ProjectKey::Shortname("anything"))
        .await
        .expect("by shortname");

    let paths: Vec<String> = transport.calls().into_iter().map(|call| call.path).collect();
    assert_eq!(
        paths,
        vec![
            "/admin/projects/iri/http%3A%2F%2Frdfh.ch%2Fprojects%2F0001".to_string(),
            "/admin/projects/shortcode/0001".to_string(),
            "/admin/projects/shortname/anything".to_string(),
        ]
    );
}

#[tokio::test]
async fn get_all_needs_projects_member() {
    let transport = FakeTransport::new()
        .answer(json!({ "projects": [anything_json()] }))
        .answer(json!({ "other": [] }));
    let projects = Project::get_all(&transport).await.expect("all");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].fields().keywords.len(), 2);

    let err = Project::get_all(&transport).await.expect_err("missing");
    assert!(matches!(err, DspError::MissingField(ref field) if field == "projects"));
}

#[tokio::test]
async fn delete_returns_server_copy() {
    let transport = FakeTransport::new().answer(json!({ "project": anything_json() }));
    let deleted = anything().delete(&transport).await.expect("delete");
    assert_eq!(deleted.shortcode(), "0001");
    assert_eq!(transport.calls()[0].method, "DELETE");
}

#[tokio::test]
async fn default_permissions_target_project_members() {
    let transport = FakeTransport::new();
    anything()
        .set_default_permissions(&transport)
        .await
        .expect("permissions");
    let body = transport.calls()[0].body.clone().expect("body");
    assert_eq!(body["forGroup"], PROJECT_MEMBER_GROUP);
    assert_eq!(body["forProject"], "http://rdfh.ch/projects/0001");
}

#[test]
fn missing_shortname_is_reported_by_name() {
    let mut record = anything_json();
    record.as_object_mut().expect("object").remove("shortname");
    let err = Project::from_json(record).expect_err("no shortname");
    assert!(matches!(err, DspError::MissingField(ref field) if field == "shortname"));
}

#[test]
fn mistyped_member_stays_a_json_error() {
    let mut record = anything_json();
    record["selfjoin"] = json!("yes");
    let err = Project::from_json(record).expect_err("bad selfjoin");
    assert!(matches!(err, DspError::Json(_)));
}
