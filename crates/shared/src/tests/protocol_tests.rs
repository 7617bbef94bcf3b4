use super::*;
use serde_json::json;

#[test]
fn project_info_parses_admin_answer() {
    let project: ProjectInfo = serde_json::from_value(json!({
        "id": "http://rdfh.ch/projects/0001",
        "shortcode": "0001",
        "shortname": "anything",
        "longname": "Anything Project",
        "description": [{"language": "en", "value": "Anything"}],
        "keywords": ["things", "arbitrary"],
        "ontologies": ["http://0.0.0.0:3333/ontology/0001/anything/v2"],
        "selfjoin": false,
        "status": true,
        "logo": null
    }))
    .expect("project");
    assert_eq!(project.shortcode, "0001");
    assert_eq!(project.description.get_exact(Language::En), Some("Anything"));
    assert!(project.keywords.contains("things"));
    assert_eq!(project.logo, None);
}

#[test]
fn project_info_requires_shortcode() {
    let err = serde_json::from_value::<ProjectInfo>(json!({
        "id": "http://rdfh.ch/projects/0001",
        "shortname": "anything",
        "selfjoin": false,
        "status": true
    }))
    .expect_err("missing shortcode");
    assert!(err.to_string().contains("shortcode"));
}

#[test]
fn user_info_keeps_group_permissions() {
    let user: UserInfo = serde_json::from_value(json!({
        "id": "http://rdfh.ch/users/root",
        "username": "root",
        "email": "root@example.com",
        "givenName": "System",
        "familyName": "Administrator",
        "lang": "de",
        "status": true,
        "permissions": {
            "groupsPerProject": {
                "http://www.knora.org/ontology/knora-admin#SystemProject": [
                    "http://www.knora.org/ontology/knora-admin#SystemAdmin"
                ]
            }
        }
    }))
    .expect("user");
    assert_eq!(user.lang, Some(Language::De));
    assert_eq!(user.permissions.groups_per_project.len(), 1);
}

#[test]
fn user_info_requires_status() {
    let err = serde_json::from_value::<UserInfo>(json!({
        "id": "http://rdfh.ch/users/root",
        "username": "root",
        "email": "root@example.com"
    }))
    .expect_err("no status");
    assert!(err.to_string().contains("missing field `status`"));
}

#[test]
fn list_tree_parses_nested_children() {
    let tree: ListTree = serde_json::from_value(json!({
        "listinfo": {
            "id": "http://rdfh.ch/lists/0001/root",
            "projectIri": "http://rdfh.ch/projects/0001",
            "labels": [{"language": "en", "value": "Root"}],
            "isRootNode": true
        },
        "children": [{
            "id": "http://rdfh.ch/lists/0001/a",
            "name": "a",
            "labels": [{"language": "en", "value": "A"}],
            "children": [{"id": "http://rdfh.ch/lists/0001/a1", "name": "a1"}]
        }]
    }))
    .expect("tree");
    assert_eq!(tree.listinfo.is_root_node, Some(true));
    assert_eq!(tree.children[0].children[0].name.as_deref(), Some("a1"));
}
