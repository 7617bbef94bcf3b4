use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{GroupIri, Language, ListNodeIri, OntologyIri, ProjectIri, UserIri},
    langstring::LangString,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// A project as returned by `/admin/projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: ProjectIri,
    pub shortcode: String,
    pub shortname: String,
    #[serde(default)]
    pub longname: Option<String>,
    #[serde(default)]
    pub description: LangString,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub ontologies: BTreeSet<OntologyIri>,
    pub selfjoin: bool,
    pub status: bool,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: ProjectIri,
}

/// A group as returned by `/admin/groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupIri,
    pub name: String,
    #[serde(default)]
    pub descriptions: LangString,
    pub project: ProjectRef,
    pub selfjoin: bool,
    pub status: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionData {
    #[serde(default)]
    pub groups_per_project: BTreeMap<String, Vec<String>>,
}

/// A user as returned by `/admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserIri,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub lang: Option<Language>,
    pub status: bool,
    #[serde(default)]
    pub permissions: PermissionData,
}

/// A list node (or list root) as returned by `/admin/lists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNodeInfo {
    pub id: ListNodeIri,
    #[serde(default)]
    pub project_iri: Option<ProjectIri>,
    #[serde(default)]
    pub labels: LangString,
    #[serde(default)]
    pub comments: LangString,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_node_iri: Option<ListNodeIri>,
    #[serde(default)]
    pub is_root_node: Option<bool>,
    #[serde(default)]
    pub has_root_node: Option<ListNodeIri>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub children: Vec<ListNodeInfo>,
}

/// Answer of `GET /admin/lists/<iri>`: root info plus the full child tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTree {
    pub listinfo: ListNodeInfo,
    #[serde(default)]
    pub children: Vec<ListNodeInfo>,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
