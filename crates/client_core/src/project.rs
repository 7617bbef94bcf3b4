use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};
use shared::{
    domain::{is_shortcode, Language, OntologyIri, ProjectIri, PROJECT_MEMBER_GROUP},
    protocol::ProjectInfo,
    LangString,
};
use tracing::info;

use crate::{encode, parse_record, take_field, tracked::Tracked, DspError, Result, Transport};

const ROUTE: &str = "/admin/projects";

/// Editable part of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFields {
    pub shortname: String,
    pub longname: Option<String>,
    pub description: LangString,
    pub keywords: BTreeSet<String>,
    pub selfjoin: bool,
    pub status: bool,
    pub logo: Option<String>,
}

/// How to look a project up on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKey<'a> {
    Iri(&'a ProjectIri),
    Shortcode(&'a str),
    Shortname(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: Option<ProjectIri>,
    shortcode: String,
    ontologies: BTreeSet<OntologyIri>,
    fields: Tracked<ProjectFields>,
}

#[derive(Debug, Default, Serialize)]
struct ProjectPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    shortcode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortname: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longname: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<&'a BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selfjoin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<bool>,
}

impl ProjectPayload<'_> {
    fn is_empty(&self) -> bool {
        self.shortname.is_none()
            && self.longname.is_none()
            && self.description.is_none()
            && self.keywords.is_none()
            && self.selfjoin.is_none()
            && self.status.is_none()
    }
}

impl Project {
    /// A project that is yet to be created. New projects are active and
    /// closed for self-join.
    pub fn new(
        shortcode: &str,
        shortname: impl Into<String>,
        longname: impl Into<String>,
        description: LangString,
    ) -> Result<Self> {
        if !is_shortcode(shortcode) {
            return Err(DspError::validation(format!(
                "project shortcode \"{shortcode}\" must be four hexadecimal digits"
            )));
        }
        Ok(Self {
            id: None,
            shortcode: shortcode.to_ascii_uppercase(),
            ontologies: BTreeSet::new(),
            fields: Tracked::new(ProjectFields {
                shortname: shortname.into(),
                longname: Some(longname.into()),
                description,
                keywords: BTreeSet::new(),
                selfjoin: false,
                status: true,
                logo: None,
            }),
        })
    }

    pub fn from_info(info: ProjectInfo) -> Self {
        Self {
            id: Some(info.id),
            shortcode: info.shortcode,
            ontologies: info.ontologies,
            fields: Tracked::from_server(ProjectFields {
                shortname: info.shortname,
                longname: info.longname,
                description: info.description,
                keywords: info.keywords,
                selfjoin: info.selfjoin,
                status: info.status,
                logo: info.logo,
            }),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let info: ProjectInfo = parse_record(value)?;
        Ok(Self::from_info(info))
    }

    pub fn id(&self) -> Option<&ProjectIri> {
        self.id.as_ref()
    }

    pub fn shortcode(&self) -> &str {
        &self.shortcode
    }

    pub fn ontologies(&self) -> &BTreeSet<OntologyIri> {
        &self.ontologies
    }

    pub fn fields(&self) -> &ProjectFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut ProjectFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        self.fields.get_mut().keywords.insert(keyword.into());
    }

    pub fn remove_keyword(&mut self, keyword: &str) -> Result<()> {
        if !self.fields.get_mut().keywords.remove(keyword) {
            return Err(DspError::validation(format!(
                "keyword \"{keyword}\" is not set on project {}",
                self.shortcode
            )));
        }
        Ok(())
    }

    pub fn add_description(&mut self, lang: Language, text: impl Into<String>) {
        self.fields.get_mut().description.set(lang, text);
    }

    pub fn remove_description(&mut self, lang: Language) -> Result<()> {
        match self.fields.get_mut().description.remove(lang) {
            Some(_) => Ok(()),
            None => Err(DspError::validation(format!(
                "project {} has no description in \"{lang}\"",
                self.shortcode
            ))),
        }
    }

    fn require_id(&self) -> Result<&ProjectIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("project has no IRI; create or read it first"))
    }

    fn create_payload(&self) -> Result<Value> {
        let fields = self.fields.get();
        let longname = fields
            .longname
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DspError::validation("there must be a valid project longname"))?;
        if fields.shortname.is_empty() {
            return Err(DspError::validation("there must be a valid project shortname"));
        }
        let description = fields
            .description
            .to_admin_json()
            .ok_or_else(|| DspError::validation("there must be a valid project description"))?;
        let payload = ProjectPayload {
            shortcode: Some(&self.shortcode),
            shortname: Some(&fields.shortname),
            longname: Some(longname),
            description: Some(description),
            keywords: Some(&fields.keywords).filter(|keywords| !keywords.is_empty()),
            selfjoin: Some(fields.selfjoin),
            status: Some(fields.status),
        };
        Ok(serde_json::to_value(payload)?)
    }

    fn update_payload(&self) -> ProjectPayload<'_> {
        let tracked = &self.fields;
        ProjectPayload {
            shortcode: None,
            shortname: tracked.changed(|f| &f.shortname).map(String::as_str),
            longname: tracked.changed(|f| &f.longname).and_then(|name| name.as_deref()),
            description: tracked
                .changed(|f| &f.description)
                .and_then(LangString::to_admin_json),
            keywords: tracked
                .changed(|f| &f.keywords)
                .filter(|keywords| !keywords.is_empty()),
            selfjoin: tracked.changed(|f| &f.selfjoin).copied(),
            status: tracked.changed(|f| &f.status).copied(),
        }
    }

    pub async fn create(&self, transport: &dyn Transport) -> Result<Project> {
        let payload = self.create_payload()?;
        let answer = transport.post(ROUTE, Some(&payload)).await?;
        let created = Project::from_info(take_field(answer, "project")?);
        info!(shortcode = %created.shortcode, "project created");
        Ok(created)
    }

    pub async fn read(&self, transport: &dyn Transport) -> Result<Project> {
        let key = match &self.id {
            Some(id) => ProjectKey::Iri(id),
            None => ProjectKey::Shortcode(&self.shortcode),
        };
        Project::fetch(transport, key).await
    }

    pub async fn fetch(transport: &dyn Transport, key: ProjectKey<'_>) -> Result<Project> {
        let path = match key {
            ProjectKey::Iri(iri) => format!("{ROUTE}/iri/{}", encode(iri.as_str())),
            ProjectKey::Shortcode(code) => format!("{ROUTE}/shortcode/{}", encode(code)),
            ProjectKey::Shortname(name) => format!("{ROUTE}/shortname/{}", encode(name)),
        };
        let answer = transport.get(&path).await?;
        Ok(Project::from_info(take_field(answer, "project")?))
    }

    /// Sends the modified fields. Returns `None` when nothing changed.
    pub async fn update(&self, transport: &dyn Transport) -> Result<Option<Project>> {
        let payload = self.update_payload();
        if payload.is_empty() {
            return Ok(None);
        }
        let id = self.require_id()?;
        let body = serde_json::to_value(payload)?;
        let answer = transport
            .put(&format!("{ROUTE}/iri/{}", encode(id.as_str())), Some(&body), None)
            .await?;
        let updated = Project::from_info(take_field(answer, "project")?);
        info!(shortcode = %updated.shortcode, "project updated");
        Ok(Some(updated))
    }

    pub async fn delete(&self, transport: &dyn Transport) -> Result<Project> {
        let id = self.require_id()?;
        let answer = transport
            .delete(&format!("{ROUTE}/iri/{}", encode(id.as_str())), &[])
            .await?;
        info!(shortcode = %self.shortcode, "project deleted");
        Ok(Project::from_info(take_field(answer, "project")?))
    }

    /// Lets project members create resources of every class.
    pub async fn set_default_permissions(&self, transport: &dyn Transport) -> Result<Value> {
        let id = self.require_id()?;
        let body = json!({
            "forGroup": PROJECT_MEMBER_GROUP,
            "forProject": id,
            "hasPermissions": [{
                "additionalInformation": null,
                "name": "ProjectResourceCreateAllPermission",
                "permissionCode": null
            }]
        });
        transport.post("/admin/permissions/ap", Some(&body)).await
    }

    pub async fn get_all(transport: &dyn Transport) -> Result<Vec<Project>> {
        let answer = transport.get(ROUTE).await?;
        let projects: Vec<ProjectInfo> = take_field(answer, "projects")?;
        Ok(projects.into_iter().map(Project::from_info).collect())
    }
}

#[cfg(test)]
#[path = "tests/project_tests.rs"]
mod tests;
