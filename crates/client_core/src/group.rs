use serde::Serialize;
use serde_json::{json, Value};
use shared::{
    domain::{GroupIri, ProjectIri},
    protocol::GroupInfo,
    LangString,
};
use tracing::info;

use crate::{encode, parse_record, take_field, tracked::Tracked, DspError, Result, Transport};

const ROUTE: &str = "/admin/groups";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFields {
    pub name: String,
    pub descriptions: LangString,
    pub selfjoin: bool,
    pub status: bool,
}

/// A user group belonging to one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: Option<GroupIri>,
    project: ProjectIri,
    fields: Tracked<GroupFields>,
}

#[derive(Debug, Serialize)]
struct GroupPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    descriptions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a ProjectIri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selfjoin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<bool>,
}

impl Group {
    pub fn new(name: impl Into<String>, project: ProjectIri, selfjoin: bool, status: bool) -> Self {
        Self {
            id: None,
            project,
            fields: Tracked::new(GroupFields {
                name: name.into(),
                descriptions: LangString::new(),
                selfjoin,
                status,
            }),
        }
    }

    pub fn from_info(info: GroupInfo) -> Self {
        Self {
            id: Some(info.id),
            project: info.project.id,
            fields: Tracked::from_server(GroupFields {
                name: info.name,
                descriptions: info.descriptions,
                selfjoin: info.selfjoin,
                status: info.status,
            }),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(Self::from_info(parse_record(value)?))
    }

    pub fn id(&self) -> Option<&GroupIri> {
        self.id.as_ref()
    }

    pub fn project(&self) -> &ProjectIri {
        &self.project
    }

    pub fn fields(&self) -> &GroupFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut GroupFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    fn require_id(&self) -> Result<&GroupIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("group has no IRI; create or read it first"))
    }

    fn path(&self) -> Result<String> {
        Ok(format!("{ROUTE}/{}", encode(self.require_id()?.as_str())))
    }

    pub async fn create(&self, transport: &dyn Transport) -> Result<Group> {
        let fields = self.fields.get();
        if fields.name.is_empty() {
            return Err(DspError::validation("there must be a valid group name"));
        }
        let payload = GroupPayload {
            name: Some(&fields.name),
            descriptions: fields.descriptions.to_admin_json(),
            project: Some(&self.project),
            selfjoin: Some(fields.selfjoin),
            status: Some(fields.status),
        };
        let body = serde_json::to_value(payload)?;
        let answer = transport.post(ROUTE, Some(&body)).await?;
        let created = Group::from_info(take_field(answer, "group")?);
        info!(name = %created.fields().name, project = %created.project, "group created");
        Ok(created)
    }

    pub async fn read(&self, transport: &dyn Transport) -> Result<Group> {
        let answer = transport.get(&self.path()?).await?;
        Ok(Group::from_info(take_field(answer, "group")?))
    }

    /// Name, descriptions and selfjoin go in one request; a status change is
    /// sent separately to the `/status` route.
    pub async fn update(&self, transport: &dyn Transport) -> Result<Group> {
        let path = self.path()?;
        let tracked = &self.fields;
        let payload = GroupPayload {
            name: tracked.changed(|f| &f.name).map(String::as_str),
            descriptions: tracked
                .changed(|f| &f.descriptions)
                .and_then(LangString::to_admin_json),
            project: None,
            selfjoin: tracked.changed(|f| &f.selfjoin).copied(),
            status: None,
        };
        let mut updated = None;
        if payload.name.is_some() || payload.descriptions.is_some() || payload.selfjoin.is_some() {
            let body = serde_json::to_value(payload)?;
            let answer = transport.put(&path, Some(&body), None).await?;
            updated = Some(Group::from_info(take_field(answer, "group")?));
        }
        if let Some(status) = tracked.changed(|f| &f.status) {
            let body = json!({ "status": status });
            let answer = transport
                .put(&format!("{path}/status"), Some(&body), None)
                .await?;
            updated = Some(Group::from_info(take_field(answer, "group")?));
        }
        Ok(updated.unwrap_or_else(|| self.clone()))
    }

    pub async fn delete(&self, transport: &dyn Transport) -> Result<Group> {
        let answer = transport.delete(&self.path()?, &[]).await?;
        info!(name = %self.fields().name, "group deleted");
        Ok(Group::from_info(take_field(answer, "group")?))
    }

    pub async fn get_all(transport: &dyn Transport) -> Result<Vec<Group>> {
        let answer = transport.get(ROUTE).await?;
        let groups: Vec<GroupInfo> = take_field(answer, "groups")?;
        Ok(groups.into_iter().map(Group::from_info).collect())
    }

    pub async fn get_all_for_project(
        transport: &dyn Transport,
        shortcode: &str,
    ) -> Result<Vec<Group>> {
        let project = ProjectIri::for_shortcode(shortcode);
        Ok(Group::get_all(transport)
            .await?
            .into_iter()
            .filter(|group| group.project == project)
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/group_tests.rs"]
mod tests;
