use std::collections::{BTreeMap, BTreeSet};

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{json, Value};
use shared::{
    domain::{
        GroupIri, Language, ProjectIri, UserIri, PROJECT_ADMIN_GROUP, PROJECT_MEMBER_GROUP,
        SYSTEM_ADMIN_GROUP, SYSTEM_PROJECT,
    },
    protocol::{ProjectInfo, UserInfo},
};
use tracing::info;

use crate::{encode, parse_record, take_field, tracked::Tracked, DspError, Result, Transport};

const ROUTE: &str = "/admin/users";
const PROJECT_MEMBERSHIPS: &str = "project-memberships";
const PROJECT_ADMIN_MEMBERSHIPS: &str = "project-admin-memberships";
const GROUP_MEMBERSHIPS: &str = "group-memberships";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFields {
    pub username: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub lang: Option<Language>,
    pub status: bool,
    pub sysadmin: bool,
    pub in_groups: BTreeSet<GroupIri>,
    /// Project memberships; the flag marks project administrators.
    pub in_projects: BTreeMap<ProjectIri, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKey<'a> {
    Iri(&'a UserIri),
    Email(&'a str),
    Username(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Option<UserIri>,
    password: Option<String>,
    fields: Tracked<UserFields>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct BasicInfoPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    given_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<Language>,
}

impl BasicInfoPayload<'_> {
    fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
            && self.lang.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserPayload<'a> {
    username: &'a str,
    email: &'a str,
    given_name: &'a str,
    family_name: &'a str,
    password: &'a str,
    lang: Language,
    status: bool,
    system_admin: bool,
}

impl User {
    /// A user that is yet to be created: active and without system
    /// administration rights.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        password: impl Into<String>,
        lang: Language,
    ) -> Self {
        Self {
            id: None,
            password: Some(password.into()),
            fields: Tracked::new(UserFields {
                username: username.into(),
                email: email.into(),
                given_name: Some(given_name.into()),
                family_name: Some(family_name.into()),
                lang: Some(lang),
                status: true,
                sysadmin: false,
                in_groups: BTreeSet::new(),
                in_projects: BTreeMap::new(),
            }),
        }
    }

    /// Memberships are derived from `permissions.groupsPerProject`.
    pub fn from_info(info: UserInfo) -> Self {
        let mut sysadmin = false;
        let mut in_projects = BTreeMap::new();
        let mut in_groups = BTreeSet::new();
        for (project, groups) in &info.permissions.groups_per_project {
            if project == SYSTEM_PROJECT {
                sysadmin |= groups.iter().any(|group| group == SYSTEM_ADMIN_GROUP);
                continue;
            }
            for group in groups {
                match group.as_str() {
                    PROJECT_MEMBER_GROUP => {
                        in_projects
                            .entry(ProjectIri::new(project.as_str()))
                            .or_insert(false);
                    }
                    PROJECT_ADMIN_GROUP => {
                        in_projects.insert(ProjectIri::new(project.as_str()), true);
                    }
                    other => {
                        in_groups.insert(GroupIri::new(other));
                    }
                }
            }
        }
        Self {
            id: Some(info.id),
            password: None,
            fields: Tracked::from_server(UserFields {
                username: info.username,
                email: info.email,
                given_name: info.given_name,
                family_name: info.family_name,
                lang: info.lang,
                status: info.status,
                sysadmin,
                in_groups,
                in_projects,
            }),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(Self::from_info(parse_record(value)?))
    }

    pub fn id(&self) -> Option<&UserIri> {
        self.id.as_ref()
    }

    pub fn fields(&self) -> &UserFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut UserFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        (self.password.is_some() && self.id.is_some()) || self.fields.has_changes()
    }

    /// New password, sent with the next update.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    pub fn add_to_group(&mut self, group: GroupIri) -> Result<()> {
        if !self.fields.get_mut().in_groups.insert(group.clone()) {
            return Err(DspError::validation(format!("already member of group {group}")));
        }
        Ok(())
    }

    pub fn remove_from_group(&mut self, group: &GroupIri) -> Result<()> {
        if !self.fields.get_mut().in_groups.remove(group) {
            return Err(DspError::validation(format!("not a member of group {group}")));
        }
        Ok(())
    }

    pub fn add_to_project(&mut self, project: ProjectIri, admin: bool) -> Result<()> {
        let projects = &mut self.fields.get_mut().in_projects;
        if projects.contains_key(&project) {
            return Err(DspError::validation(format!("already member of project {project}")));
        }
        projects.insert(project, admin);
        Ok(())
    }

    pub fn remove_from_project(&mut self, project: &ProjectIri) -> Result<()> {
        match self.fields.get_mut().in_projects.remove(project) {
            Some(_) => Ok(()),
            None => Err(DspError::validation(format!("not a member of project {project}"))),
        }
    }

    pub fn make_project_admin(&mut self, project: &ProjectIri) -> Result<()> {
        self.set_project_admin(project, true)
    }

    pub fn unmake_project_admin(&mut self, project: &ProjectIri) -> Result<()> {
        self.set_project_admin(project, false)
    }

    fn set_project_admin(&mut self, project: &ProjectIri, admin: bool) -> Result<()> {
        match self.fields.get_mut().in_projects.get_mut(project) {
            Some(flag) => {
                *flag = admin;
                Ok(())
            }
            None => Err(DspError::validation(format!(
                "user must be member of project {project}"
            ))),
        }
    }

    fn require_id(&self) -> Result<&UserIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("user has no IRI; create or read it first"))
    }

    fn create_payload(&self) -> Result<Value> {
        let fields = self.fields.get();
        let payload = CreateUserPayload {
            username: required(Some(&fields.username), "username")?,
            email: required(Some(&fields.email), "email")?,
            given_name: required(fields.given_name.as_deref(), "givenName")?,
            family_name: required(fields.family_name.as_deref(), "familyName")?,
            password: required(self.password.as_deref(), "password")?,
            lang: fields
                .lang
                .ok_or_else(|| DspError::validation("\"lang\" is mandatory"))?,
            status: fields.status,
            system_admin: fields.sysadmin,
        };
        Ok(serde_json::to_value(payload)?)
    }

    pub async fn create(&self, transport: &dyn Transport) -> Result<User> {
        let payload = self.create_payload()?;
        let answer = transport.post(ROUTE, Some(&payload)).await?;
        let created = User::from_info(take_field(answer, "user")?);
        let id = created.require_id()?;
        let fields = self.fields.get();
        for (project, admin) in &fields.in_projects {
            post_membership(transport, id, PROJECT_MEMBERSHIPS, project.as_str()).await?;
            if *admin {
                post_membership(transport, id, PROJECT_ADMIN_MEMBERSHIPS, project.as_str()).await?;
            }
        }
        for group in &fields.in_groups {
            post_membership(transport, id, GROUP_MEMBERSHIPS, group.as_str()).await?;
        }
        info!(username = %fields.username, "user created");
        User::fetch(transport, UserKey::Iri(id)).await
    }

    pub async fn read(&self, transport: &dyn Transport) -> Result<User> {
        let fields = self.fields.get();
        let key = match &self.id {
            Some(id) => UserKey::Iri(id),
            None if !fields.email.is_empty() => UserKey::Email(&fields.email),
            None if !fields.username.is_empty() => UserKey::Username(&fields.username),
            None => {
                return Err(DspError::validation(
                    "reading a user needs its IRI, email or username",
                ))
            }
        };
        User::fetch(transport, key).await
    }

    pub async fn fetch(transport: &dyn Transport, key: UserKey<'_>) -> Result<User> {
        let path = match key {
            UserKey::Iri(iri) => format!("{ROUTE}/iri/{}", encode(iri.as_str())),
            UserKey::Email(email) => format!("{ROUTE}/email/{}", encode(email)),
            UserKey::Username(name) => format!("{ROUTE}/username/{}", encode(name)),
        };
        let answer = transport.get(&path).await?;
        Ok(User::from_info(take_field(answer, "user")?))
    }

    /// Sends every pending change and returns the user as stored afterwards.
    /// A password change needs the password of the requesting user.
    pub async fn update(
        &self,
        transport: &dyn Transport,
        requester_password: Option<&str>,
    ) -> Result<User> {
        let id = self.require_id()?;
        let base = format!("{ROUTE}/iri/{}", encode(id.as_str()));
        let tracked = &self.fields;
        let current = tracked.get();
        let original = tracked.original().cloned().unwrap_or_default();

        if self.password.is_some() && requester_password.is_none() {
            return Err(DspError::validation("requester's password is missing"));
        }

        let basic = BasicInfoPayload {
            username: tracked.changed(|f| &f.username).map(String::as_str),
            email: tracked.changed(|f| &f.email).map(String::as_str),
            given_name: tracked.changed(|f| &f.given_name).and_then(|v| v.as_deref()),
            family_name: tracked.changed(|f| &f.family_name).and_then(|v| v.as_deref()),
            lang: tracked.changed(|f| &f.lang).copied().flatten(),
        };
        if !basic.is_empty() {
            let body = serde_json::to_value(basic)?;
            transport
                .put(&format!("{base}/BasicUserInformation"), Some(&body), None)
                .await?;
        }
        if let Some(status) = tracked.changed(|f| &f.status) {
            let body = json!({ "status": status });
            transport.put(&format!("{base}/Status"), Some(&body), None).await?;
        }
        if let (Some(new_password), Some(requester)) = (&self.password, requester_password) {
            let body = json!({
                "requesterPassword": requester,
                "newPassword": new_password,
            });
            transport.put(&format!("{base}/Password"), Some(&body), None).await?;
        }
        if let Some(sysadmin) = tracked.changed(|f| &f.sysadmin) {
            let body = json!({ "systemAdmin": sysadmin });
            transport
                .put(&format!("{base}/SystemAdmin"), Some(&body), None)
                .await?;
        }

        for (project, admin) in &current.in_projects {
            match original.in_projects.get(project) {
                None => {
                    post_membership(transport, id, PROJECT_MEMBERSHIPS, project.as_str()).await?;
                    if *admin {
                        post_membership(transport, id, PROJECT_ADMIN_MEMBERSHIPS, project.as_str())
                            .await?;
                    }
                }
                Some(was_admin) if was_admin != admin => {
                    if *admin {
                        post_membership(transport, id, PROJECT_ADMIN_MEMBERSHIPS, project.as_str())
                            .await?;
                    } else {
                        delete_membership(transport, id, PROJECT_ADMIN_MEMBERSHIPS, project.as_str())
                            .await?;
                    }
                }
                Some(_) => {}
            }
        }
        for (project, was_admin) in &original.in_projects {
            if current.in_projects.contains_key(project) {
                continue;
            }
            if *was_admin {
                delete_membership(transport, id, PROJECT_ADMIN_MEMBERSHIPS, project.as_str())
                    .await?;
            }
            delete_membership(transport, id, PROJECT_MEMBERSHIPS, project.as_str()).await?;
        }
        for group in current.in_groups.difference(&original.in_groups) {
            post_membership(transport, id, GROUP_MEMBERSHIPS, group.as_str()).await?;
        }
        for group in original.in_groups.difference(&current.in_groups) {
            delete_membership(transport, id, GROUP_MEMBERSHIPS, group.as_str()).await?;
        }

        info!(username = %current.username, "user updated");
        User::fetch(transport, UserKey::Iri(id)).await
    }

    pub async fn delete(&self, transport: &dyn Transport) -> Result<User> {
        let id = self.require_id()?;
        let answer = transport
            .delete(&format!("{ROUTE}/iri/{}", encode(id.as_str())), &[])
            .await?;
        info!(username = %self.fields().username, "user deleted");
        Ok(User::from_info(take_field(answer, "user")?))
    }

    pub async fn get_all(transport: &dyn Transport) -> Result<Vec<User>> {
        let answer = transport.get(ROUTE).await?;
        let users: Vec<UserInfo> = take_field(answer, "users")?;
        Ok(users.into_iter().map(User::from_info).collect())
    }

    /// Users that are members of the project with `shortcode`, checked via
    /// each user's project memberships.
    pub async fn get_all_for_project(
        transport: &dyn Transport,
        shortcode: &str,
    ) -> Result<Vec<User>> {
        let project = ProjectIri::for_shortcode(shortcode);
        let users = User::get_all(transport).await?;
        let memberships = try_join_all(users.iter().map(|user| async move {
            let id = user.require_id()?;
            let answer = transport
                .get(&format!(
                    "{ROUTE}/iri/{}/{PROJECT_MEMBERSHIPS}",
                    encode(id.as_str())
                ))
                .await?;
            take_field::<Vec<ProjectInfo>>(answer, "projects")
        }))
        .await?;
        Ok(users
            .into_iter()
            .zip(memberships)
            .filter(|(_, projects)| projects.iter().any(|p| p.id == project))
            .map(|(user, _)| user)
            .collect())
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DspError::validation(format!("\"{name}\" is mandatory")))
}

async fn post_membership(
    transport: &dyn Transport,
    user: &UserIri,
    kind: &str,
    target: &str,
) -> Result<Value> {
    let path = format!("{ROUTE}/iri/{}/{kind}/{}", encode(user.as_str()), encode(target));
    transport.post(&path, None).await
}

async fn delete_membership(
    transport: &dyn Transport,
    user: &UserIri,
    kind: &str,
    target: &str,
) -> Result<Value> {
    let path = format!("{ROUTE}/iri/{}/{kind}/{}", encode(user.as_str()), encode(target));
    transport.delete(&path, &[]).await
}

#[cfg(test)]
#[path = "tests/user_tests.rs"]
mod tests;
