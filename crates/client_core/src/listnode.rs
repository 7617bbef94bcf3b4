use futures::future::BoxFuture;
use serde_json::{Map, Value};
use shared::{
    domain::{ListNodeIri, ProjectIri},
    protocol::{ListNodeInfo, ListTree},
    LangString,
};
use tracing::info;

use crate::{encode, parse_record, take_field, tracked::Tracked, DspError, Result, Transport};

const ROUTE: &str = "/admin/lists";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListNodeFields {
    pub labels: LangString,
    pub comments: LangString,
    pub name: Option<String>,
}

/// A node of a controlled vocabulary. Root nodes stand for the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListNode {
    id: Option<ListNodeIri>,
    project: Option<ProjectIri>,
    parent: Option<ListNodeIri>,
    is_root_node: bool,
    root_node: Option<ListNodeIri>,
    position: Option<i64>,
    children: Vec<ListNode>,
    fields: Tracked<ListNodeFields>,
}

impl ListNode {
    /// A node that is yet to be created. Without a parent it becomes the root
    /// of a new list.
    pub fn new(project: ProjectIri, labels: LangString, name: Option<String>) -> Self {
        Self {
            id: None,
            project: Some(project),
            parent: None,
            is_root_node: false,
            root_node: None,
            position: None,
            children: Vec::new(),
            fields: Tracked::new(ListNodeFields {
                labels,
                comments: LangString::new(),
                name,
            }),
        }
    }

    pub fn with_parent(mut self, parent: ListNodeIri) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_comments(mut self, comments: LangString) -> Self {
        self.fields.get_mut().comments = comments;
        self
    }

    /// Adds a child that `create_tree` creates below this node.
    pub fn add_child(&mut self, child: ListNode) {
        self.children.push(child);
    }

    /// Children that are not listed with their parent or project inherit them.
    pub fn from_info(
        info: ListNodeInfo,
        parent: Option<&ListNodeIri>,
        project: Option<&ProjectIri>,
    ) -> Self {
        let project = info.project_iri.or_else(|| project.cloned());
        let parent = info.parent_node_iri.or_else(|| parent.cloned());
        let name = info.name.or_else(|| {
            info.id
                .as_str()
                .rsplit('/')
                .next()
                .map(str::to_string)
        });
        let children = info
            .children
            .into_iter()
            .map(|child| ListNode::from_info(child, Some(&info.id), project.as_ref()))
            .collect();
        Self {
            id: Some(info.id),
            project,
            parent,
            is_root_node: info.is_root_node.unwrap_or(false),
            root_node: info.has_root_node,
            position: info.position,
            children,
            fields: Tracked::from_server(ListNodeFields {
                labels: info.labels,
                comments: info.comments,
                name,
            }),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(Self::from_info(parse_record(value)?, None, None))
    }

    pub fn id(&self) -> Option<&ListNodeIri> {
        self.id.as_ref()
    }

    pub fn project(&self) -> Option<&ProjectIri> {
        self.project.as_ref()
    }

    pub fn parent(&self) -> Option<&ListNodeIri> {
        self.parent.as_ref()
    }

    pub fn is_root_node(&self) -> bool {
        self.is_root_node
    }

    pub fn root_node(&self) -> Option<&ListNodeIri> {
        self.root_node.as_ref()
    }

    pub fn position(&self) -> Option<i64> {
        self.position
    }

    pub fn children(&self) -> &[ListNode] {
        &self.children
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get().name.as_deref()
    }

    pub fn fields(&self) -> &ListNodeFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut ListNodeFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    fn require_id(&self) -> Result<&ListNodeIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("list node has no IRI; create or read it first"))
    }

    fn require_project(&self) -> Result<&ProjectIri> {
        self.project
            .as_ref()
            .ok_or_else(|| DspError::validation("there must be a project IRI for the list node"))
    }

    fn create_payload(&self) -> Result<Value> {
        let fields = self.fields.get();
        let labels = label_json(&fields.labels)
            .ok_or_else(|| DspError::validation("there must be a valid list node label"))?;
        let mut payload = Map::new();
        payload.insert("projectIri".into(), Value::String(self.require_project()?.to_string()));
        payload.insert("labels".into(), labels);
        payload.insert(
            "comments".into(),
            fields
                .comments
                .to_admin_json()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        );
        if let Some(name) = &fields.name {
            payload.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(parent) = &self.parent {
            payload.insert("parentNodeIri".into(), Value::String(parent.to_string()));
        }
        Ok(Value::Object(payload))
    }

    pub async fn create(&self, transport: &dyn Transport) -> Result<ListNode> {
        let payload = self.create_payload()?;
        let created = match &self.parent {
            Some(parent) => {
                let answer = transport
                    .post(&format!("{ROUTE}/{}", encode(parent.as_str())), Some(&payload))
                    .await?;
                ListNode::from_info(take_field(answer, "nodeinfo")?, Some(parent), None)
            }
            None => {
                let answer = transport.post(ROUTE, Some(&payload)).await?;
                let list: Value = take_field(answer, "list")?;
                ListNode::from_info(take_field(list, "listinfo")?, None, None)
            }
        };
        info!(name = ?created.name(), "list node created");
        Ok(created)
    }

    /// Creates this node and, depth first, every pending child below it.
    pub fn create_tree<'a>(&'a self, transport: &'a dyn Transport) -> BoxFuture<'a, Result<ListNode>> {
        Box::pin(async move {
            let mut created = self.create(transport).await?;
            let parent = created.require_id()?.clone();
            for child in &self.children {
                let mut child = child.clone();
                child.parent = Some(parent.clone());
                if child.project.is_none() {
                    child.project = created.project.clone();
                }
                let node = child.create_tree(transport).await?;
                created.children.push(node);
            }
            Ok(created)
        })
    }

    pub async fn read(&self, transport: &dyn Transport) -> Result<ListNode> {
        let id = self.require_id()?;
        let mut answer = transport
            .get(&format!("{ROUTE}/nodes/{}", encode(id.as_str())))
            .await?;
        let info = match answer.get_mut("nodeinfo") {
            Some(info) => info.take(),
            None => take_field::<Value>(answer, "listinfo")?,
        };
        Ok(ListNode::from_info(
            parse_record(info)?,
            self.parent.as_ref(),
            self.project.as_ref(),
        ))
    }

    /// Sends changed labels, comments and name. Returns `None` when nothing
    /// changed.
    pub async fn update(&self, transport: &dyn Transport) -> Result<Option<ListNode>> {
        let tracked = &self.fields;
        let labels = tracked.changed(|f| &f.labels).and_then(label_json);
        let comments = tracked
            .changed(|f| &f.comments)
            .and_then(LangString::to_admin_json);
        let name = tracked.changed(|f| &f.name).and_then(|name| name.clone());
        if labels.is_none() && comments.is_none() && name.is_none() {
            return Ok(None);
        }
        let id = self.require_id()?;
        let mut payload = Map::new();
        payload.insert("listIri".into(), Value::String(id.to_string()));
        payload.insert("projectIri".into(), Value::String(self.require_project()?.to_string()));
        if let Some(labels) = labels {
            payload.insert("labels".into(), labels);
        }
        if let Some(comments) = comments {
            payload.insert("comments".into(), comments);
        }
        if let Some(name) = name {
            payload.insert("name".into(), Value::String(name));
        }
        let mut answer = transport
            .put(
                &format!("{ROUTE}/{}", encode(id.as_str())),
                Some(&Value::Object(payload)),
                None,
            )
            .await?;
        let info = match answer.get_mut("listinfo") {
            Some(info) => info.take(),
            None => take_field::<Value>(answer, "nodeinfo")?,
        };
        Ok(Some(ListNode::from_info(
            parse_record(info)?,
            self.parent.as_ref(),
            self.project.as_ref(),
        )))
    }

    pub async fn delete(&self, _transport: &dyn Transport) -> Result<()> {
        Err(DspError::Unsupported(
            "deleting list nodes is not implemented by the DSP backend".into(),
        ))
    }

    /// The complete list this root node stands for, children included.
    pub async fn get_all_nodes(&self, transport: &dyn Transport) -> Result<ListNode> {
        ListNode::fetch_list(transport, self.require_id()?).await
    }

    /// Reads a whole list by the IRI of its root node.
    pub async fn fetch_list(transport: &dyn Transport, id: &ListNodeIri) -> Result<ListNode> {
        let answer = transport
            .get(&format!("{ROUTE}/{}", encode(id.as_str())))
            .await?;
        let tree: ListTree = take_field(answer, "list")?;
        let mut root = ListNode::from_info(tree.listinfo, None, None);
        let root_id = root.id.clone();
        let project = root.project.clone();
        root.children = tree
            .children
            .into_iter()
            .map(|child| ListNode::from_info(child, root_id.as_ref(), project.as_ref()))
            .collect();
        Ok(root)
    }

    pub async fn get_all_lists(
        transport: &dyn Transport,
        project: Option<&ProjectIri>,
    ) -> Result<Vec<ListNode>> {
        let path = match project {
            Some(project) => format!("{ROUTE}?projectIri={}", encode(project.as_str())),
            None => ROUTE.to_string(),
        };
        let answer = transport.get(&path).await?;
        let lists: Vec<ListNodeInfo> = take_field(answer, "lists")?;
        Ok(lists
            .into_iter()
            .map(|info| ListNode::from_info(info, None, None))
            .collect())
    }
}

/// Label JSON with double quotes turned into single quotes; the list API
/// rejects escaped double quotes in labels.
fn label_json(labels: &LangString) -> Option<Value> {
    labels.map_values(|text| text.replace('"', "'")).to_admin_json()
}

#[cfg(test)]
#[path = "tests/listnode_tests.rs"]
mod tests;
