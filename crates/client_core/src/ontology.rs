use serde_json::{json, Map, Value};
use shared::{
    context::{is_iri, KNORA_API, OWL, RDFS},
    domain::{is_shortcode, LastModificationDate, OntologyIri, ProjectIri},
    Context,
};
use tracing::{debug, info};

use crate::{
    encode, property_class::PropertyClass, resource_class::ResourceClass, tracked::Tracked,
    DspError, Result, Transport, JSONLD_CONTENT_TYPE,
};

const ROUTE: &str = "/v2/ontologies";
const ALL_LANGUAGES: &str = "?allLanguages=true";
const LINK_VALUE: &str = "knora-api:LinkValue";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OntologyFields {
    pub label: String,
    pub comment: Option<String>,
}

/// A project ontology with the resource and property classes it defines.
///
/// Every change to an ontology or one of its entities needs the last
/// modification date the server handed out with the previous change. The
/// aggregate helpers below thread that date through the entity calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ontology {
    id: Option<OntologyIri>,
    project: ProjectIri,
    name: String,
    last_modification_date: Option<LastModificationDate>,
    resource_classes: Vec<ResourceClass>,
    property_classes: Vec<PropertyClass>,
    context: Context,
    fields: Tracked<OntologyFields>,
}

impl Ontology {
    pub fn new(project: ProjectIri, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: None,
            project,
            name: name.into(),
            last_modification_date: None,
            resource_classes: Vec::new(),
            property_classes: Vec::new(),
            context: Context::default(),
            fields: Tracked::new(OntologyFields {
                label: label.into(),
                comment: None,
            }),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.fields.get_mut().comment = Some(comment.into());
        self
    }

    /// Parses a single ontology, including the entities of its `@graph`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let id = value
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| DspError::missing("@id"))?;
        let mut context = Context::from_json(value.get("@context").unwrap_or(&Value::Null));
        let id = OntologyIri::new(id);
        let name = id
            .ontology_name()
            .ok_or_else(|| DspError::validation(format!("cannot derive ontology name from {id}")))?
            .to_string();
        context.add_prefix(&name, Some(&format!("{id}#")))?;

        let mut ontology = Self::from_metadata_node(value, id, name, context)?;
        let Some(graph) = value.get("@graph").and_then(Value::as_array) else {
            return Ok(ontology);
        };
        let is_resource_class = ontology.context.term(KNORA_API, "isResourceClass")?;
        let is_resource_property = ontology.context.term(KNORA_API, "isResourceProperty")?;
        let object_type = ontology.context.term(KNORA_API, "objectType")?;
        for node in graph {
            if node.get(&is_resource_class).is_some() {
                let class = ResourceClass::from_json(ontology.context.clone(), node)?;
                ontology.resource_classes.push(class);
            } else if node.get(&is_resource_property).is_some() {
                let object = node
                    .get(&object_type)
                    .and_then(|object| object.get("@id"))
                    .and_then(Value::as_str);
                if object == Some(LINK_VALUE) {
                    continue;
                }
                let property = PropertyClass::from_json(ontology.context.clone(), node)?;
                ontology.property_classes.push(property);
            }
        }
        debug!(
            ontology = %ontology.name,
            resource_classes = ontology.resource_classes.len(),
            property_classes = ontology.property_classes.len(),
            "ontology parsed"
        );
        Ok(ontology)
    }

    /// Parses a metadata answer: either one ontology or a `@graph` of them.
    /// Nodes that are not an `owl:Ontology` are skipped.
    pub fn list_from_json(value: &Value) -> Result<Vec<Self>> {
        let mut context = Context::from_json(value.get("@context").unwrap_or(&Value::Null));
        let ontology_type = context.term(OWL, "Ontology")?;
        let nodes: Vec<&Value> = match value.get("@graph").and_then(Value::as_array) {
            Some(graph) => graph.iter().collect(),
            None => vec![value],
        };
        let mut ontologies = Vec::new();
        for node in nodes {
            if node.get("@type").and_then(Value::as_str) != Some(ontology_type.as_str()) {
                continue;
            }
            let id = node
                .get("@id")
                .and_then(Value::as_str)
                .map(OntologyIri::new)
                .ok_or_else(|| DspError::missing("@id"))?;
            let name = id
                .ontology_name()
                .ok_or_else(|| DspError::validation(format!("cannot derive ontology name from {id}")))?
                .to_string();
            let mut own_context = context.clone();
            own_context.add_prefix(&name, Some(&format!("{id}#")))?;
            ontologies.push(Self::from_metadata_node(node, id, name, own_context)?);
        }
        Ok(ontologies)
    }

    fn from_metadata_node(
        node: &Value,
        id: OntologyIri,
        name: String,
        mut context: Context,
    ) -> Result<Self> {
        let label_key = context.term(RDFS, "label")?;
        let comment_key = context.term(RDFS, "comment")?;
        let project_key = context.term(KNORA_API, "attachedToProject")?;
        let date_key = context.term(KNORA_API, "lastModificationDate")?;

        let label = node
            .get(&label_key)
            .and_then(Value::as_str)
            .ok_or_else(|| DspError::missing(label_key.as_str()))?
            .to_string();
        let comment = node.get(&comment_key).and_then(Value::as_str).map(str::to_string);
        let project = node
            .get(&project_key)
            .and_then(|project| project.get("@id"))
            .and_then(Value::as_str)
            .map(ProjectIri::new)
            .ok_or_else(|| DspError::validation(format!("ontology {id} is not attached to a project")))?;
        let last_modification_date = node
            .get(&date_key)
            .map(LastModificationDate::from_json)
            .transpose()?;
        Ok(Self {
            id: Some(id),
            project,
            name,
            last_modification_date,
            resource_classes: Vec::new(),
            property_classes: Vec::new(),
            context,
            fields: Tracked::from_server(OntologyFields { label, comment }),
        })
    }

    pub fn id(&self) -> Option<&OntologyIri> {
        self.id.as_ref()
    }

    pub fn project(&self) -> &ProjectIri {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_modification_date(&self) -> Option<&LastModificationDate> {
        self.last_modification_date.as_ref()
    }

    pub fn set_last_modification_date(&mut self, date: LastModificationDate) {
        self.last_modification_date = Some(date);
    }

    pub fn resource_classes(&self) -> &[ResourceClass] {
        &self.resource_classes
    }

    pub fn property_classes(&self) -> &[PropertyClass] {
        &self.property_classes
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn fields(&self) -> &OntologyFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut OntologyFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    fn require_id(&self) -> Result<&OntologyIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("ontology has no IRI; create or read it first"))
    }

    fn require_date(&self) -> Result<LastModificationDate> {
        self.last_modification_date
            .ok_or_else(|| DspError::validation("ontology has no last modification date"))
    }

    pub async fn create(&self, transport: &dyn Transport) -> Result<Ontology> {
        let fields = self.fields.get();
        if self.name.is_empty() {
            return Err(DspError::validation("there must be a valid ontology name"));
        }
        if fields.label.is_empty() {
            return Err(DspError::validation("there must be a valid ontology label"));
        }
        let mut payload = Map::new();
        payload.insert("knora-api:ontologyName".into(), json!(self.name));
        payload.insert(
            "knora-api:attachedToProject".into(),
            json!({ "@id": self.project }),
        );
        payload.insert("rdfs:label".into(), json!(fields.label));
        if let Some(comment) = &fields.comment {
            payload.insert("rdfs:comment".into(), json!(comment));
        }
        payload.insert("@context".into(), self.context.to_json());
        let answer = transport.post(ROUTE, Some(&Value::Object(payload))).await?;
        let created = Ontology::from_json(&answer)?;
        info!(name = %created.name, project = %created.project, "ontology created");
        Ok(created)
    }

    /// Sends changed metadata. Returns `None` when nothing changed.
    pub async fn update(&self, transport: &dyn Transport) -> Result<Option<Ontology>> {
        if !self.fields.has_changes() {
            return Ok(None);
        }
        let id = self.require_id()?;
        let date = self.require_date()?;
        let fields = self.fields.get();
        let mut payload = Map::new();
        payload.insert("@id".into(), json!(id));
        payload.insert("rdfs:label".into(), json!(fields.label));
        if let Some(Some(comment)) = self.fields.changed(|f| &f.comment) {
            payload.insert("rdfs:comment".into(), json!(comment));
        }
        payload.insert("knora-api:lastModificationDate".into(), date.to_json());
        payload.insert("@context".into(), self.context.to_json());
        let answer = transport
            .put(
                &format!("{ROUTE}/metadata"),
                Some(&Value::Object(payload)),
                Some(JSONLD_CONTENT_TYPE),
            )
            .await?;
        Ok(Some(Ontology::from_json(&answer)?))
    }

    /// Reads the ontology with all of its entities.
    pub async fn read(&self, transport: &dyn Transport) -> Result<Ontology> {
        let id = self.require_id()?;
        let answer = transport
            .get(&format!("{ROUTE}/allentities/{}{ALL_LANGUAGES}", encode(id.as_str())))
            .await?;
        Ontology::from_json(&answer)
    }

    /// Returns the server's `knora-api:result` message.
    pub async fn delete(&self, transport: &dyn Transport) -> Result<Option<String>> {
        let id = self.require_id()?;
        let date = self.require_date()?;
        let answer = transport
            .delete(
                &format!("{ROUTE}/{}", encode(id.as_str())),
                &[("lastModificationDate", date.to_string())],
            )
            .await?;
        info!(name = %self.name, "ontology deleted");
        Ok(answer
            .get("knora-api:result")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub async fn get_all(transport: &dyn Transport) -> Result<Vec<Ontology>> {
        let answer = transport.get(&format!("{ROUTE}/metadata")).await?;
        Ontology::list_from_json(&answer)
    }

    pub async fn get_project_ontologies(
        transport: &dyn Transport,
        project: &ProjectIri,
    ) -> Result<Vec<Ontology>> {
        let answer = transport
            .get(&format!(
                "{ROUTE}/metadata/{}{ALL_LANGUAGES}",
                encode(project.as_str())
            ))
            .await?;
        Ontology::list_from_json(&answer)
    }

    /// Reads an ontology through its dereferenceable IRI path. Built-in
    /// ontologies have no shortcode segment.
    pub async fn get_from_server(
        transport: &dyn Transport,
        shortcode: &str,
        name: &str,
    ) -> Result<Ontology> {
        let path = if is_shortcode(shortcode) {
            format!("/ontology/{shortcode}/{name}/v2{ALL_LANGUAGES}")
        } else {
            format!("/ontology/{name}/v2{ALL_LANGUAGES}")
        };
        let answer = transport.get(&path).await?;
        Ontology::from_json(&answer)
    }

    /// Appends a resource class, creating it on the server first when
    /// `create` is set. Returns its index.
    pub async fn add_resource_class(
        &mut self,
        transport: &dyn Transport,
        class: ResourceClass,
        create: bool,
    ) -> Result<usize> {
        let class = if create {
            let (date, created) = class.create(transport, &self.require_date()?).await?;
            self.last_modification_date = Some(date);
            created
        } else {
            class
        };
        self.resource_classes.push(class);
        Ok(self.resource_classes.len() - 1)
    }

    pub async fn update_resource_class(
        &mut self,
        transport: &dyn Transport,
        index: usize,
        class: ResourceClass,
    ) -> Result<&ResourceClass> {
        check_index(index, self.resource_classes.len())?;
        let (date, updated) = class.update(transport, &self.require_date()?).await?;
        self.last_modification_date = Some(date);
        self.resource_classes[index] = updated;
        Ok(&self.resource_classes[index])
    }

    /// Removes a resource class, deleting it on the server too when `erase`
    /// is set.
    pub async fn remove_resource_class(
        &mut self,
        transport: &dyn Transport,
        index: usize,
        erase: bool,
    ) -> Result<ResourceClass> {
        check_index(index, self.resource_classes.len())?;
        if erase {
            let date = self.resource_classes[index]
                .delete(transport, &self.require_date()?)
                .await?;
            self.last_modification_date = Some(date);
        }
        Ok(self.resource_classes.remove(index))
    }

    pub async fn add_property_class(
        &mut self,
        transport: &dyn Transport,
        property: PropertyClass,
        create: bool,
    ) -> Result<usize> {
        let property = if create {
            let (date, created) = property.create(transport, &self.require_date()?).await?;
            self.last_modification_date = Some(date);
            created
        } else {
            property
        };
        self.property_classes.push(property);
        Ok(self.property_classes.len() - 1)
    }

    pub async fn update_property_class(
        &mut self,
        transport: &dyn Transport,
        index: usize,
        property: PropertyClass,
    ) -> Result<&PropertyClass> {
        check_index(index, self.property_classes.len())?;
        let (date, updated) = property.update(transport, &self.require_date()?).await?;
        self.last_modification_date = Some(date);
        self.property_classes[index] = updated;
        Ok(&self.property_classes[index])
    }

    pub async fn remove_property_class(
        &mut self,
        transport: &dyn Transport,
        index: usize,
        erase: bool,
    ) -> Result<PropertyClass> {
        check_index(index, self.property_classes.len())?;
        if erase {
            let date = self.property_classes[index]
                .delete(transport, &self.require_date()?)
                .await?;
            self.last_modification_date = Some(date);
        }
        Ok(self.property_classes.remove(index))
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(DspError::validation(format!(
            "no entity at index {index} (ontology holds {len})"
        )));
    }
    Ok(())
}

/// Turns a class or property reference into the `@id` sent to the server:
/// `prefix:name` is kept (registering a common prefix on use), `:name` is
/// taken from `ontology` and a bare `name` is a Knora API entity.
pub(crate) fn resolve_reference(
    context: &mut Context,
    ontology: &OntologyIri,
    reference: &str,
) -> Result<String> {
    if is_iri(reference) {
        return Ok(context
            .compact(reference)
            .unwrap_or_else(|_| reference.to_string()));
    }
    match reference.split_once(':') {
        Some(("", name)) => Ok(format!("{}:{name}", context.prefix_from_iri(ontology.as_str())?)),
        Some((prefix, _)) => {
            context.add_prefix(prefix, None)?;
            Ok(reference.to_string())
        }
        None => Ok(format!("knora-api:{reference}")),
    }
}

/// Compact `@id` of an entity named `name` in `ontology`.
pub(crate) fn entity_id(context: &mut Context, ontology: &OntologyIri, name: &str) -> Result<String> {
    Ok(format!("{}:{name}", context.prefix_from_iri(ontology.as_str())?))
}

/// Wraps one graph node into the ontology document every entity change
/// sends.
pub(crate) fn ontology_envelope(
    context: &Context,
    ontology: &OntologyIri,
    date: &LastModificationDate,
    node: Value,
) -> Value {
    json!({
        "@id": ontology,
        "@type": "owl:Ontology",
        "knora-api:lastModificationDate": date.to_json(),
        "@graph": [node],
        "@context": context.to_json(),
    })
}

pub(crate) fn modification_date(answer: &Value) -> Result<LastModificationDate> {
    let date = answer
        .get("knora-api:lastModificationDate")
        .ok_or_else(|| DspError::missing("knora-api:lastModificationDate"))?;
    Ok(LastModificationDate::from_json(date)?)
}

/// First node of an answer's `@graph`.
pub(crate) fn graph_node(answer: &Value) -> Result<&Value> {
    match answer.get("@graph") {
        Some(Value::Array(nodes)) => nodes.first().ok_or_else(|| DspError::missing("@graph")),
        Some(node) => Ok(node),
        None => Err(DspError::missing("@graph")),
    }
}

/// `@id`s of a node or an array of nodes; entries without one are skipped.
pub(crate) fn node_ids(value: Option<&Value>) -> Vec<String> {
    let nodes = match value {
        Some(Value::Array(nodes)) => nodes.iter().collect(),
        Some(node) => vec![node],
        None => Vec::new(),
    };
    nodes
        .into_iter()
        .filter_map(|node| node.get("@id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Splits an entity `@id` such as `anything:Thing` and resolves the
/// ontology prefix.
pub(crate) fn split_entity_id(context: &Context, id: &str) -> Result<(OntologyIri, String)> {
    let (prefix, name) = id
        .split_once(':')
        .ok_or_else(|| DspError::validation(format!("entity id {id} has no prefix")))?;
    let ontology = context
        .iri_from_prefix(prefix)
        .ok_or_else(|| shared::ContextError::UnknownPrefix(prefix.to_string()))?;
    Ok((OntologyIri::new(ontology), name.to_string()))
}

#[cfg(test)]
#[path = "tests/ontology_tests.rs"]
mod tests;
