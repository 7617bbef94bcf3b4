use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use shared::{
    context::{KNORA_API, RDFS, SALSAH_GUI},
    domain::{LastModificationDate, OntologyIri, PropertyIri},
    Context, LangString,
};
use tracing::info;

use crate::{
    encode,
    ontology::{
        entity_id, graph_node, modification_date, node_ids, ontology_envelope, resolve_reference,
        split_entity_id,
    },
    tracked::Tracked,
    DspError, Result, Transport,
};

const ROUTE: &str = "/v2/ontologies/properties";
const DEFAULT_SUPERPROPERTY: &str = "knora-api:hasValue";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyClassFields {
    pub label: LangString,
    pub comment: LangString,
}

/// A resource property of an ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyClass {
    context: Context,
    id: Option<PropertyIri>,
    name: String,
    ontology: OntologyIri,
    superproperties: Vec<String>,
    object: Option<String>,
    subject: Option<String>,
    gui_element: Option<String>,
    gui_attributes: BTreeMap<String, String>,
    editable: Option<bool>,
    linkvalue: Option<bool>,
    fields: Tracked<PropertyClassFields>,
}

impl PropertyClass {
    /// `ontology` is an ontology IRI or a prefix known to `context`.
    pub fn new(
        context: Context,
        ontology: &str,
        name: impl Into<String>,
        label: LangString,
    ) -> Result<Self> {
        let ontology = context
            .iri_from_prefix(ontology)
            .map(OntologyIri::new)
            .ok_or_else(|| shared::ContextError::UnknownPrefix(ontology.to_string()))?;
        Ok(Self {
            context,
            id: None,
            name: name.into(),
            ontology,
            superproperties: Vec::new(),
            object: None,
            subject: None,
            gui_element: None,
            gui_attributes: BTreeMap::new(),
            editable: None,
            linkvalue: None,
            fields: Tracked::new(PropertyClassFields {
                label,
                comment: LangString::new(),
            }),
        })
    }

    pub fn with_superproperties(mut self, superproperties: Vec<String>) -> Self {
        self.superproperties = superproperties;
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_gui_element(mut self, gui_element: impl Into<String>) -> Self {
        self.gui_element = Some(gui_element.into());
        self
    }

    pub fn with_gui_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.gui_attributes.insert(key.into(), value.into());
        self
    }

    pub fn from_json(mut context: Context, node: &Value) -> Result<Self> {
        let node = match node {
            Value::Array(nodes) => nodes.first().ok_or_else(|| DspError::missing("@graph"))?,
            node => node,
        };
        let is_property = node
            .get(&context.term(KNORA_API, "isResourceProperty")?)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !is_property {
            return Err(DspError::validation("node is not a resource property"));
        }
        let compact_id = node
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| DspError::missing("@id"))?;
        let (ontology, name) = split_entity_id(&context, compact_id)?;
        let id = PropertyIri::new(format!("{ontology}#{name}"));

        let id_of = |value: Option<&Value>| {
            value
                .and_then(|value| value.get("@id"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let superproperties = node_ids(node.get(&context.term(RDFS, "subPropertyOf")?));
        let object = id_of(node.get(&context.term(KNORA_API, "objectType")?));
        let subject = id_of(node.get(&context.term(KNORA_API, "subjectType")?));
        let gui_element = id_of(node.get(&context.term(SALSAH_GUI, "guiElement")?));
        let gui_attributes = match node.get(&context.term(SALSAH_GUI, "guiAttribute")?) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(gui_attribute).collect(),
            Some(Value::String(item)) => [gui_attribute(item)].into_iter().collect(),
            _ => BTreeMap::new(),
        };
        let flag = |key: String| node.get(&key).and_then(Value::as_bool);
        let editable = flag(context.term(KNORA_API, "isEditable")?);
        let linkvalue = flag(context.term(KNORA_API, "isLinkProperty")?);
        let label = LangString::from_jsonld(
            node.get(&context.term(RDFS, "label")?).unwrap_or(&Value::Null),
        )?;
        let comment = LangString::from_jsonld(
            node.get(&context.term(RDFS, "comment")?).unwrap_or(&Value::Null),
        )?;
        Ok(Self {
            context,
            id: Some(id),
            name,
            ontology,
            superproperties,
            object,
            subject,
            gui_element,
            gui_attributes,
            editable,
            linkvalue,
            fields: Tracked::from_server(PropertyClassFields { label, comment }),
        })
    }

    pub fn id(&self) -> Option<&PropertyIri> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ontology(&self) -> &OntologyIri {
        &self.ontology
    }

    pub fn superproperties(&self) -> &[String] {
        &self.superproperties
    }

    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn gui_element(&self) -> Option<&str> {
        self.gui_element.as_deref()
    }

    pub fn gui_attributes(&self) -> &BTreeMap<String, String> {
        &self.gui_attributes
    }

    pub fn editable(&self) -> Option<bool> {
        self.editable
    }

    pub fn linkvalue(&self) -> Option<bool> {
        self.linkvalue
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn fields(&self) -> &PropertyClassFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut PropertyClassFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    fn require_id(&self) -> Result<&PropertyIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("property class has no IRI; create it first"))
    }

    fn from_answer(&self, answer: &Value) -> Result<(LastModificationDate, PropertyClass)> {
        let date = modification_date(answer)?;
        let property = PropertyClass::from_json(self.context.clone(), graph_node(answer)?)?;
        Ok((date, property))
    }

    pub async fn create(
        &self,
        transport: &dyn Transport,
        date: &LastModificationDate,
    ) -> Result<(LastModificationDate, PropertyClass)> {
        if self.name.is_empty() {
            return Err(DspError::validation("there must be a valid property class name"));
        }
        let fields = self.fields.get();
        let label = fields
            .label
            .to_jsonld()
            .ok_or_else(|| DspError::validation("there must be a valid property label"))?;
        let mut context = self.context.clone();
        let superproperties: Vec<Value> = if self.superproperties.is_empty() {
            vec![json!({ "@id": DEFAULT_SUPERPROPERTY })]
        } else {
            self.superproperties
                .iter()
                .map(|superproperty| {
                    resolve_reference(&mut context, &self.ontology, superproperty)
                        .map(|id| json!({ "@id": id }))
                })
                .collect::<Result<_>>()?
        };

        let mut node = Map::new();
        node.insert(
            "@id".into(),
            json!(entity_id(&mut context, &self.ontology, &self.name)?),
        );
        node.insert("@type".into(), json!("owl:ObjectProperty"));
        node.insert("rdfs:label".into(), label);
        node.insert("rdfs:subPropertyOf".into(), Value::Array(superproperties));
        if let Some(comment) = fields.comment.to_jsonld() {
            node.insert("rdfs:comment".into(), comment);
        }
        if let Some(subject) = &self.subject {
            let subject = resolve_reference(&mut context, &self.ontology, subject)?;
            node.insert("knora-api:subjectType".into(), json!({ "@id": subject }));
        }
        if let Some(object) = &self.object {
            let object = resolve_reference(&mut context, &self.ontology, object)?;
            node.insert("knora-api:objectType".into(), json!({ "@id": object }));
        }
        if let Some(gui_element) = &self.gui_element {
            node.insert("salsah-gui:guiElement".into(), json!({ "@id": gui_element }));
        }
        if !self.gui_attributes.is_empty() {
            let attributes: Vec<String> = self
                .gui_attributes
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            node.insert("salsah-gui:guiAttribute".into(), json!(attributes));
        }

        let payload = ontology_envelope(&context, &self.ontology, date, Value::Object(node));
        let answer = transport.post(ROUTE, Some(&payload)).await?;
        let created = Self { context, ..self.clone() }.from_answer(&answer)?;
        info!(property = %self.name, ontology = %self.ontology, "property class created");
        Ok(created)
    }

    /// Label and comment go in separate calls, each with the date returned by
    /// the call before.
    pub async fn update(
        &self,
        transport: &dyn Transport,
        date: &LastModificationDate,
    ) -> Result<(LastModificationDate, PropertyClass)> {
        let mut context = self.context.clone();
        let property_id = entity_id(&mut context, &self.ontology, &self.name)?;
        let tracked = &self.fields;
        let changes = [
            ("rdfs:label", tracked.changed(|f| &f.label)),
            ("rdfs:comment", tracked.changed(|f| &f.comment)),
        ];
        let mut date = *date;
        let mut updated = None;
        for (key, value) in changes {
            let Some(value) = value.and_then(LangString::to_jsonld) else {
                continue;
            };
            let mut node = Map::new();
            node.insert("@id".into(), json!(property_id));
            node.insert("@type".into(), json!("owl:ObjectProperty"));
            node.insert(key.into(), value);
            let payload = ontology_envelope(&context, &self.ontology, &date, Value::Object(node));
            let answer = transport.put(ROUTE, Some(&payload), None).await?;
            let (next, property) = self.from_answer(&answer)?;
            date = next;
            updated = Some(property);
        }
        Ok((date, updated.unwrap_or_else(|| self.clone())))
    }

    pub async fn delete(
        &self,
        transport: &dyn Transport,
        date: &LastModificationDate,
    ) -> Result<LastModificationDate> {
        let id = self.require_id()?;
        let answer = transport
            .delete(
                &format!("{ROUTE}/{}", encode(id.as_str())),
                &[("lastModificationDate", date.to_string())],
            )
            .await?;
        info!(property = %self.name, "property class deleted");
        modification_date(&answer)
    }
}

/// `key=value`; a bare key maps to an empty value.
fn gui_attribute(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (raw.to_string(), String::new()),
    }
}

#[cfg(test)]
#[path = "tests/property_class_tests.rs"]
mod tests;
