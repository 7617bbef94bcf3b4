use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use shared::{
    context::{KNORA_API, OWL, RDF, RDFS, SALSAH_GUI},
    domain::{Cardinality, ClassIri, LastModificationDate, OntologyIri},
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

const ROUTE: &str = "/v2/ontologies/classes";
const CARDINALITIES: &str = "/v2/ontologies/cardinalities";
const DEFAULT_SUPERCLASS: &str = "knora-api:Resource";
const NO_LABEL: &str = "no label available";
const NO_COMMENT: &str = "no comment available";

/// Where the property of a cardinality is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// rdf, rdfs or owl
    System,
    Knora,
    /// a project or external ontology
    Other,
}

/// A property bound to a resource class with a cardinality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasProperty {
    property_id: String,
    ontology: Option<OntologyIri>,
    cardinality: Cardinality,
    gui_order: Option<u64>,
    is_inherited: bool,
    ptype: PropertyType,
}

impl HasProperty {
    pub fn new(property_id: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            property_id: property_id.into(),
            ontology: None,
            cardinality,
            gui_order: None,
            is_inherited: false,
            ptype: PropertyType::Other,
        }
    }

    /// Reads an `owl:Restriction` node.
    pub fn from_json(context: &mut Context, node: &Value) -> Result<Self> {
        let restriction = context.term(OWL, "Restriction")?;
        if node.get("@type").and_then(Value::as_str) != Some(restriction.as_str()) {
            return Err(DspError::validation("expected an owl:Restriction"));
        }
        let count = |key: String| node.get(&key).and_then(Value::as_u64);
        let cardinality = Cardinality::from_owl(
            count(context.term(OWL, "cardinality")?),
            count(context.term(OWL, "maxCardinality")?),
            count(context.term(OWL, "minCardinality")?),
        )?;
        let property_id = node
            .get(&context.term(OWL, "onProperty")?)
            .and_then(|property| property.get("@id"))
            .and_then(Value::as_str)
            .ok_or_else(|| DspError::missing("owl:onProperty"))?
            .to_string();

        let system: Vec<String> = [RDF, RDFS, OWL]
            .iter()
            .map(|iri| context.prefix_from_iri(iri))
            .collect::<std::result::Result<_, _>>()?;
        let knora = context.prefix_from_iri(KNORA_API)?;
        let prefix = property_id.split_once(':').map_or("", |(prefix, _)| prefix);
        let (ptype, ontology) = if system.iter().any(|p| p == prefix) {
            (PropertyType::System, None)
        } else if prefix == knora {
            (PropertyType::Knora, None)
        } else {
            (
                PropertyType::Other,
                context.iri_from_prefix(prefix).map(OntologyIri::new),
            )
        };

        Ok(Self {
            property_id,
            ontology,
            cardinality,
            gui_order: node
                .get(&context.term(SALSAH_GUI, "guiOrder")?)
                .and_then(Value::as_u64),
            is_inherited: node
                .get(&context.term(KNORA_API, "isInherited")?)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ptype,
        })
    }

    pub fn with_gui_order(mut self, gui_order: u64) -> Self {
        self.gui_order = Some(gui_order);
        self
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    pub fn ontology(&self) -> Option<&OntologyIri> {
        self.ontology.as_ref()
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn gui_order(&self) -> Option<u64> {
        self.gui_order
    }

    pub fn is_inherited(&self) -> bool {
        self.is_inherited
    }

    pub fn ptype(&self) -> PropertyType {
        self.ptype
    }

    fn restriction(&self, with_gui_order: bool) -> Value {
        let (key, count) = self.cardinality.owl_restriction();
        let mut restriction = Map::new();
        restriction.insert("@type".into(), json!("owl:Restriction"));
        restriction.insert(key.into(), json!(count));
        restriction.insert("owl:onProperty".into(), json!({ "@id": self.property_id }));
        if let Some(order) = self.gui_order.filter(|_| with_gui_order) {
            restriction.insert("salsah-gui:guiOrder".into(), json!(order));
        }
        Value::Object(restriction)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceClassFields {
    pub label: LangString,
    pub comment: LangString,
}

/// A resource class of an ontology together with its cardinalities, keyed
/// by the compact IRI of the property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceClass {
    context: Context,
    id: Option<ClassIri>,
    name: String,
    ontology: OntologyIri,
    superclasses: Vec<String>,
    permissions: Option<String>,
    has_properties: BTreeMap<String, HasProperty>,
    fields: Tracked<ResourceClassFields>,
}

impl ResourceClass {
    /// `ontology` is an ontology IRI or a prefix known to `context`.
    pub fn new(
        context: Context,
        ontology: &str,
        name: impl Into<String>,
        superclasses: Vec<String>,
        label: LangString,
        comment: LangString,
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
            superclasses,
            permissions: None,
            has_properties: BTreeMap::new(),
            fields: Tracked::new(ResourceClassFields { label, comment }),
        })
    }

    /// Reads a class node; a `@graph` array yields its first node.
    pub fn from_json(mut context: Context, node: &Value) -> Result<Self> {
        let node = match node {
            Value::Array(nodes) => nodes.first().ok_or_else(|| DspError::missing("@graph"))?,
            node => node,
        };
        let is_class = |key: String| node.get(&key).and_then(Value::as_bool).unwrap_or(false);
        if !(is_class(context.term(KNORA_API, "isResourceClass")?)
            || is_class(context.term(KNORA_API, "isStandoffClass")?))
        {
            return Err(DspError::validation("node is not a resource class"));
        }
        let compact_id = node
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| DspError::missing("@id"))?;
        let (ontology, name) = split_entity_id(&context, compact_id)?;
        let id = ClassIri::new(format!("{ontology}#{name}"));

        let sub_class_of = node.get(&context.term(RDFS, "subClassOf")?);
        let superclasses = node_ids(sub_class_of);
        let restriction = context.term(OWL, "Restriction")?;
        let mut has_properties = BTreeMap::new();
        let parents = match sub_class_of {
            Some(Value::Array(nodes)) => nodes.iter().collect(),
            Some(node) => vec![node],
            None => Vec::new(),
        };
        for parent in parents {
            if parent.get("@type").and_then(Value::as_str) == Some(restriction.as_str()) {
                let has_property = HasProperty::from_json(&mut context, parent)?;
                has_properties.insert(has_property.property_id.clone(), has_property);
            }
        }
        // a link property also comes back as its `...Value` twin
        let twins: Vec<String> = has_properties
            .keys()
            .filter(|key| {
                key.strip_suffix("Value")
                    .is_some_and(|link| has_properties.contains_key(link))
            })
            .cloned()
            .collect();
        for twin in twins {
            has_properties.remove(&twin);
        }

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
            superclasses,
            permissions: None,
            has_properties,
            fields: Tracked::from_server(ResourceClassFields { label, comment }),
        })
    }

    pub fn with_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.permissions = Some(permissions.into());
        self
    }

    pub fn id(&self) -> Option<&ClassIri> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ontology(&self) -> &OntologyIri {
        &self.ontology
    }

    pub fn superclasses(&self) -> &[String] {
        &self.superclasses
    }

    pub fn permissions(&self) -> Option<&str> {
        self.permissions.as_deref()
    }

    pub fn has_properties(&self) -> &BTreeMap<String, HasProperty> {
        &self.has_properties
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Looks a cardinality up by a property reference in any accepted form.
    pub fn get_property(&mut self, reference: &str) -> Result<Option<&HasProperty>> {
        let key = resolve_reference(&mut self.context, &self.ontology, reference)?;
        Ok(self.has_properties.get(&key))
    }

    pub fn fields(&self) -> &ResourceClassFields {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> &mut ResourceClassFields {
        self.fields.get_mut()
    }

    pub fn has_changes(&self) -> bool {
        self.fields.has_changes()
    }

    fn require_id(&self) -> Result<&ClassIri> {
        self.id
            .as_ref()
            .ok_or_else(|| DspError::validation("resource class has no IRI; create it first"))
    }

    fn from_answer(&self, answer: &Value) -> Result<(LastModificationDate, ResourceClass)> {
        let date = modification_date(answer)?;
        let class = ResourceClass::from_json(self.context.clone(), graph_node(answer)?)?;
        Ok((date, class))
    }

    /// Creates the class and returns it with the ontology's new modification
    /// date.
    pub async fn create(
        &self,
        transport: &dyn Transport,
        date: &LastModificationDate,
    ) -> Result<(LastModificationDate, ResourceClass)> {
        if self.name.is_empty() {
            return Err(DspError::validation("there must be a valid resource class name"));
        }
        let mut context = self.context.clone();
        let superclasses = if self.superclasses.is_empty() {
            vec![json!({ "@id": DEFAULT_SUPERCLASS })]
        } else {
            self.superclasses
                .iter()
                .map(|superclass| {
                    resolve_reference(&mut context, &self.ontology, superclass)
                        .map(|id| json!({ "@id": id }))
                })
                .collect::<Result<_>>()?
        };
        let fields = self.fields.get();
        let label = non_empty_or(&fields.label, NO_LABEL);
        let comment = non_empty_or(&fields.comment, NO_COMMENT);
        let node = json!({
            "@id": entity_id(&mut context, &self.ontology, &self.name)?,
            "@type": "owl:Class",
            "rdfs:label": label.to_jsonld(),
            "rdfs:comment": comment.to_jsonld(),
            "rdfs:subClassOf": superclasses,
        });
        let payload = ontology_envelope(&context, &self.ontology, date, node);
        let answer = transport.post(ROUTE, Some(&payload)).await?;
        let created = Self { context, ..self.clone() }.from_answer(&answer)?;
        info!(class = %self.name, ontology = %self.ontology, "resource class created");
        Ok(created)
    }

    /// The server changes one thing per call: label and comment are sent
    /// separately, each with the date returned by the call before.
    pub async fn update(
        &self,
        transport: &dyn Transport,
        date: &LastModificationDate,
    ) -> Result<(LastModificationDate, ResourceClass)> {
        let mut context = self.context.clone();
        let class_id = entity_id(&mut context, &self.ontology, &self.name)?;
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
            node.insert("@id".into(), json!(class_id));
            node.insert("@type".into(), json!("owl:Class"));
            node.insert(key.into(), value);
            let node = Value::Object(node);
            let payload = ontology_envelope(&context, &self.ontology, &date, node);
            let answer = transport.put(ROUTE, Some(&payload), None).await?;
            let (next, class) = self.from_answer(&answer)?;
            date = next;
            updated = Some(class);
        }
        Ok((date, updated.unwrap_or_else(|| self.clone())))
    }

    /// Deletes the class and returns the ontology's new modification date.
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
        info!(class = %self.name, "resource class deleted");
        modification_date(&answer)
    }

    /// Adds a cardinality for a property the class does not use yet.
    pub async fn add_property(
        &mut self,
        transport: &dyn Transport,
        date: &LastModificationDate,
        property: &str,
        cardinality: Cardinality,
        gui_order: Option<u64>,
    ) -> Result<LastModificationDate> {
        let key = resolve_reference(&mut self.context, &self.ontology, property)?;
        if self.has_properties.contains_key(&key) {
            return Err(DspError::validation(format!(
                "property {key} already has a cardinality in class {}",
                self.name
            )));
        }
        let mut has_property = HasProperty::new(key.clone(), cardinality);
        has_property.gui_order = gui_order;
        let answer = transport
            .post(CARDINALITIES, Some(&self.cardinality_payload(&has_property, date, true)?))
            .await?;
        self.store_cardinality(&key, &answer)
    }

    /// Changes the cardinality or gui order of a property already bound to
    /// the class. Unknown properties leave the date untouched.
    pub async fn update_property(
        &mut self,
        transport: &dyn Transport,
        date: &LastModificationDate,
        property: &str,
        cardinality: Option<Cardinality>,
        gui_order: Option<u64>,
    ) -> Result<LastModificationDate> {
        let key = resolve_reference(&mut self.context, &self.ontology, property)?;
        let Some(existing) = self.has_properties.get(&key) else {
            return Ok(*date);
        };
        let mut has_property = existing.clone();
        if let Some(cardinality) = cardinality {
            has_property.cardinality = cardinality;
        }
        has_property.gui_order = gui_order;
        let payload = self.cardinality_payload(&has_property, date, gui_order.is_some())?;
        let answer = transport.put(CARDINALITIES, Some(&payload), None).await?;
        self.store_cardinality(&key, &answer)
    }

    pub async fn remove_property(
        &mut self,
        _transport: &dyn Transport,
        _date: &LastModificationDate,
        property: &str,
    ) -> Result<LastModificationDate> {
        Err(DspError::Unsupported(format!(
            "cannot remove property {property} from class {}",
            self.name
        )))
    }

    fn cardinality_payload(
        &self,
        has_property: &HasProperty,
        date: &LastModificationDate,
        with_gui_order: bool,
    ) -> Result<Value> {
        let node = json!({
            "@id": self.require_id()?,
            "@type": "owl:Class",
            "rdfs:subClassOf": has_property.restriction(with_gui_order),
        });
        Ok(ontology_envelope(&self.context, &self.ontology, date, node))
    }

    fn store_cardinality(&mut self, key: &str, answer: &Value) -> Result<LastModificationDate> {
        let (date, class) = self.from_answer(answer)?;
        let has_property = class
            .has_properties
            .get(key)
            .cloned()
            .ok_or_else(|| DspError::missing(key))?;
        self.has_properties.insert(key.to_string(), has_property);
        Ok(date)
    }
}

fn non_empty_or(text: &LangString, fallback: &str) -> LangString {
    if text.is_empty() {
        LangString::plain(fallback)
    } else {
        text.clone()
    }
}

#[cfg(test)]
#[path = "tests/resource_class_tests.rs"]
mod tests;
