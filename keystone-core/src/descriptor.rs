//! Descriptors of published components and their per-type index.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use crate::identity::{Identity, TypeTag};

/// Open-ended, ordered attribute map. The registry never interprets it.
pub type Attributes = IndexMap<String, Value>;

/// Attribute keys understood by the publishing layer.
pub mod attributes {
    /// Relative publishing level; lower levels are published first.
    pub const LEVEL: &str = "level";
    /// URI a remote client should connect to.
    pub const REMOTE_URI: &str = "remoteUri";
    /// Messaging topic carrying change notifications.
    pub const CHANGE_TOPIC: &str = "changeTopic";
    /// Broker the change topic lives on.
    pub const BROKER_URI: &str = "brokerUri";
    /// Scheme of the unique identifiers the component hands out.
    pub const UNIQUE_ID_SCHEME: &str = "uniqueIdScheme";
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Identity plus attributes of a published component.
///
/// Callers build it up before registration; once handed to
/// [`register_component`](crate::ComponentRepository::register_component)
/// the registry only ever clones it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Descriptor {
    #[serde(flatten)]
    identity: Identity,
    attributes: Attributes,
}

impl Descriptor {
    pub fn new<T: ?Sized + 'static>(classifier: impl Into<String>) -> Self {
        Self::for_identity(Identity::of::<T>(classifier))
    }

    pub fn for_identity(identity: Identity) -> Self {
        Self {
            identity,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Inserts or replaces an attribute, keeping first-insertion order.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn type_tag(&self) -> &TypeTag {
        self.identity.type_tag()
    }

    pub fn classifier(&self) -> &str {
        self.identity.classifier()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

// ---------------------------------------------------------------------------
// Descriptor index
// ---------------------------------------------------------------------------

/// All descriptors of one type, keyed by classifier in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorIndex {
    type_tag: TypeTag,
    descriptors: IndexMap<String, Descriptor>,
}

impl DescriptorIndex {
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag,
            descriptors: IndexMap::new(),
        }
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Exact classifier match.
    pub fn find(&self, classifier: &str) -> Option<&Descriptor> {
        self.descriptors.get(classifier)
    }

    /// Classifier match ignoring ASCII case, for human-typed names.
    pub fn find_ignore_case(&self, classifier: &str) -> Option<&Descriptor> {
        self.find(classifier).or_else(|| {
            self.descriptors
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(classifier))
                .map(|(_, descriptor)| descriptor)
        })
    }

    pub fn classifiers(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Adds a descriptor of this index's type. The instance store has already
    /// rejected duplicates, so an existing classifier is never overwritten here.
    pub(crate) fn insert(&mut self, descriptor: Descriptor) {
        debug_assert_eq!(descriptor.type_tag(), &self.type_tag);
        self.descriptors
            .entry(descriptor.classifier().to_owned())
            .or_insert(descriptor);
    }
}

impl Serialize for DescriptorIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let components: Vec<&Descriptor> = self.descriptors.values().collect();
        let mut state = serializer.serialize_struct("DescriptorIndex", 3)?;
        state.serialize_field("type", self.type_tag.name())?;
        state.serialize_field("name", self.type_tag.simple_name())?;
        state.serialize_field("components", &components)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct ExchangeMaster;

    fn index() -> DescriptorIndex {
        let mut index = DescriptorIndex::new(TypeTag::of::<ExchangeMaster>());
        index.insert(Descriptor::new::<ExchangeMaster>("Shared"));
        index.insert(Descriptor::new::<ExchangeMaster>(""));
        index
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let descriptor = Descriptor::new::<ExchangeMaster>("main")
            .with_attribute(attributes::LEVEL, 1)
            .with_attribute(attributes::UNIQUE_ID_SCHEME, "DbExg")
            .with_attribute(attributes::REMOTE_URI, "http://localhost/exg");
        let keys: Vec<_> = descriptor.attributes().keys().cloned().collect();
        assert_eq!(keys, vec!["level", "uniqueIdScheme", "remoteUri"]);
        assert_eq!(descriptor.attribute(attributes::LEVEL), Some(&json!(1)));
    }

    #[test]
    fn exact_find_is_case_sensitive() {
        let index = index();
        assert!(index.find("Shared").is_some());
        assert!(index.find("shared").is_none());
        assert!(index.find("missing").is_none());
    }

    #[test]
    fn ignore_case_find_matches_any_case() {
        let index = index();
        let found = index.find_ignore_case("SHARED").expect("found");
        assert_eq!(found.classifier(), "Shared");
        assert!(index.find_ignore_case("other").is_none());
    }

    #[test]
    fn insert_keeps_first_descriptor() {
        let mut index = index();
        index.insert(Descriptor::new::<ExchangeMaster>("Shared").with_attribute("x", 1));
        assert_eq!(index.len(), 2);
        assert!(index.find("Shared").expect("present").attributes().is_empty());
    }

    #[test]
    fn serializes_identity_flattened() {
        let descriptor = Descriptor::new::<ExchangeMaster>("main").with_attribute("level", 2);
        let value = serde_json::to_value(&descriptor).expect("serialize");
        assert_eq!(value["classifier"], "main");
        assert_eq!(value["attributes"]["level"], 2);
    }
}
