//! Component identities.
//!
//! An [`Identity`] is the pair *(type tag, classifier)* a component is stored
//! under. The type tag is derived from a Rust type (usually a trait object such
//! as `dyn UserMaster`), the classifier is free text with `""` meaning "default".

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// The classifier used when a type has a single, unnamed instance.
pub const DEFAULT_CLASSIFIER: &str = "";

// ---------------------------------------------------------------------------
// Type tag
// ---------------------------------------------------------------------------

/// A stable tag for the type a component is registered under.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for display
/// and for the case-insensitive finders.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Fully qualified name, e.g. `dyn masters::UserMaster`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without `dyn` or generic arguments, e.g. `UserMaster`.
    pub fn simple_name(&self) -> &'static str {
        let base = self.name.strip_prefix("dyn ").unwrap_or(self.name);
        let base = base.split('<').next().unwrap_or(base);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeTag").field(&self.name).finish()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The unique key of a stored instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    type_tag: TypeTag,
    classifier: String,
}

impl Identity {
    pub fn new(type_tag: TypeTag, classifier: impl Into<String>) -> Self {
        Self {
            type_tag,
            classifier: classifier.into(),
        }
    }

    pub fn of<T: ?Sized + 'static>(classifier: impl Into<String>) -> Self {
        Self::new(TypeTag::of::<T>(), classifier)
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn is_default(&self) -> bool {
        self.classifier == DEFAULT_CLASSIFIER
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "{}/<default>", self.type_tag)
        } else {
            write!(f, "{}/{}", self.type_tag, self.classifier)
        }
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Identity", 2)?;
        state.serialize_field("type", self.type_tag.name())?;
        state.serialize_field("classifier", &self.classifier)?;
        state.end()
    }
}
