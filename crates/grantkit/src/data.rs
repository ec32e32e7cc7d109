//! Typed access to one resource's fields.
//!
//! [`ResourceData`] carries two attribute maps: the prior state (what was
//! last recorded) and the current values (declared configuration, or what a
//! read observed). Lifecycle operations read current values, compare them
//! with prior ones through [`ResourceData::has_change`], and write observed
//! values back with [`ResourceData::set`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Str(String),
    /// Ordered list; set-typed fields are stored sorted and deduplicated
    List(Vec<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is the zero value of its type.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Str(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(items: BTreeSet<String>) -> Self {
        Value::List(items.into_iter().collect())
    }
}

/// Attribute map keyed by field name.
pub type Attributes = BTreeMap<String, Value>;

const FINGERPRINT_PREFIX: &str = "blake3:";

/// Stand-in recorded for a secret so that state never holds the secret itself.
///
/// ```
/// use grantkit::data::{fingerprint, is_fingerprint_of};
///
/// let recorded = fingerprint("hunter2");
/// assert!(recorded.starts_with("blake3:"));
/// assert!(is_fingerprint_of(&recorded, "hunter2"));
/// assert!(!is_fingerprint_of(&recorded, "hunter3"));
/// ```
pub fn fingerprint(secret: &str) -> String {
    if is_fingerprint(secret) {
        return secret.to_string();
    }
    format!("{FINGERPRINT_PREFIX}{}", blake3::hash(secret.as_bytes()).to_hex())
}

/// Whether `value` is already a fingerprint.
pub fn is_fingerprint(value: &str) -> bool {
    value.starts_with(FINGERPRINT_PREFIX)
}

/// Whether `recorded` is the fingerprint of `secret`.
pub fn is_fingerprint_of(recorded: &str, secret: &str) -> bool {
    is_fingerprint(recorded) && fingerprint(secret) == recorded
}

/// Identity plus prior and current attributes of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceData {
    id: Option<String>,
    prior: Attributes,
    current: Attributes,
}

impl ResourceData {
    /// Data for a resource that does not exist yet.
    pub fn from_config(config: Attributes) -> Self {
        Self {
            id: None,
            prior: Attributes::new(),
            current: config,
        }
    }

    /// Data for a resource known only from recorded state.
    pub fn from_state(id: impl Into<String>, state: Attributes) -> Self {
        Self {
            id: Some(id.into()),
            current: state.clone(),
            prior: state,
        }
    }

    /// Data for a resource moving from recorded state to a new configuration.
    pub fn for_update(id: impl Into<String>, state: Attributes, config: Attributes) -> Self {
        Self {
            id: Some(id.into()),
            prior: state,
            current: config,
        }
    }

    /// Data holding nothing but an import id.
    pub fn from_import_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Resource identity; `None` once the resource is gone.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Mark the resource as no longer existing.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.current.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// String field, treating an empty string as unset.
    pub fn get_non_empty(&self, field: &str) -> Option<&str> {
        self.get_str(field).filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, field: &str) -> bool {
        self.get(field).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_list(&self, field: &str) -> Vec<String> {
        self.get(field)
            .and_then(Value::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    pub fn get_set(&self, field: &str) -> BTreeSet<String> {
        self.get(field)
            .and_then(Value::as_list)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the field is present with a non-zero value.
    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.current.insert(field.to_string(), value.into());
    }

    /// Whether the current value of `field` differs from its prior value.
    ///
    /// A missing value and the zero value of a type count as equal.
    pub fn has_change(&self, field: &str) -> bool {
        let (old, new) = self.get_change(field);
        match (old, new) {
            (Some(a), Some(b)) => a != b,
            (Some(v), None) | (None, Some(v)) => !v.is_empty(),
            (None, None) => false,
        }
    }

    /// Prior and current value of `field`.
    pub fn get_change(&self, field: &str) -> (Option<&Value>, Option<&Value>) {
        (self.prior.get(field), self.current.get(field))
    }

    /// Prior and current value of a set field.
    pub fn get_set_change(&self, field: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        let collect = |v: Option<&Value>| -> BTreeSet<String> {
            v.and_then(Value::as_list)
                .map(|items| items.iter().cloned().collect())
                .unwrap_or_default()
        };
        let (old, new) = self.get_change(field);
        (collect(old), collect(new))
    }

    /// Names of the fields whose value changed.
    pub fn changed_fields(&self) -> Vec<String> {
        self.prior
            .keys()
            .chain(self.current.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|field| self.has_change(field))
            .cloned()
            .collect()
    }

    /// Replace the current values of `fields` with their fingerprints.
    pub fn seal(&mut self, fields: &[&str]) {
        for field in fields {
            if let Some(Value::Str(secret)) = self.current.get_mut(*field)
                && !secret.is_empty()
            {
                *secret = fingerprint(secret);
            }
        }
    }

    /// Current attributes, as they should be recorded.
    pub fn attributes(&self) -> &Attributes {
        &self.current
    }

    /// Consume into identity and current attributes.
    pub fn into_parts(self) -> (Option<String>, Attributes) {
        (self.id, self.current)
    }
}
