//! Bidirectional field mapping between client and server vocabularies.
//!
//! A [`FieldMap`] carries the explicit client ↔ server vocabulary configured
//! per adapter plus an anchor table binding logical field roles (identifier,
//! parent reference, order, ...) to concrete server fields. Records are
//! translated with [`FieldMap::map_record`], which walks the value tree and
//! renames keys according to a fixed precedence:
//!
//! 1. an explicit vocabulary entry for the mapping direction;
//! 2. an anchor reverse-lookup — a key that is the server field bound to a
//!    logical role is renamed to the role's logical key;
//! 3. otherwise the key is kept verbatim, unless the "use only mapped
//!    fields" policy is set, in which case it is dropped.
//!
//! The vocabulary's inverse is derived at construction and must be
//! injective; an ambiguous vocabulary is rejected with
//! [`MappingError::AmbiguousVocabulary`] instead of silently producing
//! corrupted client-ward translations.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    Result,
    constants::{DEFAULT_ID_FIELD, DEFAULT_ORDER_FIELD},
};

mod errors;
pub use errors::MappingError;


/// Direction of a record translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Rename server fields to client fields.
    ToClient,
    /// Rename client fields to server fields.
    ToServer,
}

/// Logical field roles that can be bound to concrete server fields.
///
/// Anchors let the dispatcher address a record's identifier, parent
/// reference, or ordering field without knowing its concrete name in either
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The record identifier.
    Id,
    /// The parent reference of a tree record.
    ParentId,
    /// The ordering position of a record.
    Order,
    /// The field a dynamic tree read selects expansion nodes by.
    TreeSelection,
    /// The boolean "has children" marker of a dynamic tree node.
    NodeHasChildren,
    /// The children container of a tree node.
    NodeChildren,
}

impl Anchor {
    /// Every role, in resolution-precedence order.
    ///
    /// When two roles are bound to the same server field (a dynamic tree
    /// binds both the parent reference and the selection role to one field),
    /// reverse lookups resolve to the earlier role in this list.
    pub const ALL: [Anchor; 6] = [
        Anchor::Id,
        Anchor::ParentId,
        Anchor::Order,
        Anchor::TreeSelection,
        Anchor::NodeHasChildren,
        Anchor::NodeChildren,
    ];

    /// The logical key this role renames to during mapping.
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Id => "id",
            Anchor::ParentId => "parent_id",
            Anchor::Order => "order",
            Anchor::TreeSelection => "tree_selection",
            Anchor::NodeHasChildren => "has_children",
            Anchor::NodeChildren => "children",
        }
    }
}

/// The per-adapter field vocabulary and anchor table.
///
/// A `FieldMap` is an immutable configuration value: the derivation methods
/// (`with_vocabulary`, `with_anchor`) return new maps and never mutate shared
/// state. Every adapter starts with the identifier and order roles anchored
/// to their default server fields.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    /// client name -> server name
    server_fields: HashMap<String, String>,
    /// server name -> client name, derived inverse
    client_fields: HashMap<String, String>,
    anchors: HashMap<Anchor, String>,
    use_only_mapped_fields: bool,
}

impl FieldMap {
    /// Creates a map with no vocabulary and the default anchor bindings
    /// (`id` and `order` to their server fields of the same name).
    pub fn new() -> Self {
        let mut anchors = HashMap::new();
        anchors.insert(Anchor::Id, DEFAULT_ID_FIELD.to_string());
        anchors.insert(Anchor::Order, DEFAULT_ORDER_FIELD.to_string());
        Self {
            server_fields: HashMap::new(),
            client_fields: HashMap::new(),
            anchors,
            use_only_mapped_fields: false,
        }
    }

    /// Derives a map with the given client → server vocabulary bound.
    ///
    /// The inverse (server → client) mapping is computed here and must be
    /// injective: two client names mapping to the same server name are
    /// rejected with [`MappingError::AmbiguousVocabulary`]. Anchor bindings
    /// carry over unchanged.
    pub fn with_vocabulary<I, K, V>(&self, vocabulary: I, use_only_mapped_fields: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut server_fields = HashMap::new();
        let mut client_fields: HashMap<String, String> = HashMap::new();

        for (client, server) in vocabulary {
            let client = client.into();
            let server = server.into();
            if let Some(first_client) = client_fields.get(&server) {
                return Err(MappingError::AmbiguousVocabulary {
                    server_field: server,
                    first_client: first_client.clone(),
                    second_client: client,
                }
                .into());
            }
            client_fields.insert(server.clone(), client.clone());
            server_fields.insert(client, server);
        }

        Ok(Self {
            server_fields,
            client_fields,
            anchors: self.anchors.clone(),
            use_only_mapped_fields,
        })
    }

    /// Derives a map with one anchor role bound to a server field.
    ///
    /// Binding is additive over the existing table; rebinding a role
    /// replaces its previous target.
    pub fn with_anchor(&self, role: Anchor, server_field: impl Into<String>) -> Self {
        let mut derived = self.clone();
        derived.anchors.insert(role, server_field.into());
        derived
    }

    /// Whether unmapped fields are dropped instead of passed through.
    pub fn use_only_mapped_fields(&self) -> bool {
        self.use_only_mapped_fields
    }

    /// The raw server field a role is bound to, if any.
    ///
    /// This is the anchor table target itself, without the vocabulary
    /// precedence applied by [`FieldMap::field_by_anchor`]. Tree assembly
    /// works on raw server records and needs the raw target.
    pub fn anchor_target(&self, role: Anchor) -> Option<&str> {
        self.anchors.get(&role).map(String::as_str)
    }

    /// Resolves a logical role to its effective field name.
    ///
    /// The anchor table supplies the server field for the role; if that
    /// server field also has a vocabulary entry, the vocabulary (client)
    /// name takes precedence over the raw anchor target.
    pub fn field_by_anchor(&self, role: Anchor) -> Option<&str> {
        let server = self.anchors.get(&role)?;
        match self.client_fields.get(server) {
            Some(client) => Some(client),
            None => Some(server),
        }
    }

    /// Bulk form of [`FieldMap::field_by_anchor`]: resolves every given role,
    /// omitting roles with no binding.
    pub fn fields_by_anchors(&self, roles: &[Anchor]) -> HashMap<Anchor, String> {
        roles
            .iter()
            .filter_map(|role| {
                self.field_by_anchor(*role)
                    .map(|field| (*role, field.to_string()))
            })
            .collect()
    }

    /// Whether a role's anchor target also appears in the vocabulary.
    ///
    /// An anchor only counts as "mapped" when its resolved server field has
    /// an explicit vocabulary entry.
    pub fn is_anchor_mapped(&self, role: Anchor) -> bool {
        self.anchors
            .get(&role)
            .is_some_and(|server| self.client_fields.contains_key(server))
    }

    /// Reads a record value through a role's resolved field name.
    ///
    /// The plain logical key is tried first, then the resolved anchor field,
    /// so payloads may address the identifier either way. Absent fields read
    /// as `None`.
    pub fn field_data_by_anchor<'a>(&self, record: &'a Value, role: Anchor) -> Option<&'a Value> {
        let fields = record.as_object()?;
        if let Some(value) = fields.get(role.as_str()) {
            return Some(value);
        }
        fields.get(self.field_by_anchor(role)?)
    }

    /// Removes a record value through a role's resolved field name.
    ///
    /// Counterpart of [`FieldMap::field_data_by_anchor`], used to strip the
    /// identifier from a payload before dispatch so the stored body never
    /// duplicates it. Returns the removed value, if any.
    pub fn delete_field_data_by_anchor(&self, record: &mut Value, role: Anchor) -> Option<Value> {
        let resolved = self.field_by_anchor(role).map(str::to_string);
        let fields = record.as_object_mut()?;
        if let Some(value) = fields.shift_remove(role.as_str()) {
            return Some(value);
        }
        fields.shift_remove(resolved?.as_str())
    }

    /// Translates a single field name.
    ///
    /// Same precedence as [`FieldMap::map_record`], but names with neither a
    /// vocabulary entry nor an anchor binding are always kept: dropping a
    /// filter or sort field would silently change query semantics.
    pub fn map_field(&self, name: &str, direction: Direction) -> String {
        if let Some(mapped) = self.vocabulary_name(name, direction) {
            return mapped.to_string();
        }
        if let Some(role) = self.anchor_for_field(name) {
            return role.as_str().to_string();
        }
        name.to_string()
    }

    /// Translates a record between the client and server vocabularies.
    ///
    /// Applies recursively: nested objects and collections are translated
    /// before the outer key is renamed. Scalars pass through untouched.
    pub fn map_record(&self, value: &Value, direction: Direction) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.map_record(item, direction))
                    .collect(),
            ),
            Value::Object(fields) => {
                let mut mapped = Map::new();
                for (key, field_value) in fields {
                    let field_value = self.map_record(field_value, direction);
                    if let Some(name) = self.vocabulary_name(key, direction) {
                        mapped.insert(name.to_string(), field_value);
                    } else if let Some(role) = self.anchor_for_field(key) {
                        mapped.insert(role.as_str().to_string(), field_value);
                    } else if !self.use_only_mapped_fields {
                        mapped.insert(key.clone(), field_value);
                    }
                }
                Value::Object(mapped)
            }
            scalar => scalar.clone(),
        }
    }

    /// The explicit vocabulary entry for a key in the given direction.
    fn vocabulary_name(&self, key: &str, direction: Direction) -> Option<&str> {
        let vocabulary = match direction {
            Direction::ToServer => &self.server_fields,
            Direction::ToClient => &self.client_fields,
        };
        vocabulary.get(key).map(String::as_str)
    }

    /// The role a server field is bound to, if any.
    ///
    /// Resolution follows [`Anchor::ALL`] order so a field bound to several
    /// roles resolves deterministically.
    fn anchor_for_field(&self, field: &str) -> Option<Anchor> {
        Anchor::ALL
            .iter()
            .find(|role| {
                self.anchors
                    .get(role)
                    .is_some_and(|target| target == field)
            })
            .copied()
    }
}
