//! Hierarchical data engine.
//!
//! Builds a tree from a flat collection whose records reference their parent
//! by identifier. Construction indexes the records, links every record into
//! its parent's children container, and collects the records whose parent is
//! absent from the index as roots, preserving input order.
//!
//! Two materializations are offered. The static form ([`Tree::root`],
//! [`Tree::forest`]) embeds the complete hierarchy in one pass and suits
//! small or complete datasets. The dynamic form ([`Tree::item_children`])
//! reveals a single level per request, marking non-leaf children with a
//! boolean flag instead of embedding their subtrees — trading round-trips
//! for memory and bandwidth on large hierarchies.
//!
//! [`Tree::branch_elements`] computes the pre-order descendant set of a node
//! and exists solely to materialize the fan-out set of a cascading delete.
//!
//! Construction deep-copies its input; the caller's collection is never
//! observably mutated. Cyclic parent references violate the engine's
//! precondition and are rejected with [`TreeError::CycleDetected`] instead
//! of looping.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::{
    Result,
    constants::{
        DEFAULT_CHILDREN_FIELD, DEFAULT_HAS_CHILDREN_FIELD, DEFAULT_ID_FIELD,
        DEFAULT_PARENT_ID_FIELD, ROOT_TREE_ID,
    },
    mapping::{Anchor, FieldMap},
};

mod errors;
pub use errors::TreeError;


/// Canonical index key for an identifier value.
///
/// Numbers, strings, and booleans normalize to their string form, so `5` and
/// `"5"` address the same node. Non-scalar values are not indexable.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Field names the engine reads and writes on records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFields {
    /// Field holding a record's identifier.
    pub id: String,
    /// Field holding a record's parent reference.
    pub parent_id: String,
    /// Field carrying the boolean "has children" marker in dynamic mode.
    pub has_children: String,
    /// Field carrying a node's children container.
    pub children: String,
}

impl Default for TreeFields {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID_FIELD.to_string(),
            parent_id: DEFAULT_PARENT_ID_FIELD.to_string(),
            has_children: DEFAULT_HAS_CHILDREN_FIELD.to_string(),
            children: DEFAULT_CHILDREN_FIELD.to_string(),
        }
    }
}

impl TreeFields {
    /// Derives the field set from an adapter's anchor table.
    ///
    /// Raw anchor targets are used rather than vocabulary-resolved names:
    /// the engine runs on server-side records before any client-ward
    /// translation. Unbound roles fall back to the defaults.
    pub fn from_anchors(map: &FieldMap) -> Self {
        let defaults = Self::default();
        Self {
            id: map
                .anchor_target(Anchor::Id)
                .map_or(defaults.id, str::to_string),
            parent_id: map
                .anchor_target(Anchor::ParentId)
                .map_or(defaults.parent_id, str::to_string),
            has_children: map
                .anchor_target(Anchor::NodeHasChildren)
                .map_or(defaults.has_children, str::to_string),
            children: map
                .anchor_target(Anchor::NodeChildren)
                .map_or(defaults.children, str::to_string),
        }
    }
}

/// A hierarchy built once per read or delete operation from a flat
/// collection.
///
/// The engine owns a deep copy of the records and a positional child index;
/// the materialized structures returned by the accessors pass ownership to
/// the caller.
#[derive(Debug)]
pub struct Tree {
    fields: TreeFields,
    /// Flat deep copies of the input records, in input order.
    records: Vec<Value>,
    /// Child positions per record position.
    children: Vec<Vec<usize>>,
    /// Positions of records whose parent is absent from the index.
    roots: Vec<usize>,
}

impl Tree {
    /// Builds a hierarchy from a flat collection.
    ///
    /// Records are indexed by identifier; each record whose parent
    /// identifier resolves within the index is linked under that parent,
    /// every other record becomes a root. Input order is preserved among
    /// roots and among siblings.
    ///
    /// # Errors
    /// * [`TreeError::InvalidRecord`] if a collection entry is not an object
    /// * [`TreeError::CycleDetected`] if parent references form a cycle
    pub fn build(records: &[Value], fields: TreeFields) -> Result<Self> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            let record = record
                .as_object()
                .ok_or(TreeError::InvalidRecord { position })?;
            if let Some(key) = record.get(&fields.id).and_then(id_key) {
                index.insert(key, position);
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        let mut roots = Vec::new();
        for (position, record) in records.iter().enumerate() {
            let parent = record
                .get(&fields.parent_id)
                .and_then(id_key)
                .and_then(|key| index.get(&key).copied());
            match parent {
                Some(parent_position) if parent_position != position => {
                    children[parent_position].push(position);
                }
                Some(_) => {
                    return Err(TreeError::CycleDetected {
                        id: node_id(&records[position], &fields),
                    }
                    .into());
                }
                None => roots.push(position),
            }
        }

        // Every record must be reachable from a root; anything left over
        // sits on a parent cycle.
        let mut visited = vec![false; records.len()];
        let mut stack = roots.clone();
        while let Some(position) = stack.pop() {
            if std::mem::replace(&mut visited[position], true) {
                continue;
            }
            stack.extend(children[position].iter().copied());
        }
        if let Some(position) = visited.iter().position(|seen| !seen) {
            return Err(TreeError::CycleDetected {
                id: node_id(&records[position], &fields),
            }
            .into());
        }

        tracing::debug!(
            nodes = records.len(),
            roots = roots.len(),
            "built hierarchy from flat collection"
        );

        Ok(Self {
            fields,
            records: records.to_vec(),
            children,
            roots,
        })
    }

    /// The field names this hierarchy was built with.
    pub fn fields(&self) -> &TreeFields {
        &self.fields
    }

    /// Static form: a single synthetic root wrapping the true roots as its
    /// children container.
    ///
    /// The synthetic root's parent reference mirrors the first true root's
    /// parent value. An empty collection yields a root with an empty
    /// container.
    pub fn root(&self) -> Value {
        let mut node = Map::new();
        if let Some(first) = self.roots.first() {
            let parent = self.records[*first]
                .get(&self.fields.parent_id)
                .cloned()
                .unwrap_or(Value::Null);
            node.insert(self.fields.parent_id.clone(), parent);
        }
        node.insert(self.fields.children.clone(), Value::Array(self.forest()));
        Value::Object(node)
    }

    /// Plain form: the ordered list of true roots, fully materialized, with
    /// no synthetic wrapper.
    pub fn forest(&self) -> Vec<Value> {
        self.roots
            .iter()
            .map(|position| self.assemble(*position))
            .collect()
    }

    /// Pre-order branch traversal: the identified node followed by every
    /// transitive descendant, parent before children, each exactly once.
    ///
    /// Node lookup is a linear scan; this runs once per cascading delete,
    /// not per node.
    ///
    /// # Errors
    /// * [`TreeError::NodeNotFound`] if no record carries the identifier
    pub fn branch_elements(&self, root_id: &str) -> Result<Vec<Value>> {
        let root = self
            .records
            .iter()
            .position(|record| {
                record
                    .get(&self.fields.id)
                    .and_then(id_key)
                    .is_some_and(|key| key == root_id)
            })
            .ok_or_else(|| TreeError::NodeNotFound {
                id: root_id.to_string(),
            })?;

        let mut elements = Vec::new();
        let mut stack = vec![root];
        while let Some(position) = stack.pop() {
            elements.push(self.assemble(position));
            // Reverse keeps siblings in input order off the stack.
            stack.extend(self.children[position].iter().rev().copied());
        }
        Ok(elements)
    }

    /// Dynamic form: a synthetic node holding only the direct children of
    /// `item_id`, one level deep.
    ///
    /// For the reserved [`ROOT_TREE_ID`] sentinel the container holds the
    /// records whose parent is absent from the index. Children that have
    /// descendants of their own carry the boolean has-children marker
    /// instead of a container; deeper levels are never serialized.
    pub fn item_children(&self, item_id: &str) -> Value {
        let mut children = Vec::new();
        for (position, record) in self.records.iter().enumerate() {
            let selected = if item_id == ROOT_TREE_ID {
                self.roots.contains(&position)
            } else {
                record
                    .get(&self.fields.parent_id)
                    .and_then(id_key)
                    .is_some_and(|key| key == item_id)
            };
            if !selected {
                continue;
            }

            let mut child = record.clone();
            if !self.children[position].is_empty()
                && let Some(fields) = child.as_object_mut()
            {
                fields.shift_remove(&self.fields.children);
                fields.insert(self.fields.has_children.clone(), Value::Bool(true));
            }
            children.push(child);
        }

        let mut node = Map::new();
        node.insert(
            self.fields.parent_id.clone(),
            Value::String(item_id.to_string()),
        );
        node.insert(self.fields.children.clone(), Value::Array(children));
        Value::Object(node)
    }

    /// Materializes the subtree rooted at a record position.
    fn assemble(&self, position: usize) -> Value {
        let mut node = self.records[position].clone();
        if !self.children[position].is_empty()
            && let Some(fields) = node.as_object_mut()
        {
            let container: Vec<Value> = self.children[position]
                .iter()
                .map(|child| self.assemble(*child))
                .collect();
            fields.insert(self.fields.children.clone(), Value::Array(container));
        }
        node
    }
}

/// Best-effort identifier for error reporting.
fn node_id(record: &Value, fields: &TreeFields) -> String {
    record
        .get(&fields.id)
        .and_then(id_key)
        .unwrap_or_else(|| "<unidentified>".to_string())
}
