//! Constants used throughout the Dataport library.
//!
//! This module provides central definitions for reserved identifiers and
//! default field names used by the mapping and tree engines.

/// Reserved identifier for "no parent": a dynamic-mode request carrying this
/// id asks for the top level of the hierarchy.
pub const ROOT_TREE_ID: &str = "0";

/// Default server field holding a record's identifier.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Default server field holding a record's parent reference.
pub const DEFAULT_PARENT_ID_FIELD: &str = "parent_id";

/// Default server field holding a record's ordering position.
pub const DEFAULT_ORDER_FIELD: &str = "order";

/// Default field carrying the boolean "has children" marker in dynamic mode.
pub const DEFAULT_HAS_CHILDREN_FIELD: &str = "children";

/// Default field carrying a tree node's children container.
pub const DEFAULT_CHILDREN_FIELD: &str = "data";

/// Payload field naming the requested action.
pub const ACTION_FIELD: &str = "action";

/// Payload field carrying the record body.
pub const DATA_FIELD: &str = "data";

/// Payload field carrying the read filter block.
pub const FILTER_FIELD: &str = "filter";

/// Payload body field naming the move target for `move` actions.
pub const MOVE_TARGET_FIELD: &str = "move_id";
