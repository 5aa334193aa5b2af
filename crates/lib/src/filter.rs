//! Read-filter block parsing.
//!
//! A read request may carry a filter block `{fields, filter, sort, limit}`
//! expressed in the client vocabulary. [`Filter::parse`] normalizes the
//! block and [`Filter::map_fields`] translates every field name server-ward,
//! so the storage collaborator always receives filters in its own
//! vocabulary. Enforcement of the filter is the collaborator's concern.

use serde_json::Value;

use crate::mapping::{Direction, FieldMap};

/// Sort mode marking ascending order.
pub const SORT_ASCENDING: &str = "ASC";

/// Sort mode marking descending order.
pub const SORT_DESCENDING: &str = "DESC";

/// One filter or sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    /// The addressed field.
    pub field: String,
    /// The raw mode string, if any.
    pub mode: Option<String>,
    /// True when the mode is a match mask rather than a sort direction.
    pub is_mask: bool,
}

/// A result-window request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub from: Option<u64>,
    pub count: Option<u64>,
}

/// A parsed read-filter block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    /// Fields to project, empty meaning all.
    pub fields: Vec<String>,
    /// Match criteria.
    pub filter: Vec<FilterEntry>,
    /// Sort criteria.
    pub sort: Vec<FilterEntry>,
    /// Result window.
    pub limit: Limit,
}

impl Filter {
    /// Parses a raw filter block.
    ///
    /// `fields` accepts either a comma-separated string (whitespace ignored)
    /// or an array of names. `filter` and `sort` entries carry `{field,
    /// mode}`; a mode other than [`SORT_ASCENDING`]/[`SORT_DESCENDING`] is
    /// treated as a match mask. Unknown block keys are ignored.
    pub fn parse(block: &Value) -> Self {
        let mut parsed = Self::default();
        let Some(block) = block.as_object() else {
            return parsed;
        };

        if let Some(fields) = block.get("fields") {
            parsed.fields = match fields {
                Value::String(list) => list
                    .split(',')
                    .map(|name| name.split_whitespace().collect::<String>())
                    .filter(|name| !name.is_empty())
                    .collect(),
                Value::Array(names) => names
                    .iter()
                    .filter_map(|name| name.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
        }
        if let Some(criteria) = block.get("filter").and_then(Value::as_array) {
            parsed.filter = criteria.iter().filter_map(parse_entry).collect();
        }
        if let Some(criteria) = block.get("sort").and_then(Value::as_array) {
            parsed.sort = criteria.iter().filter_map(parse_entry).collect();
        }
        if let Some(limit) = block.get("limit").and_then(Value::as_object) {
            parsed.limit = Limit {
                from: limit.get("from").and_then(Value::as_u64),
                count: limit.get("count").and_then(Value::as_u64),
            };
        }

        parsed
    }

    /// Translates every field name server-ward through the mapping engine.
    pub fn map_fields(&self, map: &FieldMap) -> Self {
        let map_entry = |entry: &FilterEntry| FilterEntry {
            field: map.map_field(&entry.field, Direction::ToServer),
            mode: entry.mode.clone(),
            is_mask: entry.is_mask,
        };
        Self {
            fields: self
                .fields
                .iter()
                .map(|field| map.map_field(field, Direction::ToServer))
                .collect(),
            filter: self.filter.iter().map(map_entry).collect(),
            sort: self.sort.iter().map(map_entry).collect(),
            limit: self.limit,
        }
    }
}

fn parse_entry(criterion: &Value) -> Option<FilterEntry> {
    let field = criterion.get("field")?.as_str()?.to_string();
    let mode = criterion
        .get("mode")
        .and_then(Value::as_str)
        .map(str::to_string);
    let is_mask = mode
        .as_deref()
        .is_some_and(|mode| mode != SORT_ASCENDING && mode != SORT_DESCENDING);
    Some(FilterEntry {
        field,
        mode,
        is_mask,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_fields_from_string_and_array() {
        let from_string = Filter::parse(&json!({"fields": "id, title , note"}));
        assert_eq!(from_string.fields, ["id", "title", "note"]);

        let from_array = Filter::parse(&json!({"fields": ["id", "title"]}));
        assert_eq!(from_array.fields, ["id", "title"]);
    }

    #[test]
    fn test_parse_sort_and_mask_modes() {
        let filter = Filter::parse(&json!({
            "filter": [{"field": "title", "mode": "abc%"}],
            "sort": [{"field": "order", "mode": "ASC"}]
        }));

        assert!(filter.filter[0].is_mask);
        assert!(!filter.sort[0].is_mask);
        assert_eq!(filter.sort[0].mode.as_deref(), Some(SORT_ASCENDING));
    }

    #[test]
    fn test_parse_limit_and_ignores_unknown_keys() {
        let filter = Filter::parse(&json!({
            "limit": {"from": 10, "count": 25},
            "unknown": {"ignored": true}
        }));

        assert_eq!(filter.limit.from, Some(10));
        assert_eq!(filter.limit.count, Some(25));
        assert!(filter.fields.is_empty());
    }

    #[test]
    fn test_map_fields_translates_server_ward() {
        let map = FieldMap::new()
            .with_vocabulary([("title", "t_title")], false)
            .unwrap();
        let filter = Filter::parse(&json!({
            "fields": "title,note",
            "filter": [{"field": "title", "mode": "a%"}],
            "sort": [{"field": "title", "mode": "DESC"}]
        }));

        let mapped = filter.map_fields(&map);

        assert_eq!(mapped.fields, ["t_title", "note"]);
        assert_eq!(mapped.filter[0].field, "t_title");
        assert_eq!(mapped.sort[0].field, "t_title");
    }
}
