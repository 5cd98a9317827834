//! Search criteria and the boolean query string built from them.
//!
//! A [`Criteria`] is an ANDed set of field constraints. Values are passed to
//! the index verbatim: OR/AND grouping, `*`/`?` wildcards and `/regex/`
//! syntax are the index's business, not ours. A field name with a leading
//! `-` becomes a negated clause.
//!
//! The reserved fields (`retracted`, `latest`, `replica`, `data_node`) are
//! overwritten by the resolver at fixed stages through the `with_*`
//! transformations below, which always return a new value. Negating a
//! reserved field (for example `-replica`) is not supported: the negated
//! clause is emitted as given next to the forced one and the result is
//! whatever the index makes of the contradiction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Query matching every File record in the index.
pub const MATCH_ALL_QUERY: &str = "*:*";

/// Field marking withdrawn dataset versions.
pub const RETRACTED_FIELD: &str = "retracted";
/// Field marking the newest version of a dataset.
pub const LATEST_FIELD: &str = "latest";
/// Field distinguishing canonical originals from replicas.
pub const REPLICA_FIELD: &str = "replica";
/// Field naming the data node serving a record.
pub const DATA_NODE_FIELD: &str = "data_node";

/// An ANDed group of field constraints plus an optional data node preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// Field name to value expression.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Skipped entirely when set (config-file convenience).
    #[serde(default)]
    pub disabled: bool,
    /// Data nodes to prefer, most preferred first. Exact host names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_node_priority: Vec<String>,
    /// Offset of the first canonical original to fetch; earlier matches are
    /// neither counted nor downloaded.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start: usize,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl Criteria {
    /// Creates an empty criteria, which matches every file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a criteria from `(field, value)` pairs.
    #[must_use]
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Returns a copy with `field` set to `value`, replacing any previous value.
    #[must_use]
    pub fn with_field(&self, field: &str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.fields.insert(field.to_string(), value.into());
        next
    }

    /// Returns a copy with the given data node priority list.
    #[must_use]
    pub fn with_priority(&self, priority: Vec<String>) -> Self {
        let mut next = self.clone();
        next.data_node_priority = priority;
        next
    }

    /// Returns a copy restricted to the newest, non-retracted version of each file.
    #[must_use]
    pub fn canonical(&self) -> Self {
        self.with_field(RETRACTED_FIELD, "false")
            .with_field(LATEST_FIELD, "true")
    }

    /// Returns a copy selecting replicas (`true`) or canonical originals (`false`).
    #[must_use]
    pub fn with_replica(&self, replica: bool) -> Self {
        self.with_field(REPLICA_FIELD, replica.to_string())
    }

    /// Returns a copy restricted to an OR of exactly the given data nodes.
    #[must_use]
    pub fn with_data_nodes(&self, nodes: &[String]) -> Self {
        let value = nodes
            .iter()
            .map(|node| format!("\"{node}\""))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.with_field(DATA_NODE_FIELD, value)
    }

    /// Whether this criteria currently selects replicas.
    #[must_use]
    pub fn selects_replicas(&self) -> bool {
        self.fields
            .get(REPLICA_FIELD)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    /// Builds the boolean query string for this criteria.
    #[must_use]
    pub fn query(&self) -> String {
        build_query(&self.fields)
    }
}

/// Builds a boolean query ANDing one clause per field.
///
/// Each field is emitted as `field:(value)`; a leading `-` on the field name
/// emits `NOT field:(value)`. An empty mapping yields [`MATCH_ALL_QUERY`], and
/// a mapping holding only negated fields is anchored on it so the index has
/// a positive set to subtract from.
#[must_use]
pub fn build_query(fields: &BTreeMap<String, String>) -> String {
    if fields.is_empty() {
        return MATCH_ALL_QUERY.to_string();
    }

    let mut clauses = Vec::with_capacity(fields.len() + 1);
    let mut has_positive = false;
    for (field, value) in fields {
        match field.strip_prefix('-') {
            Some(negated) => clauses.push(format!("NOT {negated}:({value})")),
            None => {
                has_positive = true;
                clauses.push(format!("{field}:({value})"));
            }
        }
    }
    if !has_positive {
        clauses.insert(0, MATCH_ALL_QUERY.to_string());
    }
    clauses.join(" AND ")
}
