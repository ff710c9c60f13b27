use crate::model::{ColumnMap, QueryParameter, RelationshipSet, Sproc, SprocDefinition, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// SchemaSnapshot
///
/// Persisted form of a schema cache. Maps are keyed by table full name
/// (or procedure name) and serialize in key order.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub primary_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnMap>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipSet>,
    #[serde(default)]
    pub sprocs: Vec<Sproc>,
    #[serde(default)]
    pub sprocs_params: BTreeMap<String, Vec<QueryParameter>>,
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<SprocDefinition>>,
    #[serde(default)]
    pub individuals: Vec<String>,
    #[serde(default)]
    pub is_offline: bool,
}
