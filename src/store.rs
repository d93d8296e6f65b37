//! In-memory transactional record store.
//!
//! Holds named tables of JSON records and offers active-record style
//! `find`/`update` plus snapshot transactions. Transactions are
//! store-wide, like a single database connection: `begin` pushes a
//! snapshot of every table, `rollback` restores it, `commit` drops it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CrudError, Result};
use crate::payload::{Payload, ResourceId};
use crate::transaction::TransactionManager;
use crate::validation::Rules;

/// Fields the store manages itself; never mass-assignable.
const RESERVED_FIELDS: [&str; 2] = ["id", "updated_at"];

/// A persisted row.
///
/// Serializes flat: `{"id": 42, "name": "Bob", "updated_at": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: ResourceId,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    /// Set on every update that changes an attribute, when the table
    /// keeps timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
            updated_at: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}

/// Definition of a table, as found in a seed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Mass-assignable fields. `None` allows every field except `id` and
    /// `updated_at`.
    #[serde(default)]
    pub fillable: Option<Vec<String>>,

    /// Whether updates stamp `updated_at`.
    #[serde(default)]
    pub timestamps: bool,

    /// Reject every update with 403 before anything is written.
    #[serde(default)]
    pub read_only: bool,

    /// Fields whose values may not be shared by two records. Checked after
    /// the update is applied.
    #[serde(default)]
    pub unique: Vec<String>,

    /// Validation rules for updates.
    #[serde(default)]
    pub rules: Rules,

    /// Initial rows.
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Seed document: table name to definition.
pub type Seed = BTreeMap<String, TableDefinition>;

#[derive(Debug, Clone, Default)]
struct Table {
    records: BTreeMap<ResourceId, Record>,
    fillable: Option<Vec<String>>,
    timestamps: bool,
    read_only: bool,
    unique: Vec<String>,
    rules: Rules,
}

impl From<TableDefinition> for Table {
    fn from(def: TableDefinition) -> Self {
        Self {
            records: def
                .records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
            fillable: def.fillable,
            timestamps: def.timestamps,
            read_only: def.read_only,
            unique: def.unique,
            rules: def.rules,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: BTreeMap<String, Table>,
    snapshots: Vec<BTreeMap<String, Table>>,
}

impl StoreState {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| CrudError::UnknownResource(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| CrudError::UnknownResource(name.to_string()))
    }
}

/// Shared handle to an in-memory store.
///
/// Cheaply cloneable; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a seed document.
    pub fn from_seed(seed: Seed) -> Self {
        let tables = seed
            .into_iter()
            .map(|(name, def)| (name, Table::from(def)))
            .collect();
        Self {
            state: Arc::new(RwLock::new(StoreState {
                tables,
                snapshots: Vec::new(),
            })),
        }
    }

    /// Load a seed document from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid seed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seed: Seed = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.display(), tables = seed.len(), "loaded seed");
        Ok(Self::from_seed(seed))
    }

    /// Builder-style table definition.
    pub fn with_table(self, name: &str, def: TableDefinition) -> Self {
        let mut state = self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!(table = name, "store lock poisoned, defining table anyway");
            poisoned.into_inner()
        });
        state.tables.insert(name.to_string(), Table::from(def));
        drop(state);
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| CrudError::Transaction("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| CrudError::Transaction("store lock poisoned".to_string()))
    }

    /// Names of all tables.
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.tables.keys().cloned().collect())
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.read()
            .map(|state| state.tables.contains_key(name))
            .unwrap_or(false)
    }

    /// Validation rules configured for a table.
    pub fn rules(&self, table: &str) -> Result<Rules> {
        Ok(self.read()?.table(table)?.rules.clone())
    }

    /// Whether the table refuses updates.
    pub fn is_read_only(&self, table: &str) -> Result<bool> {
        Ok(self.read()?.table(table)?.read_only)
    }

    /// Unique fields of `record` whose value another record already holds.
    pub fn conflicts(&self, table: &str, record: &Record) -> Result<Vec<String>> {
        let state = self.read()?;
        let table = state.table(table)?;

        let taken = table
            .unique
            .iter()
            .filter(|field| {
                record.get(field).is_some_and(|value| {
                    !value.is_null()
                        && table
                            .records
                            .values()
                            .any(|other| other.id != record.id && other.get(field) == Some(value))
                })
            })
            .cloned()
            .collect();
        Ok(taken)
    }

    /// Find a record by id.
    pub fn find(&self, table: &str, id: &ResourceId) -> Result<Option<Record>> {
        Ok(self.read()?.table(table)?.records.get(id).cloned())
    }

    /// All records of a table, ordered by id.
    pub fn records(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.read()?.table(table)?.records.values().cloned().collect())
    }

    /// Insert or replace a record.
    pub fn insert(&self, table: &str, record: Record) -> Result<()> {
        let mut state = self.write()?;
        state
            .table_mut(table)?
            .records
            .insert(record.id.clone(), record);
        Ok(())
    }

    /// Remove a record, returning it if it existed.
    pub fn delete(&self, table: &str, id: &ResourceId) -> Result<Option<Record>> {
        let mut state = self.write()?;
        Ok(state.table_mut(table)?.records.remove(id))
    }

    /// Mass-assign the payload to a stored record.
    ///
    /// Fields outside the table's fillable list, `id` and `updated_at` are
    /// ignored.
    /// Returns `false` if the record no longer exists. On success the
    /// caller's copy is refreshed from the store.
    #[tracing::instrument(skip(self, record, payload), fields(id = %record.id))]
    pub fn update(&self, table: &str, record: &mut Record, payload: &Payload) -> Result<bool> {
        let mut state = self.write()?;
        let Table {
            records,
            fillable,
            timestamps,
            ..
        } = state.table_mut(table)?;

        let Some(stored) = records.get_mut(&record.id) else {
            tracing::debug!("record vanished before update");
            return Ok(false);
        };

        let mut dirty = false;
        for (field, value) in payload.iter() {
            let assignable = !RESERVED_FIELDS.contains(&field.as_str())
                && fillable
                    .as_ref()
                    .map_or(true, |allowed| allowed.iter().any(|f| f == field));
            if !assignable {
                tracing::trace!(%field, "ignoring non-fillable field");
                continue;
            }
            if stored.attributes.get(field) != Some(value) {
                stored.attributes.insert(field.clone(), value.clone());
                dirty = true;
            }
        }

        if dirty && *timestamps {
            stored.updated_at = Some(Utc::now());
        }

        *record = stored.clone();
        Ok(true)
    }

    /// Number of open (possibly nested) transactions.
    pub fn transaction_level(&self) -> usize {
        self.read().map(|state| state.snapshots.len()).unwrap_or(0)
    }
}

impl TransactionManager for MemoryStore {
    fn begin(&self) -> Result<()> {
        let mut state = self.write()?;
        let snapshot = state.tables.clone();
        state.snapshots.push(snapshot);
        tracing::trace!(level = state.snapshots.len(), "begin");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.write()?;
        state
            .snapshots
            .pop()
            .ok_or_else(|| CrudError::Transaction("commit without an open transaction".into()))?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut state = self.write()?;
        let snapshot = state
            .snapshots
            .pop()
            .ok_or_else(|| CrudError::Transaction("rollback without an open transaction".into()))?;
        state.tables = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::PoisonError;

    fn users() -> MemoryStore {
        MemoryStore::new().with_table(
            "users",
            TableDefinition {
                fillable: Some(vec!["name".to_string(), "email".to_string()]),
                timestamps: true,
                records: vec![Record::new(42).with("name", "Alice").with("role", "admin")],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_find_existing_and_missing() {
        let store = users();
        let found = store.find("users", &ResourceId::Int(42)).unwrap();
        assert_eq!(found.unwrap().get("name"), Some(&json!("Alice")));
        assert!(store.find("users", &ResourceId::Int(999)).unwrap().is_none());
    }

    #[test]
    fn test_find_unknown_table_fails() {
        let store = users();
        let result = store.find("posts", &ResourceId::Int(1));
        assert!(matches!(result, Err(CrudError::UnknownResource(t)) if t == "posts"));
    }

    #[test]
    fn test_update_respects_fillable() {
        let store = users();
        let mut record = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        let payload = Payload::new()
            .with("name", "Bob")
            .with("role", "root")
            .with("id", 7);

        assert!(store.update("users", &mut record, &payload).unwrap());

        assert_eq!(record.id, ResourceId::Int(42));
        assert_eq!(record.get("name"), Some(&json!("Bob")));
        assert_eq!(record.get("role"), Some(&json!("admin")));
        assert!(record.updated_at.is_some());

        let stored = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn test_update_never_assigns_updated_at() {
        let store = MemoryStore::new().with_table(
            "posts",
            TableDefinition {
                timestamps: true,
                records: vec![Record::new(1).with("title", "a")],
                ..Default::default()
            },
        );
        let mut record = store.find("posts", &ResourceId::Int(1)).unwrap().unwrap();
        let payload = Payload::new()
            .with("updated_at", "not-a-date")
            .with("title", "b");

        assert!(store.update("posts", &mut record, &payload).unwrap());
        assert!(record.get("updated_at").is_none());
        assert!(record.updated_at.is_some());

        let raw = serde_json::to_string(&record).unwrap();
        assert_eq!(raw.matches("updated_at").count(), 1);
        let parsed: Record = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_conflicts_reports_taken_unique_values() {
        let store = MemoryStore::new().with_table(
            "users",
            TableDefinition {
                unique: vec!["email".to_string(), "nick".to_string()],
                records: vec![
                    Record::new(1).with("email", "a@example.com").with("nick", Value::Null),
                    Record::new(2).with("email", "b@example.com").with("nick", Value::Null),
                ],
                ..Default::default()
            },
        );

        let own = store.find("users", &ResourceId::Int(1)).unwrap().unwrap();
        assert!(store.conflicts("users", &own).unwrap().is_empty());

        let clash = Record::new(1).with("email", "b@example.com").with("nick", Value::Null);
        assert_eq!(store.conflicts("users", &clash).unwrap(), vec!["email"]);
    }

    #[test]
    fn test_read_only_flag() {
        let store = MemoryStore::new()
            .with_table("audit", TableDefinition { read_only: true, ..Default::default() })
            .with_table("notes", TableDefinition::default());
        assert!(store.is_read_only("audit").unwrap());
        assert!(!store.is_read_only("notes").unwrap());
        assert!(store.is_read_only("missing").is_err());
    }

    #[test]
    fn test_with_table_recovers_poisoned_lock() {
        let store = users();
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.state.write().unwrap();
            panic!("poison the store lock");
        })
        .join();
        assert!(store.table_names().is_err());

        let store = store.with_table("posts", TableDefinition::default());
        let state = store.state.read().unwrap_or_else(PoisonError::into_inner);
        assert!(state.tables.contains_key("posts"));
    }

    #[test]
    fn test_update_without_changes_keeps_timestamp() {
        let store = users();
        let mut record = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        let payload = Payload::new().with("name", "Alice");

        assert!(store.update("users", &mut record, &payload).unwrap());
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn test_update_vanished_record_returns_false() {
        let store = users();
        let mut record = Record::new(999);
        let payload = Payload::new().with("name", "Bob");
        assert!(!store.update("users", &mut record, &payload).unwrap());
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let store = users();
        store.begin().unwrap();
        assert_eq!(store.transaction_level(), 1);

        let mut record = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        store
            .update("users", &mut record, &Payload::new().with("name", "Bob"))
            .unwrap();
        store.rollback().unwrap();

        assert_eq!(store.transaction_level(), 0);
        let stored = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn test_commit_keeps_changes() {
        let store = users();
        store.begin().unwrap();
        let mut record = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        store
            .update("users", &mut record, &Payload::new().with("name", "Bob"))
            .unwrap();
        store.commit().unwrap();

        let stored = store.find("users", &ResourceId::Int(42)).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Bob")));
    }

    #[test]
    fn test_nested_rollback_only_undoes_inner() {
        let store = users();
        store.begin().unwrap();
        store.insert("users", Record::new(1).with("name", "outer")).unwrap();
        store.begin().unwrap();
        store.insert("users", Record::new(2).with("name", "inner")).unwrap();
        store.rollback().unwrap();
        store.commit().unwrap();

        assert!(store.find("users", &ResourceId::Int(1)).unwrap().is_some());
        assert!(store.find("users", &ResourceId::Int(2)).unwrap().is_none());
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let store = users();
        assert!(matches!(store.commit(), Err(CrudError::Transaction(_))));
        assert!(matches!(store.rollback(), Err(CrudError::Transaction(_))));
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record::new(42).with("name", "Bob");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"id": 42, "name": "Bob"})
        );

        let parsed: Record =
            serde_json::from_value(json!({"id": "abc", "title": "Hi"})).unwrap();
        assert_eq!(parsed.id, ResourceId::Str("abc".to_string()));
        assert_eq!(parsed.get("title"), Some(&json!("Hi")));
    }

    #[test]
    fn test_seed_document_parses() {
        let seed: Seed = serde_json::from_value(json!({
            "users": {
                "fillable": ["name"],
                "timestamps": true,
                "unique": ["name"],
                "rules": {"name": ["required", "string"]},
                "records": [{"id": 1, "name": "Ann"}]
            },
            "tags": {}
        }))
        .unwrap();

        let store = MemoryStore::from_seed(seed);
        assert_eq!(store.table_names().unwrap(), vec!["tags", "users"]);
        assert!(!store.rules("users").unwrap().is_empty());
        assert_eq!(store.records("users").unwrap().len(), 1);
    }
}
