use crate::error::{FormDbError, Result};
use crate::query::{self, QueryParams, QueryResult};
use crate::record::{IdStrategy, Payload, Record};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

/// The in-memory owner of all records.
///
/// Records are kept in insertion order, which is also the tie-break order
/// for sorting. Mutations take `&mut self`; callers sharing a store between
/// threads wrap it in a lock so that queries only ever see a consistent
/// collection.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    config: StoreConfig,
    last_created: Option<DateTime<Utc>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        RecordStore {
            config,
            ..Self::default()
        }
    }

    /// Build a store from existing records, e.g. an exported snapshot.
    /// Ids must be unique; records keep their given order and timestamps.
    pub fn load(config: StoreConfig, records: Vec<Record>) -> Result<Self> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(FormDbError::Payload(format!(
                    "duplicate record id '{}'",
                    record.id
                )));
            }
        }

        let last_created = records.iter().map(|r| r.created_at).max();
        Ok(RecordStore {
            records,
            config,
            last_created,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// All records in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a new record. Id and timestamp are assigned here.
    pub fn append(&mut self, data: Payload) -> Record {
        let record = Record {
            id: self.next_id(),
            created_at: self.next_timestamp(),
            data,
        };
        log::debug!("Appended record {}", record.id);
        self.records.push(record.clone());
        record
    }

    /// Get a record by id
    pub fn get(&self, id: &str) -> Result<&Record> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| FormDbError::not_found(id))
    }

    /// Shallow-merge `partial` into the record's data. No validation.
    pub fn update(&mut self, id: &str, partial: Payload) -> Result<Record> {
        self.update_checked(id, partial, |_| Ok(()))
    }

    /// Shallow-merge `partial` into the record's data, committing only if
    /// `check` accepts the merged payload.
    pub fn update_checked<F>(&mut self, id: &str, partial: Payload, check: F) -> Result<Record>
    where
        F: FnOnce(&Payload) -> Result<()>,
    {
        let index = self.position(id)?;

        let mut merged = self.records[index].clone();
        merged.merge(partial);
        check(&merged.data)?;

        self.records[index] = merged.clone();
        log::debug!("Updated record {id}");
        Ok(merged)
    }

    /// Remove a record, returning it
    pub fn delete(&mut self, id: &str) -> Result<Record> {
        let index = self.position(id)?;
        let removed = self.records.remove(index);
        log::debug!("Deleted record {id}");
        Ok(removed)
    }

    /// Run the query engine over the current collection
    pub fn query(&self, params: &QueryParams) -> QueryResult {
        query::query(&self.records, params)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| FormDbError::not_found(id))
    }

    fn next_id(&self) -> String {
        loop {
            let id = self.config.id_strategy.generate();
            if !self.records.iter().any(|r| r.id == id) {
                return id;
            }
        }
    }

    /// Current time at the wire's millisecond resolution, never earlier
    /// than the previously assigned timestamp.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(3);
        let ts = match self.last_created {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created = Some(ts);
        ts
    }
}
