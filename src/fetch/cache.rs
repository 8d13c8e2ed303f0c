use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::process::RecordTable;

/// `(location, row cap)` as given by the caller.
pub type CacheKey = (String, Option<usize>);

/// Session-local memo of loaded tables. Entries are never evicted.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<CacheKey, Arc<RecordTable>>,
    hits: usize,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, location: &str, row_cap: Option<usize>) -> Option<Arc<RecordTable>> {
        let hit = self
            .entries
            .get(&(location.to_string(), row_cap))
            .map(Arc::clone);
        if hit.is_some() {
            self.hits += 1;
            debug!(location, ?row_cap, hits = self.hits, "cache hit");
        }
        hit
    }

    pub fn insert(
        &mut self,
        location: &str,
        row_cap: Option<usize>,
        table: RecordTable,
    ) -> Arc<RecordTable> {
        let table = Arc::new(table);
        self.entries
            .insert((location.to_string(), row_cap), Arc::clone(&table));
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
