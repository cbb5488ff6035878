use std::collections::{BTreeSet, HashMap};

use crate::{
    models::{Book, BookId, Recommendation},
    services::ranking::rank_by_weight,
};

/// A recommended book and the favorites responsible for it
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionEntry {
    /// `None` while the catalog lookup is in flight (or never resolved)
    pub item: Option<Book>,
    pub source_ids: BTreeSet<BookId>,
}

/// Read-only view of one entry, as exposed to callers
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub item_id: BookId,
    pub item: Option<Book>,
    pub source_ids: Vec<BookId>,
}

/// Maps recommended book ids to their attribution.
///
/// Entries are kept in ranked order: descending source count, ties in the
/// order of the previous ranking (new entries start at the end). The order is
/// recomputed after every mutation. An entry never exists with an empty
/// source set.
#[derive(Debug, Default)]
pub struct AttributionTable {
    entries: HashMap<BookId, AttributionEntry>,
    order: Vec<BookId>,
}

impl AttributionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&AttributionEntry> {
        self.entries.get(item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    /// Records `source_id` as a reason for recommending `item_id`.
    ///
    /// Returns `true` when a new pending entry was created and its record
    /// still has to be fetched. Attributing an existing source is a no-op.
    pub fn attribute(&mut self, item_id: &str, source_id: &str) -> bool {
        let created = match self.entries.get_mut(item_id) {
            Some(entry) => {
                if !entry.source_ids.insert(source_id.to_string()) {
                    return false;
                }
                false
            }
            None => {
                self.entries.insert(
                    item_id.to_string(),
                    AttributionEntry {
                        item: None,
                        source_ids: BTreeSet::from([source_id.to_string()]),
                    },
                );
                self.order.push(item_id.to_string());
                true
            }
        };
        self.rerank();
        created
    }

    /// Drops `source_id` from every entry, deleting entries left without sources.
    ///
    /// Returns the ids of deleted entries.
    pub fn detach_source(&mut self, source_id: &str) -> Vec<BookId> {
        let mut touched = false;
        let mut orphaned = Vec::new();

        for (item_id, entry) in self.entries.iter_mut() {
            if entry.source_ids.remove(source_id) {
                touched = true;
                if entry.source_ids.is_empty() {
                    orphaned.push(item_id.clone());
                }
            }
        }

        for item_id in &orphaned {
            self.entries.remove(item_id);
        }
        if !orphaned.is_empty() {
            self.order.retain(|id| self.entries.contains_key(id));
        }
        if touched {
            self.rerank();
        }

        orphaned
    }

    /// Deletes an entry whatever its state; `true` if it existed
    pub fn remove(&mut self, item_id: &str) -> bool {
        if self.entries.remove(item_id).is_none() {
            return false;
        }
        self.order.retain(|id| id != item_id);
        true
    }

    /// Fills in the record of an existing entry.
    ///
    /// Returns `false` when the entry is gone; a late record never
    /// re-creates an entry.
    pub fn resolve(&mut self, item_id: &str, book: Book) -> bool {
        match self.entries.get_mut(item_id) {
            Some(entry) => {
                entry.item = Some(book);
                true
            }
            None => false,
        }
    }

    /// Resolved entries in ranked order
    pub fn ranked(&self) -> Vec<Recommendation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter_map(|entry| {
                entry.item.as_ref().map(|book| Recommendation {
                    book: book.clone(),
                    source_count: entry.source_ids.len(),
                })
            })
            .collect()
    }

    /// All entries, pending included, in ranked order
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.order
            .iter()
            .filter_map(|id| {
                self.entries.get(id).map(|entry| EntrySnapshot {
                    item_id: id.clone(),
                    item: entry.item.clone(),
                    source_ids: entry.source_ids.iter().cloned().collect(),
                })
            })
            .collect()
    }

    fn rerank(&mut self) {
        let order = std::mem::take(&mut self.order);
        let entries = &self.entries;
        self.order = rank_by_weight(order, |id| {
            entries.get(id).map_or(0, |entry| entry.source_ids.len())
        });
    }
}
