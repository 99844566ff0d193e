//! In-memory report cache.
//!
//! A [`ReportStore`] holds one snapshot of one backend collection. Reloads
//! replace the whole snapshot at once: the fetch completes first, then the
//! new vector and its index are swapped in together. A failed fetch leaves
//! the previous snapshot untouched.

use std::collections::HashMap;

use log::{info, warn};

use crate::backend::{Backend, Collection};
use crate::error::Result;
use crate::report::{Report, ReportId};

/// Ordered, id-indexed snapshot of a report collection.
#[derive(Debug, Clone)]
pub struct ReportStore {
    collection: Collection,
    reports: Vec<Report>,
    index: HashMap<ReportId, usize>,
    loaded: bool,
}

impl ReportStore {
    /// Create an empty store for a collection. Nothing is fetched yet.
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            reports: Vec::new(),
            index: HashMap::new(),
            loaded: false,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Fetch the collection and replace the snapshot.
    ///
    /// On failure the previous snapshot is kept and the error is returned,
    /// so a failed reload is never confused with an empty collection.
    pub async fn reload<B: Backend>(&mut self, backend: &B) -> Result<&[Report]> {
        let fetched = backend.fetch_reports(self.collection).await;
        self.apply_fetch(fetched)
    }

    /// Apply the outcome of a fetch issued elsewhere (e.g. batched with
    /// other page requests). Same semantics as [`ReportStore::reload`].
    pub fn apply_fetch(&mut self, fetched: Result<Vec<Report>>) -> Result<&[Report]> {
        match fetched {
            Ok(reports) => {
                info!(
                    "[ReportStore] Loaded {} {:?} reports",
                    reports.len(),
                    self.collection
                );
                self.replace(reports);
                Ok(&self.reports)
            }
            Err(e) => {
                warn!(
                    "[ReportStore] Reload of {:?} failed, keeping {} cached reports: {}",
                    self.collection,
                    self.reports.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Swap in a new snapshot.
    ///
    /// If the backend repeats an id, the first occurrence wins.
    pub fn replace(&mut self, reports: Vec<Report>) {
        let mut index = HashMap::with_capacity(reports.len());
        let mut kept = Vec::with_capacity(reports.len());
        for report in reports {
            if index.contains_key(&report.id) {
                warn!("[ReportStore] Duplicate report id {} ignored", report.id);
                continue;
            }
            index.insert(report.id.clone(), kept.len());
            kept.push(report);
        }
        self.reports = kept;
        self.index = index;
        self.loaded = true;
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.index.get(id).map(|&i| &self.reports[i])
    }

    pub fn contains(&self, id: &ReportId) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ReportId> {
        self.reports.iter().map(|r| &r.id)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Whether a snapshot has ever been loaded successfully.
    pub fn loaded(&self) -> bool {
        self.loaded
    }
}
