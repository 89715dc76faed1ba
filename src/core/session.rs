//! Session management for a bounded collection of datasets.
//!
//! Insertion order is tab order. Exactly one dataset is active whenever the
//! session is non-empty. Capacity handling is a result enum rather than an
//! error so callers can degrade gracefully: graduated warnings as the
//! collection approaches the limit, a hard reject at the limit.

use tracing::debug;

use crate::core::dataset::Dataset;
use crate::core::types::DatasetId;
use crate::errors::{Error, Result};

/// Default dataset capacity per session.
pub const DEFAULT_MAX_DATASETS: usize = 10;

/// Outcome of [`DatasetSession::add_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddDatasetResult {
    Success,
    /// Added, but the session now holds 8 datasets; surface a warning.
    WarningEightDatasets,
    /// Added, but the session now holds 9 datasets; surface a stronger warning.
    WarningNineDatasets,
    /// Rejected; the collection is unchanged.
    ErrorAtLimit,
}

impl AddDatasetResult {
    /// Whether the dataset was actually added.
    pub fn is_added(&self) -> bool {
        !matches!(self, Self::ErrorAtLimit)
    }
}

/// An ordered collection of datasets with one active member and an optional
/// two-dataset split view.
#[derive(Debug)]
pub struct DatasetSession {
    pub datasets: Vec<Dataset>,
    pub active_dataset_id: Option<DatasetId>,
    pub max_datasets: usize,
    pub split_pane_enabled: bool,
    pub split_pane_datasets: Option<(DatasetId, DatasetId)>,
}

impl Default for DatasetSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSession {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_DATASETS)
    }

    pub fn with_capacity(max_datasets: usize) -> Self {
        Self {
            datasets: Vec::new(),
            active_dataset_id: None,
            max_datasets,
            split_pane_enabled: false,
            split_pane_datasets: None,
        }
    }

    /// Add a dataset, resolving name collisions with a numeric suffix. The
    /// first dataset added to an empty session becomes active.
    pub fn add_dataset(&mut self, mut dataset: Dataset) -> AddDatasetResult {
        if self.datasets.len() >= self.max_datasets {
            return AddDatasetResult::ErrorAtLimit;
        }

        if self.name_taken(&dataset.name) {
            let base = dataset.name.clone();
            let mut suffix = 1usize;
            loop {
                let candidate = format!("{base}_{suffix}");
                if !self.name_taken(&candidate) {
                    debug!(from = %base, to = %candidate, "renamed dataset on collision");
                    dataset.name = candidate;
                    break;
                }
                suffix += 1;
            }
        }

        if self.datasets.is_empty() {
            dataset.is_active = true;
            self.active_dataset_id = Some(dataset.id.clone());
        }
        self.datasets.push(dataset);

        match self.datasets.len() {
            8 => AddDatasetResult::WarningEightDatasets,
            9 => AddDatasetResult::WarningNineDatasets,
            _ => AddDatasetResult::Success,
        }
    }

    /// Remove a dataset by id. Promotes the first remaining dataset to
    /// active if the removed one was active, and disables split-pane if it
    /// was part of the pair. Returns `false` when the id is unknown.
    pub fn remove_dataset(&mut self, id: &DatasetId) -> bool {
        let Some(index) = self.datasets.iter().position(|d| &d.id == id) else {
            return false;
        };
        let removed = self.datasets.remove(index);

        if let Some((a, b)) = &self.split_pane_datasets
            && (a == id || b == id)
        {
            self.split_pane_enabled = false;
            self.split_pane_datasets = None;
        }

        if removed.is_active {
            match self.datasets.first_mut() {
                Some(first) => {
                    first.is_active = true;
                    self.active_dataset_id = Some(first.id.clone());
                }
                None => self.active_dataset_id = None,
            }
        }
        true
    }

    /// Make the dataset with `id` the single active one.
    ///
    /// An unknown id is a programmer error, reported as `DatasetNotFound`.
    pub fn set_active_dataset(&mut self, id: &DatasetId) -> Result<()> {
        if !self.datasets.iter().any(|d| &d.id == id) {
            return Err(Error::DatasetNotFound(id.to_string()));
        }
        for dataset in &mut self.datasets {
            dataset.is_active = &dataset.id == id;
        }
        self.active_dataset_id = Some(id.clone());
        Ok(())
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.is_active)
    }

    pub fn active_dataset_mut(&mut self) -> Option<&mut Dataset> {
        self.datasets.iter_mut().find(|d| d.is_active)
    }

    pub fn get_dataset(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.iter().find(|d| &d.id == id)
    }

    pub fn get_dataset_mut(&mut self, id: &DatasetId) -> Option<&mut Dataset> {
        self.datasets.iter_mut().find(|d| &d.id == id)
    }

    /// Enable the two-dataset split view.
    pub fn enable_split_pane(&mut self, id1: &DatasetId, id2: &DatasetId) -> Result<()> {
        if id1 == id2 {
            return Err(Error::validation(
                "split pane",
                "both panes reference the same dataset",
            ));
        }
        for id in [id1, id2] {
            if self.get_dataset(id).is_none() {
                return Err(Error::DatasetNotFound(id.to_string()));
            }
        }
        self.split_pane_datasets = Some((id1.clone(), id2.clone()));
        self.split_pane_enabled = true;
        Ok(())
    }

    pub fn disable_split_pane(&mut self) {
        self.split_pane_enabled = false;
        self.split_pane_datasets = None;
    }

    fn name_taken(&self, name: &str) -> bool {
        self.datasets.iter().any(|d| d.name == name)
    }
}
