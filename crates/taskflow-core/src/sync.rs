use std::fmt;

use taskflow_shared::{TaskDto, TaskQuery};
use tracing::{debug, error, instrument};

use crate::client::ServiceError;
use crate::filter::FilterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Matches the current filter; drives the main list.
    Filtered,
    /// Unfiltered; drives sidebar counts only.
    Complete,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered => f.write_str("filtered"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

/// Issued when a fetch starts and handed back when it resolves. The
/// generation decides whether the result may still be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    dataset: Dataset,
    generation: u64,
    query: TaskQuery,
}

impl FetchTicket {
    pub(crate) fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    /// A newer fetch for the same dataset was issued; the result was dropped.
    Superseded,
    /// The previous collection was kept.
    Failed(ServiceError),
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Loading,
    Empty,
    Stale(String),
    Ready,
}

#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    tasks: Vec<TaskDto>,
    issued: u64,
    loaded: bool,
    last_error: Option<String>,
}

impl TaskCollection {
    pub fn tasks(&self) -> &[TaskDto] {
        &self.tasks
    }

    /// True once any fetch has been installed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.issued
    }

    fn install(&mut self, tasks: Vec<TaskDto>) {
        self.tasks = tasks;
        self.loaded = true;
        self.last_error = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    filtered: TaskCollection,
    complete: TaskCollection,
    loading: bool,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtered(&self) -> &TaskCollection {
        &self.filtered
    }

    pub fn complete(&self) -> &TaskCollection {
        &self.complete
    }

    /// Set only while the latest filtered fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn display(&self) -> DisplayState {
        if self.loading {
            DisplayState::Loading
        } else if let Some(message) = self.filtered.last_error() {
            DisplayState::Stale(message.to_string())
        } else if self.filtered.tasks.is_empty() {
            DisplayState::Empty
        } else {
            DisplayState::Ready
        }
    }

    #[instrument(skip(self, filter))]
    pub fn begin_filtered(&mut self, filter: &FilterState) -> FetchTicket {
        let generation = self.filtered.issue();
        self.loading = true;
        let query = filter.query();
        debug!(generation, query = ?query.pairs(), "issuing filtered fetch");

        FetchTicket {
            dataset: Dataset::Filtered,
            generation,
            query,
        }
    }

    #[instrument(skip(self))]
    pub fn begin_all(&mut self) -> FetchTicket {
        let generation = self.complete.issue();
        debug!(generation, "issuing complete fetch");

        FetchTicket {
            dataset: Dataset::Complete,
            generation,
            query: TaskQuery::default(),
        }
    }

    /// Called when a fetch is dropped before it resolved. Clears `loading`
    /// only if that fetch was the latest filtered one; the collection is left
    /// as it was.
    pub fn abandon(&mut self, dataset: Dataset, generation: u64) -> bool {
        if dataset != Dataset::Filtered || !self.filtered.is_current(generation) {
            return false;
        }
        debug!(generation, "latest filtered fetch abandoned");
        self.loading = false;
        true
    }

    /// Installs `result` if `ticket` is still the latest for its dataset.
    #[instrument(skip(self, ticket, result), fields(dataset = %ticket.dataset, generation = ticket.generation))]
    pub fn finish(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<TaskDto>, ServiceError>,
    ) -> FetchOutcome {
        let collection = match ticket.dataset {
            Dataset::Filtered => &mut self.filtered,
            Dataset::Complete => &mut self.complete,
        };

        if !collection.is_current(ticket.generation) {
            debug!(latest = collection.issued, "discarding superseded fetch result");
            return FetchOutcome::Superseded;
        }

        if ticket.dataset == Dataset::Filtered {
            self.loading = false;
        }

        let collection = match ticket.dataset {
            Dataset::Filtered => &mut self.filtered,
            Dataset::Complete => &mut self.complete,
        };

        match result {
            Ok(tasks) => {
                let count = tasks.len();
                collection.install(tasks);
                debug!(count, "installed fetch result");
                FetchOutcome::Applied { count }
            }
            Err(err) => {
                error!(kind = err.kind(), error = %err, "fetch failed; keeping previous tasks");
                collection.last_error = Some(err.user_message());
                FetchOutcome::Failed(err)
            }
        }
    }
}
