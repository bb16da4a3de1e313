use std::cell::RefCell;

use taskflow_shared::{TaskCreate, TaskDto, TaskId, TaskPatch, View};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::client::{ServiceError, TaskService};
use crate::filter::{CategoryFilter, FilterState, PriorityFilter};
use crate::form::{FormError, TaskForm};
use crate::stats::SidebarStats;
use crate::sync::{Dataset, DisplayState, FetchOutcome, FetchTicket, Synchronizer};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] FormError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub filter: FilterState,
    pub heading: String,
    pub display: DisplayState,
    pub tasks: Vec<TaskDto>,
    pub stats: SidebarStats,
    pub editing: Option<TaskDto>,
}

#[derive(Debug, Default)]
struct SessionState {
    filter: FilterState,
    sync: Synchronizer,
    editing: Option<TaskDto>,
    form: Option<TaskForm>,
}

/// Coordinates filter selection, the two task collections, and mutations
/// against one task service.
///
/// State sits behind a `RefCell` and no borrow is held across an `.await`,
/// so several operations may be in flight on one thread at once.
pub struct TaskSession<S> {
    service: S,
    state: RefCell<SessionState>,
}

impl<S: TaskService> TaskSession<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: RefCell::new(SessionState::default()),
        }
    }

    /// Initial load of both collections.
    #[instrument(skip(self))]
    pub async fn start(&self) -> (FetchOutcome, FetchOutcome) {
        tokio::join!(self.refresh_filtered(), self.refresh_all())
    }

    pub fn filter(&self) -> FilterState {
        self.state.borrow().filter
    }

    pub fn heading(&self) -> String {
        self.state.borrow().filter.heading()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().sync.is_loading()
    }

    pub fn tasks(&self) -> Vec<TaskDto> {
        self.state.borrow().sync.filtered().tasks().to_vec()
    }

    pub fn all_tasks(&self) -> Vec<TaskDto> {
        self.state.borrow().sync.complete().tasks().to_vec()
    }

    pub fn stats(&self) -> SidebarStats {
        SidebarStats::from_tasks(self.state.borrow().sync.complete().tasks())
    }

    pub fn view(&self) -> SessionView {
        let state = self.state.borrow();
        SessionView {
            filter: state.filter,
            heading: state.filter.heading(),
            display: state.sync.display(),
            tasks: state.sync.filtered().tasks().to_vec(),
            stats: SidebarStats::from_tasks(state.sync.complete().tasks()),
            editing: state.editing.clone(),
        }
    }

    /// Looks the id up in the unfiltered collection first, then the
    /// filtered one.
    pub fn find_task(&self, id: &TaskId) -> Option<TaskDto> {
        let state = self.state.borrow();
        state
            .sync
            .complete()
            .tasks()
            .iter()
            .chain(state.sync.filtered().tasks())
            .find(|task| &task.id == id)
            .cloned()
    }

    pub async fn set_view(&self, view: View) -> FetchOutcome {
        self.state.borrow_mut().filter.set_view(view);
        self.refresh_filtered().await
    }

    pub async fn set_category(&self, category: CategoryFilter) -> FetchOutcome {
        self.state.borrow_mut().filter.set_category(category);
        self.refresh_filtered().await
    }

    pub async fn set_priority(&self, priority: PriorityFilter) -> FetchOutcome {
        self.state.borrow_mut().filter.set_priority(priority);
        self.refresh_filtered().await
    }

    /// Replaces the whole filter state with one fetch.
    pub async fn select(&self, filter: FilterState) -> FetchOutcome {
        self.state.borrow_mut().filter = filter;
        self.refresh_filtered().await
    }

    #[instrument(skip(self))]
    pub async fn refresh_filtered(&self) -> FetchOutcome {
        let ticket = {
            let mut state = self.state.borrow_mut();
            let filter = state.filter;
            state.sync.begin_filtered(&filter)
        };

        self.fetch(ticket).await
    }

    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> FetchOutcome {
        let ticket = self.state.borrow_mut().sync.begin_all();
        self.fetch(ticket).await
    }

    #[instrument(skip(self, create), fields(title_len = create.title.len()))]
    pub async fn create(&self, create: TaskCreate) -> Result<TaskDto, ServiceError> {
        let created = self
            .service
            .create_task(&create)
            .await
            .inspect_err(|err| error!(kind = err.kind(), error = %err, "create failed"))?;

        info!(task_id = %created.id, "task created");
        self.close_form();
        self.resync().await;
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<TaskDto, ServiceError> {
        let updated = self.send_update(id, &patch).await?;
        self.close_form();
        self.resync().await;
        Ok(updated)
    }

    /// Flips completion and leaves `completed_at` to the service. Unlike
    /// `update`, an open form is left alone.
    #[instrument(skip(self, task), fields(task_id = %task.id, completed = task.completed))]
    pub async fn toggle_complete(&self, task: &TaskDto) -> Result<TaskDto, ServiceError> {
        let updated = self
            .send_update(&task.id, &TaskPatch::completion(!task.completed))
            .await?;
        self.resync().await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.service
            .delete_task(id)
            .await
            .inspect_err(|err| error!(kind = err.kind(), error = %err, "delete failed"))?;

        info!("task deleted");
        self.resync().await;
        Ok(())
    }

    /// Submits `form` as an update of the task being edited, or as a new
    /// task when nothing is being edited.
    pub async fn save(&self, form: &TaskForm) -> Result<TaskDto, SaveError> {
        let editing = self.editing();
        match editing {
            Some(task) => {
                let patch = form.to_patch()?;
                Ok(self.update(&task.id, patch).await?)
            }
            None => {
                let create = form.to_create()?;
                Ok(self.create(create).await?)
            }
        }
    }

    pub fn begin_edit(&self, task: &TaskDto) {
        debug!(task_id = %task.id, "editing task");
        let mut state = self.state.borrow_mut();
        state.form = Some(TaskForm::from_task(task));
        state.editing = Some(task.clone());
    }

    pub fn begin_create(&self) {
        let mut state = self.state.borrow_mut();
        state.editing = None;
        state.form = Some(TaskForm::default());
    }

    pub fn close_form(&self) {
        let mut state = self.state.borrow_mut();
        state.form = None;
        state.editing = None;
    }

    pub fn editing(&self) -> Option<TaskDto> {
        self.state.borrow().editing.clone()
    }

    pub fn form(&self) -> Option<TaskForm> {
        self.state.borrow().form.clone()
    }

    async fn send_update(&self, id: &TaskId, patch: &TaskPatch) -> Result<TaskDto, ServiceError> {
        let updated = self
            .service
            .update_task(id, patch)
            .await
            .inspect_err(|err| error!(task_id = %id, kind = err.kind(), error = %err, "update failed"))?;

        info!(task_id = %id, "task updated");
        Ok(updated)
    }

    async fn fetch(&self, ticket: FetchTicket) -> FetchOutcome {
        let guard = InFlight {
            state: &self.state,
            dataset: ticket.dataset(),
            generation: ticket.generation(),
            settled: false,
        };
        let result = self.service.list_tasks(ticket.query()).await;
        guard.settle();
        self.state.borrow_mut().sync.finish(ticket, result)
    }

    async fn resync(&self) {
        let (filtered, complete) = tokio::join!(self.refresh_filtered(), self.refresh_all());
        debug!(?filtered, ?complete, "resynchronized after mutation");
    }
}

/// Hands a dropped fetch back to the synchronizer so `loading` cannot
/// outlive it.
struct InFlight<'a> {
    state: &'a RefCell<SessionState>,
    dataset: Dataset,
    generation: u64,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.sync.abandon(self.dataset, self.generation);
        }
    }
}
