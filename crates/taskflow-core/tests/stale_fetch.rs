use std::cell::{Cell, RefCell};

use taskflow_core::client::{ServiceError, TaskService};
use taskflow_core::filter::CategoryFilter;
use taskflow_core::session::TaskSession;
use taskflow_core::sync::{DisplayState, FetchOutcome};
use taskflow_shared::{Category, Priority, TaskCreate, TaskDto, TaskId, TaskPatch, TaskQuery};
use tokio::sync::oneshot;
use tokio::task::yield_now;

type Reply = Result<Vec<TaskDto>, ServiceError>;

/// Every list call parks until the test answers the gate registered for its
/// query, so replies can arrive in any order.
#[derive(Default)]
struct GatedService {
    waiting: RefCell<Vec<(TaskQuery, oneshot::Receiver<Reply>)>>,
    calls: Cell<usize>,
}

impl GatedService {
    fn gate(&self, query: TaskQuery) -> oneshot::Sender<Reply> {
        let (sender, receiver) = oneshot::channel();
        self.waiting.borrow_mut().push((query, receiver));
        sender
    }

    async fn wait_for_calls(&self, count: usize) {
        while self.calls.get() < count {
            yield_now().await;
        }
    }
}

impl TaskService for GatedService {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskDto>, ServiceError> {
        self.calls.set(self.calls.get() + 1);
        let receiver = {
            let mut waiting = self.waiting.borrow_mut();
            let index = waiting
                .iter()
                .position(|(gated, _)| gated == query)
                .expect("gate registered for query");
            waiting.remove(index).1
        };
        receiver.await.expect("reply sent")
    }

    async fn create_task(&self, _create: &TaskCreate) -> Result<TaskDto, ServiceError> {
        Err(read_only())
    }

    async fn update_task(&self, _id: &TaskId, _patch: &TaskPatch) -> Result<TaskDto, ServiceError> {
        Err(read_only())
    }

    async fn delete_task(&self, _id: &TaskId) -> Result<(), ServiceError> {
        Err(read_only())
    }
}

fn read_only() -> ServiceError {
    ServiceError::Service {
        status: None,
        message: "read only".to_string(),
    }
}

fn task(id: u64, title: &str, category: Category) -> TaskDto {
    TaskDto {
        id: TaskId::Number(id),
        title: title.to_string(),
        description: None,
        category,
        priority: Priority::Medium,
        due_date: None,
        completed: false,
        completed_at: None,
        created_at: None,
        status: "Pending".to_string(),
        is_late: false,
    }
}

fn category_query(category: Category) -> TaskQuery {
    TaskQuery {
        category: Some(category),
        ..TaskQuery::default()
    }
}

fn titles(tasks: &[TaskDto]) -> Vec<String> {
    tasks.iter().map(|task| task.title.clone()).collect()
}

#[tokio::test]
async fn older_reply_arriving_last_is_discarded() {
    let service = GatedService::default();
    let work = service.gate(category_query(Category::Work));
    let shopping = service.gate(category_query(Category::Shopping));
    let session = TaskSession::new(&service);

    let first = session.set_category(CategoryFilter::Only(Category::Work));
    let second = async {
        service.wait_for_calls(1).await;
        session.set_category(CategoryFilter::Only(Category::Shopping)).await
    };
    let driver = async {
        service.wait_for_calls(2).await;
        shopping
            .send(Ok(vec![task(2, "groceries", Category::Shopping)]))
            .expect("shopping fetch waiting");
        while session.is_loading() {
            yield_now().await;
        }
        work.send(Ok(vec![task(1, "report", Category::Work)]))
            .expect("work fetch waiting");
    };

    let (first, second, ()) = tokio::join!(first, second, driver);
    assert_eq!(first, FetchOutcome::Superseded);
    assert_eq!(second, FetchOutcome::Applied { count: 1 });

    assert_eq!(titles(&session.tasks()), vec!["groceries"]);
    assert_eq!(session.heading(), "Shopping Tasks");
    assert_eq!(session.filter().query(), category_query(Category::Shopping));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn superseded_reply_does_not_end_loading() {
    let service = GatedService::default();
    let work = service.gate(category_query(Category::Work));
    let health = service.gate(category_query(Category::Health));
    let session = TaskSession::new(&service);

    let first = session.set_category(CategoryFilter::Only(Category::Work));
    let second = async {
        service.wait_for_calls(1).await;
        session.set_category(CategoryFilter::Only(Category::Health)).await
    };
    let driver = async {
        service.wait_for_calls(2).await;
        work.send(Ok(vec![task(1, "report", Category::Work)]))
            .expect("work fetch waiting");
        for _ in 0..4 {
            yield_now().await;
        }
        assert!(session.is_loading());
        assert_eq!(session.view().display, DisplayState::Loading);
        assert!(session.tasks().is_empty());

        health.send(Ok(vec![])).expect("health fetch waiting");
    };

    let (first, second, ()) = tokio::join!(first, second, driver);
    assert_eq!(first, FetchOutcome::Superseded);
    assert_eq!(second, FetchOutcome::Applied { count: 0 });
    assert_eq!(session.view().display, DisplayState::Empty);
}

#[tokio::test]
async fn failed_latest_fetch_keeps_previous_tasks() {
    let service = GatedService::default();
    let initial = service.gate(TaskQuery::default());
    let session = TaskSession::new(&service);

    initial
        .send(Ok(vec![task(1, "report", Category::Work), task(2, "groceries", Category::Shopping)]))
        .expect("initial fetch");
    assert!(session.refresh_filtered().await.is_applied());

    let failing = service.gate(category_query(Category::Work));
    failing
        .send(Err(ServiceError::Transport {
            url: "http://localhost:5000/api/tasks?category=Work".to_string(),
            message: "connection refused".to_string(),
        }))
        .expect("work fetch");
    let outcome = session.set_category(CategoryFilter::Only(Category::Work)).await;

    assert!(matches!(outcome, FetchOutcome::Failed(ServiceError::Transport { .. })));
    assert_eq!(titles(&session.tasks()), vec!["report", "groceries"]);
    assert!(!session.is_loading());
    assert!(matches!(session.view().display, DisplayState::Stale(_)));
}

#[tokio::test]
async fn filtered_and_complete_collections_resolve_independently() {
    let service = GatedService::default();
    let filtered = service.gate(category_query(Category::Health));
    let complete = service.gate(TaskQuery::default());
    let session = TaskSession::new(&service);

    let select = session.set_category(CategoryFilter::Only(Category::Health));
    let everything = session.refresh_all();
    let driver = async {
        service.wait_for_calls(2).await;
        complete
            .send(Ok(vec![
                task(1, "report", Category::Work),
                task(3, "run", Category::Health),
            ]))
            .expect("complete fetch waiting");
        while session.all_tasks().is_empty() {
            yield_now().await;
        }
        assert!(session.is_loading());
        assert_eq!(session.stats().total, 2);

        filtered
            .send(Ok(vec![task(3, "run", Category::Health)]))
            .expect("filtered fetch waiting");
    };

    let (select, everything, ()) = tokio::join!(select, everything, driver);
    assert!(select.is_applied());
    assert!(everything.is_applied());
    assert_eq!(titles(&session.tasks()), vec!["run"]);
    assert_eq!(session.stats().count_for(Category::Health), 1);
    assert_eq!(session.stats().count_for(Category::Work), 1);
}
