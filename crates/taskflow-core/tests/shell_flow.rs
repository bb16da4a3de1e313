use std::cell::{Cell, RefCell};

use taskflow_core::cli::{Command, EditArgs, ListArgs};
use taskflow_core::client::{AssistantService, ServiceError, TaskService};
use taskflow_core::commands::App;
use taskflow_core::filter::CategoryFilter;
use taskflow_core::render::Renderer;
use taskflow_shared::{Category, Priority, TaskCreate, TaskDto, TaskId, TaskPatch, TaskQuery, View};

#[derive(Default)]
struct MemoryService {
    tasks: RefCell<Vec<TaskDto>>,
    queries: RefCell<Vec<TaskQuery>>,
    patches: RefCell<Vec<(TaskId, TaskPatch)>>,
    fail_updates: Cell<bool>,
}

impl MemoryService {
    fn seeded() -> Self {
        let service = Self::default();
        service.tasks.borrow_mut().extend([
            task(1, "quarterly report", Category::Work, Priority::High),
            task(2, "oat milk", Category::Shopping, Priority::Low),
        ]);
        service
    }
}

impl TaskService for MemoryService {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskDto>, ServiceError> {
        self.queries.borrow_mut().push(*query);
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|task| query.category.is_none_or(|category| task.category == category))
            .filter(|task| query.priority.is_none_or(|priority| task.priority == priority))
            .filter(|task| query.view != Some(View::Completed) || task.completed)
            .cloned()
            .collect())
    }

    async fn create_task(&self, create: &TaskCreate) -> Result<TaskDto, ServiceError> {
        let mut tasks = self.tasks.borrow_mut();
        let id = tasks.len() as u64 + 1;
        let mut created = task(id, &create.title, create.category, create.priority);
        created.description = Some(create.description.clone());
        created.due_date = create.due_date.clone();
        tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<TaskDto, ServiceError> {
        self.patches.borrow_mut().push((id.clone(), patch.clone()));
        if self.fail_updates.get() {
            return Err(ServiceError::from_error_body(500, r#"{"error": "database is locked"}"#));
        }
        let mut tasks = self.tasks.borrow_mut();
        let task = tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| ServiceError::from_error_body(404, r#"{"error": "Task not found"}"#))?;

        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = &patch.due_date {
            task.due_date = due_date.clone();
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
            task.status = if completed { "Completed" } else { "Pending" }.to_string();
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.tasks.borrow_mut().retain(|task| &task.id != id);
        Ok(())
    }
}

struct CannedAssistant;

impl AssistantService for CannedAssistant {
    async fn chat(&self, message: &str) -> Result<String, ServiceError> {
        Ok(format!("You asked: {message}"))
    }
}

fn task(id: u64, title: &str, category: Category, priority: Priority) -> TaskDto {
    TaskDto {
        id: TaskId::Number(id),
        title: title.to_string(),
        description: None,
        category,
        priority,
        due_date: None,
        completed: false,
        completed_at: None,
        created_at: None,
        status: "Pending".to_string(),
        is_late: false,
    }
}

async fn run(app: &App<&MemoryService, CannedAssistant>, command: Command, input: &str) -> (anyhow::Result<()>, String) {
    let mut out = Vec::new();
    let result = app.dispatch(command, input.as_bytes(), &mut out).await;
    (result, String::from_utf8(out).expect("utf8 output"))
}

#[tokio::test]
async fn shell_keeps_filters_between_lines() {
    let service = MemoryService::seeded();
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let script = "\
category work
add \"draft summary\" -c work -p high --due 2025-05-01T09:00
done 1
priority low
fly away
chat what is next
quit
";
    let (result, output) = run(&app, Command::Shell, script).await;
    result.expect("shell exits cleanly");

    assert!(output.contains("All Tasks"));
    assert!(output.contains("Work Tasks"));
    assert!(output.contains("Created task 3."));
    assert!(output.contains("Completed task 1."));
    assert!(output.contains("[Low]"));
    assert!(output.contains("You asked: what is next"));
    assert!(output.contains("error"), "unknown command is reported: {output}");

    let filter = app.tasks().filter();
    assert_eq!(filter.category(), CategoryFilter::Only(Category::Work));
    assert_eq!(filter.query().priority, Some(Priority::Low));

    let created = app.tasks().find_task(&TaskId::Number(3)).expect("created task listed");
    assert_eq!(created.due_date.as_deref(), Some("2025-05-01T09:00"));

    let last_query = *service.queries.borrow().last().expect("queried");
    assert_eq!(
        last_query,
        TaskQuery {
            view: None,
            category: Some(Category::Work),
            priority: Some(Priority::Low),
        }
    );
}

#[tokio::test]
async fn shell_stops_at_end_of_input() {
    let service = MemoryService::seeded();
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let (result, output) = run(&app, Command::Shell, "view completed\n").await;
    result.expect("eof ends the shell");
    assert!(output.contains("Completed Tasks"));
    assert!(output.contains("No tasks found"));
}

#[tokio::test]
async fn list_prints_heading_table_and_sidebar() {
    let service = MemoryService::seeded();
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let args = ListArgs {
        category: Some(CategoryFilter::Only(Category::Shopping)),
        ..ListArgs::default()
    };
    let (result, output) = run(&app, Command::List(args), "").await;
    result.expect("list");

    assert!(output.starts_with("Shopping Tasks\n"));
    assert!(output.contains("oat milk"));
    assert!(!output.contains("quarterly report"));
    assert!(output.contains("0 of 2 tasks completed (0%)"));
}

#[tokio::test]
async fn edit_clear_due_sends_null_due_date() {
    let service = MemoryService::seeded();
    service.tasks.borrow_mut()[0].due_date = Some("2025-04-10T12:00:00".to_string());
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let args = EditArgs {
        id: TaskId::Number(1),
        title: Some("annual report".to_string()),
        description: None,
        category: None,
        priority: None,
        due: None,
        clear_due: true,
    };
    let (result, output) = run(&app, Command::Edit(args), "").await;
    result.expect("edit");
    assert!(output.contains("Updated task 1."));

    let patches = service.patches.borrow();
    let (id, patch) = patches.last().expect("patched");
    assert_eq!(id, &TaskId::Number(1));
    assert_eq!(patch.title.as_deref(), Some("annual report"));
    assert_eq!(patch.category, Some(Category::Work));
    assert_eq!(patch.due_date, Some(None));
    assert!(app.tasks().editing().is_none());
}

#[tokio::test]
async fn failed_edit_keeps_task_selected() {
    let service = MemoryService::seeded();
    service.fail_updates.set(true);
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let args = EditArgs {
        id: TaskId::Number(1),
        title: Some("annual report".to_string()),
        description: None,
        category: None,
        priority: None,
        due: None,
        clear_due: false,
    };
    let (result, output) = run(&app, Command::Edit(args), "").await;
    let err = result.expect_err("update rejected");
    assert_eq!(err.to_string(), "database is locked");
    assert!(!output.contains("Updated task"));

    let editing = app.tasks().editing().expect("still editing");
    assert_eq!(editing.id, TaskId::Number(1));
    let form = app.tasks().form().expect("form kept open");
    assert_eq!(form.title, "annual report");
    assert_eq!(service.tasks.borrow()[0].title, "quarterly report");
}

#[tokio::test]
async fn done_on_unknown_id_fails_without_writing() {
    let service = MemoryService::seeded();
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let (result, _) = run(&app, Command::Done { id: TaskId::Number(99) }, "").await;
    let err = result.expect_err("unknown id");
    assert_eq!(err.to_string(), "no task with id 99");
    assert!(service.patches.borrow().is_empty());
}

#[tokio::test]
async fn chat_loop_reads_until_quit() {
    let service = MemoryService::seeded();
    let app = App::new(&service, CannedAssistant, Renderer::plain());

    let (result, output) = run(&app, Command::Chat { message: vec![] }, "hello\n\n/quit\nignored\n").await;
    result.expect("chat loop");

    assert!(output.contains("How can I help you manage your tasks today?"));
    assert!(output.contains("You asked: hello"));
    assert!(!output.contains("ignored"));
    assert_eq!(app.chat().len(), 3);
}
