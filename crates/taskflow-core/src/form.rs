use taskflow_shared::{Category, Priority, TaskCreate, TaskDto, TaskPatch};
use thiserror::Error;

use crate::datetime::{format_due_input, parse_due_input};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("invalid due date {0:?}; expected YYYY-MM-DDTHH:MM")]
    InvalidDue(String),
}

/// Editable copy of a task's user-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    /// `YYYY-MM-DDTHH:MM`, or empty for no due date.
    pub due: String,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: Category::Personal,
            priority: Priority::Medium,
            due: String::new(),
        }
    }
}

impl TaskForm {
    pub fn from_task(task: &TaskDto) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            category: task.category,
            priority: task.priority,
            due: task
                .due_date
                .as_deref()
                .map(|due| due.chars().take(16).collect())
                .unwrap_or_default(),
        }
    }

    pub fn to_create(&self) -> Result<TaskCreate, FormError> {
        let (title, due_date) = self.validated()?;
        Ok(TaskCreate {
            title,
            description: self.description.trim().to_string(),
            category: self.category,
            priority: self.priority,
            due_date,
        })
    }

    /// Full patch: every user field is sent, and an empty due date clears it.
    pub fn to_patch(&self) -> Result<TaskPatch, FormError> {
        let (title, due_date) = self.validated()?;
        Ok(TaskPatch {
            title: Some(title),
            description: Some(self.description.trim().to_string()),
            category: Some(self.category),
            priority: Some(self.priority),
            due_date: Some(due_date),
            completed: None,
        })
    }

    fn validated(&self) -> Result<(String, Option<String>), FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::EmptyTitle);
        }

        let due = self.due.trim();
        let due_date = if due.is_empty() {
            None
        } else {
            let parsed = parse_due_input(due).ok_or_else(|| FormError::InvalidDue(due.to_string()))?;
            Some(format_due_input(parsed))
        };

        Ok((title.to_string(), due_date))
    }
}
