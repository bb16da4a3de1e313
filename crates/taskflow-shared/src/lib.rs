use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct ParseLabelError {
  pub kind:  &'static str,
  pub input: String
}

impl fmt::Display for ParseLabelError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown {}: {}",
      self.kind, self.input
    )
  }
}

impl std::error::Error
  for ParseLabelError
{
}

/// Service-assigned task identifier.
/// The client never interprets it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(untagged)]
pub enum TaskId {
  Number(u64),
  Text(String)
}

impl fmt::Display for TaskId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Number(value) => {
        write!(f, "{value}")
      }
      | Self::Text(value) => {
        f.write_str(value)
      }
    }
  }
}

impl FromStr for TaskId {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
      return Err(ParseLabelError {
        kind:  "task id",
        input: s.to_string()
      });
    }
    Ok(match trimmed.parse::<u64>() {
      | Ok(number) => {
        Self::Number(number)
      }
      | Err(_) => {
        Self::Text(trimmed.to_string())
      }
    })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
)]
pub enum Category {
  Personal,
  Work,
  Shopping,
  Health
}

impl Category {
  /// Sidebar order.
  pub const ALL: [Category; 4] = [
    Category::Personal,
    Category::Work,
    Category::Shopping,
    Category::Health
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Personal => "Personal",
      | Self::Work => "Work",
      | Self::Shopping => "Shopping",
      | Self::Health => "Health"
    }
  }
}

impl fmt::Display for Category {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|category| {
        category
          .as_str()
          .eq_ignore_ascii_case(s.trim())
      })
      .ok_or_else(|| ParseLabelError {
        kind:  "category",
        input: s.to_string()
      })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
pub enum Priority {
  Low,
  Medium,
  High
}

impl Priority {
  /// Filter-bar order.
  pub const ALL: [Priority; 3] = [
    Priority::High,
    Priority::Medium,
    Priority::Low
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Low => "Low",
      | Self::Medium => "Medium",
      | Self::High => "High"
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Priority {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|priority| {
        priority
          .as_str()
          .eq_ignore_ascii_case(s.trim())
      })
      .ok_or_else(|| ParseLabelError {
        kind:  "priority",
        input: s.to_string()
      })
  }
}

/// Navigational grouping understood by
/// the task service's `view` parameter.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum View {
  #[default]
  All,
  Today,
  Upcoming,
  Overdue,
  Completed
}

impl View {
  pub const ALL: [View; 5] = [
    View::All,
    View::Today,
    View::Upcoming,
    View::Overdue,
    View::Completed
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Today => "today",
      | Self::Upcoming => "upcoming",
      | Self::Overdue => "overdue",
      | Self::Completed => "completed"
    }
  }
}

impl fmt::Display for View {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for View {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|view| {
        view
          .as_str()
          .eq_ignore_ascii_case(s.trim())
      })
      .ok_or_else(|| ParseLabelError {
        kind:  "view",
        input: s.to_string()
      })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskDto {
  pub id:           TaskId,
  #[serde(default)]
  pub title:        String,
  #[serde(default)]
  pub description:  Option<String>,
  pub category:     Category,
  pub priority:     Priority,
  #[serde(default)]
  pub due_date:     Option<String>,
  #[serde(default)]
  pub completed:    bool,
  #[serde(default)]
  pub completed_at: Option<String>,
  #[serde(default)]
  pub created_at:   Option<String>,
  #[serde(default)]
  pub status:       String,
  #[serde(default)]
  pub is_late:      bool
}

impl TaskDto {
  /// Reads the service-supplied status;
  /// never compares dates locally.
  pub fn is_overdue(&self) -> bool {
    self.status == "Overdue"
  }
}

/// Parameters for `GET /tasks`. Unset
/// fields are omitted from the URL.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskQuery {
  pub view:     Option<View>,
  pub category: Option<Category>,
  pub priority: Option<Priority>
}

impl TaskQuery {
  pub fn is_empty(&self) -> bool {
    self.view.is_none()
      && self.category.is_none()
      && self.priority.is_none()
  }

  pub fn pairs(
    &self
  ) -> Vec<(&'static str, &'static str)>
  {
    let mut pairs = Vec::with_capacity(3);
    if let Some(view) = self.view {
      pairs.push(("view", view.as_str()));
    }
    if let Some(category) = self.category
    {
      pairs.push((
        "category",
        category.as_str()
      ));
    }
    if let Some(priority) = self.priority
    {
      pairs.push((
        "priority",
        priority.as_str()
      ));
    }
    pairs
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskCreate {
  pub title:       String,
  pub description: String,
  pub category:    Category,
  pub priority:    Priority,
  pub due_date:    Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub category:    Option<Category>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<Priority>,
  /// `Some(None)` clears the due date.
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>
}

impl TaskPatch {
  pub fn completion(
    completed: bool
  ) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ChatRequest {
  pub message: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct ChatReply {
  #[serde(default)]
  pub response: Option<String>,
  #[serde(default)]
  pub error:    Option<String>
}

/// Body carried by non-2xx responses.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct ErrorBody {
  #[serde(default)]
  pub error: Option<String>
}
