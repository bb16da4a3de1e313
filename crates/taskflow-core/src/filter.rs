use std::fmt;
use std::str::FromStr;

use taskflow_shared::{
  Category,
  ParseLabelError,
  Priority,
  TaskQuery,
  View
};
use tracing::trace;

/// The single active navigation
/// selector. A view and a category can
/// never be active together.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub enum Navigation {
  View(View),
  Category(Category)
}

impl Default for Navigation {
  fn default() -> Self {
    Self::View(View::All)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(Category)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

impl fmt::Display for CategoryFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::All => f.write_str("All"),
      | Self::Only(category) => {
        write!(f, "{category}")
      }
    }
  }
}

impl FromStr for CategoryFilter {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(Self::All);
    }
    s.parse().map(Self::Only)
  }
}

impl fmt::Display for PriorityFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::All => f.write_str("All"),
      | Self::Only(priority) => {
        write!(f, "{priority}")
      }
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = ParseLabelError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(Self::All);
    }
    s.parse().map(Self::Only)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub struct FilterState {
  navigation: Navigation,
  priority:   PriorityFilter
}

impl FilterState {
  pub fn navigation(&self) -> Navigation {
    self.navigation
  }

  /// Reads `View::All` while a category
  /// is selected.
  pub fn view(&self) -> View {
    match self.navigation {
      | Navigation::View(view) => view,
      | Navigation::Category(_) => {
        View::All
      }
    }
  }

  /// Reads `CategoryFilter::All` while a
  /// view is selected.
  pub fn category(
    &self
  ) -> CategoryFilter {
    match self.navigation {
      | Navigation::View(_) => {
        CategoryFilter::All
      }
      | Navigation::Category(category) => {
        CategoryFilter::Only(category)
      }
    }
  }

  pub fn priority(
    &self
  ) -> PriorityFilter {
    self.priority
  }

  pub fn set_view(&mut self, view: View) {
    trace!(%view, previous = ?self.navigation, "selecting view");
    self.navigation =
      Navigation::View(view);
  }

  pub fn set_category(
    &mut self,
    category: CategoryFilter
  ) {
    trace!(%category, previous = ?self.navigation, "selecting category");
    self.navigation = match category {
      | CategoryFilter::All => {
        Navigation::View(View::All)
      }
      | CategoryFilter::Only(category) => {
        Navigation::Category(category)
      }
    };
  }

  pub fn set_priority(
    &mut self,
    priority: PriorityFilter
  ) {
    trace!(%priority, "selecting priority");
    self.priority = priority;
  }

  /// Parameters for the filtered list
  /// request. A non-"all" view takes the
  /// navigation slot; otherwise the
  /// category does.
  pub fn query(&self) -> TaskQuery {
    let priority = match self.priority {
      | PriorityFilter::All => None,
      | PriorityFilter::Only(priority) => {
        Some(priority)
      }
    };

    match self.navigation {
      | Navigation::View(View::All) => {
        TaskQuery {
          view: None,
          category: None,
          priority
        }
      }
      | Navigation::View(view) => {
        TaskQuery {
          view: Some(view),
          category: None,
          priority
        }
      }
      | Navigation::Category(category) => {
        TaskQuery {
          view: None,
          category: Some(category),
          priority
        }
      }
    }
  }

  pub fn heading(&self) -> String {
    match self.navigation {
      | Navigation::View(View::Today) => {
        "Today's Tasks".to_string()
      }
      | Navigation::View(View::Upcoming) => {
        "Upcoming Tasks".to_string()
      }
      | Navigation::View(View::Overdue) => {
        "Overdue Tasks".to_string()
      }
      | Navigation::View(
        View::Completed
      ) => "Completed Tasks".to_string(),
      | Navigation::Category(category) => {
        format!("{category} Tasks")
      }
      | Navigation::View(View::All) => {
        "All Tasks".to_string()
      }
    }
  }
}
