use taskflow_shared::{Category, TaskDto};

/// Aggregates shown beside the task list, computed from the unfiltered
/// collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarStats {
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
    pub per_category: [(Category, usize); 4],
}

impl SidebarStats {
    pub fn from_tasks(tasks: &[TaskDto]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 * 100.0) / total as f64).round() as u8
        };

        let per_category = Category::ALL.map(|category| {
            let count = tasks.iter().filter(|task| task.category == category).count();
            (category, count)
        });

        Self {
            total,
            completed,
            percent,
            per_category,
        }
    }

    pub fn count_for(&self, category: Category) -> usize {
        self.per_category
            .iter()
            .find(|(candidate, _)| *candidate == category)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}
