use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use taskflow_shared::{Category, Priority, TaskDto, View};
use unicode_width::UnicodeWidthStr;

use crate::chat::{ChatMessage, ChatRole};
use crate::config::Config;
use crate::datetime::{format_task_date, today_subtitle};
use crate::filter::{CategoryFilter, FilterState, PriorityFilter};
use crate::session::SessionView;
use crate::stats::SidebarStats;
use crate::sync::DisplayState;

const PROGRESS_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Color follows the `color` setting and is dropped when stdout is not
    /// a terminal.
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true);
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Heading, date line, priority chips, then the filtered list in
    /// whatever state it is in.
    #[tracing::instrument(skip_all, fields(heading = %view.heading, tasks = view.tasks.len()))]
    pub fn write_session<W: Write>(
        &self,
        out: &mut W,
        view: &SessionView,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.heading, "1"))?;
        writeln!(out, "{}", self.paint(&today_subtitle(today), "2"))?;
        writeln!(out, "{}", self.priority_chips(&view.filter))?;
        writeln!(out)?;

        match &view.display {
            DisplayState::Loading => writeln!(out, "Loading tasks...")?,
            DisplayState::Empty => write_empty(out)?,
            DisplayState::Stale(message) => {
                writeln!(
                    out,
                    "{}",
                    self.paint(&format!("Could not refresh tasks: {message}"), "31")
                )?;
                if view.tasks.is_empty() {
                    write_empty(out)?;
                } else {
                    self.write_task_table(out, &view.tasks)?;
                }
            }
            DisplayState::Ready => self.write_task_table(out, &view.tasks)?,
        }

        Ok(())
    }

    pub fn write_task_table<W: Write>(&self, out: &mut W, tasks: &[TaskDto]) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Category".to_string(),
            "Priority".to_string(),
            "Due".to_string(),
            "Flags".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let done = if task.completed { "[x]" } else { "[ ]" };

            let due = task.due_date.as_deref().map(format_task_date).unwrap_or_default();
            let due = if task.is_overdue() {
                self.paint(&due, "31")
            } else {
                due
            };

            let mut flags = Vec::new();
            if task.is_overdue() {
                flags.push(self.paint("Overdue", "31"));
            }
            if task.is_late {
                flags.push(self.paint("Late", "33"));
            }
            if task.completed
                && let Some(completed_at) = task.completed_at.as_deref()
            {
                flags.push(format!("done {}", format_task_date(completed_at)));
            }

            rows.push(vec![
                self.paint(&task.id.to_string(), "33"),
                done.to_string(),
                task.title.clone(),
                task.category.to_string(),
                self.paint_priority(task.priority),
                due,
                flags.join(" "),
            ]);
        }

        write_table(out, headers, rows)
    }

    pub fn write_task_detail<W: Write>(&self, out: &mut W, task: &TaskDto) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if let Some(description) = task.description.as_deref().filter(|text| !text.is_empty()) {
            writeln!(out, "description {description}")?;
        }
        writeln!(out, "category    {}", task.category)?;
        writeln!(out, "priority    {}", task.priority)?;
        writeln!(out, "status      {}", task.status)?;
        if let Some(due) = task.due_date.as_deref() {
            writeln!(out, "due         {}", format_task_date(due))?;
        }
        if let Some(completed_at) = task.completed_at.as_deref() {
            writeln!(out, "completed   {}", format_task_date(completed_at))?;
        }
        if task.is_late {
            writeln!(out, "late        yes")?;
        }
        Ok(())
    }

    /// Navigation, per-category counts, and the progress line.
    pub fn write_sidebar<W: Write>(
        &self,
        out: &mut W,
        stats: &SidebarStats,
        filter: &FilterState,
    ) -> anyhow::Result<()> {
        writeln!(out, "Views")?;
        for view in View::ALL {
            let active = filter.view() == view && filter.category() == CategoryFilter::All;
            writeln!(out, "  {} {}", marker(active), view_label(view))?;
        }

        writeln!(out, "Categories")?;
        for category in Category::ALL {
            let active = filter.category() == CategoryFilter::Only(category);
            writeln!(
                out,
                "  {} {:<10} {}",
                marker(active),
                category.as_str(),
                stats.count_for(category)
            )?;
        }

        let filled = PROGRESS_WIDTH * usize::from(stats.percent) / 100;
        writeln!(
            out,
            "Progress [{}{}] {} of {} tasks completed ({}%)",
            "#".repeat(filled),
            "-".repeat(PROGRESS_WIDTH - filled),
            stats.completed,
            stats.total,
            stats.percent
        )?;
        Ok(())
    }

    pub fn write_chat<W: Write>(&self, out: &mut W, messages: &[ChatMessage]) -> anyhow::Result<()> {
        for message in messages {
            let label = match message.role {
                ChatRole::User => self.paint("you", "36"),
                ChatRole::Assistant => self.paint("assistant", "32"),
                ChatRole::System => self.paint("system", "2"),
            };
            writeln!(out, "{label}> {}", message.content)?;
        }
        Ok(())
    }

    fn priority_chips(&self, filter: &FilterState) -> String {
        let mut chips = vec![PriorityFilter::All];
        chips.extend(Priority::ALL.map(PriorityFilter::Only));
        chips
            .into_iter()
            .map(|chip| {
                let label = chip.to_string();
                if chip == filter.priority() {
                    self.paint(&format!("[{label}]"), "7")
                } else {
                    format!(" {label} ")
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn paint_priority(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn marker(active: bool) -> &'static str {
    if active { ">" } else { " " }
}

fn view_label(view: View) -> &'static str {
    match view {
        View::All => "All Tasks",
        View::Today => "Today",
        View::Upcoming => "Upcoming",
        View::Overdue => "Overdue",
        View::Completed => "Completed",
    }
}

fn write_empty<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "No tasks found")?;
    writeln!(out, "Try adjusting filters or add a new task.")?;
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
