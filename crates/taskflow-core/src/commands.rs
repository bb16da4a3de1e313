use std::io::{BufRead, Write};

use anyhow::{Context, anyhow, bail};
use chrono::Local;
use taskflow_shared::{TaskDto, TaskId};
use tracing::{debug, info, instrument, warn};

use crate::chat::{ChatSession, SendOutcome};
use crate::cli::{AddArgs, Command, EditArgs, ListArgs, ShellCommand, ShellLine};
use crate::client::{AssistantService, TaskService};
use crate::filter::FilterState;
use crate::form::TaskForm;
use crate::render::Renderer;
use crate::session::TaskSession;
use crate::sync::FetchOutcome;

const SHELL_HELP: &str = "\
view <all|today|upcoming|overdue|completed>   select a view (clears the category)
category <personal|work|shopping|health|all>  select a category (clears the view)
priority <high|medium|low|all>                narrow the list by priority
list                                          refetch and print the list
show <id>                                     print every field of a task
add <title> [-d text] [-c category] [-p priority] [--due YYYY-MM-DDTHH:MM]
edit <id> [-t title] [-d text] [-c category] [-p priority] [--due ..|--clear-due]
done <id>                                     toggle completion
delete <id>                                   delete a task
stats                                         progress and category counts
chat <message>                                ask the assistant
quit                                          leave the shell";

enum ShellFlow {
    Continue,
    Quit,
}

/// One task session and one chat transcript behind the command surface.
pub struct App<S, A> {
    tasks: TaskSession<S>,
    chat: ChatSession<A>,
    renderer: Renderer,
}

impl<S: TaskService, A: AssistantService> App<S, A> {
    pub fn new(service: S, assistant: A, renderer: Renderer) -> Self {
        Self {
            tasks: TaskSession::new(service),
            chat: ChatSession::new(assistant),
            renderer,
        }
    }

    pub fn tasks(&self) -> &TaskSession<S> {
        &self.tasks
    }

    pub fn chat(&self) -> &ChatSession<A> {
        &self.chat
    }

    /// Runs one top-level command. `input` is only read by the interactive
    /// commands.
    #[instrument(skip_all)]
    pub async fn dispatch<R: BufRead, W: Write>(
        &self,
        command: Command,
        input: R,
        out: &mut W,
    ) -> anyhow::Result<()> {
        debug!(?command, "dispatching command");

        match command {
            Command::List(args) => self.cmd_list(&args, out).await,
            Command::Add(args) => self.cmd_add(args, out).await,
            Command::Edit(args) => self.cmd_edit(args, out).await,
            Command::Show { id } => self.cmd_show(&id, out).await,
            Command::Done { id } => self.cmd_done(&id, out).await,
            Command::Delete { id } => self.cmd_delete(&id, out).await,
            Command::Stats => self.cmd_stats(out).await,
            Command::Chat { message } if message.is_empty() => self.chat_loop(input, out).await,
            Command::Chat { message } => {
                match self.send_chat(&message.join(" "), out).await? {
                    SendOutcome::Failed(err) => Err(anyhow!(err).context("chat request failed")),
                    SendOutcome::Replied | SendOutcome::Ignored => Ok(()),
                }
            }
            Command::Shell => self.shell(input, out).await,
        }
    }

    #[instrument(skip(self, out))]
    async fn cmd_list<W: Write>(&self, args: &ListArgs, out: &mut W) -> anyhow::Result<()> {
        let filter = apply_list_args(FilterState::default(), args);
        let (filtered, complete) = tokio::join!(self.tasks.select(filter), self.tasks.refresh_all());
        if let FetchOutcome::Failed(err) = &complete {
            warn!(error = %err, "sidebar counts unavailable");
        }

        self.write_list(out)?;

        if let FetchOutcome::Failed(err) = filtered {
            return Err(anyhow!(err).context("could not load tasks"));
        }
        Ok(())
    }

    #[instrument(skip(self, args, out))]
    async fn cmd_add<W: Write>(&self, args: AddArgs, out: &mut W) -> anyhow::Result<()> {
        info!("command add");

        let mut form = TaskForm {
            title: args.title.join(" "),
            description: args.description.unwrap_or_default(),
            due: args.due.unwrap_or_default(),
            ..TaskForm::default()
        };
        if let Some(category) = args.category {
            form.category = category;
        }
        if let Some(priority) = args.priority {
            form.priority = priority;
        }

        self.tasks.begin_create();
        let created = self.tasks.save(&form).await?;

        writeln!(out, "Created task {}.", created.id)?;
        Ok(())
    }

    #[instrument(skip(self, args, out), fields(task_id = %args.id))]
    async fn cmd_edit<W: Write>(&self, args: EditArgs, out: &mut W) -> anyhow::Result<()> {
        info!("command edit");

        let changes_nothing = args.title.is_none()
            && args.description.is_none()
            && args.category.is_none()
            && args.priority.is_none()
            && args.due.is_none()
            && !args.clear_due;
        if changes_nothing {
            bail!("nothing to change for task {}", args.id);
        }

        let task = self.lookup(&args.id).await?;
        self.tasks.begin_edit(&task);
        let mut form = self
            .tasks
            .form()
            .unwrap_or_else(|| TaskForm::from_task(&task));

        if let Some(title) = args.title {
            form.title = title;
        }
        if let Some(description) = args.description {
            form.description = description;
        }
        if let Some(category) = args.category {
            form.category = category;
        }
        if let Some(priority) = args.priority {
            form.priority = priority;
        }
        if let Some(due) = args.due {
            form.due = due;
        }
        if args.clear_due {
            form.due.clear();
        }

        let updated = self.tasks.save(&form).await?;

        writeln!(out, "Updated task {}.", updated.id)?;
        Ok(())
    }

    async fn cmd_show<W: Write>(&self, id: &TaskId, out: &mut W) -> anyhow::Result<()> {
        let task = self.lookup(id).await?;
        self.renderer.write_task_detail(out, &task)
    }

    #[instrument(skip(self, out))]
    async fn cmd_done<W: Write>(&self, id: &TaskId, out: &mut W) -> anyhow::Result<()> {
        let task = self.lookup(id).await?;
        let updated = self.tasks.toggle_complete(&task).await?;

        if updated.completed {
            writeln!(out, "Completed task {}.", updated.id)?;
        } else {
            writeln!(out, "Reopened task {}.", updated.id)?;
        }
        Ok(())
    }

    #[instrument(skip(self, out))]
    async fn cmd_delete<W: Write>(&self, id: &TaskId, out: &mut W) -> anyhow::Result<()> {
        self.tasks.delete(id).await?;
        writeln!(out, "Deleted task {id}.")?;
        Ok(())
    }

    async fn cmd_stats<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        if let FetchOutcome::Failed(err) = self.tasks.refresh_all().await {
            return Err(anyhow!(err).context("could not load tasks"));
        }
        self.renderer
            .write_sidebar(out, &self.tasks.stats(), &self.tasks.filter())
    }

    /// Finds a task in the loaded collections, fetching the complete list
    /// once when the id is not there yet.
    async fn lookup(&self, id: &TaskId) -> anyhow::Result<TaskDto> {
        if let Some(task) = self.tasks.find_task(id) {
            return Ok(task);
        }

        if let FetchOutcome::Failed(err) = self.tasks.refresh_all().await {
            return Err(anyhow!(err).context("could not load tasks"));
        }

        self.tasks
            .find_task(id)
            .ok_or_else(|| anyhow!("no task with id {id}"))
    }

    fn write_list<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let view = self.tasks.view();
        self.renderer
            .write_session(out, &view, Local::now().date_naive())?;
        writeln!(out)?;
        self.renderer.write_sidebar(out, &view.stats, &view.filter)
    }

    async fn send_chat<W: Write>(&self, message: &str, out: &mut W) -> anyhow::Result<SendOutcome> {
        let before = self.chat.len();
        let outcome = self.chat.send(message).await;
        self.renderer.write_chat(out, &self.chat.since(before))?;
        Ok(outcome)
    }

    async fn chat_loop<R: BufRead, W: Write>(&self, input: R, out: &mut W) -> anyhow::Result<()> {
        info!("starting chat");
        self.renderer.write_chat(out, &self.chat.transcript())?;

        let mut lines = input.lines();
        loop {
            write!(out, "you> ")?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line.context("failed to read chat input")?;
            let message = line.trim();
            if matches!(message, "/quit" | "/exit") {
                break;
            }
            if message.is_empty() {
                continue;
            }

            self.send_chat(message, out).await?;
        }

        Ok(())
    }

    async fn shell<R: BufRead, W: Write>(&self, input: R, out: &mut W) -> anyhow::Result<()> {
        info!("starting shell");
        self.tasks.start().await;
        self.write_list(out)?;
        writeln!(out, "Type `help` for commands.")?;

        let mut lines = input.lines();
        loop {
            write!(out, "taskflow> ")?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line.context("failed to read shell input")?;

            let parsed = match ShellLine::parse_line(&line) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "{err}")?;
                    continue;
                }
            };

            match self.shell_command(parsed.command, out).await {
                Ok(ShellFlow::Continue) => {}
                Ok(ShellFlow::Quit) => break,
                Err(err) => {
                    let detail = format!("{err:#}");
                    warn!(error = %detail, "shell command failed");
                    writeln!(out, "error: {detail}")?;
                }
            }
        }

        info!("shell closed");
        Ok(())
    }

    #[instrument(skip(self, out))]
    async fn shell_command<W: Write>(&self, command: ShellCommand, out: &mut W) -> anyhow::Result<ShellFlow> {
        match command {
            ShellCommand::View { view } => {
                self.tasks.set_view(view).await;
                self.write_list(out)?;
            }
            ShellCommand::Category { category } => {
                self.tasks.set_category(category).await;
                self.write_list(out)?;
            }
            ShellCommand::Priority { priority } => {
                self.tasks.set_priority(priority).await;
                self.write_list(out)?;
            }
            ShellCommand::List => {
                tokio::join!(self.tasks.refresh_filtered(), self.tasks.refresh_all());
                self.write_list(out)?;
            }
            ShellCommand::Add(args) => {
                self.cmd_add(args, out).await?;
                self.write_list(out)?;
            }
            ShellCommand::Edit(args) => {
                self.cmd_edit(args, out).await?;
                self.write_list(out)?;
            }
            ShellCommand::Show { id } => self.cmd_show(&id, out).await?,
            ShellCommand::Done { id } => {
                self.cmd_done(&id, out).await?;
                self.write_list(out)?;
            }
            ShellCommand::Delete { id } => {
                self.cmd_delete(&id, out).await?;
                self.write_list(out)?;
            }
            ShellCommand::Stats => self.cmd_stats(out).await?,
            ShellCommand::Chat { message } if message.is_empty() => {
                writeln!(out, "usage: chat <message>")?;
            }
            ShellCommand::Chat { message } => {
                self.send_chat(&message.join(" "), out).await?;
            }
            ShellCommand::Help => writeln!(out, "{SHELL_HELP}")?,
            ShellCommand::Quit => return Ok(ShellFlow::Quit),
        }

        Ok(ShellFlow::Continue)
    }
}

/// Applies `--view`, `--category`, then `--priority` through the filter
/// setters.
fn apply_list_args(mut filter: FilterState, args: &ListArgs) -> FilterState {
    if let Some(view) = args.view {
        filter.set_view(view);
    }
    if let Some(category) = args.category {
        filter.set_category(category);
    }
    if let Some(priority) = args.priority {
        filter.set_priority(priority);
    }
    filter
}

#[cfg(test)]
mod tests {
    use taskflow_shared::{Category, Priority, View};

    use super::apply_list_args;
    use crate::cli::ListArgs;
    use crate::filter::{CategoryFilter, FilterState, PriorityFilter};

    #[test]
    fn list_args_build_the_query() {
        let args = ListArgs {
            view: None,
            category: Some(CategoryFilter::Only(Category::Work)),
            priority: Some(PriorityFilter::Only(Priority::High)),
        };
        let filter = apply_list_args(FilterState::default(), &args);
        let query = filter.query();
        assert_eq!(query.view, None);
        assert_eq!(query.category, Some(Category::Work));
        assert_eq!(query.priority, Some(Priority::High));

        let args = ListArgs {
            view: Some(View::Today),
            ..ListArgs::default()
        };
        let filter = apply_list_args(FilterState::default(), &args);
        assert_eq!(filter.query().view, Some(View::Today));
        assert_eq!(filter.heading(), "Today's Tasks");
    }
}
