//! Line-oriented list browser: commands on stdin, rendered pages on stdout

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::{DetailCache, DetailRef, ListItem, Resource, Story, StoryOwner, User};
use crate::command::{ParsedCommand, available_commands, parse_command};
use crate::fetch::ListSource;
use crate::list::{ListAction, ListView, LoadState};
use crate::pagination::{PageToken, Viewport};
use crate::preference::{PreferenceStore, ViewMode, load_preference, save_preference};
use crate::query::QueryState;
use crate::url::MemoryHistory;

/// Columns in the story grid layout
const GRID_COLUMNS: usize = 3;
const GRID_CELL_WIDTH: usize = 30;

enum Event {
    Line(Option<String>),
    Update(bool),
}

/// What the loop does after a command
enum Flow {
    Render,
    Say(String),
    Quit,
}

pub struct Browser<S: ListSource, P: PreferenceStore> {
    view: ListView<S, MemoryHistory>,
    resource: Resource,
    details: DetailCache,
    prefs: P,
    view_mode: ViewMode,
    viewport: Viewport,
}

impl<S, P> Browser<S, P>
where
    S: ListSource,
    S::Item: ListItem,
    P: PreferenceStore,
{
    pub fn new(
        view: ListView<S, MemoryHistory>,
        resource: Resource,
        details: DetailCache,
        prefs: P,
        viewport: Viewport,
    ) -> Self {
        let view_mode = load_preference(&prefs);
        Self {
            view,
            resource,
            details,
            prefs,
            view_mode,
            viewport,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = tokio::io::stdout();
        write_out(&mut out, &self.render()).await?;

        loop {
            let event = tokio::select! {
                line = lines.next_line() => Event::Line(line?),
                alive = self.view.next_update() => Event::Update(alive),
            };

            match event {
                Event::Line(None) | Event::Update(false) => break,
                Event::Update(true) => write_out(&mut out, &self.render()).await?,
                Event::Line(Some(line)) => {
                    let flow = match parse_command(&line) {
                        Ok(Some(command)) => self.handle(command).await,
                        Ok(None) => continue,
                        Err(e) => Flow::Say(e.to_string()),
                    };
                    match flow {
                        Flow::Render => {
                            // Announcements already queued are reflected in this render
                            self.view.drain_updates();
                            write_out(&mut out, &self.render()).await?
                        }
                        Flow::Say(message) => write_out(&mut out, &format!("{message}\n")).await?,
                        Flow::Quit => break,
                    }
                }
            }
        }

        tracing::debug!(
            "Browser closed at {} ({} scroll resets)",
            self.address(),
            self.view.navigator().scroll_resets()
        );
        Ok(())
    }

    /// Print the page the address points at once it has loaded
    pub async fn print_once(mut self) -> Result<()> {
        self.view.load().await;
        let mut out = tokio::io::stdout();
        write_out(&mut out, &self.render()).await
    }

    async fn handle(&mut self, command: ParsedCommand) -> Flow {
        match command {
            ParsedCommand::Next if !self.view.state().is_loading() && !self.view.has_next() => {
                return Flow::Say("Already on the last page".to_string());
            }
            ParsedCommand::Prev if !self.view.has_previous() => {
                return Flow::Say("Already on the first page".to_string());
            }
            _ => {}
        }
        if let Some(intent) = command.intent(self.view.query()) {
            if !self.resource.supports_filters()
                && matches!(
                    command,
                    ParsedCommand::Search(_)
                        | ParsedCommand::Sort(_)
                        | ParsedCommand::Dates(..)
                        | ParsedCommand::Recent(_)
                        | ParsedCommand::Owner(_)
                )
            {
                return Flow::Say(format!("The {} list cannot be filtered", self.resource.label()));
            }
            return match self.view.dispatch(intent) {
                Some(_) => Flow::Render,
                None => Flow::Say("Nothing to change".to_string()),
            };
        }

        match command {
            ParsedCommand::Back | ParsedCommand::Forward => {
                let moved = match command {
                    ParsedCommand::Back => self.view.navigator_mut().back(),
                    _ => self.view.navigator_mut().forward(),
                };
                if !moved {
                    return Flow::Say("No more history in that direction".to_string());
                }
                self.view.on_history_change();
                Flow::Render
            }
            ParsedCommand::Retry => self.run_action(ListAction::Retry),
            ParsedCommand::ClearSearch => self.run_action(ListAction::ClearSearch),
            ParsedCommand::View(mode) => {
                self.view_mode = mode;
                save_preference(&mut self.prefs, mode);
                Flow::Render
            }
            ParsedCommand::Show(n) => Flow::Say(self.show(n).await),
            ParsedCommand::Help => Flow::Say(help_text()),
            ParsedCommand::Quit => Flow::Quit,
            // Every query change was handled above
            _ => Flow::Render,
        }
    }

    fn run_action(&mut self, action: ListAction) -> Flow {
        if self.view.available_action() != Some(action) {
            return Flow::Say(format!("'{}' is not available right now", action.label()));
        }
        self.view.run_action(action);
        Flow::Render
    }

    async fn show(&self, n: usize) -> String {
        let LoadState::Success(result) = self.view.state() else {
            return "No items to show".to_string();
        };
        let Some(item) = result.items.get(n - 1) else {
            return format!("There is no item {n} on this page");
        };
        match item.detail_ref() {
            Some(DetailRef::User(uuid)) => match self.details.user(&uuid).await {
                Ok(user) => describe_user(&user),
                Err(e) => format!("Could not load profile: {e}"),
            },
            Some(DetailRef::Story(id)) => match self.details.story(&id).await {
                Ok(story) => describe_story(&story),
                Err(e) => format!("Could not load story: {e}"),
            },
            None => item.title(),
        }
    }

    /// Address bar as a route plus query string
    pub fn address(&self) -> String {
        format!("{}{}", route(&self.resource), self.view.url())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let query = self.view.query();

        let mut header = format!("== {} · page {}", self.resource.label(), query.page);
        if let LoadState::Success(result) = self.view.state() {
            header.push_str(&format!(" of {} · {} total", result.total_pages(), result.total_count));
        }
        if self.resource.ordering_value(query.ordering).is_some() {
            header.push_str(&format!(" · {}", query.ordering.label()));
        }
        if query.has_filters() {
            header.push_str(&format!(" · {}", filter_summary(query)));
        }
        if self.view.is_refreshing() {
            header.push_str(" · refreshing");
        } else if let Some(at) = self.view.updated_at() {
            let minutes = at.elapsed().as_secs() / 60;
            if minutes > 0 {
                header.push_str(&format!(" · updated {minutes} min ago"));
            }
        }
        out.push_str(&header);
        out.push_str(" ==\n");

        match self.view.state() {
            LoadState::Loading => out.push_str("Loading…\n"),
            LoadState::Empty => {
                out.push_str("Nothing found.\n");
                if self.view.available_action() == Some(ListAction::ClearSearch) {
                    out.push_str("Type 'clear' to clear the search.\n");
                }
            }
            LoadState::Error { reason } => {
                out.push_str(&format!("Error: {reason}\nType 'retry' to try again.\n"));
            }
            LoadState::Success(result) => {
                let layout = match self.resource {
                    Resource::Stories => self.view_mode,
                    _ => ViewMode::List,
                };
                render_items(&mut out, &result.items, layout);
            }
        }

        let tokens = self.view.page_tokens(self.viewport);
        if tokens.len() > 1 {
            out.push_str(&format!("pages: {}\n", render_tokens(&tokens, query.page)));
        }
        out.push_str(&format!("address: {}\n", self.address()));
        out
    }
}

async fn write_out(out: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

fn route(resource: &Resource) -> String {
    match resource {
        Resource::Users => "/users".to_string(),
        Resource::Stories => "/stories".to_string(),
        Resource::UserHistory { uuid } => format!("/users/{uuid}/history"),
    }
}

fn filter_summary(query: &QueryState) -> String {
    let mut parts = Vec::new();
    if query.has_search() {
        parts.push(format!("search \"{}\"", query.search));
    }
    match (query.date_from, query.date_to) {
        (Some(from), Some(to)) => parts.push(format!("{from} to {to}")),
        (Some(from), None) => parts.push(format!("since {from}")),
        (None, Some(to)) => parts.push(format!("until {to}")),
        (None, None) => {}
    }
    if let Some(owner) = &query.owner {
        parts.push(format!("owner {owner}"));
    }
    parts.join(" · ")
}

fn render_items<T: ListItem>(out: &mut String, items: &[T], layout: ViewMode) {
    match layout {
        ViewMode::List => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("{:>3}. {}\n", i + 1, item.title()));
                if let Some(subtitle) = item.subtitle() {
                    out.push_str(&format!("     {subtitle}\n"));
                }
            }
        }
        ViewMode::Compact => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("{:>3}. {}\n", i + 1, item.title()));
            }
        }
        ViewMode::Grid => {
            for (row, chunk) in items.chunks(GRID_COLUMNS).enumerate() {
                let cells: Vec<String> = chunk
                    .iter()
                    .enumerate()
                    .map(|(col, item)| {
                        let cell = format!("{}. {}", row * GRID_COLUMNS + col + 1, item.title());
                        fit(&cell, GRID_CELL_WIDTH)
                    })
                    .collect();
                out.push_str(cells.join("  ").trim_end());
                out.push('\n');
            }
        }
    }
}

/// Truncate or pad to exactly `width` characters
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    } else {
        format!("{text}{}", " ".repeat(width - count))
    }
}

fn render_tokens(tokens: &[PageToken], current: u32) -> String {
    tokens
        .iter()
        .map(|token| match token {
            PageToken::Page(n) if *n == current => format!("[{n}]"),
            token => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_user(user: &User) -> String {
    let mut lines = vec![user.title()];
    if let Some(subtitle) = user.subtitle() {
        lines.push(subtitle);
    }
    if let Some(bio) = user.biography.as_deref().filter(|b| !b.is_empty()) {
        lines.push(bio.to_string());
    }
    lines.push(format!("uuid {} · instagram id {}", user.uuid, user.instagram_id));
    if user.has_history {
        lines.push(format!("history: arkiv history {}", user.uuid));
    }
    lines.join("\n")
}

fn describe_story(story: &Story) -> String {
    let mut lines = vec![story.title()];
    if let Some(subtitle) = story.subtitle() {
        lines.push(subtitle);
    }
    if let Some(StoryOwner::Profile { uuid, .. }) = &story.user {
        lines.push(format!("owner uuid {uuid}"));
    }
    lines.push(format!("media {}", story.media));
    if let Some(thumbnail) = &story.thumbnail {
        lines.push(format!("thumbnail {thumbnail}"));
    }
    lines.join("\n")
}

fn help_text() -> String {
    available_commands()
        .iter()
        .map(|c| format!("  {:<20} {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}
