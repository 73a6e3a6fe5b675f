use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::cli::Command;
use crate::config::Config;
use crate::events::{EventBus, Toast};
use crate::fetch::{Fetcher, QueryKey};
use crate::filter::FilterMode;
use crate::render::Renderer;
use crate::store::TaskStore;

mod focus;
mod task_ops;
mod views;

/// The application root: owns the store, the fetcher and the toast
/// channel for the lifetime of one command.
pub struct App {
    pub cfg: Config,
    pub store: TaskStore,
    pub fetcher: Fetcher,
    pub renderer: Renderer,
    toasts: broadcast::Receiver<Toast>,
}

impl App {
    #[instrument(skip_all)]
    pub async fn connect(cfg: Config) -> anyhow::Result<Self> {
        let settings = cfg.fetch_settings()?;
        let events = Arc::new(EventBus::new());
        let toasts = events.subscribe();

        let fetcher = Fetcher::connect(settings, Arc::clone(&events))
            .await
            .context("task service unavailable; retry once it is running, or pass --offline")?;
        let store = TaskStore::new(cfg.pomodoro_secs()?, cfg.selection_fallback()?);
        let renderer = Renderer::new(&cfg)?;

        let mut app = Self::with_parts(cfg, store, fetcher, renderer, toasts);
        app.fetcher
            .load(&mut app.store)
            .await
            .context("failed to load tasks")?;
        info!(
            backend = %app.fetcher.backend(),
            count = app.store.tasks().len(),
            "tasks loaded"
        );
        Ok(app)
    }

    pub fn with_parts(
        cfg: Config,
        store: TaskStore,
        fetcher: Fetcher,
        renderer: Renderer,
        toasts: broadcast::Receiver<Toast>,
    ) -> Self {
        Self {
            cfg,
            store,
            fetcher,
            renderer,
            toasts,
        }
    }

    /// Prints pending toasts to stderr.
    pub fn flush_toasts(&mut self) {
        let mut err = io::stderr().lock();
        while let Ok(toast) = self.toasts.try_recv() {
            let _ = writeln!(err, "{}", self.renderer.toast_line(&toast));
        }
    }
}

#[instrument(skip(app, command))]
pub async fn dispatch(app: &mut App, command: Command) -> anyhow::Result<()> {
    debug!(?command, backend = %app.fetcher.backend(), "dispatching command");

    let result = match command {
        Command::List {
            filter,
            search,
            select,
        } => views::cmd_list(app, filter, search, select),
        Command::Show { id } => views::cmd_show(app, &id).await,
        Command::Add {
            title,
            description,
            tags,
            steps,
            priority,
            due,
        } => {
            let opts = task_ops::AddOptions {
                title: title.join(" "),
                description,
                tags,
                steps,
                priority,
                due,
            };
            task_ops::cmd_add(app, opts).await
        }
        Command::Edit {
            id,
            title,
            description,
            tags,
            priority,
            due,
            clear_due,
        } => {
            let opts = task_ops::EditOptions {
                title,
                description,
                tags,
                priority,
                due,
                clear_due,
            };
            task_ops::cmd_edit(app, &id, opts).await
        }
        Command::Done { id } => task_ops::cmd_done(app, &id).await,
        Command::Step { id, index } => task_ops::cmd_step(app, &id, index).await,
        Command::Rm { id } => task_ops::cmd_rm(app, &id).await,
        Command::Search { query } => views::cmd_query(app, QueryKey::Search(query)).await,
        Command::Tag { tag } => views::cmd_query(app, QueryKey::Tag(tag)).await,
        Command::Priority { priority } => {
            let priority = priority.parse()?;
            views::cmd_query(app, QueryKey::Priority(priority)).await
        }
        Command::Completed => views::cmd_query(app, QueryKey::Completed).await,
        Command::Pending => views::cmd_query(app, QueryKey::Pending).await,
        // The session length was already folded into the config.
        Command::Focus { id, .. } => focus::cmd_focus(app, &id).await,
        Command::Keys { chords, select } => views::cmd_keys(app, &chords, select),
        Command::Palette { query, run } => views::cmd_palette(app, query.as_deref(), run.as_deref()),
        Command::Stats => views::cmd_stats(app),
    };

    app.flush_toasts();
    result
}

/// The command used when none is given.
pub fn default_command() -> Command {
    Command::List {
        filter: FilterMode::All,
        search: None,
        select: None,
    }
}
