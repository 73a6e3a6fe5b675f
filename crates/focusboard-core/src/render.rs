use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use focusboard_shared::{Priority, Task};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_clock, format_relative};
use crate::events::{Toast, ToastKind};
use crate::palette::PaletteEntry;
use crate::store::{PomodoroState, TaskStats, TaskStore};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?;
        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn write_task_table(
        &self,
        out: &mut dyn Write,
        tasks: &[&Task],
        selected: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["", "ID", "Pri", "Title", "Steps", "Due", "Tags"]
            .map(str::to_string)
            .to_vec();

        let rows = tasks
            .iter()
            .map(|task| {
                let marker = if selected == Some(task.id.as_str()) {
                    self.paint(">", "1")
                } else {
                    String::new()
                };
                let title = if task.completed {
                    self.paint(&format!("✓ {}", task.title), "2")
                } else {
                    task.title.clone()
                };
                let steps = if task.steps.is_empty() {
                    String::new()
                } else {
                    format!("{}/{}", task.completed_steps(), task.steps.len())
                };
                vec![
                    marker,
                    self.paint(&task.id, "33"),
                    self.priority_cell(task.priority),
                    title,
                    steps,
                    self.due_cell(task, now),
                    task.tags.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(" "),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(id = %task.id))]
    pub fn write_task_detail(&self, out: &mut dyn Write, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if !task.description.is_empty() {
            writeln!(out, "description {}", task.description)?;
        }
        writeln!(out, "status      {}", if task.completed { "completed" } else { "pending" })?;
        writeln!(out, "priority    {}", self.priority_cell(task.priority))?;
        if !task.tags.is_empty() {
            writeln!(out, "tags        {}", task.tags.join(", "))?;
        }
        if let Some(due) = task.due_date {
            writeln!(
                out,
                "due         {} ({})",
                due.format("%Y-%m-%d %H:%M"),
                self.due_cell(task, now)
            )?;
        }
        writeln!(out, "focus       {} min, {} pomodoro(s)", task.focus_time_minutes, task.pomodoro_count)?;
        writeln!(out, "created     {}", format_relative(task.created_at, now))?;
        writeln!(out, "updated     {}", format_relative(task.updated_at, now))?;

        if !task.steps.is_empty() {
            writeln!(out, "steps       {}/{}", task.completed_steps(), task.steps.len())?;
            for (idx, step) in task.steps.iter().enumerate() {
                let mark = if step.is_completed { "x" } else { " " };
                writeln!(out, "  [{mark}] {idx} {}", step.step_name)?;
            }
        }
        Ok(())
    }

    pub fn write_stats(&self, out: &mut dyn Write, stats: &TaskStats, tags: &[(String, usize)]) -> anyhow::Result<()> {
        writeln!(out, "total       {}", stats.total)?;
        writeln!(out, "completed   {}", stats.completed)?;
        writeln!(out, "pending     {}", stats.pending)?;
        writeln!(out, "rate        {}%", stats.completion_rate)?;
        writeln!(out, "focus       {} min", stats.focus_minutes)?;

        if !tags.is_empty() {
            let rows = tags.iter().map(|(tag, count)| vec![format!("#{tag}"), count.to_string()]).collect();
            writeln!(out)?;
            write_table(out, vec!["Tag".to_string(), "Count".to_string()], rows)?;
        }
        Ok(())
    }

    pub fn write_palette(&self, out: &mut dyn Write, entries: &[PaletteEntry]) -> anyhow::Result<()> {
        if entries.is_empty() {
            writeln!(out, "No results found.")?;
            return Ok(());
        }
        let mut current = None;
        for entry in entries {
            if current != Some(entry.group) {
                writeln!(out, "{}", self.paint(&entry.group.to_string(), "1"))?;
                current = Some(entry.group);
            }
            match &entry.hint {
                Some(hint) => writeln!(out, "  {:<18} {} {}", entry.value, entry.label, self.paint(hint, "2"))?,
                None => writeln!(out, "  {:<18} {}", entry.value, entry.label)?,
            }
        }
        Ok(())
    }

    pub fn write_state(&self, out: &mut dyn Write, store: &TaskStore) -> anyhow::Result<()> {
        let flag = |on: bool| if on { "on" } else { "off" };
        writeln!(out, "filter      {}", store.filter())?;
        writeln!(out, "search      {:?}", store.search_query())?;
        writeln!(
            out,
            "selected    {} (index {})",
            store.selected_task_id().unwrap_or("-"),
            store.selected_index()
        )?;
        if let Some(task) = store.selected_task() {
            writeln!(out, "            {}", task.title)?;
        }
        writeln!(out, "palette     {}", flag(store.is_command_open()))?;
        writeln!(
            out,
            "focus       {} {}",
            flag(store.is_focus_mode()),
            store.focused_task_id().unwrap_or("")
        )?;
        writeln!(out, "editing     {}", store.editing_task_id().unwrap_or("-"))?;
        writeln!(out, "creating    {}", flag(store.is_creating()))?;
        Ok(())
    }

    pub fn toast_line(&self, toast: &Toast) -> String {
        let code = match toast.kind {
            ToastKind::Success => "32",
            ToastKind::Achievement => "33",
            ToastKind::Streak => "35",
        };
        self.paint(&format!("[{}] {}", toast.kind, toast.message), code)
    }

    pub fn clock_line(&self, pomodoro: &PomodoroState, title: &str) -> String {
        let state = if pomodoro.running { "focus" } else { "paused" };
        format!("{} {state}  {title}", self.paint(&format_clock(pomodoro.remaining_secs), "1"))
    }

    fn priority_cell(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::Urgent => "31",
            Priority::High => "33",
            Priority::Medium => "0",
            Priority::Low => "2",
        };
        self.paint(priority.as_str(), code)
    }

    fn due_cell(&self, task: &Task, now: DateTime<Utc>) -> String {
        let Some(due) = task.due_date else {
            return String::new();
        };
        let text = format_relative(due, now);
        if due < now && !task.completed {
            self.paint(&text, "31")
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table(writer: &mut dyn Write, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
            })
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    writeln!(writer, "{}", line(headers.as_slice()))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", line(rule.as_slice()))?;
    for row in &rows {
        writeln!(writer, "{}", line(row.as_slice()))?;
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
