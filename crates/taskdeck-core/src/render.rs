use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::filter::ViewEntry;
use crate::preference::Theme;
use crate::task::{Priority, Task};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(cfg: &Config, theme: Theme) -> anyhow::Result<Self> {
        let color = cfg.color()?;

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            theme,
        })
    }

    #[tracing::instrument(skip(self, entries, today))]
    pub fn print_task_table(
        &self,
        entries: &[ViewEntry<'_>],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, entries, today)?;
        Ok(())
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        entries: &[ViewEntry<'_>],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if entries.is_empty() {
            writeln!(out, "No matching tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Id".to_string(),
            "Done".to_string(),
            "Due".to_string(),
            "Priority".to_string(),
            "Text".to_string(),
        ];

        let rows = entries
            .iter()
            .map(|entry| self.task_row(entry.position, entry.task, today))
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_task_line(&self, verb: &str, position: usize, task: &Task) {
        println!("{verb} task {} '{}'.", position + 1, task.text);
    }

    pub fn print_theme(&self, theme: Theme) {
        let label = self.paint(theme.as_str(), self.accent_code());
        println!("Theme: {label}");
    }

    fn task_row(&self, position: usize, task: &Task, today: NaiveDate) -> Vec<String> {
        let number = self.paint(&(position + 1).to_string(), self.accent_code());
        let short_id = self.paint(&task.short_id(), self.muted_code());
        let done = if task.completed { "[x]" } else { "[ ]" }.to_string();

        let due = task.due_date.clone().unwrap_or_else(|| "N/A".to_string());
        let due = if !task.completed && is_overdue(task, today) {
            self.paint(&due, "31")
        } else {
            due
        };

        let priority = if task.completed {
            self.paint(task.priority.as_str(), self.muted_code())
        } else {
            self.paint(task.priority.as_str(), self.priority_code(task.priority))
        };

        let text = if task.completed {
            self.paint(&task.text, self.muted_code())
        } else {
            task.text.clone()
        };

        vec![number, short_id, done, due, priority, text]
    }

    fn priority_code(&self, priority: Priority) -> &'static str {
        match (self.theme, priority) {
            (Theme::Light, Priority::High) => "31",
            (Theme::Light, Priority::Medium) => "33",
            (Theme::Light, Priority::Low) => "32",
            (Theme::Dark, Priority::High) => "91",
            (Theme::Dark, Priority::Medium) => "93",
            (Theme::Dark, Priority::Low) => "92",
        }
    }

    fn accent_code(&self) -> &'static str {
        match self.theme {
            Theme::Light => "35",
            Theme::Dark => "96",
        }
    }

    fn muted_code(&self) -> &'static str {
        match self.theme {
            Theme::Light => "2",
            Theme::Dark => "90",
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Only `YYYY-MM-DD` dates can be overdue; anything else is shown as typed.
fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.due_date
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        .is_some_and(|due| due < today)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
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

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{StatusFilter, compute};

    fn plain() -> Renderer {
        Renderer {
            color: false,
            theme: Theme::Light,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn table_shows_collection_numbers_and_placeholders() {
        let tasks = vec![
            Task::new("Buy milk".into(), Some("2024-01-01".into()), Priority::High),
            Task::new("Call mom".into(), None, Priority::Low),
        ];
        let entries = compute(&tasks, StatusFilter::All, "mom");
        let mut out = Vec::new();

        plain().write_task_table(&mut out, &entries, today()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# "));
        assert!(lines[2].starts_with("2 "));
        assert!(lines[2].contains(&tasks[1].short_id()));
        assert!(lines[2].contains("N/A"));
        assert!(lines[2].contains("Low"));
        assert!(lines[2].contains("Call mom"));
    }

    #[test]
    fn empty_view_says_so() {
        let mut out = Vec::new();

        plain().write_task_table(&mut out, &[], today()).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "No matching tasks.\n");
    }

    #[test]
    fn overdue_needs_a_parseable_past_date() {
        let past = Task::new("a".into(), Some("2024-01-01".into()), Priority::Medium);
        let future = Task::new("b".into(), Some("2030-01-01".into()), Priority::Medium);
        let free_form = Task::new("c".into(), Some("next week".into()), Priority::Medium);

        assert!(is_overdue(&past, today()));
        assert!(!is_overdue(&future, today()));
        assert!(!is_overdue(&free_form, today()));
    }

    #[test]
    fn ansi_is_ignored_for_widths() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
