use crossterm::{
    cursor::MoveToPreviousLine,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io;

use crate::extractor::SkipReason;
use crate::harvest::{HarvestObserver, HarvestReport};
use crate::models::Record;

/// Console status for a harvest run: one line per category, redrawn in place while it runs.
pub struct HarvestTUI {
    total_categories: usize,
    current: Option<CategoryLine>,
    live: bool,
    spinner_tick: usize,
}

struct CategoryLine {
    index: usize,
    name: String,
    written: usize,
    skipped: usize,
    max_places: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum LineStatus {
    Running,
    Done,
    Failed,
}

impl HarvestTUI {
    /// `live` redraws the running category line in place; leave it off when log lines are interleaved.
    pub fn new(total_categories: usize, live: bool) -> Self {
        Self {
            total_categories,
            current: None,
            live,
            spinner_tick: 0,
        }
    }

    /// Show grey summary line with the resumed identity count
    pub fn show_resume(&self, seen: usize, output: &str) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!("📁 Loaded {} existing places from {}\n", seen, output)),
            ResetColor
        )
    }

    fn draw(&self, line: &CategoryLine, status: LineStatus) -> io::Result<()> {
        let (color, icon) = match status {
            LineStatus::Running => (Color::White, self.spinner()),
            LineStatus::Done => (Color::Green, "✅"),
            LineStatus::Failed => (Color::Red, "❌"),
        };
        execute!(
            io::stdout(),
            SetForegroundColor(color),
            Print(format!(
                "{} [{}/{}] {} - {}/{} written, {} skipped\n",
                icon,
                line.index,
                self.total_categories,
                Self::truncate(&line.name),
                line.written,
                line.max_places,
                line.skipped
            )),
            ResetColor
        )
    }

    fn redraw(&self, status: LineStatus) -> io::Result<()> {
        if let Some(line) = &self.current {
            if self.live {
                execute!(io::stdout(), MoveToPreviousLine(1), Clear(ClearType::CurrentLine))?;
            }
            self.draw(line, status)?;
        }
        Ok(())
    }

    fn spinner(&self) -> &'static str {
        match self.spinner_tick % 4 {
            0 => "⠋",
            1 => "⠙",
            2 => "⠹",
            _ => "⠸",
        }
    }

    fn truncate(name: &str) -> String {
        if name.chars().count() > 40 {
            format!("{}...", name.chars().take(37).collect::<String>())
        } else {
            name.to_string()
        }
    }

    pub fn show_final_summary(&self, report: &HarvestReport) -> io::Result<()> {
        execute!(
            io::stdout(),
            Print("─".repeat(80)),
            Print("\n"),
            SetForegroundColor(Color::Green),
            Print(format!(
                "✅ Harvest completed: {} categories, {} places written",
                report.categories_completed, report.records_written
            )),
            ResetColor
        )?;
        if report.categories_failed > 0 {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Red),
                Print(format!(", {} categories failed", report.categories_failed)),
                ResetColor
            )?;
        }
        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                " | skipped {} seen, {} unreadable | {} session restarts\n",
                report.skipped_seen, report.skipped_unreadable, report.session_restarts
            )),
            ResetColor
        )
    }
}

impl HarvestObserver for HarvestTUI {
    fn category_started(&mut self, index: usize, category: &str, max_places: usize) {
        let line = CategoryLine {
            index,
            name: category.to_string(),
            written: 0,
            skipped: 0,
            max_places,
        };
        let _ = self.draw(&line, LineStatus::Running);
        self.current = Some(line);
    }

    fn item_written(&mut self, _record: &Record) {
        self.spinner_tick += 1;
        if let Some(line) = self.current.as_mut() {
            line.written += 1;
        }
        if self.live {
            let _ = self.redraw(LineStatus::Running);
        }
    }

    fn item_skipped(&mut self, _reason: &SkipReason) {
        self.spinner_tick += 1;
        if let Some(line) = self.current.as_mut() {
            line.skipped += 1;
        }
        if self.live {
            let _ = self.redraw(LineStatus::Running);
        }
    }

    fn category_restarted(&mut self) {
        let _ = execute!(
            io::stdout(),
            SetForegroundColor(Color::Yellow),
            Print("🔄 Browser session replaced, retrying category\n"),
            ResetColor
        );
        if let Some(line) = &self.current {
            let _ = self.draw(line, LineStatus::Running);
        }
    }

    fn category_finished(&mut self, _category: &str, failed: bool) {
        let status = if failed { LineStatus::Failed } else { LineStatus::Done };
        let _ = self.redraw(status);
        self.current = None;
    }
}
