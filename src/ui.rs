//! Terminal output helpers.
//!
//! - `Table` - box-drawn summary table that shrinks its widest column to fit
//!   the terminal
//! - `spinner` / `file_bar` - indicatif styles shared by the stages
//! - `init_logging` - tracing subscriber setup

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Narrowest a column is squeezed to before giving up on fitting.
const MIN_COLUMN: usize = 8;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are dropped.
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn print(&self) {
        let (_, width) = console::Term::stdout().size();
        for line in self.render(width as usize) {
            println!("{}", line);
        }
    }

    pub fn render(&self, max_width: usize) -> Vec<String> {
        if self.headers.is_empty() {
            return Vec::new();
        }

        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|h| console::measure_text_width(h))
            .collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(console::measure_text_width(&flatten(cell)));
            }
        }
        fit_columns(&mut widths, max_width);

        let border = |left: &str, mid: &str, right: &str| {
            let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, inner.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let mut s = String::from("  │");
            for (cell, &width) in cells.iter().zip(&widths) {
                let text = console::truncate_str(&flatten(cell), width, "...").to_string();
                let pad = width.saturating_sub(console::measure_text_width(&text));
                let text = if bold { text.bold().to_string() } else { text };
                s.push_str(&format!(" {}{} │", text, " ".repeat(pad)));
            }
            s
        };

        let mut out = vec![border("┌", "┬", "┐"), line(&self.headers, true), border("├", "┼", "┤")];
        out.extend(self.rows.iter().map(|row| line(row, false)));
        out.push(border("└", "┴", "┘"));
        out
    }
}

/// Shave the widest column until the table fits or nothing is wider than
/// `MIN_COLUMN`.
fn fit_columns(widths: &mut [usize], max_width: usize) {
    let overhead = 3 + 3 * widths.len();
    let available = max_width.saturating_sub(overhead);
    let mut total: usize = widths.iter().sum();
    while total > available {
        let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
            return;
        };
        if widest <= MIN_COLUMN {
            return;
        }
        widths[idx] -= 1;
        total -= 1;
    }
}

fn flatten(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            _ => c,
        })
        .collect()
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("◜◠◝◞◡◟"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.into());
    pb
}

/// Per-file progress for the analysis stage.
pub fn file_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` when verbose.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
