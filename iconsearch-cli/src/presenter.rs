//! Terminal presenter.
//!
//! Busy state is a spinner on stderr, results are a numbered three-column
//! grid of icon names followed by their addresses, and notices are single
//! styled lines.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::{pad_str, style, Alignment, Term};
use indicatif::{ProgressBar, ProgressStyle};

use iconsearch::presenter::{Notice, ResultPresenter};
use iconsearch::storage::ResolvedAddress;

/// Columns in the result grid.
pub const GRID_COLUMNS: usize = 3;

/// Presenter writing to the terminal.
pub struct TerminalPresenter {
    spinner: Mutex<Option<ProgressBar>>,
    show_addresses: bool,
}

impl TerminalPresenter {
    /// Create a presenter. With `show_addresses`, every address is printed
    /// below the grid.
    pub fn new(show_addresses: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            show_addresses,
        }
    }

    /// Update the spinner text, if the spinner is showing.
    pub fn set_message(&self, message: String) {
        let spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(spinner) = spinner.as_ref() {
            spinner.set_message(message);
        }
    }

    fn terminal_width() -> usize {
        let (_, cols) = Term::stdout().size();
        usize::from(cols).max(GRID_COLUMNS * 12)
    }
}

impl ResultPresenter for TerminalPresenter {
    fn set_busy(&self, busy: bool) {
        let mut spinner = self.spinner.lock().unwrap_or_else(PoisonError::into_inner);
        if busy {
            if spinner.is_none() {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_message("Working...");
                bar.enable_steady_tick(Duration::from_millis(100));
                *spinner = Some(bar);
            }
        } else if let Some(bar) = spinner.take() {
            bar.finish_and_clear();
        }
    }

    fn present(&self, addresses: &[ResolvedAddress]) {
        let names: Vec<String> = addresses
            .iter()
            .map(|a| display_name(a.as_str()).to_string())
            .collect();

        println!();
        println!("{}", render_grid(&names, GRID_COLUMNS, Self::terminal_width()));
        println!();
        println!("{} icons", style(addresses.len()).bold());

        if self.show_addresses {
            println!();
            for (i, address) in addresses.iter().enumerate() {
                println!("{:>4}. {}", i + 1, style(address).dim());
            }
        }
    }

    fn notify(&self, notice: Notice) {
        let line = match &notice {
            Notice::NetworkRestored => style(notice.to_string()).green(),
            Notice::NoMatches | Notice::QueryTooShort { .. } => style(notice.to_string()).yellow(),
            _ => style(notice.to_string()).red(),
        };
        eprintln!("{}", line);
    }
}

/// Icon filename from an address.
///
/// Handles both plain paths and single-segment encoded object paths
/// (`.../o/folder%2Fname.png?alt=media`).
pub fn display_name(address: &str) -> &str {
    let path = address.split('?').next().unwrap_or(address);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind("%2F").or_else(|| segment.rfind("%2f")) {
        Some(pos) => &segment[pos + 3..],
        None => segment,
    }
}

/// Lay out `names` in a numbered grid of `columns` columns fitting `width`.
pub fn render_grid(names: &[String], columns: usize, width: usize) -> String {
    let columns = columns.max(1);
    let cell_width = (width / columns).max(8);
    let number_width = names.len().to_string().len();

    names
        .chunks(columns)
        .enumerate()
        .map(|(row, chunk)| {
            chunk
                .iter()
                .enumerate()
                .map(|(col, name)| {
                    let number = row * columns + col + 1;
                    let cell = format!("{:>w$}. {}", number, name, w = number_width);
                    pad_str(&cell, cell_width - 1, Alignment::Left, Some("…")).into_owned()
                })
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
