//! Shell command - interactive search prompt.
//!
//! Keeps one session open: the index is loaded once, connectivity changes
//! are followed in the background, and every line is a query.

use std::sync::Arc;

use console::style;
use dialoguer::Input;
use tracing::warn;

use iconsearch::search::SearchError;
use iconsearch::session::SearchSession;

use super::common::{follow_progress, print_banner};
use crate::error::CliError;
use crate::presenter::TerminalPresenter;
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the shell command.
pub struct ShellArgs {
    pub show_addresses: bool,
}

fn print_help() {
    println!("Type a filename fragment to search (at least two characters).");
    println!("  :reload   load the icon list again");
    println!("  :status   show session state");
    println!("  :quit     leave");
    println!();
}

fn print_status(session: &SearchSession) {
    let index = session.index().state();
    let input = if session.input_enabled() {
        style("enabled").green()
    } else {
        style("disabled").red()
    };
    println!("State:  {}", session.coordinator().state().display_status());
    println!("Index:  {}", index.label());
    println!("Input:  {}", input);
}

/// Run the shell command.
pub fn run(options: &GlobalOptions, args: ShellArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("shell");
    print_banner(&runner);

    let presenter = Arc::new(TerminalPresenter::new(args.show_addresses));
    let connection = runner.connect(presenter.clone())?;
    let session = Arc::clone(&connection.session);
    let progress = follow_progress(&runner, &session, presenter);

    let events = {
        let session = Arc::clone(&session);
        runner
            .runtime()
            .spawn(async move { session.run_events().await })
    };

    match runner.block_on(session.start()) {
        Ok(handles) => println!("{} icons loaded.", style(handles.len()).bold()),
        Err(e) => {
            warn!(error = %e, "Initial index load failed");
            println!("Icon list not loaded. Use :reload once the network is back.");
        }
    }
    println!();
    print_help();

    let result = prompt_loop(&runner, &session);

    progress.abort();
    connection.close(&runner);
    let _ = runner.block_on(events);
    result
}

fn prompt_loop(runner: &CliRunner, session: &SearchSession) -> Result<(), CliError> {
    loop {
        let prompt = if session.input_enabled() {
            "Search".to_string()
        } else {
            format!("Search ({})", style("unavailable").red())
        };
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;

        match line.trim() {
            "" => continue,
            ":q" | ":quit" | ":exit" => return Ok(()),
            ":help" => print_help(),
            ":status" => print_status(session),
            ":reload" => match runner.block_on(session.retry_load()) {
                Ok(handles) => println!("{} icons loaded.", style(handles.len()).bold()),
                Err(e) => eprintln!("{}", style(e).red()),
            },
            _ => match runner.block_on(session.submit(&line)) {
                Ok(_) => {}
                // Already shown as notices.
                Err(SearchError::QueryTooShort { .. }) | Err(SearchError::NetworkUnavailable) => {}
                Err(e) => eprintln!("{}", style(e).red()),
            },
        }
    }
}
