//! List command - print every icon in the density folder.

use std::sync::Arc;

use console::style;

use super::common::print_banner;
use crate::error::CliError;
use crate::presenter::{render_grid, TerminalPresenter, GRID_COLUMNS};
use crate::runner::{CliRunner, GlobalOptions};

/// Run the list command.
pub fn run(options: &GlobalOptions) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("list");
    print_banner(&runner);

    let presenter = Arc::new(TerminalPresenter::new(false));
    let connection = runner.connect(presenter)?;
    let session = Arc::clone(&connection.session);
    let result = runner.block_on(async move { session.start().await });
    connection.close(&runner);

    let handles = result?;
    let names: Vec<String> = handles.iter().map(|h| h.name().to_string()).collect();
    let (_, cols) = console::Term::stdout().size();

    println!("{}", render_grid(&names, GRID_COLUMNS, usize::from(cols)));
    println!();
    println!("{} icons", style(names.len()).bold());
    Ok(())
}
