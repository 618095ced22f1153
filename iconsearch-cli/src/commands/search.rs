//! Search command - run one query and print the result grid.

use std::sync::Arc;

use console::style;
use iconsearch::search::{Query, SearchOutcome};

use super::common::{follow_progress, print_banner};
use crate::error::CliError;
use crate::presenter::TerminalPresenter;
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the search command.
pub struct SearchArgs {
    pub query: String,
    pub show_addresses: bool,
}

/// Run the search command.
pub fn run(options: &GlobalOptions, args: SearchArgs) -> Result<(), CliError> {
    // Reject short queries before touching the network.
    Query::parse(&args.query)?;

    let runner = CliRunner::new(options)?;
    runner.log_startup("search");
    print_banner(&runner);

    let presenter = Arc::new(TerminalPresenter::new(args.show_addresses));
    let connection = runner.connect(presenter.clone())?;
    let progress = follow_progress(&runner, &connection.session, presenter);

    let session = Arc::clone(&connection.session);
    let result = runner.block_on(async move {
        session.start().await?;
        let outcome = session.submit(&args.query).await?;
        Ok::<_, CliError>(outcome)
    });

    progress.abort();
    connection.close(&runner);

    let outcome = result?;
    if !outcome.failures().is_empty() {
        eprintln!();
        for failure in outcome.failures() {
            eprintln!(
                "  {} {}",
                style(&failure.name).yellow(),
                style(&failure.reason).dim()
            );
        }
    }
    if let SearchOutcome::AllFailed { failures } = &outcome {
        tracing::warn!(failed = failures.len(), "Search produced no icons");
    }
    Ok(())
}
