//! Helpers shared by the bucket commands.

use std::sync::Arc;

use console::style;
use tokio::task::JoinHandle;

use iconsearch::search::SearchProgress;
use iconsearch::session::SearchSession;

use crate::presenter::TerminalPresenter;
use crate::runner::CliRunner;

/// Print the startup banner.
pub fn print_banner(runner: &CliRunner) {
    let storage = &runner.config().storage;
    println!(
        "{} v{}",
        style("Icon Search").bold(),
        iconsearch::VERSION
    );
    println!("Bucket: {}", storage.bucket);
    println!("Folder: {}", runner.folder());
    println!();
}

/// Spinner text for a progress snapshot.
pub fn progress_message(progress: &SearchProgress) -> String {
    if progress.failed == 0 {
        format!("Resolving {}/{}", progress.settled(), progress.total)
    } else {
        format!(
            "Resolving {}/{} ({} failed)",
            progress.settled(),
            progress.total,
            progress.failed
        )
    }
}

/// Mirror search progress into the spinner until the session goes away.
pub fn follow_progress(
    runner: &CliRunner,
    session: &SearchSession,
    presenter: Arc<TerminalPresenter>,
) -> JoinHandle<()> {
    let mut progress = session.coordinator().subscribe_progress();
    runner.runtime().spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            presenter.set_message(progress_message(&snapshot));
        }
    })
}
