use crate::StatediffContext;
use crate::output::{self, Verbosity};
use crate::session::Session;
use crate::storage::Phase;
use anyhow::Result;

/// Capture the `before` phase of a session
///
/// # Errors
///
/// Returns an error if the session cannot be opened, the configuration is
/// unusable, or the snapshot cannot be written.
pub fn execute(ctx: &StatediffContext, session: &str, excludes: &[String]) -> Result<()> {
    let session = Session::open(ctx, session)?
        .with_excludes(excludes)
        .with_progress(output::get_verbosity() != Verbosity::Quiet);

    output::action("Capturing", &format!("before state for '{}'", session.name()));
    let summary = session.capture(Phase::Before)?;
    super::print_capture_summary(&summary);

    output::success(&format!(
        "Before snapshot saved in {}",
        session.dir().display()
    ));
    output::info(&format!(
        "Apply your changes, then run: statediff after {}",
        session.name()
    ));
    Ok(())
}
