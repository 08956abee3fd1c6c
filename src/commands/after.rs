use crate::StatediffContext;
use crate::output::{self, Verbosity};
use crate::report::SectionFilter;
use crate::session::Session;
use crate::storage::Phase;
use anyhow::Result;

/// Capture the `after` phase and write the report
///
/// # Errors
///
/// Returns an error if no `before` snapshot exists, the section list names
/// an unknown section, or capturing or reporting fails.
pub fn execute(
    ctx: &StatediffContext,
    session: &str,
    sections: &str,
    excludes: &[String],
) -> Result<()> {
    // Parsed up front so a typo fails before the scan
    let filter: SectionFilter = sections.parse()?;

    let session = Session::open(ctx, session)?
        .with_excludes(excludes)
        .with_progress(output::get_verbosity() != Verbosity::Quiet);

    output::action("Capturing", &format!("after state for '{}'", session.name()));
    let summary = session.capture(Phase::After)?;
    super::print_capture_summary(&summary);

    output::action("Comparing", "before and after");
    let outcome = session.report(&filter)?;
    super::print_report_summary(&outcome.report);

    output::success(&format!("Report: {}", outcome.text_path.display()));
    output::info(&format!("JSON:   {}", outcome.json_path.display()));
    Ok(())
}
