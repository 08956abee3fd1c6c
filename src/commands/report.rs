use crate::StatediffContext;
use crate::output;
use crate::report::SectionFilter;
use crate::session::Session;
use anyhow::Result;

/// Rebuild the report from the stored phases
///
/// # Errors
///
/// Returns an error if either phase is missing or corrupt, or the report
/// cannot be written.
pub fn execute(
    ctx: &StatediffContext,
    session: &str,
    sections: &str,
    print: bool,
    json: bool,
) -> Result<()> {
    let filter: SectionFilter = sections.parse()?;
    let session = Session::open(ctx, session)?;
    let outcome = session.report(&filter)?;

    if print {
        print!("{}", outcome.report.render_text());
    } else if json {
        println!("{}", outcome.report.to_json()?);
    } else {
        super::print_report_summary(&outcome.report);
        output::success(&format!("Report: {}", outcome.text_path.display()));
    }
    Ok(())
}
