use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;
use tracing::{Level, debug, span};

/// Configuration for unified diff rendering
#[derive(Debug, Clone, Copy)]
pub struct UnifiedDiffConfig {
    /// Number of context lines around changes (typically 3)
    pub context_lines: usize,
    /// Whether to colorize the output
    pub colorize: bool,
}

impl Default for UnifiedDiffConfig {
    fn default() -> Self {
        Self {
            context_lines: 3,
            colorize: false,
        }
    }
}

/// Render a unified diff between two text blobs.
///
/// Produces:
/// - headers (`--- <before_label>` and `+++ <after_label>`)
/// - hunk headers (`@@ -10,7 +10,9 @@`)
/// - context lines prefixed with a space
/// - deletions prefixed with `-`, additions with `+`
///
/// Returns an empty string when the inputs are identical.
#[must_use]
pub fn render_unified(
    before: &str,
    after: &str,
    labels: (&str, &str),
    config: &UnifiedDiffConfig,
) -> String {
    let (before_label, after_label) = labels;
    let span = span!(
        Level::DEBUG,
        "render_unified",
        label = after_label,
        context = config.context_lines
    );
    let _guard = span.enter();

    if before == after {
        return String::new();
    }

    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();

    let old_header = format!("--- {before_label}");
    let new_header = format!("+++ {after_label}");
    if config.colorize {
        let _ = writeln!(out, "{}", old_header.red());
        let _ = writeln!(out, "{}", new_header.green());
    } else {
        let _ = writeln!(out, "{old_header}");
        let _ = writeln!(out, "{new_header}");
    }

    let mut total_changes = 0;

    for hunk in diff
        .unified_diff()
        .context_radius(config.context_lines)
        .iter_hunks()
    {
        let hunk_header = hunk.header().to_string();
        if config.colorize {
            let _ = writeln!(out, "{}", hunk_header.cyan());
        } else {
            let _ = writeln!(out, "{hunk_header}");
        }

        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => {
                    total_changes += 1;
                    let line = format!("-{change}");
                    if config.colorize { line.red().to_string() } else { line }
                }
                ChangeTag::Insert => {
                    total_changes += 1;
                    let line = format!("+{change}");
                    if config.colorize { line.green().to_string() } else { line }
                }
                ChangeTag::Equal => format!(" {change}"),
            };

            out.push_str(&line);
            // Last line of a blob without a trailing newline
            if !line.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    debug!(label = after_label, changes = total_changes, "Diff rendered");
    out
}
