use std::fmt;

/// Categorized git failures with operator guidance
#[derive(Debug)]
pub enum GitError {
    /// A phase tag or path is not in the repository
    NotFound(String),
    /// Commit refused because no identity is configured
    Identity(String),
    /// Another git process left a lock behind
    Locked(String),
    /// Filesystem permission errors
    Permission(String),
    /// The tracked tree is not a usable repository
    Corrupt(String),
    /// Unknown or uncategorized error
    Unknown(String),
}

impl GitError {
    /// Parse git stderr to categorize the error
    #[must_use]
    pub fn from_stderr(command: &str, stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let detail = extract_meaningful_message(stderr);

        if stderr_lower.contains("unknown revision")
            || stderr_lower.contains("bad revision")
            || stderr_lower.contains("ambiguous argument")
            || stderr_lower.contains("did not match any")
        {
            return Self::NotFound(format!("{command}: Not found - {detail}"));
        }

        if stderr_lower.contains("please tell me who you are")
            || stderr_lower.contains("empty ident")
            || stderr_lower.contains("unable to auto-detect email")
        {
            return Self::Identity(format!("{command}: Missing identity - {detail}"));
        }

        if stderr_lower.contains("index.lock") || stderr_lower.contains("another git process") {
            return Self::Locked(format!("{command}: Repository locked - {detail}"));
        }

        if stderr_lower.contains("permission denied")
            || stderr_lower.contains("unable to create")
            || stderr_lower.contains("read-only")
        {
            return Self::Permission(format!("{command}: Permission error - {detail}"));
        }

        if stderr_lower.contains("not a git repository")
            || stderr_lower.contains("corrupt")
            || stderr_lower.contains("bad object")
        {
            return Self::Corrupt(format!("{command}: Broken repository - {detail}"));
        }

        Self::Unknown(format!("{command}: {detail}"))
    }

    /// A user-facing message with a hint for fixing the problem
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(msg) => format!(
                "{msg}\n\nSuggestions:\n\
                 - Capture both 'before' and 'after' for this session\n\
                 - Check the path was a text file in both captures"
            ),
            Self::Identity(msg) => format!(
                "{msg}\n\nSuggestions:\n\
                 - Set [git] user_name and user_email in the configuration"
            ),
            Self::Locked(msg) => format!(
                "{msg}\n\nSuggestions:\n\
                 - Wait for the other capture to finish\n\
                 - Remove a stale fs_git/.git/index.lock if no capture is running"
            ),
            Self::Permission(msg) => format!(
                "{msg}\n\nSuggestions:\n\
                 - Run the capture as a user that can write the session directory"
            ),
            Self::Corrupt(msg) => format!(
                "{msg}\n\nSuggestions:\n\
                 - Remove the session's fs_git directory and capture again"
            ),
            Self::Unknown(msg) => msg.clone(),
        }
    }

    /// Short description of the error type
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not Found",
            Self::Identity(_) => "Missing Identity",
            Self::Locked(_) => "Repository Locked",
            Self::Permission(_) => "Permission Denied",
            Self::Corrupt(_) => "Broken Repository",
            Self::Unknown(_) => "Unknown Error",
        }
    }
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for GitError {}

/// First few non-empty stderr lines joined on one line
fn extract_meaningful_message(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(3)
        .collect();

    if lines.is_empty() {
        return "No error details available".to_string();
    }

    lines.join(" | ")
}
