/// Glob-style exclusion matching with component-prefix semantics.
pub mod exclude;

/// Lazy, pruning walk over the configured scan roots.
pub mod walker;

pub use exclude::ExclusionMatcher;
pub use walker::{EntryKind, PathEnumerator, WalkItem};
