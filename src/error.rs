use thiserror::Error;

/// Errors surfaced by a shaping pass.
///
/// Field-level problems (failed expressions, missing data, shape
/// mismatches) never show up here; they degrade to `null` in place.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    /// A fragment spreads itself, directly or through other fragments.
    /// Holds the chain of fragment names, ending with the repeated one.
    #[error("fragment cycle: {}", .0.join(" -> "))]
    FragmentCycle(Vec<String>),
}

pub type Result<T> = std::result::Result<T, ShapeError>;
