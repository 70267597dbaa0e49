//! Error types shared by the grid, the routing collaborators and the filler.
use thiserror::Error;

/// Failure to read or write a named node field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("node field `{0}` not found")]
    NotFound(String),

    #[error("node field `{name}` does not hold {expected} values")]
    WrongKind { name: String, expected: &'static str },

    #[error("node field `{name}` has {actual} values but the grid has {expected} nodes")]
    Shape {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillError {
    #[error(
        "grid has no `{default}` node field and no alternate elevation field was configured"
    )]
    NoElevationField { default: &'static str },

    #[error("configured elevation field `{0}` does not exist on the grid")]
    MissingElevationField(String),

    #[error("invalid fill configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    /// Fatal: no slope magnitude preserved drainage direction at the lake
    /// margins. Elevations have been restored to their pre-fill values.
    #[error(
        "no stable sloped fill found after {retries} attempts (last slope tried {last_slope:e})"
    )]
    StabilityFailure { retries: u32, last_slope: f64 },

    #[error("scratch field `{name}` {problem} at cleanup")]
    FieldBookkeeping { name: String, problem: String },
}

pub type Result<T> = std::result::Result<T, FillError>;
