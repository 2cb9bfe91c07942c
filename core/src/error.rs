use thiserror::Error;

/// Decode failures, split by blast radius.
///
/// Everything except `Io` is a line-level condition: the offending line is
/// dropped and the file keeps streaming until the pipeline's skip threshold
/// is reached. `Io` only occurs at the file boundary.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("empty CSV or missing event after timestamp")]
    MissingEventType,

    #[error("invalid format for {event}: insufficient columns")]
    InsufficientColumns { event: String },

    #[error("incomplete line for {0}")]
    IncompleteEvent(String),

    #[error("unknown event format: {0}")]
    UnknownEventFormat(String),

    #[error("invalid {field} in {event}: {token}")]
    InvalidField {
        event: &'static str,
        field: &'static str,
        token: String,
    },

    #[error("{label} literal malformed")]
    MalformedLiteral { label: &'static str },

    #[error("combatant info incomplete: missing {block}")]
    IncompleteSnapshot { block: &'static str },

    #[error("unexpected item entry in equipment")]
    MalformedEquipment,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Whether this failure may be attributed to a single line (as opposed
    /// to the enclosing file).
    pub fn is_line_level(&self) -> bool {
        !matches!(self, ParseError::Io(_))
    }
}
