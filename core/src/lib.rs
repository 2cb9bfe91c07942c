pub mod combatant;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod literal;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod timestamp;
pub mod tokenizer;
pub mod value;

// Re-exports for convenience
pub use dispatch::{EventDispatcher, Record};
pub use error::ParseError;
pub use pipeline::{ConversionReport, FileOutcome, LogConverter, convert_file, convert_files};
pub use state::ParserState;
