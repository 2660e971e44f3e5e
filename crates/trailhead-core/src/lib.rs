pub mod matching;
pub mod parse;
pub mod types;

pub use matching::{scope_matches, word_boundary_match, WordMatcher};
pub use parse::{parse_log, parse_record, ParseError, ParsedRecord};
pub use types::*;
