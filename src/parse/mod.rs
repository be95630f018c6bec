mod error;
mod grammar;
mod parser;
mod services;

pub use error::{ParseError, ParseErrorKind};
pub use parser::{ParseOptions, Parser, PortResolution};
pub use services::ServiceTable;

use crate::Rule;

/// Parse one ACL line with default options (lenient service resolution,
/// built-in service names only).
///
/// # Errors
///
/// Returns [`ParseError`] if the line is not a recognizable ACL entry.
pub fn parse_line(line: &str) -> Result<Rule, ParseError> {
    Parser::default().parse(line)
}
