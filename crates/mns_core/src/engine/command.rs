//! Engine command representation.

use std::fmt;
use std::path::Path;

/// One discrete command for the external image-processing engine.
///
/// A command is an immutable ordered token list; `Display` joins the tokens
/// with single spaces, which is exactly the line sent over the engine
/// transport. Assembly from configuration happens in pure builder functions
/// (see `calibration` and `stacking`), never inside the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    tokens: Vec<String>,
}

impl EngineCommand {
    /// Create a command from ordered tokens.
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Directory-change command.
    pub fn cd(dir: &Path) -> Self {
        Self::new(["cd".to_string(), dir.display().to_string()])
    }

    /// The command verb (first token).
    pub fn name(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or("")
    }

    /// All tokens in issue order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}
