//! Output formatting and the refusal error.

use serde::Serialize;

/// Exit code for an operation the core refused (conflict, not found, ...).
pub const REFUSED_EXIT_CODE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }

    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Print `human` or the JSON rendering of `value`.
    #[allow(clippy::print_stdout)]
    pub fn emit<T: Serialize>(self, human: &str, value: &T) -> anyhow::Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string(value)?);
        } else {
            println!("{human}");
        }
        Ok(())
    }
}

/// The core answered with a refusal. The message has already been printed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Refused(pub String);
