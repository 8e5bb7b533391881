//! Normalization of raw move text.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A move as submitted by an agent, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum MoveInput {
    /// Long-form coordinate notation, lowercased: `e2e4`, `e7e8q`.
    #[display("{_0}")]
    Coordinate(String),
    /// Anything else, passed through trimmed for the oracle to interpret.
    #[display("{_0}")]
    Text(String),
}

/// The submitted move text was blank.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Move input is empty")]
pub struct MoveInputError;

impl MoveInput {
    /// Classifies raw move text.
    ///
    /// Text shaped like `<from><to>[promotion]` becomes [`MoveInput::Coordinate`];
    /// everything else is kept verbatim as [`MoveInput::Text`].
    ///
    /// # Errors
    ///
    /// Returns [`MoveInputError`] if the input is blank.
    #[instrument]
    pub fn parse(raw: &str) -> Result<Self, MoveInputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MoveInputError);
        }

        let lowered = trimmed.to_ascii_lowercase();
        if is_coordinate(&lowered) {
            Ok(Self::Coordinate(lowered))
        } else {
            Ok(Self::Text(trimmed.to_string()))
        }
    }

    /// Returns the normalized text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Coordinate(s) | Self::Text(s) => s,
        }
    }
}

fn is_coordinate(text: &str) -> bool {
    let bytes = text.as_bytes();
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);

    match bytes.len() {
        4 => square(bytes[0], bytes[1]) && square(bytes[2], bytes[3]),
        5 => {
            square(bytes[0], bytes[1])
                && square(bytes[2], bytes[3])
                && matches!(bytes[4], b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    }
}
