//! The two seats of a session.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the two turn-taking roles in a session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Side {
    /// Moves first.
    White,
    /// Moves second.
    Black,
}

impl Side {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<chess::Color> for Side {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Side::White,
            chess::Color::Black => Side::Black,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Side::from_str("WHITE").unwrap(), Side::White);
        assert_eq!(Side::from_str("black").unwrap(), Side::Black);
        assert!(Side::from_str("red").is_err());
    }

    #[test]
    fn test_opponent_flips() {
        assert_eq!(Side::White.opponent(), Side::Black);
        assert_eq!(Side::Black.opponent().opponent(), Side::Black);
    }
}
