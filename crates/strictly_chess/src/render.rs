//! Plain-text board rendering for terminals.

use crate::Position;

/// Renders the placement field of a position as an 8x8 grid, white at the bottom.
///
/// Unreadable placement text is returned verbatim rather than failing.
pub fn render_board(position: &Position) -> String {
    let Some(placement) = position.as_str().split_whitespace().next() else {
        return String::new();
    };

    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return position.to_string();
    }

    let mut out = String::new();
    for (index, rank) in ranks.iter().enumerate() {
        out.push_str(&format!("{} ", 8 - index));
        for c in rank.chars() {
            match c.to_digit(10) {
                Some(empty) => (0..empty).for_each(|_| out.push_str(" .")),
                None => {
                    out.push(' ');
                    out.push(c);
                }
            }
        }
        out.push('\n');
    }
    out.push_str("   a b c d e f g h");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_grid() {
        let text = render_board(&Position::start());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "8  r n b q k b n r");
        assert_eq!(lines[4], "4  . . . . . . . .");
        assert_eq!(lines[8], "   a b c d e f g h");
    }

    #[test]
    fn test_garbage_is_returned_verbatim() {
        let junk = Position::new("not a board");
        assert_eq!(render_board(&junk), "not a board");
    }
}
