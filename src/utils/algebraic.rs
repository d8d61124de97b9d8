//! Long-algebraic coordinate conversions.
//!
//! Converts between human-readable coordinates (e.g., `e4`, `e7e8q`) and the
//! internal square/move representations reused by the FEN and UCI components.
//! Castling uses the king's final square on both sides of the conversion, so
//! `e1g1` maps directly onto the internal castle move.

use crate::board::position::Position;
use crate::board::types::{file_of, rank_of, square_at, Move, PieceKind, Square};
use crate::errors::ChessError;
use crate::movegen::generator::generate_legal_moves;

/// Convert long algebraic notation (for example: "e4") to a padded-board
/// square index.
#[inline]
pub fn algebraic_to_square(square: &str) -> Result<Square, ChessError> {
    let bytes = square.as_bytes();
    if bytes.len() != 2 {
        return Err(ChessError::InvalidSquare(square.to_owned()));
    }

    let file = bytes[0];
    let rank = bytes[1];

    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return Err(ChessError::InvalidSquare(square.to_owned()));
    }

    Ok(square_at(file - b'a', rank - b'1'))
}

/// Convert a playable padded-board square index to long algebraic notation.
#[inline]
pub fn square_to_algebraic(square: Square) -> String {
    let file_char = char::from(b'a' + file_of(square));
    let rank_char = char::from(b'1' + rank_of(square));
    format!("{file_char}{rank_char}")
}

/// Render a move as a 4- or 5-character long-algebraic string.
pub fn move_to_algebraic(mv: Move) -> String {
    let mut out = String::with_capacity(5);
    out.push_str(&square_to_algebraic(mv.from));
    out.push_str(&square_to_algebraic(mv.to));
    if let Some(promo) = mv.promotion {
        out.push(promotion_char(promo));
    }
    out
}

/// Parse a long-algebraic string against the legal moves of `position`.
///
/// Malformed strings and strings naming no legal move are rejected without
/// touching the position.
pub fn algebraic_to_move(lan: &str, position: &Position) -> Result<Move, ChessError> {
    let bytes = lan.as_bytes();
    if !lan.is_ascii() || (bytes.len() != 4 && bytes.len() != 5) {
        return Err(ChessError::InvalidMoveString(lan.to_owned()));
    }

    let from = algebraic_to_square(&lan[0..2])?;
    let to = algebraic_to_square(&lan[2..4])?;
    let promotion = match bytes.get(4).copied() {
        None => None,
        Some(b'q') => Some(PieceKind::Queen),
        Some(b'r') => Some(PieceKind::Rook),
        Some(b'b') => Some(PieceKind::Bishop),
        Some(b'n') => Some(PieceKind::Knight),
        Some(_) => return Err(ChessError::InvalidMoveString(lan.to_owned())),
    };

    generate_legal_moves(position)
        .into_iter()
        .find(|m| m.from == from && m.to == to && m.promotion == promotion)
        .ok_or_else(|| ChessError::IllegalMove(lan.to_owned()))
}

#[inline]
fn promotion_char(kind: PieceKind) -> char {
    match kind {
        PieceKind::Queen => 'q',
        PieceKind::Rook => 'r',
        PieceKind::Bishop => 'b',
        PieceKind::Knight => 'n',
        // Generation never emits other promotion kinds.
        _ => 'q',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{A1, E1, G1, H8};

    #[test]
    fn round_trip_square_conversions() {
        assert_eq!(algebraic_to_square("a1").expect("a1 should parse"), A1);
        assert_eq!(algebraic_to_square("h8").expect("h8 should parse"), H8);
        assert_eq!(square_to_algebraic(A1), "a1");
        assert_eq!(square_to_algebraic(H8), "h8");
    }

    #[test]
    fn malformed_squares_are_rejected() {
        for bad in ["", "e", "e9", "i4", "e44"] {
            assert!(algebraic_to_square(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn moves_parse_against_the_position() {
        let position = Position::startpos();
        let mv = algebraic_to_move("e2e4", &position).expect("e2e4 should parse");
        assert_eq!(move_to_algebraic(mv), "e2e4");

        assert!(algebraic_to_move("e2e5", &position).is_err());
        assert!(algebraic_to_move("e2", &position).is_err());
        assert!(algebraic_to_move("e2e4x", &position).is_err());
    }

    #[test]
    fn castling_and_promotion_strings_round_trip() {
        let castle =
            crate::utils::fen::parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("parses");
        let mv = algebraic_to_move("e1g1", &castle).expect("castle should parse");
        assert_eq!(mv.from, E1);
        assert_eq!(mv.to, G1);
        assert_eq!(move_to_algebraic(mv), "e1g1");

        let promo =
            crate::utils::fen::parse_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").expect("parses");
        let mv = algebraic_to_move("a7a8n", &promo).expect("promotion should parse");
        assert_eq!(mv.promotion, Some(PieceKind::Knight));
        assert_eq!(move_to_algebraic(mv), "a7a8n");
    }
}
