//! FEN parsing and serialization.
//!
//! Builds a fully-populated `Position` (piece lists, king squares, clocks,
//! and both hashes) from a Forsyth-Edwards Notation string, and renders the
//! exact canonical string back. Parsing is strict: a string that fails any
//! field check is rejected as a whole, so a caller's existing position is
//! never left half-updated.

use crate::board::position::Position;
use crate::board::types::{
    rank_of, square_at, Cell, CastlingRights, Color, PieceKind, Square, CASTLE_BLACK_KINGSIDE,
    CASTLE_BLACK_QUEENSIDE, CASTLE_WHITE_KINGSIDE, CASTLE_WHITE_QUEENSIDE, A1, A8, E1, E8, H1, H8,
};
use crate::errors::ChessError;
use crate::utils::algebraic::{algebraic_to_square, square_to_algebraic};

pub const STARTING_POSITION_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub fn parse_fen(fen: &str) -> Result<Position, ChessError> {
    let mut parts = fen.split_whitespace();

    let board_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing board layout".to_owned()))?;
    let side_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing side-to-move".to_owned()))?;
    let castling_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing castling rights".to_owned()))?;
    let en_passant_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing en-passant square".to_owned()))?;
    let halfmove_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing halfmove clock".to_owned()))?;
    let fullmove_part = parts
        .next()
        .ok_or_else(|| ChessError::InvalidFen("missing fullmove number".to_owned()))?;

    if parts.next().is_some() {
        return Err(ChessError::InvalidFen("extra trailing fields".to_owned()));
    }

    let mut position = Position::empty();

    parse_board(board_part, &mut position)?;
    position.side_to_move = parse_side_to_move(side_part)?;
    position.castling_rights = parse_castling_rights(castling_part, &position)?;
    position.en_passant_square = parse_en_passant(en_passant_part, position.side_to_move)?;
    position.halfmove_clock = halfmove_part
        .parse::<u16>()
        .map_err(|_| ChessError::InvalidFen(format!("invalid halfmove clock: {halfmove_part}")))?;
    position.fullmove_number = fullmove_part
        .parse::<u16>()
        .map_err(|_| ChessError::InvalidFen(format!("invalid fullmove number: {fullmove_part}")))?;
    if position.fullmove_number == 0 {
        return Err(ChessError::InvalidFen(
            "fullmove number must be positive".to_owned(),
        ));
    }

    position.refresh_hashes();
    Ok(position)
}

fn parse_board(board_part: &str, position: &mut Position) -> Result<(), ChessError> {
    let ranks: Vec<&str> = board_part.split('/').collect();
    if ranks.len() != 8 {
        return Err(ChessError::InvalidFen(
            "board layout must contain 8 ranks".to_owned(),
        ));
    }

    for (fen_rank_idx, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - fen_rank_idx as u8;
        let mut file = 0u8;
        let mut previous_was_digit = false;

        for ch in rank_str.chars() {
            if let Some(run) = ch.to_digit(10) {
                if previous_was_digit || !(1..=8).contains(&run) {
                    return Err(ChessError::InvalidFen(format!(
                        "invalid empty-square run '{ch}'"
                    )));
                }
                previous_was_digit = true;
                file += run as u8;
                continue;
            }
            previous_was_digit = false;

            let (color, kind) = piece_from_fen_char(ch).ok_or_else(|| {
                ChessError::InvalidFen(format!("invalid piece character '{ch}'"))
            })?;
            if file >= 8 {
                return Err(ChessError::InvalidFen("rank has too many files".to_owned()));
            }
            position.place_piece(color, kind, square_at(file, rank));
            file += 1;
        }

        if file != 8 {
            return Err(ChessError::InvalidFen(
                "rank does not sum to 8 files".to_owned(),
            ));
        }
    }

    Ok(())
}

fn parse_side_to_move(side_part: &str) -> Result<Color, ChessError> {
    match side_part {
        "w" => Ok(Color::White),
        "b" => Ok(Color::Black),
        _ => Err(ChessError::InvalidFen(format!(
            "invalid side-to-move field: {side_part}"
        ))),
    }
}

fn parse_castling_rights(
    castling_part: &str,
    position: &Position,
) -> Result<CastlingRights, ChessError> {
    if castling_part == "-" {
        return Ok(0);
    }

    let mut rights: CastlingRights = 0;
    let mut last_bit = 0u8;

    for ch in castling_part.chars() {
        let bit = match ch {
            'K' => CASTLE_WHITE_KINGSIDE,
            'Q' => CASTLE_WHITE_QUEENSIDE,
            'k' => CASTLE_BLACK_KINGSIDE,
            'q' => CASTLE_BLACK_QUEENSIDE,
            _ => {
                return Err(ChessError::InvalidFen(format!(
                    "invalid castling rights character: {ch}"
                )))
            }
        };
        // Canonical KQkq order without repeats.
        if bit <= last_bit {
            return Err(ChessError::InvalidFen(
                "castling rights out of order".to_owned(),
            ));
        }
        last_bit = bit;
        rights |= bit;
    }

    // A right is meaningless unless its king and rook stand on home squares.
    let checks: [(CastlingRights, Color, Square, Square); 4] = [
        (CASTLE_WHITE_KINGSIDE, Color::White, E1, H1),
        (CASTLE_WHITE_QUEENSIDE, Color::White, E1, A1),
        (CASTLE_BLACK_KINGSIDE, Color::Black, E8, H8),
        (CASTLE_BLACK_QUEENSIDE, Color::Black, E8, A8),
    ];
    for (bit, color, king_home, rook_home) in checks {
        if rights & bit == 0 {
            continue;
        }
        let king_ok = matches!(
            position.piece_at(king_home),
            Cell::Occupied(p) if p.color == color && p.kind == PieceKind::King
        );
        let rook_ok = matches!(
            position.piece_at(rook_home),
            Cell::Occupied(p) if p.color == color && p.kind == PieceKind::Rook
        );
        if !king_ok || !rook_ok {
            return Err(ChessError::InvalidFen(
                "castling rights disagree with piece placement".to_owned(),
            ));
        }
    }

    Ok(rights)
}

fn parse_en_passant(
    en_passant_part: &str,
    side_to_move: Color,
) -> Result<Option<Square>, ChessError> {
    if en_passant_part == "-" {
        return Ok(None);
    }

    let sq = algebraic_to_square(en_passant_part)
        .map_err(|_| ChessError::InvalidFen(format!("invalid en-passant square: {en_passant_part}")))?;
    let expected_rank = match side_to_move {
        Color::White => 5,
        Color::Black => 2,
    };
    if rank_of(sq) != expected_rank {
        return Err(ChessError::InvalidFen(format!(
            "en-passant square on the wrong rank: {en_passant_part}"
        )));
    }
    Ok(Some(sq))
}

fn piece_from_fen_char(ch: char) -> Option<(Color, PieceKind)> {
    let color = if ch.is_ascii_uppercase() {
        Color::White
    } else if ch.is_ascii_lowercase() {
        Color::Black
    } else {
        return None;
    };

    let kind = match ch.to_ascii_lowercase() {
        'p' => PieceKind::Pawn,
        'n' => PieceKind::Knight,
        'b' => PieceKind::Bishop,
        'r' => PieceKind::Rook,
        'q' => PieceKind::Queen,
        'k' => PieceKind::King,
        _ => return None,
    };

    Some((color, kind))
}

/// Render the canonical FEN string for `position`. Round-trips exactly
/// through `parse_fen` for any position reachable from legal play.
pub fn generate_fen(position: &Position) -> String {
    let mut out = String::with_capacity(90);

    for rank in (0..8u8).rev() {
        let mut run = 0u8;
        for file in 0..8u8 {
            match position.piece_at(square_at(file, rank)) {
                Cell::Occupied(p) => {
                    if run > 0 {
                        out.push(char::from(b'0' + run));
                        run = 0;
                    }
                    out.push(piece_to_fen_char(p.color, p.kind));
                }
                _ => run += 1,
            }
        }
        if run > 0 {
            out.push(char::from(b'0' + run));
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push(match position.side_to_move {
        Color::White => 'w',
        Color::Black => 'b',
    });

    out.push(' ');
    if position.castling_rights == 0 {
        out.push('-');
    } else {
        for (bit, ch) in [
            (CASTLE_WHITE_KINGSIDE, 'K'),
            (CASTLE_WHITE_QUEENSIDE, 'Q'),
            (CASTLE_BLACK_KINGSIDE, 'k'),
            (CASTLE_BLACK_QUEENSIDE, 'q'),
        ] {
            if position.castling_rights & bit != 0 {
                out.push(ch);
            }
        }
    }

    out.push(' ');
    match position.en_passant_square {
        Some(sq) => out.push_str(&square_to_algebraic(sq)),
        None => out.push('-'),
    }

    out.push(' ');
    out.push_str(&position.halfmove_clock.to_string());
    out.push(' ');
    out.push_str(&position.fullmove_number.to_string());

    out
}

fn piece_to_fen_char(color: Color, kind: PieceKind) -> char {
    let ch = match kind {
        PieceKind::Pawn => 'p',
        PieceKind::Knight => 'n',
        PieceKind::Bishop => 'b',
        PieceKind::Rook => 'r',
        PieceKind::Queen => 'q',
        PieceKind::King => 'k',
    };
    match color {
        Color::White => ch.to_ascii_uppercase(),
        Color::Black => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::render::render_position;

    #[test]
    fn starting_position_parses_and_renders() {
        let position = parse_fen(STARTING_POSITION_FEN).expect("starting FEN should parse");

        println!("\n{}", render_position(&position));

        assert_eq!(position.side_to_move, Color::White);
        assert_eq!(position.fullmove_number, 1);
        assert_eq!(position.halfmove_clock, 0);
        assert!(position.is_consistent());
    }

    #[test]
    fn fen_round_trips_exactly() {
        let cases = [
            STARTING_POSITION_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2",
            "4k3/8/8/8/8/8/8/4K3 b - - 42 99",
        ];
        for fen in cases {
            let position = parse_fen(fen).expect("FEN should parse");
            assert_eq!(generate_fen(&position), fen);
        }
    }

    #[test]
    fn malformed_fens_are_rejected() {
        let cases = [
            "",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1 extra",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/x7/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/44/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KK - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w qK - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e9 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e4 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - x 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 0",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBN1 w KQkq - 0 1",
        ];
        for fen in cases {
            assert!(parse_fen(fen).is_err(), "should reject: {fen}");
        }
    }

    #[test]
    fn kingless_study_positions_are_accepted() {
        // Material studies (SEE probes and the like) legitimately omit kings.
        let position = parse_fen("4r3/8/8/r3b2R/8/8/8/4R3 w - - 0 1").expect("FEN should parse");
        assert_eq!(generate_fen(&position), "4r3/8/8/r3b2R/8/8/8/4R3 w - - 0 1");
        assert!(!position.in_check());
    }

    #[test]
    fn en_passant_field_round_trips_for_both_sides() {
        let white_push = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let position = parse_fen(white_push).expect("FEN should parse");
        assert_eq!(generate_fen(&position), white_push);

        let black_push = "rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2";
        let position = parse_fen(black_push).expect("FEN should parse");
        assert_eq!(generate_fen(&position), black_push);
    }
}
