//! Pseudo-legal move generation.
//!
//! Both generators emit pseudo-legal moves only: a move may still leave the
//! mover's king attacked, and castling is emitted whenever the rights and
//! occupancy allow it. Legality is resolved in exactly one place, the
//! make/unmake filter inside `Position::make_move`, which
//! `generate_legal_moves` applies on behalf of front ends.

use smallvec::SmallVec;

use crate::board::lookup::{
    offset, BISHOP_DELTAS, KING_DELTAS, KNIGHT_DELTAS, PAWN_CAPTURES, PAWN_PUSH, ROOK_DELTAS,
};
use crate::board::position::Position;
use crate::board::types::{
    rank_of, Cell, Color, Move, PieceKind, Square, CASTLE_BLACK_KINGSIDE, CASTLE_BLACK_QUEENSIDE,
    CASTLE_WHITE_KINGSIDE, CASTLE_WHITE_QUEENSIDE, B1, B8, C1, C8, D1, D8, E1, E8, F1, F8, G1, G8,
};

/// Generated moves for one node; stays on the stack for typical positions.
pub type MoveList = SmallVec<[Move; 64]>;

const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

/// Every pseudo-legal move for the side to move. Order is unspecified;
/// search applies its own ordering.
pub fn generate_pseudo_legal_moves(position: &Position) -> MoveList {
    let mut moves = MoveList::new();
    let mover = position.side_to_move;

    generate_pawn_moves(position, mover, false, &mut moves);
    generate_leaper_moves(position, mover, PieceKind::Knight, &KNIGHT_DELTAS, false, &mut moves);
    generate_slider_moves(position, mover, PieceKind::Bishop, &BISHOP_DELTAS, false, &mut moves);
    generate_slider_moves(position, mover, PieceKind::Rook, &ROOK_DELTAS, false, &mut moves);
    generate_queen_moves(position, mover, false, &mut moves);
    generate_leaper_moves(position, mover, PieceKind::King, &KING_DELTAS, false, &mut moves);
    generate_castling_moves(position, mover, &mut moves);

    moves
}

/// The forcing subset explored by quiescence search: captures, en passant,
/// and promotions (pawn pushes onto the last rank included, since they are
/// forcing even without a capture). Quiet non-promoting moves are excluded.
pub fn generate_captures_and_promotions(position: &Position) -> MoveList {
    let mut moves = MoveList::new();
    let mover = position.side_to_move;

    generate_pawn_moves(position, mover, true, &mut moves);
    generate_leaper_moves(position, mover, PieceKind::Knight, &KNIGHT_DELTAS, true, &mut moves);
    generate_slider_moves(position, mover, PieceKind::Bishop, &BISHOP_DELTAS, true, &mut moves);
    generate_slider_moves(position, mover, PieceKind::Rook, &ROOK_DELTAS, true, &mut moves);
    generate_queen_moves(position, mover, true, &mut moves);
    generate_leaper_moves(position, mover, PieceKind::King, &KING_DELTAS, true, &mut moves);

    moves
}

/// Fully legal moves, produced by attempting each pseudo-legal move against
/// the make/unmake filter. Used by the protocol layer to validate input and
/// to detect checkmate/stalemate (no legal moves means mate when in check,
/// stalemate otherwise).
pub fn generate_legal_moves(position: &Position) -> MoveList {
    let mut scratch = position.clone();
    let mut legal = MoveList::new();
    for mv in generate_pseudo_legal_moves(position) {
        if scratch.make_move(mv) {
            scratch.unmake_move(mv);
            legal.push(mv);
        }
    }
    legal
}

fn generate_pawn_moves(
    position: &Position,
    mover: Color,
    captures_only: bool,
    moves: &mut MoveList,
) {
    let push = PAWN_PUSH[mover.index()];
    let (start_rank, promo_rank) = match mover {
        Color::White => (1u8, 7u8),
        Color::Black => (6u8, 0u8),
    };

    for &from in position.piece_squares(mover, PieceKind::Pawn) {
        let ahead = offset(from, push);

        if position.piece_at(ahead).is_empty() {
            if rank_of(ahead) == promo_rank {
                for promo in PROMOTION_KINDS {
                    moves.push(Move::promotion(from, ahead, promo));
                }
            } else if !captures_only {
                moves.push(Move::quiet(from, ahead));
                if rank_of(from) == start_rank {
                    let two_ahead = offset(ahead, push);
                    if position.piece_at(two_ahead).is_empty() {
                        moves.push(Move::double_pawn_push(from, two_ahead));
                    }
                }
            }
        }

        for delta in PAWN_CAPTURES[mover.index()] {
            let to = offset(from, delta);
            match position.piece_at(to) {
                Cell::Occupied(p) if p.color != mover => {
                    if rank_of(to) == promo_rank {
                        for promo in PROMOTION_KINDS {
                            moves.push(Move::promotion_capture(from, to, p.kind, promo));
                        }
                    } else {
                        moves.push(Move::capture(from, to, p.kind));
                    }
                }
                Cell::Empty if position.en_passant_square == Some(to) => {
                    moves.push(Move::en_passant(from, to));
                }
                _ => {}
            }
        }
    }
}

fn generate_leaper_moves(
    position: &Position,
    mover: Color,
    kind: PieceKind,
    deltas: &[i16],
    captures_only: bool,
    moves: &mut MoveList,
) {
    for &from in position.piece_squares(mover, kind) {
        for &delta in deltas {
            let to = offset(from, delta);
            match position.piece_at(to) {
                Cell::Empty if !captures_only => moves.push(Move::quiet(from, to)),
                Cell::Occupied(p) if p.color != mover => {
                    moves.push(Move::capture(from, to, p.kind))
                }
                _ => {}
            }
        }
    }
}

fn generate_slider_moves(
    position: &Position,
    mover: Color,
    kind: PieceKind,
    deltas: &[i16],
    captures_only: bool,
    moves: &mut MoveList,
) {
    for &from in position.piece_squares(mover, kind) {
        slide_from(position, mover, from, deltas, captures_only, moves);
    }
}

fn generate_queen_moves(
    position: &Position,
    mover: Color,
    captures_only: bool,
    moves: &mut MoveList,
) {
    for &from in position.piece_squares(mover, PieceKind::Queen) {
        slide_from(position, mover, from, &BISHOP_DELTAS, captures_only, moves);
        slide_from(position, mover, from, &ROOK_DELTAS, captures_only, moves);
    }
}

#[inline]
fn slide_from(
    position: &Position,
    mover: Color,
    from: Square,
    deltas: &[i16],
    captures_only: bool,
    moves: &mut MoveList,
) {
    for &delta in deltas {
        let mut to = offset(from, delta);
        loop {
            match position.piece_at(to) {
                Cell::Empty => {
                    if !captures_only {
                        moves.push(Move::quiet(from, to));
                    }
                }
                Cell::Occupied(p) => {
                    if p.color != mover {
                        moves.push(Move::capture(from, to, p.kind));
                    }
                    break;
                }
                Cell::Offboard => break,
            }
            to = offset(to, delta);
        }
    }
}

/// Castling is gated here on rights and occupancy only; traversal through
/// attacked squares is refused later by the make/unmake filter.
fn generate_castling_moves(position: &Position, mover: Color, moves: &mut MoveList) {
    let empty = |sq: Square| position.piece_at(sq).is_empty();
    match mover {
        Color::White => {
            if position.castling_rights & CASTLE_WHITE_KINGSIDE != 0 && empty(F1) && empty(G1) {
                moves.push(Move::castle(E1, G1));
            }
            if position.castling_rights & CASTLE_WHITE_QUEENSIDE != 0
                && empty(D1)
                && empty(C1)
                && empty(B1)
            {
                moves.push(Move::castle(E1, C1));
            }
        }
        Color::Black => {
            if position.castling_rights & CASTLE_BLACK_KINGSIDE != 0 && empty(F8) && empty(G8) {
                moves.push(Move::castle(E8, G8));
            }
            if position.castling_rights & CASTLE_BLACK_QUEENSIDE != 0
                && empty(D8)
                && empty(C8)
                && empty(B8)
            {
                moves.push(Move::castle(E8, C8));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::MoveKind;
    use crate::utils::fen::parse_fen;

    #[test]
    fn starting_position_has_twenty_legal_moves() {
        let position = Position::startpos();
        assert_eq!(generate_legal_moves(&position).len(), 20);
    }

    #[test]
    fn captures_subset_keeps_only_forcing_moves() {
        let position = parse_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
            .expect("FEN should parse");
        let forcing = generate_captures_and_promotions(&position);
        assert!(forcing.iter().all(|m| m.is_tactical()));
        assert!(forcing.iter().any(|m| m.kind == MoveKind::Capture));
    }

    #[test]
    fn non_capture_promotions_are_forcing() {
        let position = parse_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").expect("FEN should parse");
        let forcing = generate_captures_and_promotions(&position);
        assert_eq!(
            forcing
                .iter()
                .filter(|m| m.kind == MoveKind::Promotion)
                .count(),
            4
        );
    }

    #[test]
    fn en_passant_is_generated_when_available() {
        let position = parse_fen("rnbqkbnr/pp1ppppp/8/8/2pP4/8/PPP1PPPP/RNBQKBNR b KQkq d3 0 3")
            .expect("FEN should parse");
        let moves = generate_pseudo_legal_moves(&position);
        assert!(moves.iter().any(|m| m.kind == MoveKind::EnPassant));
    }

    #[test]
    fn blocked_castling_is_not_generated() {
        let position = Position::startpos();
        let moves = generate_pseudo_legal_moves(&position);
        assert!(moves.iter().all(|m| m.kind != MoveKind::Castle));

        let open = parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("FEN should parse");
        let castles: Vec<Move> = generate_pseudo_legal_moves(&open)
            .into_iter()
            .filter(|m| m.kind == MoveKind::Castle)
            .collect();
        assert_eq!(castles.len(), 2);
    }

    #[test]
    fn stalemated_side_has_no_legal_moves() {
        let position = parse_fen("5k2/5P2/5K2/8/8/8/8/8 b - - 0 1").expect("FEN should parse");
        assert!(generate_legal_moves(&position).is_empty());
        assert!(!position.in_check());
    }

    #[test]
    fn checkmated_side_has_no_legal_moves() {
        let position = parse_fen("8/8/5K1k/8/8/8/8/7R b - - 0 1").expect("FEN should parse");
        assert!(generate_legal_moves(&position).is_empty());
        assert!(position.in_check());
    }
}
