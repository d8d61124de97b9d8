//! Static exchange evaluation.
//!
//! Estimates the net material outcome of a full capture sequence on one
//! square without mutating the position: both sides recapture with their
//! least valuable attacker until one of them runs out. The simulation runs
//! on a scratch copy of the board cells, so sliders hidden behind an
//! earlier capturer are revealed naturally once that capturer vacates its
//! square. Scores are in pawn units and drive capture ordering and
//! quiescence pruning.

use crate::board::lookup::{
    offset, BISHOP_DELTAS, KING_DELTAS, KNIGHT_DELTAS, PAWN_CAPTURES, ROOK_DELTAS,
};
use crate::board::position::Position;
use crate::board::types::{Cell, Color, Move, MoveKind, Piece, PieceKind, Square, BOARD_CELLS};

/// Exchange values in pawn units; the king's value only matters in that it
/// dwarfs everything else.
const SEE_VALUES: [i32; 6] = [1, 3, 3, 5, 9, 100];

#[inline]
pub const fn see_value(kind: PieceKind) -> i32 {
    SEE_VALUES[kind.index()]
}

/// Net material outcome of playing `mv` and letting both sides recapture
/// on the destination square, least valuable attacker first.
///
/// Quiet non-promoting moves score 0. A non-capturing promotion is scored
/// with the promoted piece's value and floored at 0, matching its use as a
/// forcing-move ordering signal.
pub fn see(position: &Position, mv: Move) -> i32 {
    if mv.captured.is_none() && mv.promotion.is_none() {
        return 0;
    }

    let mover = position.side_to_move;
    let mut board = *position.cells();

    // Play the initial move on the scratch board.
    let mut score = mv.captured.map(see_value).unwrap_or(0);
    let mut at_risk = match mv.promotion {
        Some(promo) => {
            score += see_value(promo) - see_value(PieceKind::Pawn);
            see_value(promo)
        }
        None => match board[mv.from as usize] {
            Cell::Occupied(p) => see_value(p.kind),
            _ => return 0,
        },
    };
    if mv.kind == MoveKind::EnPassant {
        let behind = match mover {
            Color::White => mv.to - 10,
            Color::Black => mv.to + 10,
        };
        board[behind as usize] = Cell::Empty;
    }
    let occupant = match mv.promotion {
        Some(promo) => Piece {
            color: mover,
            kind: promo,
        },
        None => match board[mv.from as usize] {
            Cell::Occupied(p) => p,
            _ => return 0,
        },
    };
    board[mv.from as usize] = Cell::Empty;
    board[mv.to as usize] = Cell::Occupied(occupant);

    // Alternate recaptures until a side has no attacker left.
    let mut side = mover.opposite();
    let mut sign = -1;
    loop {
        let Some((sq, kind)) = least_valuable_attacker(&board, mv.to, side) else {
            break;
        };
        // A king may only join the exchange when it cannot be recaptured.
        if kind == PieceKind::King
            && least_valuable_attacker(&board, mv.to, side.opposite()).is_some()
        {
            break;
        }

        score += sign * at_risk;
        at_risk = see_value(kind);
        board[sq as usize] = Cell::Empty;
        board[mv.to as usize] = Cell::Occupied(Piece { color: side, kind });
        side = side.opposite();
        sign = -sign;
    }

    if mv.kind == MoveKind::Promotion {
        score.max(0)
    } else {
        score
    }
}

/// Cheapest piece of `color` attacking `target` on the scratch board.
fn least_valuable_attacker(
    board: &[Cell; BOARD_CELLS],
    target: Square,
    color: Color,
) -> Option<(Square, PieceKind)> {
    // Pawns first: a pawn of `color` on a capture-origin square.
    for delta in PAWN_CAPTURES[color.index()] {
        let origin = offset(target, -delta);
        if board[origin as usize]
            == Cell::Occupied(Piece {
                color,
                kind: PieceKind::Pawn,
            })
        {
            return Some((origin, PieceKind::Pawn));
        }
    }

    for delta in KNIGHT_DELTAS {
        let origin = offset(target, delta);
        if board[origin as usize]
            == Cell::Occupied(Piece {
                color,
                kind: PieceKind::Knight,
            })
        {
            return Some((origin, PieceKind::Knight));
        }
    }

    if let Some(found) = nearest_slider(board, target, color, &BISHOP_DELTAS, PieceKind::Bishop) {
        return Some(found);
    }
    if let Some(found) = nearest_slider(board, target, color, &ROOK_DELTAS, PieceKind::Rook) {
        return Some(found);
    }
    // Queens attack along both ray families.
    for deltas in [&BISHOP_DELTAS, &ROOK_DELTAS] {
        if let Some(found) = nearest_slider(board, target, color, deltas, PieceKind::Queen) {
            return Some(found);
        }
    }

    for delta in KING_DELTAS {
        let origin = offset(target, delta);
        if board[origin as usize]
            == Cell::Occupied(Piece {
                color,
                kind: PieceKind::King,
            })
        {
            return Some((origin, PieceKind::King));
        }
    }

    None
}

/// First piece met along each ray out of `target`; an attacker if it is a
/// `color` slider of the wanted kind.
fn nearest_slider(
    board: &[Cell; BOARD_CELLS],
    target: Square,
    color: Color,
    deltas: &[i16],
    kind: PieceKind,
) -> Option<(Square, PieceKind)> {
    for &delta in deltas {
        let mut sq = offset(target, delta);
        loop {
            match board[sq as usize] {
                Cell::Empty => sq = offset(sq, delta),
                Cell::Occupied(p) => {
                    if p.color == color && p.kind == kind {
                        return Some((sq, kind));
                    }
                    break;
                }
                Cell::Offboard => break,
            }
        }
    }
    None
}
