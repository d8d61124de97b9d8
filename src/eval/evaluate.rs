//! Static position evaluation.
//!
//! Scores a position from the perspective of the side to move (positive
//! favors the mover). Per-color sums cover material, piece-square placement
//! (the king table interpolated between middlegame and endgame shapes by a
//! phase coefficient), weighted mobility, pawn-structure terms, and a few
//! piece-specific bonuses. Full-position results are cached by the position
//! hash; pawn-structure subtotals are cached separately by the pawn-only
//! hash since pawn formations change far less often than the rest of the
//! board.

use crate::board::lookup::{
    offset, BISHOP_DELTAS, KNIGHT_DELTAS, PAWN_CAPTURES, PAWN_PUSH, ROOK_DELTAS,
};
use crate::board::position::Position;
use crate::board::types::{
    file_of, index64, rank_of, Cell, Color, PieceKind, Square,
};
use crate::eval::caches::{EvalCache, PawnCache, PawnScores};
use crate::eval::pst::{
    table_value, BISHOP_TABLE, KING_EARLY_TABLE, KING_LATE_TABLE, KNIGHT_TABLE, PAWN_TABLE,
    QUEEN_TABLE, ROOK_TABLE,
};

pub const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// Material value in centipawns.
#[inline]
pub const fn piece_value(kind: PieceKind) -> i32 {
    PIECE_VALUES[kind.index()]
}

/// Destination-count weight per piece kind; pawns and kings are excluded
/// from mobility.
const MOBILITY_WEIGHTS: [i32; 6] = [0, 4, 5, 2, 1, 0];

const BISHOP_PAIR_BONUS: i32 = 30;
const KNIGHT_OUTPOST_BONUS: i32 = 14;
const ROOK_OPEN_FILE_BONUS: i32 = 15;
const ROOK_SEMI_OPEN_FILE_BONUS: i32 = 8;
const ROOK_ON_SEVENTH_BONUS: i32 = 20;

const DOUBLED_PAWN_PENALTY: i32 = 12;
const ISOLATED_PAWN_PENALTY: i32 = 15;
const BACKWARD_PAWN_PENALTY: i32 = 8;
const PROTECTED_PAWN_BONUS: i32 = 6;
/// Passed-pawn bonus indexed by relative rank.
const PASSED_PAWN_BONUS: [i32; 8] = [0, 10, 15, 20, 30, 45, 60, 0];

/// Phase runs 0 (bare kings and pawns) to 24 (full material); the king
/// table interpolates between its endgame and middlegame shapes along it.
const MAX_PHASE: i32 = 24;

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    eval_cache: EvalCache,
    pawn_cache: PawnCache,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            eval_cache: EvalCache::new(),
            pawn_cache: PawnCache::new(),
        }
    }

    /// Forget all cached results (on `ucinewgame` and similar resets).
    pub fn clear(&mut self) {
        self.eval_cache.clear();
        self.pawn_cache.clear();
    }

    /// Score `position` for the side to move.
    pub fn evaluate(&mut self, position: &Position) -> i32 {
        if let Some(score) = self.eval_cache.probe(position.hash) {
            return score;
        }

        let pawns = match self.pawn_cache.probe(position.pawn_hash) {
            Some(scores) => scores,
            None => {
                let scores = PawnScores {
                    white: pawn_structure_score(position, Color::White),
                    black: pawn_structure_score(position, Color::Black),
                };
                self.pawn_cache.store(position.pawn_hash, scores);
                scores
            }
        };

        let phase = game_phase(position);
        let white = color_score(position, Color::White, phase) + pawns.white;
        let black = color_score(position, Color::Black, phase) + pawns.black;

        let score = match position.side_to_move {
            Color::White => white - black,
            Color::Black => black - white,
        };

        self.eval_cache.store(position.hash, score);
        score
    }
}

/// Remaining minor/major material of both sides, capped at `MAX_PHASE`.
fn game_phase(position: &Position) -> i32 {
    let mut phase = 0i32;
    for color in [Color::White, Color::Black] {
        phase += position.piece_count(color, PieceKind::Knight) as i32;
        phase += position.piece_count(color, PieceKind::Bishop) as i32;
        phase += position.piece_count(color, PieceKind::Rook) as i32 * 2;
        phase += position.piece_count(color, PieceKind::Queen) as i32 * 4;
    }
    phase.min(MAX_PHASE)
}

fn color_score(position: &Position, color: Color, phase: i32) -> i32 {
    let mut score = 0i32;

    for &sq in position.piece_squares(color, PieceKind::Pawn) {
        score += piece_value(PieceKind::Pawn) + table_value(&PAWN_TABLE, color, index64(sq));
    }

    for &sq in position.piece_squares(color, PieceKind::Knight) {
        score += piece_value(PieceKind::Knight) + table_value(&KNIGHT_TABLE, color, index64(sq));
        score += MOBILITY_WEIGHTS[PieceKind::Knight.index()]
            * leaper_mobility(position, color, sq, &KNIGHT_DELTAS);
        if is_knight_outpost(position, color, sq) {
            score += KNIGHT_OUTPOST_BONUS;
        }
    }

    let bishops = position.piece_squares(color, PieceKind::Bishop);
    if bishops.len() >= 2 {
        score += BISHOP_PAIR_BONUS;
    }
    for &sq in bishops {
        score += piece_value(PieceKind::Bishop) + table_value(&BISHOP_TABLE, color, index64(sq));
        score += MOBILITY_WEIGHTS[PieceKind::Bishop.index()]
            * slider_mobility(position, color, sq, &BISHOP_DELTAS);
    }

    for &sq in position.piece_squares(color, PieceKind::Rook) {
        score += piece_value(PieceKind::Rook) + table_value(&ROOK_TABLE, color, index64(sq));
        score += MOBILITY_WEIGHTS[PieceKind::Rook.index()]
            * slider_mobility(position, color, sq, &ROOK_DELTAS);
        score += rook_file_bonus(position, color, sq);
        if relative_rank(color, sq) == 6 {
            score += ROOK_ON_SEVENTH_BONUS;
        }
    }

    for &sq in position.piece_squares(color, PieceKind::Queen) {
        score += piece_value(PieceKind::Queen) + table_value(&QUEEN_TABLE, color, index64(sq));
        let mobility = slider_mobility(position, color, sq, &BISHOP_DELTAS)
            + slider_mobility(position, color, sq, &ROOK_DELTAS);
        score += MOBILITY_WEIGHTS[PieceKind::Queen.index()] * mobility;
    }

    if position.piece_count(color, PieceKind::King) > 0 {
        let sq64 = index64(position.king_square(color));
        let early = table_value(&KING_EARLY_TABLE, color, sq64);
        let late = table_value(&KING_LATE_TABLE, color, sq64);
        score += (early * phase + late * (MAX_PHASE - phase)) / MAX_PHASE;
    }

    score
}

#[inline]
fn relative_rank(color: Color, sq: Square) -> u8 {
    match color {
        Color::White => rank_of(sq),
        Color::Black => 7 - rank_of(sq),
    }
}

fn leaper_mobility(position: &Position, color: Color, from: Square, deltas: &[i16]) -> i32 {
    let mut count = 0;
    for &delta in deltas {
        match position.piece_at(offset(from, delta)) {
            Cell::Empty => count += 1,
            Cell::Occupied(p) if p.color != color => count += 1,
            _ => {}
        }
    }
    count
}

fn slider_mobility(position: &Position, color: Color, from: Square, deltas: &[i16]) -> i32 {
    let mut count = 0;
    for &delta in deltas {
        let mut sq = offset(from, delta);
        loop {
            match position.piece_at(sq) {
                Cell::Empty => count += 1,
                Cell::Occupied(p) => {
                    if p.color != color {
                        count += 1;
                    }
                    break;
                }
                Cell::Offboard => break,
            }
            sq = offset(sq, delta);
        }
    }
    count
}

/// A knight parked in enemy territory, guarded by a pawn, with no enemy
/// pawn able to evict it from an adjacent file.
fn is_knight_outpost(position: &Position, color: Color, sq: Square) -> bool {
    if !(3..=5).contains(&relative_rank(color, sq)) {
        return false;
    }
    if !is_defended_by_pawn(position, color, sq) {
        return false;
    }
    let enemy = color.opposite();
    let file = file_of(sq);
    for &enemy_sq in position.piece_squares(enemy, PieceKind::Pawn) {
        let enemy_file = file_of(enemy_sq);
        if enemy_file.abs_diff(file) == 1
            && relative_rank(color, enemy_sq) > relative_rank(color, sq)
        {
            return false;
        }
    }
    true
}

#[inline]
fn is_defended_by_pawn(position: &Position, color: Color, sq: Square) -> bool {
    for delta in PAWN_CAPTURES[color.index()] {
        if position.piece_at(offset(sq, -delta)).piece().map(|p| (p.color, p.kind))
            == Some((color, PieceKind::Pawn))
        {
            return true;
        }
    }
    false
}

fn rook_file_bonus(position: &Position, color: Color, sq: Square) -> i32 {
    let file = file_of(sq);
    let own_pawn_on_file = position
        .piece_squares(color, PieceKind::Pawn)
        .iter()
        .any(|&p| file_of(p) == file);
    if own_pawn_on_file {
        return 0;
    }
    let enemy_pawn_on_file = position
        .piece_squares(color.opposite(), PieceKind::Pawn)
        .iter()
        .any(|&p| file_of(p) == file);
    if enemy_pawn_on_file {
        ROOK_SEMI_OPEN_FILE_BONUS
    } else {
        ROOK_OPEN_FILE_BONUS
    }
}

/// Pawn-structure subtotal for one color. Depends only on pawn placement,
/// which is what makes the pawn-hash cache sound.
fn pawn_structure_score(position: &Position, color: Color) -> i32 {
    let enemy = color.opposite();
    let own_pawns = position.piece_squares(color, PieceKind::Pawn);
    let enemy_pawns = position.piece_squares(enemy, PieceKind::Pawn);

    let mut own_on_file = [0u8; 8];
    for &sq in own_pawns {
        own_on_file[file_of(sq) as usize] += 1;
    }

    let mut score = 0i32;

    for count in own_on_file {
        if count > 1 {
            score -= DOUBLED_PAWN_PENALTY * (count as i32 - 1);
        }
    }

    for &sq in own_pawns {
        let file = file_of(sq);
        let rel = relative_rank(color, sq);

        let isolated = neighbor_files(file)
            .iter()
            .all(|&f| own_on_file[f as usize] == 0);
        if isolated {
            score -= ISOLATED_PAWN_PENALTY;
        }

        let passed = !enemy_pawns.iter().any(|&e| {
            let ef = file_of(e);
            ef.abs_diff(file) <= 1 && relative_rank(color, e) > rel
        });
        if passed {
            score += PASSED_PAWN_BONUS[rel as usize];
        }

        if is_defended_by_pawn(position, color, sq) {
            score += PROTECTED_PAWN_BONUS;
        }

        if !isolated && !passed && is_backward(position, color, sq, own_pawns) {
            score -= BACKWARD_PAWN_PENALTY;
        }
    }

    score
}

/// A pawn whose advance square is covered by an enemy pawn while every
/// friendly pawn on a neighboring file is already further ahead.
fn is_backward(position: &Position, color: Color, sq: Square, own_pawns: &[Square]) -> bool {
    let file = file_of(sq);
    let rel = relative_rank(color, sq);

    let supported_from_behind = own_pawns.iter().any(|&p| {
        file_of(p).abs_diff(file) == 1 && relative_rank(color, p) <= rel
    });
    if supported_from_behind {
        return false;
    }

    let push = PAWN_PUSH[color.index()];
    let stop = offset(sq, push);
    let enemy = color.opposite();
    for delta in PAWN_CAPTURES[enemy.index()] {
        if position.piece_at(offset(stop, -delta)).piece().map(|p| (p.color, p.kind))
            == Some((enemy, PieceKind::Pawn))
        {
            return true;
        }
    }
    false
}

#[inline]
fn neighbor_files(file: u8) -> smallvec::SmallVec<[u8; 2]> {
    let mut out = smallvec::SmallVec::new();
    if file > 0 {
        out.push(file - 1);
    }
    if file < 7 {
        out.push(file + 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fen::parse_fen;

    #[test]
    fn starting_position_is_balanced() {
        let mut evaluator = Evaluator::new();
        let position = Position::startpos();
        assert_eq!(evaluator.evaluate(&position), 0);
    }

    #[test]
    fn evaluation_is_symmetric_between_the_sides() {
        let mut evaluator = Evaluator::new();
        // The same asymmetric structure from white's and black's seats.
        let as_white =
            parse_fen("4k3/pp6/8/3N4/8/8/PPP5/4K3 w - - 0 1").expect("FEN should parse");
        let as_black =
            parse_fen("4k3/ppp5/8/8/3n4/8/PP6/4K3 b - - 0 1").expect("FEN should parse");
        assert_eq!(evaluator.evaluate(&as_white), evaluator.evaluate(&as_black));
    }

    #[test]
    fn material_advantage_shows_up_for_the_side_to_move() {
        let mut evaluator = Evaluator::new();
        let up_a_rook = parse_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").expect("FEN should parse");
        assert!(evaluator.evaluate(&up_a_rook) > 0);

        let opponent_view = parse_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1").expect("FEN should parse");
        assert!(evaluator.evaluate(&opponent_view) < 0);
    }

    #[test]
    fn passed_pawns_outscore_blocked_structures() {
        let mut evaluator = Evaluator::new();
        let passed =
            parse_fen("4k3/8/8/3P4/8/8/8/4K3 w - - 0 1").expect("FEN should parse");
        let opposed =
            parse_fen("4k3/3p4/8/3P4/8/8/8/4K3 w - - 0 1").expect("FEN should parse");
        assert!(evaluator.evaluate(&passed) > evaluator.evaluate(&opposed));
    }

    #[test]
    fn cached_results_are_stable() {
        let mut evaluator = Evaluator::new();
        let position =
            parse_fen("r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4")
                .expect("FEN should parse");
        let first = evaluator.evaluate(&position);
        let second = evaluator.evaluate(&position);
        assert_eq!(first, second);
    }
}
