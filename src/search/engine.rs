//! Iterative-deepening principal variation search.
//!
//! The driver deepens from depth 1, reusing each completed iteration's best
//! move as ordering input for the next, and stops once a completed depth
//! has consumed more than a quarter of the move budget. Inside an
//! iteration, every node polls the deadline; when it trips, the whole
//! recursion unwinds by returning `None` and the caller falls back to the
//! previous completed depth's answer. Aborted partial results are never
//! trusted. The transposition table is cleared at the end of each call;
//! its depth-versioned entries are only meaningful within one search.

use std::time::{Duration, Instant};

use crate::board::position::Position;
use crate::board::types::{Move, PieceKind};
use crate::eval::evaluate::{piece_value, Evaluator};
use crate::movegen::generator::{
    generate_captures_and_promotions, generate_legal_moves, generate_pseudo_legal_moves, MoveList,
};
use crate::search::see::see;
use crate::search::transposition::{Bound, TTEntry, TranspositionTable};
use crate::utils::algebraic::move_to_algebraic;

pub const MATE_SCORE: i32 = 30_000;
pub const MAX_DEPTH: u8 = 64;
const MATE_TT_THRESHOLD: i32 = MATE_SCORE - 1_000;
const DEFAULT_HASH_MB: usize = 16;

/// Outcome of one `iterative_deepening` call.
#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    /// Best move of the deepest completed iteration; `None` only when the
    /// position has no legal moves at all.
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: u8,
    pub nodes: u64,
    pub elapsed_ms: u64,
    pub pv: Vec<Move>,
}

#[derive(Debug)]
pub struct Searcher {
    tt: TranspositionTable,
    evaluator: Evaluator,
    nodes: u64,
    deadline: Option<Instant>,
    /// Best move of the previous completed iteration, used as an ordering
    /// hint below the transposition move.
    pv_move: Option<Move>,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher {
    pub fn new() -> Self {
        Self::with_hash_mb(DEFAULT_HASH_MB)
    }

    pub fn with_hash_mb(size_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new_with_mb(size_mb),
            evaluator: Evaluator::new(),
            nodes: 0,
            deadline: None,
            pv_move: None,
        }
    }

    /// Reset cached state between games.
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.evaluator.clear();
        self.pv_move = None;
    }

    /// Pick a move within `time_budget_ms`, deepening up to `max_depth`.
    ///
    /// A depth whose search is cut off by the deadline is discarded and the
    /// previous depth's move is returned; deepening also stops once elapsed
    /// time exceeds a quarter of the budget, since the next iteration would
    /// be unlikely to finish.
    pub fn iterative_deepening(
        &mut self,
        position: &Position,
        time_budget_ms: u64,
        max_depth: u8,
    ) -> SearchReport {
        let started = Instant::now();
        let budget = Duration::from_millis(time_budget_ms.max(1));
        self.deadline = Some(started + budget);
        self.pv_move = None;
        self.nodes = 0;

        let mut report = SearchReport::default();
        let mut root = position.clone();

        // Best-effort fallback so a tiny budget still answers with a move.
        report.best_move = generate_legal_moves(position).first().copied();

        for depth in 1..=max_depth.clamp(1, MAX_DEPTH) {
            let Some((best_move, score)) = self.search_root(&mut root, depth) else {
                log::debug!("depth {depth} aborted by the time budget, keeping previous result");
                break;
            };

            report.score = score;
            report.depth = depth;
            if best_move.is_some() {
                report.best_move = best_move;
                report.pv = self.principal_variation(position, depth);
            }
            self.pv_move = best_move;

            log::debug!(
                "depth {depth} score {score} nodes {} elapsed {}ms pv {}",
                self.nodes,
                started.elapsed().as_millis(),
                render_pv(&report.pv),
            );

            if best_move.is_none() {
                // Mated or stalemated at the root; deeper search cannot help.
                break;
            }
            if started.elapsed() > budget / 4 {
                break;
            }
        }

        report.nodes = self.nodes;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.deadline = None;
        self.tt.clear();
        report
    }

    #[inline]
    fn timed_out(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Full-window principal variation search at the root. Returns `None`
    /// when the deadline tripped mid-iteration, `Some((None, score))` when
    /// the side to move has no legal move.
    fn search_root(&mut self, position: &mut Position, depth: u8) -> Option<(Option<Move>, i32)> {
        let mut alpha = -MATE_SCORE;
        let beta = MATE_SCORE;

        let mut moves = generate_pseudo_legal_moves(position);
        let tt_move = self.tt.probe(position.hash).and_then(|e| e.best_move);
        order_moves(position, &mut moves, tt_move, self.pv_move);

        let mut best_move: Option<Move> = None;
        let mut legal = 0usize;

        for mv in moves {
            if self.timed_out() {
                return None;
            }
            if !position.make_move(mv) {
                continue;
            }
            legal += 1;
            if best_move.is_none() {
                best_move = Some(mv);
            }

            let score = if legal == 1 {
                let result = self.search(position, -beta, -alpha, depth - 1, 1);
                position.unmake_move(mv);
                -(result?)
            } else {
                let probe = self.search(position, -alpha - 1, -alpha, depth - 1, 1);
                let Some(probe_score) = probe else {
                    position.unmake_move(mv);
                    return None;
                };
                if -probe_score > alpha {
                    let result = self.search(position, -beta, -alpha, depth - 1, 1);
                    position.unmake_move(mv);
                    -(result?)
                } else {
                    position.unmake_move(mv);
                    -probe_score
                }
            };

            if score > alpha {
                alpha = score;
                best_move = Some(mv);
            }
        }

        if legal == 0 {
            return Some((None, terminal_score(position, 0)));
        }

        self.tt.store(TTEntry {
            key: position.hash,
            depth,
            score: tt_score_for_storage(alpha, 0),
            bound: Bound::Exact,
            best_move,
        });

        Some((best_move, alpha))
    }

    /// Fail-hard PVS. `None` means the time budget tripped and the result
    /// must not be trusted anywhere up the stack.
    fn search(
        &mut self,
        position: &mut Position,
        mut alpha: i32,
        mut beta: i32,
        depth: u8,
        ply: u8,
    ) -> Option<i32> {
        if self.timed_out() {
            return None;
        }
        self.nodes += 1;

        if let Some(entry) = self.tt.probe(position.hash) {
            if entry.depth >= depth {
                let tt_score = tt_score_from_storage(entry.score, ply);
                match entry.bound {
                    Bound::Exact => return Some(tt_score),
                    Bound::Lower => alpha = alpha.max(tt_score),
                    Bound::Upper => beta = beta.min(tt_score),
                }
                if alpha >= beta {
                    return Some(tt_score);
                }
            }
        }
        let alpha_orig = alpha;

        if depth == 0 {
            return self.quiescence(position, alpha, beta, ply);
        }

        let mut moves = generate_pseudo_legal_moves(position);
        let tt_move = self.tt.probe(position.hash).and_then(|e| e.best_move);
        order_moves(position, &mut moves, tt_move, self.pv_move);

        let mut best_move: Option<Move> = None;
        let mut legal = 0usize;

        for mv in moves {
            if !position.make_move(mv) {
                continue;
            }
            legal += 1;

            let score = if legal == 1 {
                let result = self.search(position, -beta, -alpha, depth - 1, ply + 1);
                position.unmake_move(mv);
                -(result?)
            } else {
                let probe = self.search(position, -alpha - 1, -alpha, depth - 1, ply + 1);
                let Some(probe_score) = probe else {
                    position.unmake_move(mv);
                    return None;
                };
                if -probe_score > alpha {
                    let result = self.search(position, -beta, -alpha, depth - 1, ply + 1);
                    position.unmake_move(mv);
                    -(result?)
                } else {
                    position.unmake_move(mv);
                    -probe_score
                }
            };

            if score > alpha {
                alpha = score;
                best_move = Some(mv);
            }
            if alpha >= beta {
                self.tt.store(TTEntry {
                    key: position.hash,
                    depth,
                    score: tt_score_for_storage(beta, ply),
                    bound: Bound::Lower,
                    best_move: Some(mv),
                });
                return Some(beta);
            }
        }

        if legal == 0 {
            return Some(terminal_score(position, ply));
        }

        let bound = if alpha > alpha_orig {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.tt.store(TTEntry {
            key: position.hash,
            depth,
            score: tt_score_for_storage(alpha, ply),
            bound,
            best_move,
        });

        Some(alpha)
    }

    /// Capture/promotion-only search below the horizon. The static score
    /// stands pat as a lower bound, and losing captures (negative static
    /// exchange) are pruned outright. Converges because every recursive
    /// call consumes a capture and the board holds finitely many pieces.
    fn quiescence(
        &mut self,
        position: &mut Position,
        mut alpha: i32,
        beta: i32,
        ply: u8,
    ) -> Option<i32> {
        if self.timed_out() {
            return None;
        }
        self.nodes += 1;

        let stand_pat = self.evaluator.evaluate(position);
        if stand_pat >= beta {
            return Some(beta);
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut moves = generate_captures_and_promotions(position);
        moves.retain(|mv| see(position, *mv) >= 0);
        order_moves(position, &mut moves, None, None);

        for mv in moves {
            if !position.make_move(mv) {
                continue;
            }
            let result = self.quiescence(position, -beta, -alpha, ply + 1);
            position.unmake_move(mv);
            let score = -(result?);

            if score >= beta {
                return Some(beta);
            }
            if score > alpha {
                alpha = score;
            }
        }

        Some(alpha)
    }

    /// Walk the transposition table from the root, validating each stored
    /// move against the legality filter, to recover the principal variation
    /// of the just-completed iteration.
    fn principal_variation(&self, position: &Position, max_len: u8) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut current = position.clone();

        for _ in 0..max_len {
            let Some(entry) = self.tt.probe(current.hash) else {
                break;
            };
            let Some(best_move) = entry.best_move else {
                break;
            };
            if !current.make_move(best_move) {
                break;
            }
            pv.push(best_move);
        }

        pv
    }
}

/// Score for a node with no legal moves: mated if in check, else a draw.
/// Mates closer to the root score worse for the mated side, so the winner
/// steers toward the shortest mate.
#[inline]
fn terminal_score(position: &Position, ply: u8) -> i32 {
    if position.in_check() {
        -(MATE_SCORE - i32::from(ply))
    } else {
        0
    }
}

/// Mate scores are stored relative to the probing node, not the root, so a
/// table entry written at one ply stays meaningful at another.
#[inline]
fn tt_score_for_storage(score: i32, ply: u8) -> i32 {
    if score >= MATE_TT_THRESHOLD {
        score.saturating_add(i32::from(ply))
    } else if score <= -MATE_TT_THRESHOLD {
        score.saturating_sub(i32::from(ply))
    } else {
        score
    }
}

#[inline]
fn tt_score_from_storage(score: i32, ply: u8) -> i32 {
    if score >= MATE_TT_THRESHOLD {
        score.saturating_sub(i32::from(ply))
    } else if score <= -MATE_TT_THRESHOLD {
        score.saturating_add(i32::from(ply))
    } else {
        score
    }
}

/// Sort descending by ordering key: transposition move first, then the
/// previous iteration's principal-variation move, then MVV-LVA captures
/// and promotions, then everything else.
fn order_moves(position: &Position, moves: &mut MoveList, tt_move: Option<Move>, pv_move: Option<Move>) {
    moves.sort_unstable_by_key(|mv| -order_score(position, *mv, tt_move, pv_move));
}

fn order_score(position: &Position, mv: Move, tt_move: Option<Move>, pv_move: Option<Move>) -> i32 {
    if Some(mv) == tt_move {
        return 1_000_000;
    }
    if Some(mv) == pv_move {
        return 900_000;
    }

    let mut score = 0i32;
    if let Some(victim) = mv.captured {
        let attacker = position
            .piece_at(mv.from)
            .piece()
            .map(|p| p.kind)
            .unwrap_or(PieceKind::Pawn);
        score += 100_000 + piece_value(victim) * 16 - piece_value(attacker);
    }
    if let Some(promo) = mv.promotion {
        score += 90_000 + piece_value(promo);
    }
    score
}

fn render_pv(pv: &[Move]) -> String {
    pv.iter()
        .map(|mv| move_to_algebraic(*mv))
        .collect::<Vec<_>>()
        .join(" ")
}
