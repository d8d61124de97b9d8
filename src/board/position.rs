//! Core incremental board state representation.
//!
//! `Position` is the central model for the engine: a padded 10x12 mailbox
//! board, per-color piece lists, castling/en-passant/clock state, and two
//! incrementally maintained Zobrist hashes. It is mutated only through
//! `make_move`/`unmake_move`; after any sequence of makes undone in reverse
//! order the position compares equal to its former self, hashes included.
//!
//! `make_move` is also the engine's sole legality filter: the move generator
//! emits pseudo-legal moves, and a move that leaves the mover's own king
//! attacked (or castles across an attacked square) is rolled back here and
//! reported as refused.

use crate::board::lookup::{
    self, attack_kind, pawn_attack_bit, ray_step, ATTACK_DIAGONAL, ATTACK_KING, ATTACK_KNIGHT,
    ATTACK_STRAIGHT, PAWN_CAPTURES,
};
use crate::board::piece_list::PieceList;
use crate::board::types::{
    is_playable, Cell, CastlingRights, Color, Move, MoveKind, Piece, PieceKind, Square,
    ALL_PIECE_KINDS, BOARD_CELLS, CASTLE_ALL, CASTLE_BLACK_KINGSIDE, CASTLE_BLACK_QUEENSIDE,
    CASTLE_WHITE_KINGSIDE, CASTLE_WHITE_QUEENSIDE, A1, A8, C1, C8, D1, D8, E1, E8, F1, F8, G1, G8,
    H1, H8,
};
use crate::board::zobrist;
use crate::utils::fen;

/// Snapshot pushed before every make and popped on unmake. Hash state is
/// restored from here, never by re-xor, so it cannot drift.
#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    en_passant: Option<Square>,
    castling: CastlingRights,
    hash: u64,
    pawn_hash: u64,
    halfmove_clock: u16,
}

#[derive(Debug, Clone)]
pub struct Position {
    cells: [Cell; BOARD_CELLS],
    piece_lists: [PieceList; 2],
    king_square: [Square; 2],
    pub side_to_move: Color,
    pub castling_rights: CastlingRights,
    pub en_passant_square: Option<Square>,
    pub halfmove_clock: u16,
    pub fullmove_number: u16,
    pub hash: u64,
    pub pawn_hash: u64,
    history: Vec<HistoryEntry>,
}

impl PartialEq for Position {
    /// Observable-state equality: board, rights, clocks, and both hashes.
    /// Internal piece-list ordering and the history stack are excluded.
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
            && self.king_square == other.king_square
            && self.side_to_move == other.side_to_move
            && self.castling_rights == other.castling_rights
            && self.en_passant_square == other.en_passant_square
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
            && self.hash == other.hash
            && self.pawn_hash == other.pawn_hash
    }
}

impl Position {
    /// An empty board: all playable squares vacant, everything else sentinel.
    pub fn empty() -> Self {
        let mut cells = [Cell::Offboard; BOARD_CELLS];
        for (idx, cell) in cells.iter_mut().enumerate() {
            if is_playable(idx as Square) {
                *cell = Cell::Empty;
            }
        }
        Self {
            cells,
            piece_lists: [PieceList::new(), PieceList::new()],
            king_square: [E1, E8],
            side_to_move: Color::White,
            castling_rights: 0,
            en_passant_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
            pawn_hash: 0,
            history: Vec::with_capacity(128),
        }
    }

    pub fn startpos() -> Self {
        fen::parse_fen(fen::STARTING_POSITION_FEN).expect("starting FEN should always parse")
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Cell {
        self.cells[sq as usize]
    }

    #[inline]
    pub(crate) fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.cells
    }

    /// Squares occupied by `color`'s pieces of `kind`, in index order.
    #[inline]
    pub fn piece_squares(&self, color: Color, kind: PieceKind) -> &[Square] {
        self.piece_lists[color.index()].squares(kind)
    }

    #[inline]
    pub fn piece_count(&self, color: Color, kind: PieceKind) -> usize {
        self.piece_lists[color.index()].count(kind)
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.king_square[color.index()]
    }

    /// Used by the FEN loader while assembling a fresh position.
    pub(crate) fn place_piece(&mut self, color: Color, kind: PieceKind, sq: Square) {
        debug_assert!(self.cells[sq as usize].is_empty(), "square already occupied");
        self.cells[sq as usize] = Cell::Occupied(Piece { color, kind });
        self.piece_lists[color.index()].add(kind, sq);
        if kind == PieceKind::King {
            self.king_square[color.index()] = sq;
        }
    }

    /// Recompute both hashes from the board. Only legitimate at load time;
    /// during play the hashes are maintained incrementally.
    pub(crate) fn refresh_hashes(&mut self) {
        self.hash = zobrist::compute_hash(self);
        self.pawn_hash = zobrist::compute_pawn_hash(self);
    }

    /// Whether a pawn of the side to move could capture onto `ep`.
    #[inline]
    pub(crate) fn en_passant_capturable(&self, ep: Square) -> bool {
        let mover = self.side_to_move;
        for delta in PAWN_CAPTURES[mover.index()] {
            let origin = lookup::offset(ep, -delta);
            if self.cells[origin as usize]
                == Cell::Occupied(Piece {
                    color: mover,
                    kind: PieceKind::Pawn,
                })
            {
                return true;
            }
        }
        false
    }

    /// Whether `sq` is attacked by any piece of `by`.
    ///
    /// Walks only the attacker's piece lists, rejecting non-attacking
    /// offsets through the precomputed geometry table and confirming slider
    /// rays by checking the squares in between. Short-circuits on the first
    /// attacker found.
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        let lists = &self.piece_lists[by.index()];
        let pawn_bit = pawn_attack_bit(by);

        for &p in lists.squares(PieceKind::Pawn) {
            if attack_kind(p, sq) & pawn_bit != 0 {
                return true;
            }
        }
        for &p in lists.squares(PieceKind::Knight) {
            if attack_kind(p, sq) & ATTACK_KNIGHT != 0 {
                return true;
            }
        }
        for &p in lists.squares(PieceKind::King) {
            if attack_kind(p, sq) & ATTACK_KING != 0 {
                return true;
            }
        }
        for &p in lists.squares(PieceKind::Bishop) {
            if attack_kind(p, sq) & ATTACK_DIAGONAL != 0 && self.ray_is_clear(p, sq) {
                return true;
            }
        }
        for &p in lists.squares(PieceKind::Rook) {
            if attack_kind(p, sq) & ATTACK_STRAIGHT != 0 && self.ray_is_clear(p, sq) {
                return true;
            }
        }
        for &p in lists.squares(PieceKind::Queen) {
            if attack_kind(p, sq) & (ATTACK_DIAGONAL | ATTACK_STRAIGHT) != 0
                && self.ray_is_clear(p, sq)
            {
                return true;
            }
        }
        false
    }

    /// Whether the side to move is currently in check. Analysis positions
    /// without a king (material studies) are never in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        let mover = self.side_to_move;
        self.piece_lists[mover.index()].count(PieceKind::King) > 0
            && self.is_attacked(self.king_square[mover.index()], mover.opposite())
    }

    /// All cells strictly between `from` and `to` along their ray are empty.
    /// Sentinel cells count as blockers, which rejects table offsets that
    /// would wrap around the board edge.
    #[inline]
    fn ray_is_clear(&self, from: Square, to: Square) -> bool {
        let step = ray_step(from, to);
        debug_assert_ne!(step, 0, "ray walk on non-ray offset");
        let mut s = from as i16 + step;
        while s != to as i16 {
            if self.cells[s as usize] != Cell::Empty {
                return false;
            }
            s += step;
        }
        true
    }

    /// Apply a pseudo-legal move.
    ///
    /// Updates the board, piece lists, rights, clocks, and both hashes
    /// incrementally, then verifies the mover did not leave their own king
    /// attacked (for castling: that no square the king traversed was
    /// attacked). An illegal move is rolled back internally and `false` is
    /// returned; this check is the engine's only legality filter.
    pub fn make_move(&mut self, mv: Move) -> bool {
        let Cell::Occupied(piece) = self.cells[mv.from as usize] else {
            debug_assert!(false, "make_move from an empty square");
            return false;
        };
        let mover = piece.color;
        let opponent = mover.opposite();
        debug_assert_eq!(mover, self.side_to_move, "move out of turn");

        self.history.push(HistoryEntry {
            en_passant: self.en_passant_square,
            castling: self.castling_rights,
            hash: self.hash,
            pawn_hash: self.pawn_hash,
            halfmove_clock: self.halfmove_clock,
        });

        // Remove the old en-passant contribution while the pre-move board
        // (which determines whether a capturer exists) is still intact.
        self.hash ^= zobrist::en_passant_component(self);

        if let Some(victim) = mv.captured {
            let cap_sq = self.capture_square(mv, mover);
            self.cells[cap_sq as usize] = Cell::Empty;
            self.piece_lists[opponent.index()].remove(victim, cap_sq);
            self.hash ^= zobrist::piece_square_key(opponent, victim, cap_sq);
            if victim == PieceKind::Pawn {
                self.pawn_hash ^= zobrist::piece_square_key(opponent, PieceKind::Pawn, cap_sq);
            }
        }

        self.cells[mv.from as usize] = Cell::Empty;
        self.hash ^= zobrist::piece_square_key(mover, piece.kind, mv.from);
        if piece.kind == PieceKind::Pawn {
            self.pawn_hash ^= zobrist::piece_square_key(mover, PieceKind::Pawn, mv.from);
        }

        if let Some(promo) = mv.promotion {
            self.piece_lists[mover.index()].remove(PieceKind::Pawn, mv.from);
            self.piece_lists[mover.index()].add(promo, mv.to);
            self.cells[mv.to as usize] = Cell::Occupied(Piece {
                color: mover,
                kind: promo,
            });
            self.hash ^= zobrist::piece_square_key(mover, promo, mv.to);
        } else {
            self.piece_lists[mover.index()].relocate(piece.kind, mv.from, mv.to);
            self.cells[mv.to as usize] = Cell::Occupied(piece);
            self.hash ^= zobrist::piece_square_key(mover, piece.kind, mv.to);
            if piece.kind == PieceKind::Pawn {
                self.pawn_hash ^= zobrist::piece_square_key(mover, PieceKind::Pawn, mv.to);
            }
        }

        if piece.kind == PieceKind::King {
            self.king_square[mover.index()] = mv.to;
        }

        if mv.kind == MoveKind::Castle {
            let (rook_from, rook_to) = castle_rook_squares(mv.to);
            let rook = Piece {
                color: mover,
                kind: PieceKind::Rook,
            };
            self.cells[rook_from as usize] = Cell::Empty;
            self.cells[rook_to as usize] = Cell::Occupied(rook);
            self.piece_lists[mover.index()].relocate(PieceKind::Rook, rook_from, rook_to);
            self.hash ^= zobrist::piece_square_key(mover, PieceKind::Rook, rook_from);
            self.hash ^= zobrist::piece_square_key(mover, PieceKind::Rook, rook_to);
        }

        let new_rights =
            self.castling_rights & castling_update_mask(mv.from) & castling_update_mask(mv.to);
        let lost = self.castling_rights & !new_rights;
        for bit in 0..4 {
            if lost & (1 << bit) != 0 {
                self.hash ^= zobrist::castling_right_key(bit);
            }
        }
        self.castling_rights = new_rights;

        self.en_passant_square = if mv.kind == MoveKind::DoublePawnPush {
            Some((mv.from + mv.to) / 2)
        } else {
            None
        };

        if piece.kind == PieceKind::Pawn || mv.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if mover == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }

        self.side_to_move = opponent;
        self.hash ^= zobrist::side_to_move_key();
        self.hash ^= zobrist::en_passant_component(self);

        let has_king = self.piece_lists[mover.index()].count(PieceKind::King) > 0;
        let mut illegal =
            has_king && self.is_attacked(self.king_square[mover.index()], opponent);
        if !illegal && mv.kind == MoveKind::Castle {
            let crossed = (mv.from + mv.to) / 2;
            illegal =
                self.is_attacked(mv.from, opponent) || self.is_attacked(crossed, opponent);
        }
        if illegal {
            self.unmake_move(mv);
            return false;
        }
        true
    }

    /// Undo the most recent `make_move`. The board and piece lists are
    /// rebuilt from the move's own fields; rights, en-passant, clocks, and
    /// both hashes come back verbatim from the history snapshot.
    pub fn unmake_move(&mut self, mv: Move) {
        let Some(undo) = self.history.pop() else {
            debug_assert!(false, "unmake_move without a matching make_move");
            return;
        };
        let mover = self.side_to_move.opposite();
        let opponent = self.side_to_move;
        self.side_to_move = mover;

        if mover == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_sub(1);
        }
        self.castling_rights = undo.castling;
        self.en_passant_square = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
        self.pawn_hash = undo.pawn_hash;

        let Cell::Occupied(moved) = self.cells[mv.to as usize] else {
            debug_assert!(false, "unmake_move with an empty destination");
            return;
        };
        self.cells[mv.to as usize] = Cell::Empty;

        if mv.promotion.is_some() {
            self.piece_lists[mover.index()].remove(moved.kind, mv.to);
            self.piece_lists[mover.index()].add(PieceKind::Pawn, mv.from);
            self.cells[mv.from as usize] = Cell::Occupied(Piece {
                color: mover,
                kind: PieceKind::Pawn,
            });
        } else {
            self.piece_lists[mover.index()].relocate(moved.kind, mv.to, mv.from);
            self.cells[mv.from as usize] = Cell::Occupied(moved);
            if moved.kind == PieceKind::King {
                self.king_square[mover.index()] = mv.from;
            }
        }

        if mv.kind == MoveKind::Castle {
            let (rook_from, rook_to) = castle_rook_squares(mv.to);
            let rook = Piece {
                color: mover,
                kind: PieceKind::Rook,
            };
            self.cells[rook_to as usize] = Cell::Empty;
            self.cells[rook_from as usize] = Cell::Occupied(rook);
            self.piece_lists[mover.index()].relocate(PieceKind::Rook, rook_to, rook_from);
        }

        if let Some(victim) = mv.captured {
            let cap_sq = self.capture_square(mv, mover);
            self.cells[cap_sq as usize] = Cell::Occupied(Piece {
                color: opponent,
                kind: victim,
            });
            self.piece_lists[opponent.index()].add(victim, cap_sq);
        }
    }

    /// Square the captured piece stands on: the destination, except for
    /// en passant where the victim is one rank behind the target.
    #[inline]
    fn capture_square(&self, mv: Move, mover: Color) -> Square {
        if mv.kind == MoveKind::EnPassant {
            match mover {
                Color::White => mv.to - 10,
                Color::Black => mv.to + 10,
            }
        } else {
            mv.to
        }
    }

    /// How many earlier positions in the current game line share this
    /// position's hash. Exposed for front ends; search does not consult it.
    pub fn repetition_count(&self) -> usize {
        self.history.iter().filter(|h| h.hash == self.hash).count()
    }

    /// Debug-mode consistency check: piece lists, king squares, and both
    /// hashes agree with the board cells.
    pub fn is_consistent(&self) -> bool {
        let mut counted = [[0usize; 6]; 2];
        for idx in 0..BOARD_CELLS {
            let sq = idx as Square;
            match self.cells[idx] {
                Cell::Offboard => {
                    if is_playable(sq) {
                        return false;
                    }
                }
                Cell::Empty => {
                    if !is_playable(sq) {
                        return false;
                    }
                }
                Cell::Occupied(p) => {
                    if !is_playable(sq) {
                        return false;
                    }
                    counted[p.color.index()][p.kind.index()] += 1;
                    if !self
                        .piece_lists[p.color.index()]
                        .squares(p.kind)
                        .contains(&sq)
                    {
                        return false;
                    }
                    if p.kind == PieceKind::King && self.king_square[p.color.index()] != sq {
                        return false;
                    }
                }
            }
        }
        for color in [Color::White, Color::Black] {
            for kind in ALL_PIECE_KINDS {
                if counted[color.index()][kind.index()]
                    != self.piece_lists[color.index()].count(kind)
                {
                    return false;
                }
            }
        }
        self.hash == zobrist::compute_hash(self) && self.pawn_hash == zobrist::compute_pawn_hash(self)
    }
}

/// Mask of castling rights that survive a piece moving from or to `sq`.
#[inline]
fn castling_update_mask(sq: Square) -> CastlingRights {
    match sq {
        A1 => CASTLE_ALL & !CASTLE_WHITE_QUEENSIDE,
        E1 => CASTLE_ALL & !(CASTLE_WHITE_KINGSIDE | CASTLE_WHITE_QUEENSIDE),
        H1 => CASTLE_ALL & !CASTLE_WHITE_KINGSIDE,
        A8 => CASTLE_ALL & !CASTLE_BLACK_QUEENSIDE,
        E8 => CASTLE_ALL & !(CASTLE_BLACK_KINGSIDE | CASTLE_BLACK_QUEENSIDE),
        H8 => CASTLE_ALL & !CASTLE_BLACK_KINGSIDE,
        _ => CASTLE_ALL,
    }
}

/// Rook origin and destination for a castle landing the king on `to`.
#[inline]
fn castle_rook_squares(to: Square) -> (Square, Square) {
    match to {
        G1 => (H1, F1),
        C1 => (A1, D1),
        G8 => (H8, F8),
        C8 => (A8, D8),
        _ => {
            debug_assert!(false, "castle destination must be g1/c1/g8/c8");
            (to, to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::generator::generate_legal_moves;
    use crate::utils::algebraic::algebraic_to_move;
    use crate::utils::fen::{generate_fen, parse_fen};

    fn play(position: &mut Position, moves: &[&str]) -> Vec<Move> {
        let mut applied = Vec::new();
        for lan in moves {
            let mv = algebraic_to_move(lan, position).expect("move should parse");
            assert!(position.make_move(mv), "move should be legal: {lan}");
            applied.push(mv);
        }
        applied
    }

    #[test]
    fn make_unmake_restores_everything() {
        let mut position = Position::startpos();
        let before = position.clone();

        let applied = play(
            &mut position,
            &["e2e4", "d7d5", "e4d5", "g8f6", "b1c3", "f6d5", "c3d5", "d8d5"],
        );
        assert!(position.is_consistent());

        for mv in applied.iter().rev() {
            position.unmake_move(*mv);
        }
        assert_eq!(position, before);
        assert!(position.is_consistent());
    }

    #[test]
    fn en_passant_capture_round_trips() {
        let mut position =
            parse_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
                .expect("FEN should parse");
        let before = position.clone();

        let mv = algebraic_to_move("d4e3", &position).expect("move should parse");
        assert_eq!(mv.kind, MoveKind::EnPassant);
        assert!(position.make_move(mv));
        assert!(position.is_consistent());
        assert!(position.piece_at(crate::board::types::square_at(4, 3)).is_empty());

        position.unmake_move(mv);
        assert_eq!(position, before);
    }

    #[test]
    fn castling_moves_both_pieces_and_round_trips() {
        let mut position =
            parse_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").expect("FEN parses");
        let before = position.clone();

        let mv = algebraic_to_move("e1g1", &position).expect("move should parse");
        assert_eq!(mv.kind, MoveKind::Castle);
        assert!(position.make_move(mv));
        assert_eq!(
            position.piece_at(G1),
            Cell::Occupied(Piece {
                color: Color::White,
                kind: PieceKind::King
            })
        );
        assert_eq!(
            position.piece_at(F1),
            Cell::Occupied(Piece {
                color: Color::White,
                kind: PieceKind::Rook
            })
        );
        assert_eq!(position.castling_rights & CASTLE_WHITE_KINGSIDE, 0);
        assert!(position.is_consistent());

        position.unmake_move(mv);
        assert_eq!(position, before);
    }

    #[test]
    fn promotion_round_trips() {
        let mut position = parse_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").expect("FEN should parse");
        let before = position.clone();

        let mv = algebraic_to_move("a7a8q", &position).expect("move should parse");
        assert!(position.make_move(mv));
        assert_eq!(
            position.piece_at(A8),
            Cell::Occupied(Piece {
                color: Color::White,
                kind: PieceKind::Queen
            })
        );
        assert_eq!(position.piece_count(Color::White, PieceKind::Pawn), 0);
        assert!(position.is_consistent());

        position.unmake_move(mv);
        assert_eq!(position, before);
    }

    #[test]
    fn moving_into_check_is_refused_without_side_effects() {
        // The black king may not step next to the white king.
        let mut position = parse_fen("8/8/8/4k3/8/4K3/8/8 b - - 0 1").expect("FEN should parse");
        let before = position.clone();

        let mv = Move::quiet(position.king_square(Color::Black), position.king_square(Color::Black) - 10);
        assert!(!position.make_move(mv));
        assert_eq!(position, before);
    }

    #[test]
    fn castling_through_attack_is_refused() {
        // Black rook on f8 covers f1; kingside castling must be rejected.
        let mut position =
            parse_fen("5rk1/8/8/8/8/8/8/R3K2R w KQ - 0 1").expect("FEN should parse");
        let legal = generate_legal_moves(&position);
        assert!(!legal
            .iter()
            .any(|m| m.kind == MoveKind::Castle && m.to == G1));
        // Queenside is unaffected.
        assert!(legal.iter().any(|m| m.kind == MoveKind::Castle && m.to == C1));
        let mv = Move::castle(E1, G1);
        assert!(!position.make_move(mv));
    }

    #[test]
    fn incremental_hash_matches_recomputation_along_a_line() {
        let mut position = Position::startpos();
        for lan in ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "g8f6", "e1g1"] {
            let mv = algebraic_to_move(lan, &position).expect("move should parse");
            assert!(position.make_move(mv));
            assert_eq!(position.hash, zobrist::compute_hash(&position), "after {lan}");
            assert_eq!(
                position.pawn_hash,
                zobrist::compute_pawn_hash(&position),
                "after {lan}"
            );
        }
    }

    #[test]
    fn halfmove_and_fullmove_clocks_follow_the_rules() {
        let mut position = Position::startpos();
        play(&mut position, &["g1f3", "g8f6"]);
        assert_eq!(position.halfmove_clock, 2);
        assert_eq!(position.fullmove_number, 2);

        play(&mut position, &["f3e5", "f6e4", "e5d7"]);
        // Knight takes pawn resets the clock.
        assert_eq!(position.halfmove_clock, 0);
        let fen = generate_fen(&position);
        assert!(fen.ends_with("0 3"), "unexpected FEN tail: {fen}");
    }

    #[test]
    fn repetition_count_sees_shuffling() {
        let mut position = Position::startpos();
        play(&mut position, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        assert_eq!(position.repetition_count(), 1);
        play(&mut position, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        assert_eq!(position.repetition_count(), 2);
    }
}
