//! Zobrist hashing for fast position identity.
//!
//! The keys are generated from a fixed-seed RNG so hashes are deterministic
//! across runs, which is useful for testing and debugging. Two keys are
//! maintained per position: the full position hash and a pawn-only hash used
//! by the pawn-structure cache. Both are updated incrementally during
//! make/unmake; the from-scratch computations below are used at load time
//! and as a debug-mode consistency check.

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::board::position::Position;
use crate::board::types::{
    file_of, Color, PieceKind, Square, ALL_PIECE_KINDS, BOARD_CELLS, CASTLE_ALL,
};

#[derive(Debug)]
struct ZobristTables {
    piece_square: [[[u64; BOARD_CELLS]; 6]; 2],
    side_to_move: u64,
    castling: [u64; 4],
    en_passant_file: [u64; 8],
}

static TABLES: OnceLock<ZobristTables> = OnceLock::new();

#[inline]
fn tables() -> &'static ZobristTables {
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> ZobristTables {
    let mut rng = StdRng::seed_from_u64(0x51C3_A11E_D0_u64);

    let mut piece_square = [[[0u64; BOARD_CELLS]; 6]; 2];
    for color in &mut piece_square {
        for kind in color {
            for key in kind.iter_mut() {
                *key = rng.random();
            }
        }
    }

    let side_to_move = rng.random();

    let mut castling = [0u64; 4];
    for key in &mut castling {
        *key = rng.random();
    }

    let mut en_passant_file = [0u64; 8];
    for key in &mut en_passant_file {
        *key = rng.random();
    }

    ZobristTables {
        piece_square,
        side_to_move,
        castling,
        en_passant_file,
    }
}

/// Key for a `(color, piece, square)` occupancy term.
#[inline]
pub fn piece_square_key(color: Color, kind: PieceKind, sq: Square) -> u64 {
    tables().piece_square[color.index()][kind.index()][sq as usize]
}

/// Key for one castling-right bit index (`0..=3`), xor-ed in while the
/// right is held and xor-ed out when it is lost.
#[inline]
pub fn castling_right_key(bit: usize) -> u64 {
    tables().castling[bit]
}

/// Key for a valid en-passant file.
#[inline]
pub fn en_passant_file_key(file: u8) -> u64 {
    tables().en_passant_file[file as usize]
}

/// Side-to-move toggle key (xor in when black is to move).
#[inline]
pub fn side_to_move_key() -> u64 {
    tables().side_to_move
}

/// En-passant contribution of the current state, or 0 when there is none.
///
/// The en-passant file participates in the hash only when a pawn of the
/// side to move could actually perform the capture; a double push that no
/// enemy pawn can answer leaves the hash unchanged.
#[inline]
pub fn en_passant_component(position: &Position) -> u64 {
    match position.en_passant_square {
        Some(ep) if position.en_passant_capturable(ep) => en_passant_file_key(file_of(ep)),
        _ => 0,
    }
}

/// Compute the full position hash from the complete board state.
pub fn compute_hash(position: &Position) -> u64 {
    let mut key = 0u64;

    for color in [Color::White, Color::Black] {
        for kind in ALL_PIECE_KINDS {
            for &sq in position.piece_squares(color, kind) {
                key ^= piece_square_key(color, kind, sq);
            }
        }
    }

    if position.side_to_move == Color::Black {
        key ^= side_to_move_key();
    }

    for bit in 0..4 {
        if position.castling_rights & CASTLE_ALL & (1 << bit) != 0 {
            key ^= castling_right_key(bit);
        }
    }

    key ^= en_passant_component(position);

    key
}

/// Compute the pawn-only hash from the complete board state.
pub fn compute_pawn_hash(position: &Position) -> u64 {
    let mut key = 0u64;

    for color in [Color::White, Color::Black] {
        for &sq in position.piece_squares(color, PieceKind::Pawn) {
            key ^= piece_square_key(color, PieceKind::Pawn, sq);
        }
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fen::parse_fen;

    #[test]
    fn hashes_are_deterministic() {
        let a = Position::startpos();
        let b = Position::startpos();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.pawn_hash, b.pawn_hash);
        assert_ne!(a.hash, 0);
    }

    #[test]
    fn side_to_move_changes_hash() {
        let w = parse_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").expect("FEN should parse");
        let b = parse_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").expect("FEN should parse");
        assert_ne!(w.hash, b.hash);
        assert_eq!(w.pawn_hash, b.pawn_hash);
    }

    #[test]
    fn castling_rights_change_hash() {
        let with_rights = parse_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").expect("FEN should parse");
        let without_rights =
            parse_fen("4k3/8/8/8/8/8/8/R3K2R w - - 0 1").expect("FEN should parse");
        assert_ne!(with_rights.hash, without_rights.hash);
    }

    #[test]
    fn en_passant_counts_only_with_a_capturer() {
        // No black pawn can take on e3: the en-passant file stays out of the hash.
        let idle = parse_fen("4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1").expect("FEN should parse");
        let none = parse_fen("4k3/8/8/8/4P3/8/8/4K3 b - - 0 1").expect("FEN should parse");
        assert_eq!(idle.hash, none.hash);

        // A black pawn on d4 can take on e3: now the file participates.
        let live = parse_fen("4k3/8/8/8/3pP3/8/8/4K3 b - e3 0 1").expect("FEN should parse");
        let live_none = parse_fen("4k3/8/8/8/3pP3/8/8/4K3 b - - 0 1").expect("FEN should parse");
        assert_ne!(live.hash, live_none.hash);
    }
}
