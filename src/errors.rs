//! Errors used throughout the chess engine.
//!
//! `ChessError` is the single error type returned by the parsing and protocol
//! entry points. Only malformed external input produces an error: an invalid
//! position string or an unparseable/illegal move string is rejected without
//! mutating existing state. Internal conditions that are part of normal
//! operation (a pseudo-legal move refused by the legality filter, a search
//! aborted by its time budget, a cache slot reused by an unrelated position)
//! are not errors and are handled in-band by the modules that own them.

use thiserror::Error;

/// Unified error type for external input handling.
#[derive(Debug, Error)]
pub enum ChessError {
    /// A position string failed strict FEN validation.
    ///
    /// The payload describes the offending field or token.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    /// An algebraic square token was outside `a1`..`h8`.
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// A long-algebraic move string was malformed.
    #[error("invalid move string: {0}")]
    InvalidMoveString(String),

    /// A well-formed move string does not correspond to any legal move in
    /// the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}
