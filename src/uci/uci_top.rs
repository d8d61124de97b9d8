//! UCI protocol front-end and command loop.
//!
//! Parses UCI commands, maintains the current position, routes `go`
//! requests into the iterative-deepening search, and emits
//! protocol-compliant output. The search itself is synchronous; `stop`
//! has nothing to interrupt and is a no-op.

use std::io::{self, BufRead, Write};

use crate::board::position::Position;
use crate::board::types::Color;
use crate::errors::ChessError;
use crate::search::engine::{Searcher, MAX_DEPTH};
use crate::utils::algebraic::{algebraic_to_move, move_to_algebraic};
use crate::utils::fen::parse_fen;

const UCI_ENGINE_NAME: &str = "Quince Chess";
const UCI_ENGINE_AUTHOR: &str = "the Quince Chess authors";

const DEFAULT_HASH_MB: usize = 16;
const DEFAULT_MOVETIME_MS: u64 = 1_000;

pub fn run_stdio_loop() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut uci = UciState::new();

    for line in stdin.lock().lines() {
        let line = line?;
        let should_quit = uci.handle_command(&line, &mut stdout)?;
        stdout.flush()?;
        if should_quit {
            break;
        }
    }

    Ok(())
}

struct UciState {
    position: Position,
    searcher: Searcher,
    hash_mb: usize,
    fixed_depth: Option<u8>,
}

#[derive(Debug, Default, Clone, Copy)]
struct GoParams {
    movetime_ms: Option<u64>,
    wtime_ms: Option<u64>,
    btime_ms: Option<u64>,
    winc_ms: Option<u64>,
    binc_ms: Option<u64>,
    depth: Option<u8>,
}

impl UciState {
    fn new() -> Self {
        Self {
            position: Position::startpos(),
            searcher: Searcher::with_hash_mb(DEFAULT_HASH_MB),
            hash_mb: DEFAULT_HASH_MB,
            fixed_depth: None,
        }
    }

    fn handle_command(&mut self, line: &str, out: &mut impl Write) -> io::Result<bool> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }

        let mut parts = trimmed.split_whitespace();
        let cmd = parts.next().unwrap_or_default();

        match cmd {
            "uci" => {
                writeln!(out, "id name {}", UCI_ENGINE_NAME)?;
                writeln!(out, "id author {}", UCI_ENGINE_AUTHOR)?;
                writeln!(out, "option name Hash type spin default 16 min 1 max 1024")?;
                writeln!(out, "option name FixedDepth type spin default 0 min 0 max 64")?;
                writeln!(out, "uciok")?;
            }
            "isready" => {
                writeln!(out, "readyok")?;
            }
            "setoption" => {
                if let Err(err) = self.handle_setoption(trimmed) {
                    writeln!(out, "info string setoption error: {}", err)?;
                }
            }
            "ucinewgame" => {
                self.position = Position::startpos();
                self.searcher.new_game();
            }
            "position" => {
                if let Err(err) = self.handle_position(trimmed) {
                    writeln!(out, "info string position error: {}", err)?;
                }
            }
            "go" => {
                self.handle_go(trimmed, out)?;
            }
            "stop" => {
                // Search is synchronous; there is nothing running to stop.
            }
            "quit" => {
                return Ok(true);
            }
            _ => {
                // Unknown commands are ignored for UCI compatibility.
            }
        }

        Ok(false)
    }

    fn handle_setoption(&mut self, line: &str) -> Result<(), String> {
        let mut tokens = line.split_whitespace();
        let _ = tokens.next(); // setoption

        let mut name_tokens = Vec::<String>::new();
        let mut value_tokens = Vec::<String>::new();
        let mut mode = "";

        for tok in tokens {
            match tok {
                "name" => mode = "name",
                "value" => mode = "value",
                _ if mode == "name" => name_tokens.push(tok.to_owned()),
                _ if mode == "value" => value_tokens.push(tok.to_owned()),
                _ => {}
            }
        }

        let name = name_tokens.join(" ");
        let value = value_tokens.join(" ");

        if name.eq_ignore_ascii_case("Hash") {
            let parsed = value
                .parse::<usize>()
                .map_err(|_| format!("invalid Hash value '{value}'"))?;
            self.hash_mb = parsed.clamp(1, 1024);
            self.searcher = Searcher::with_hash_mb(self.hash_mb);
        } else if name.eq_ignore_ascii_case("FixedDepth") {
            let parsed = value
                .parse::<u8>()
                .map_err(|_| format!("invalid FixedDepth value '{value}'"))?;
            self.fixed_depth = (parsed > 0).then_some(parsed.min(MAX_DEPTH));
        } else {
            return Err(format!("unknown option '{name}'"));
        }

        Ok(())
    }

    /// `position [startpos | fen <fields>] [moves <lan>...]`
    ///
    /// A failure anywhere leaves the previously loaded position untouched.
    fn handle_position(&mut self, line: &str) -> Result<(), ChessError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let moves_at = tokens.iter().position(|t| *t == "moves");
        let setup_end = moves_at.unwrap_or(tokens.len());

        let mut candidate = match tokens.get(1) {
            Some(&"startpos") => Position::startpos(),
            Some(&"fen") => {
                let fen = tokens[2..setup_end].join(" ");
                parse_fen(&fen)?
            }
            _ => {
                return Err(ChessError::InvalidFen(
                    "position requires startpos or fen".to_owned(),
                ))
            }
        };

        if let Some(at) = moves_at {
            for lan in &tokens[at + 1..] {
                let mv = algebraic_to_move(lan, &candidate)?;
                // Legal by construction, but refuse to desync on surprises.
                if !candidate.make_move(mv) {
                    return Err(ChessError::IllegalMove((*lan).to_owned()));
                }
            }
        }

        self.position = candidate;
        Ok(())
    }

    fn handle_go(&mut self, line: &str, out: &mut impl Write) -> io::Result<()> {
        let params = parse_go_params(line);
        let budget_ms = self.resolve_budget(&params);
        let depth = self
            .fixed_depth
            .or(params.depth)
            .unwrap_or(MAX_DEPTH)
            .clamp(1, MAX_DEPTH);

        let report = self
            .searcher
            .iterative_deepening(&self.position, budget_ms, depth);

        let pv: Vec<String> = report.pv.iter().map(|m| move_to_algebraic(*m)).collect();
        writeln!(
            out,
            "info depth {} score cp {} nodes {} time {} pv {}",
            report.depth,
            report.score,
            report.nodes,
            report.elapsed_ms,
            pv.join(" "),
        )?;

        match report.best_move {
            Some(mv) => writeln!(out, "bestmove {}", move_to_algebraic(mv))?,
            None => writeln!(out, "bestmove 0000")?,
        }
        Ok(())
    }

    /// Explicit `movetime` is used verbatim; otherwise a twentieth of the
    /// mover's remaining clock plus half the increment.
    fn resolve_budget(&self, params: &GoParams) -> u64 {
        if let Some(movetime) = params.movetime_ms {
            return movetime.max(1);
        }

        let (remaining, increment) = match self.position.side_to_move {
            Color::White => (params.wtime_ms, params.winc_ms),
            Color::Black => (params.btime_ms, params.binc_ms),
        };

        match remaining {
            Some(clock) => ((clock / 20) + increment.unwrap_or(0) / 2).max(1),
            None => DEFAULT_MOVETIME_MS,
        }
    }
}

fn parse_go_params(line: &str) -> GoParams {
    let mut params = GoParams::default();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    params.movetime_ms = value_after(&tokens, "movetime").and_then(|v| v.parse().ok());
    params.wtime_ms = value_after(&tokens, "wtime").and_then(|v| v.parse().ok());
    params.btime_ms = value_after(&tokens, "btime").and_then(|v| v.parse().ok());
    params.winc_ms = value_after(&tokens, "winc").and_then(|v| v.parse().ok());
    params.binc_ms = value_after(&tokens, "binc").and_then(|v| v.parse().ok());
    params.depth = value_after(&tokens, "depth").and_then(|v| v.parse().ok());

    params
}

fn value_after<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| *t == key)
        .and_then(|at| tokens.get(at + 1).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fen::generate_fen;

    fn run(uci: &mut UciState, line: &str) -> String {
        let mut out = Vec::new();
        uci.handle_command(line, &mut out)
            .expect("command should run");
        String::from_utf8(out).expect("output should be utf8")
    }

    #[test]
    fn uci_handshake_identifies_the_engine() {
        let mut uci = UciState::new();
        let out = run(&mut uci, "uci");
        assert!(out.contains("id name Quince Chess"));
        assert!(out.trim_end().ends_with("uciok"));
        assert_eq!(run(&mut uci, "isready").trim(), "readyok");
    }

    #[test]
    fn position_command_applies_moves() {
        let mut uci = UciState::new();
        run(&mut uci, "position startpos moves e2e4 e7e5");
        let fen = generate_fen(&uci.position);
        assert!(fen.starts_with("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w"));
    }

    #[test]
    fn bad_position_commands_leave_state_untouched() {
        let mut uci = UciState::new();
        run(&mut uci, "position startpos moves e2e4");
        let before = generate_fen(&uci.position);

        let out = run(&mut uci, "position fen not a fen at all");
        assert!(out.contains("position error"));
        assert_eq!(generate_fen(&uci.position), before);

        let out = run(&mut uci, "position startpos moves e2e5");
        assert!(out.contains("position error"));
        assert_eq!(generate_fen(&uci.position), before);
    }

    #[test]
    fn go_movetime_produces_a_bestmove() {
        let mut uci = UciState::new();
        run(&mut uci, "position startpos");
        let out = run(&mut uci, "go movetime 50");
        assert!(out.contains("bestmove "));
        assert!(!out.contains("bestmove 0000"));
    }

    #[test]
    fn mated_positions_answer_with_a_null_move() {
        let mut uci = UciState::new();
        run(&mut uci, "position fen 8/8/5K1k/8/8/8/8/7R b - - 0 1");
        let out = run(&mut uci, "go movetime 50");
        assert!(out.contains("bestmove 0000"));
    }

    #[test]
    fn go_parses_clock_fields() {
        let params = parse_go_params("go wtime 60000 btime 30000 winc 1000 binc 500 depth 7");
        assert_eq!(params.wtime_ms, Some(60_000));
        assert_eq!(params.btime_ms, Some(30_000));
        assert_eq!(params.winc_ms, Some(1_000));
        assert_eq!(params.binc_ms, Some(500));
        assert_eq!(params.depth, Some(7));
    }
}
