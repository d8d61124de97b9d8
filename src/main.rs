//! UCI binary entry point.

use std::io;

fn main() -> io::Result<()> {
    env_logger::init();
    quince_chess::uci::uci_top::run_stdio_loop()
}
