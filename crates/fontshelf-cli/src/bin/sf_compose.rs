//! sf-compose - generate a MIDI composition and play it with a cataloged soundfont.

use anyhow::Result;
use clap::Parser;
use fontshelf_cli::{compose, init_logging, install_interrupt_handler, ComposeArgs};
use fontshelf_core::CancellationToken;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let args = ComposeArgs::parse();
    init_logging(args.debug);

    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel)?;

    compose::run(&args, &cancel)
}
