//! sf-annotate - scan a directory of SF2 soundfonts into a JSON catalog.

use anyhow::Result;
use clap::Parser;
use fontshelf_cli::{annotate, init_logging, install_interrupt_handler, AnnotateArgs};
use fontshelf_core::CancellationToken;
use std::process::ExitCode;
use tracing::info;

fn main() -> Result<ExitCode> {
    let args = AnnotateArgs::parse();
    init_logging(args.debug);

    info!("Soundfont annotator {}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel)?;

    annotate::run(&args, &cancel)
}
