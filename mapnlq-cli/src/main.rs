//! MapNLQ CLI - Dolby Vision profile 7 NLQ reconstruction.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CmdInfo, CmdMap};

/// Command-line arguments for the mapnlq tool.
#[derive(Parser, Debug)]
#[command(name = "mapnlq")]
#[command(version)]
#[command(about = "Rebuild 12-bit video from Dolby Vision profile 7 base and enhancement layers")]
#[command(long_about = "MapNLQ combines a 16-bit base layer with a 10-bit enhancement layer\n\
    using the NLQ parameters carried in Dolby Vision RPUs.\n\n\
    EXAMPLES:\n    \
    mapnlq map --bl bl.yuv --el el.yuv --width 3840 --height 2160 --rpu RPU.bin -o out.yuv\n    \
    mapnlq map --bl bl.yuv --el el.yuv --width 1920 --height 1080 --attach-rpu RPU.bin -o out.yuv\n    \
    mapnlq info RPU.bin --json")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconstruct 12-bit frames from raw BL/EL files
    Map(CmdMap),
    /// Inspect an RPU file
    Info(CmdInfo),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Command::Map(cmd) => cmd.run(),
        Command::Info(cmd) => cmd.run(),
    }
}
