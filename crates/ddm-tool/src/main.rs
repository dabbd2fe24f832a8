//! Command-line tool for DDM frames.
//!
//! ```bash
//! # Show how a 70000-byte request is cut into wire pieces
//! ddm-tool segment --length 70000
//!
//! # Wrap a payload file and save the wire bytes
//! ddm-tool segment payload.bin -o capture.bin
//!
//! # Decode a captured byte stream
//! ddm-tool inspect capture.bin
//!
//! # Send one request and print the reply
//! ddm-tool send --config session.toml --payload 0006106d
//! ```
//!
//! Logs go to stderr and are controlled by `RUST_LOG`; command output goes to
//! stdout.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand, ValueEnum};
use ddm_core::TransportKind;
use ddm_proto::DssType;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

pub use error::ToolError;

#[derive(Parser, Debug)]
#[command(name = "ddm-tool")]
#[command(version, about = "Inspect and exchange DDM frames", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a payload into wire bytes and list the pieces
    Segment {
        /// Payload file
        #[arg(value_name = "FILE", required_unless_present = "length")]
        input: Option<PathBuf>,

        /// Synthetic payload length, used when no file is given
        #[arg(short, long, conflicts_with = "input")]
        length: Option<usize>,

        /// Write the wire bytes to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Correlation id
        #[arg(short, long, default_value_t = 1)]
        correlation_id: u16,

        /// DSS type
        #[arg(short = 't', long = "type", value_enum, default_value_t = Kind::Request)]
        kind: Kind,
    },

    /// Decode every frame in a captured byte stream
    Inspect {
        /// Capture file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Payload bytes to dump per frame
        #[arg(long, default_value_t = 16)]
        dump: usize,

        /// Largest reassembled message accepted
        #[arg(long)]
        max_message_size: Option<usize>,
    },

    /// Send one request and print the reply
    Send {
        /// Session configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the configured address
        #[arg(short, long)]
        address: Option<String>,

        /// Override the configured transport
        #[arg(long, value_enum)]
        transport: Option<Transport>,

        /// Request payload as hex
        #[arg(short, long)]
        payload: String,

        /// Payload bytes of the reply to dump
        #[arg(long, default_value_t = 64)]
        dump: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Request,
    Reply,
    Object,
    Communication,
}

impl From<Kind> for DssType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Request => Self::Request,
            Kind::Reply => Self::Reply,
            Kind::Object => Self::Object,
            Kind::Communication => Self::Communication,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Remote,
    Native,
}

impl From<Transport> for TransportKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Remote => Self::Remote,
            Transport::Native => Self::Native,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Segment { input, length, output, correlation_id, kind } => {
            commands::segment(input, length, output, correlation_id, kind.into())
        },
        Commands::Inspect { input, dump, max_message_size } => {
            commands::inspect(input, dump, max_message_size)
        },
        Commands::Send { config, address, transport, payload, dump } => {
            commands::send(config, address, transport.map(Into::into), &payload, dump)
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr().lock(), "ddm-tool: {e}");
            ExitCode::FAILURE
        },
    }
}
