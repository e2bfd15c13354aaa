//! commpack - CRC8-framed serial packets
//!
//! Builds, checks and sends frames of the form
//! `main_version | data_version | length | payload | crc8`.

mod commands;
mod config;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use commpack_protocol::LengthField;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commpack")]
#[command(about = "Build, check and send CRC8-framed serial packets")]
#[command(version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, env = "COMMPACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Frame format flags; unset flags fall back to the config.
#[derive(Args, Debug, Clone, Default)]
pub struct FrameArgs {
    /// Protocol major version (decimal or 0x-prefixed)
    #[arg(long, value_parser = parse_version)]
    main_version: Option<u8>,

    /// Payload schema version (decimal or 0x-prefixed)
    #[arg(long, value_parser = parse_version)]
    data_version: Option<u8>,

    /// Length field width: u8 or u16
    #[arg(short, long)]
    length_field: Option<LengthField>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the CRC8 of hex bytes
    Crc {
        /// Input bytes as hex, e.g. "03 01" or "0x03,0x01"
        data: String,

        /// First byte to include
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Number of bytes to include (defaults to the rest of the input)
        #[arg(long)]
        length: Option<usize>,
    },

    /// Build a frame from a hex payload and print it as hex
    Build {
        /// Payload bytes as hex
        payload: String,

        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Validate and describe a hex-encoded frame
    Decode {
        /// Frame bytes as hex
        frame: String,

        /// Length field width: u8 or u16
        #[arg(short, long)]
        length_field: Option<LengthField>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a frame and write it to a serial device
    Send {
        /// Payload bytes as hex
        payload: String,

        /// Device path (overrides link.device)
        #[arg(short, long, env = "COMMPACK_DEVICE")]
        device: Option<PathBuf>,

        /// Wait for one reply frame and print it
        #[arg(long)]
        await_reply: bool,

        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

fn parse_version(s: &str) -> Result<u8, String> {
    config::parse_u8(s).ok_or_else(|| format!("invalid version '{}': expected 0-255 or 0x00-0xff", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    match commands::execute(&config, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
