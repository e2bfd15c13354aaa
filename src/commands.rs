//! Command execution.

use crate::config::Config;
use crate::{Commands, FrameArgs};
use colored::Colorize;
use commpack_link::FrameLink;
use commpack_protocol::{crc8_from_bytes, Frame, FrameBuilder, LengthField};
use serde::Serialize;

/// Executes a command and returns the formatted output.
pub async fn execute(config: &Config, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Crc {
            data,
            offset,
            length,
        } => {
            let bytes = parse_hex(&data)?;
            let length = length.unwrap_or_else(|| bytes.len().saturating_sub(offset));
            let crc = crc8_from_bytes(&bytes, offset, length)?;
            Ok(format!("{:#04x}", crc))
        }

        Commands::Build { payload, frame } => {
            let frame = build_frame(config, &frame, &parse_hex(&payload)?)?;
            Ok(hex::encode(frame.frame_bytes()))
        }

        Commands::Decode {
            frame,
            length_field,
            json,
        } => {
            let length_field = length_field.unwrap_or(config.protocol.length_field);
            let frame = Frame::parse(&parse_hex(&frame)?, length_field)?;
            if json {
                Ok(serde_json::to_string_pretty(&FrameSummary::from(&frame))?)
            } else {
                Ok(format_frame(&frame))
            }
        }

        Commands::Send {
            payload,
            device,
            await_reply,
            frame,
        } => {
            let device = device
                .or_else(|| config.link.device.clone())
                .ok_or("no device given (use --device or link.device)")?;
            let frame = build_frame(config, &frame, &parse_hex(&payload)?)?;

            let file = tokio::fs::OpenOptions::new()
                .read(await_reply)
                .write(true)
                .open(&device)
                .await?;
            let mut link = FrameLink::new(file, config.link.link_config(&config.protocol));

            link.send(&frame).await?;
            tracing::info!("Sent {} bytes to {}", frame.frame_bytes().len(), device.display());

            let mut output = format!(
                "{} {} ({} bytes) to {}",
                "Sent".green(),
                hex::encode(frame.frame_bytes()),
                frame.frame_bytes().len(),
                device.display()
            );
            if await_reply {
                let reply = link.recv().await?;
                output.push('\n');
                output.push_str(&format_frame(&reply));
            }
            Ok(output)
        }

        Commands::ShowConfig => Ok(config.to_yaml()?),
    }
}

/// Runs the builder state machine with versions from flags or config.
fn build_frame(
    config: &Config,
    args: &FrameArgs,
    payload: &[u8],
) -> Result<Frame, commpack_protocol::ProtocolError> {
    let length_field: LengthField = args.length_field.unwrap_or(config.protocol.length_field);
    let defaults = config.protocol.versions();
    let mut builder = FrameBuilder::with_length_field(length_field);
    builder.set_versions(
        args.main_version.unwrap_or(defaults.main),
        args.data_version.unwrap_or(defaults.data),
    )?;
    builder.init_frame()?;
    builder.extend_buffer(payload)?;
    builder.build_comm_pack()
}

/// Parses hex input such as `"0301"`, `"03 01"` or `"0x03,0x01"`.
fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    hex::decode(digits)
}

/// JSON view of a frame.
#[derive(Debug, Serialize)]
struct FrameSummary {
    main_version: u8,
    data_version: u8,
    length_field: LengthField,
    length: usize,
    payload: String,
    crc: u8,
    frame: String,
}

impl From<&Frame> for FrameSummary {
    fn from(frame: &Frame) -> Self {
        Self {
            main_version: frame.main_version(),
            data_version: frame.data_version(),
            length_field: frame.length_field(),
            length: frame.length(),
            payload: hex::encode(frame.payload()),
            crc: frame.crc(),
            frame: hex::encode(frame.frame_bytes()),
        }
    }
}

fn format_frame(frame: &Frame) -> String {
    format!(
        "{}  {:#04x}\n{}  {:#04x}\n{}        {} ({})\n{}       {}\n{}           {:#04x} {}",
        "main_version:".cyan(),
        frame.main_version(),
        "data_version:".cyan(),
        frame.data_version(),
        "length:".cyan(),
        frame.length(),
        frame.length_field(),
        "payload:".cyan(),
        hex::encode(frame.payload()),
        "crc:".cyan(),
        frame.crc(),
        "ok".green()
    )
}
