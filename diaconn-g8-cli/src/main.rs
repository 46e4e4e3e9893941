use std::error::Error;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use diaconn_g8_lib::codec::{defect, defect_reason, get_crc, to_hex};
use diaconn_g8_lib::logs::LogRecord;
use diaconn_g8_lib::response::Response;
use diaconn_g8_lib::state::PumpState;

/// Offline diagnostics for Diaconn G8 byte dumps.
#[derive(Parser)]
#[command(name = "diaconn-g8-cli", about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a response/report frame captured from the pump
    DecodePacket {
        /// Full frame as hex (20 or 182 bytes)
        hex: String,
    },
    /// Decode one 12-byte history log record
    DecodeLog {
        /// Record as hex
        hex: String,
        /// Emit JSON instead of the display form
        #[arg(long)]
        json: bool,
    },
    /// Compute the frame checksum and defect code for a buffer
    Crc {
        /// Buffer as hex
        hex: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbose.tracing_level_filter())
        .init();

    match cli.command {
        Commands::DecodePacket { hex } => {
            let data = hex::decode(hex)?;
            let mut state = PumpState::new();
            let now_ms = now_ms();
            match Response::handle(&data, &mut state, now_ms) {
                Ok(response) => {
                    println!("{response:#?}");
                }
                Err(err) => {
                    println!("decode failed: {err}");
                    println!("frame: {}", to_hex(&data));
                }
            }
        }
        Commands::DecodeLog { hex, json } => {
            let record = LogRecord::parse(&hex)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{record}");
            }
        }
        Commands::Crc { hex } => {
            let data = hex::decode(hex)?;
            if data.is_empty() {
                println!("empty buffer");
                return Ok(());
            }
            let code = defect(&data);
            println!("crc over {} bytes: 0x{:02X}", data.len() - 1, get_crc(&data, data.len() - 1));
            println!("defect: {} ({})", code, defect_reason(code));
        }
    }

    Ok(())
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
