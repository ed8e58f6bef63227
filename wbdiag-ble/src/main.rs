//! BLE diagnostic tool for WBDiag devices
//!
//! Scans for WBDiag devices and runs diagnostic commands over BLE. The
//! `simulate` command runs a raw frame through the device dispatcher on a
//! simulated board, without any hardware.

use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{debug, warn};
use serde::Serialize;

use wbdiag_ble_controller::ble::{self, DiagClient};
use wbdiag_mcu::sim::SimBoard;
use wbdiag_mcu::{Dispatcher, FirmwareBuild, LinkStatus};
use wbdiag_proto::{Command, Response};

#[derive(Parser)]
#[command(name = "wbdiag-ble")]
#[command(about = "BLE diagnostic tool for WBDiag devices")]
struct Cli {
    /// Device name or address to connect to
    #[arg(long, global = true, env = "WBDIAG_DEVICE")]
    device: Option<String>,
    /// How long to wait for each response, in milliseconds
    #[arg(long, global = true, env = "WBDIAG_TIMEOUT_MS", default_value = "2000")]
    timeout_ms: u64,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for WBDiag devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Read the signal strength of the link
    Rssi,
    /// Read the wireless firmware build
    Firmware,
    /// Blink the device indicator
    Blink,
    /// Read the link status
    Link,
    /// Run a hex-encoded request frame against a simulated board
    Simulate {
        /// Request frame, e.g. "aa01" or "aa:03"
        frame: String,
        /// RSSI reported by the board
        #[arg(long, allow_negative_numbers = true, default_value = "-60")]
        rssi: i8,
        /// Make the RSSI read fail
        #[arg(long)]
        rssi_fails: bool,
        /// Status of link slot 0
        #[arg(long, default_value = "2")]
        link_status: u8,
        /// Make the link status read fail
        #[arg(long)]
        link_fails: bool,
        /// Status byte of the firmware version query
        #[arg(long, default_value = "0")]
        fw_status: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let device = cli.device.as_deref();

    match cli.command {
        Commands::Scan { duration } => scan_devices(duration, cli.json).await?,
        Commands::Rssi => run_command(device, timeout, Command::GetSignalStrength, cli.json).await?,
        Commands::Firmware => run_command(device, timeout, Command::GetFirmwareBuild, cli.json).await?,
        Commands::Blink => run_command(device, timeout, Command::IndicatorTest, cli.json).await?,
        Commands::Link => run_command(device, timeout, Command::GetLinkStatus, cli.json).await?,
        Commands::Simulate {
            frame,
            rssi,
            rssi_fails,
            link_status,
            link_fails,
            fw_status,
        } => {
            let mut board = SimBoard::new()
                .with_rssi(rssi)
                .with_link(LinkStatus::single(link_status, 0x0801))
                .with_firmware(FirmwareBuild {
                    status: fw_status,
                    ..SimBoard::default().firmware
                });
            if rssi_fails {
                board = board.failing_rssi();
            }
            if link_fails {
                board = board.failing_link();
            }
            let output = simulate(board, &parse_hex(&frame)?)?;
            print_simulation(&output, cli.json)?;
        }
    }

    Ok(())
}

async fn scan_devices(duration: u64, json: bool) -> anyhow::Result<()> {
    if !json {
        println!("Scanning for WBDiag devices ({} seconds)...", duration);
    }
    let devices = ble::scan(duration).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_wbdiag { " [WBDIAG]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }
    Ok(())
}

async fn run_command(
    device: Option<&str>,
    timeout: Duration,
    command: Command,
    json: bool,
) -> anyhow::Result<()> {
    let mut client = DiagClient::connect(device, timeout).await?;
    let result = query(&mut client, command, json).await;
    if let Err(e) = client.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    result
}

async fn query(client: &mut DiagClient, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::GetSignalStrength => {
            let rssi = client.signal_strength().await?;
            if json {
                print_json(&Response::SignalStrength { rssi })?;
            } else {
                println!("RSSI: {} dBm", rssi);
            }
        }
        Command::GetFirmwareBuild => {
            let fw = client.firmware_build().await?;
            if json {
                print_json(&Response::FirmwareBuild(fw))?;
            } else if fw.is_success() {
                println!("Firmware: {}.{}.{}", fw.major, fw.minor, fw.patch);
            } else {
                println!(
                    "Firmware: {}.{}.{} (query failed, status 0x{:02x})",
                    fw.major, fw.minor, fw.patch, fw.status
                );
            }
        }
        Command::IndicatorTest => {
            let ok = client.indicator_test().await?;
            if json {
                print_json(&Response::IndicatorTest { ok })?;
            } else {
                println!("Indicator test: {}", if ok { "ok" } else { "failed" });
            }
        }
        Command::GetLinkStatus => {
            let status = client.link_status().await?;
            if json {
                print_json(&Response::LinkStatus { status })?;
            } else {
                println!("Link status: 0x{:02x}", status);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct Simulation {
    outcome: String,
    frame: Option<String>,
    response: Option<Response>,
}

fn simulate(board: SimBoard, frame: &[u8]) -> anyhow::Result<Simulation> {
    let mut dispatcher = Dispatcher::new(board);
    let outcome = dispatcher.handle_frame(frame);
    debug!("Simulated {:02x?}: {:?}", frame, outcome);

    let sent = dispatcher.into_inner().take_sent();
    let response = sent.first().map(|f| Response::from_bytes(f)).transpose()?;
    Ok(Simulation {
        outcome: format!("{:?}", outcome),
        frame: sent.first().map(|f| to_hex(f)),
        response,
    })
}

fn print_simulation(output: &Simulation, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(output);
    }
    println!("Outcome: {}", output.outcome);
    match &output.frame {
        Some(frame) => println!("Response frame: {}", frame),
        None => println!("No response sent"),
    }
    Ok(())
}

/// Parse "aa01", "0xaa01", "aa 01" or "aa:01" into bytes
fn parse_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(digits.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid hex frame {:?}: {}", s, e))
}

fn to_hex(bytes: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_frames() {
        assert_eq!(parse_hex("aa01").unwrap(), vec![0xAA, 0x01]);
        assert_eq!(parse_hex("AA:03").unwrap(), vec![0xAA, 0x03]);
        assert_eq!(parse_hex("0xaa 04 ff").unwrap(), vec![0xAA, 0x04, 0xFF]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("aa0").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn hex_frames_reject_signs_and_inner_prefixes() {
        assert!(parse_hex("+a01").is_err());
        assert!(parse_hex("aa:0x01").is_err());
        assert!(parse_hex("aa-01").is_err());
    }

    #[test]
    fn simulate_firmware_build() {
        let output = simulate(SimBoard::new(), &[0xAA, 0x02]).unwrap();
        assert_eq!(output.frame.as_deref(), Some("bb02010d0000"));
        assert!(matches!(output.response, Some(Response::FirmwareBuild(_))));
    }

    #[test]
    fn simulate_failed_read_sends_nothing() {
        let output = simulate(SimBoard::new().failing_rssi(), &[0xAA, 0x01]).unwrap();
        assert_eq!(output.frame, None);
        assert!(output.response.is_none());
        assert!(output.outcome.contains("CapabilityFailed"));
    }

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["wbdiag-ble", "simulate", "aa01", "--rssi", "-70"]);
        assert!(matches!(cli.command, Commands::Simulate { rssi: -70, .. }));
    }
}
