//! `sigma` — command-line interface for the SigmaDSP bridge.
//!
//! ```text
//! USAGE:
//!   sigma serve --config <file>      Run the bridge daemon
//!   sigma init-config                Print a default configuration
//!   sigma list                       List catalog parameters
//!   sigma read <name>                Read a parameter
//!   sigma write <name> <value>       Write a parameter
//!   sigma volume <name> <db>         Set a volume cell in dB
//!   sigma adjust <name> <db>         Shift a volume cell by a dB delta
//!   sigma describe <name|0xaddr>     Show a catalog row
//!   sigma reload [path]              Reload the parameter catalog
//!   sigma check-params <path>        Validate a parameter file offline
//!   sigma reset [--hard]             Reset the DSP
//!   sigma self-boot <true|false>     Drive the self-boot select line
//! ```
//!
//! Everything except `serve` and `init-config` talks to a running daemon
//! over the JSON control port.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sigma_bridge::server::ControlRequest;
use sigma_bridge::{
    open_transport, worker, BridgeConfig, NamedTranslator, PinController, SharedCatalog, SigmaDsp,
};
use sigma_params::{ParameterCatalog, ParameterValue};

#[derive(Parser)]
#[command(name = "sigma", about = "SigmaDSP bridge CLI", version)]
struct Cli {
    /// Control service host, for client commands.
    #[arg(long, global = true, default_value = "127.0.0.1")]
    host: String,

    /// Control service port, for client commands.
    #[arg(long, global = true, default_value_t = 8088)]
    port: u16,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the bridge daemon.
    Serve {
        /// Configuration file.
        #[arg(long, default_value = "/etc/sigmabridge/config.json")]
        config: PathBuf,
    },
    /// Print a default configuration file to stdout.
    InitConfig,
    /// List all parameter names in the running daemon's catalog.
    List,
    /// Read a parameter by name.
    Read {
        /// Cell name from the parameter catalog.
        name: String,
    },
    /// Write a parameter by name.
    Write {
        /// Cell name from the parameter catalog.
        name: String,
        /// Value: a float (0.5), an integer (3), or a switch (true).
        value: String,
    },
    /// Set a volume cell to a level in dB.
    Volume {
        /// Cell name from the parameter catalog.
        name: String,
        /// Target level in dB (0 is unity gain).
        db: f64,
    },
    /// Shift a volume cell by a dB delta.
    Adjust {
        /// Cell name from the parameter catalog.
        name: String,
        /// Delta in dB; negative attenuates.
        db: f64,
    },
    /// Show the catalog row behind a name or a register address.
    Describe {
        /// Cell name (e.g. master_volume) or register address (e.g. 0x0020).
        name: String,
    },
    /// Reload the parameter catalog from disk.
    Reload {
        /// Catalog file; defaults to the one the daemon was configured with.
        path: Option<PathBuf>,
    },
    /// Validate a parameter file offline, without a running daemon.
    CheckParams {
        /// Catalog file, a JSON table or a SigmaStudio `.params` export.
        path: PathBuf,
    },
    /// Reset the DSP.
    Reset {
        /// Pulse the reset pin instead of the reset register.
        #[arg(long)]
        hard: bool,
    },
    /// Drive the self-boot select line.
    SelfBoot {
        /// Engage (true) or release (false).
        engaged: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Cmd::Serve { config } => cmd_serve(config)?,
        Cmd::InitConfig => cmd_init_config()?,
        Cmd::List => cmd_list(&cli)?,
        Cmd::Read { name } => cmd_read(&cli, name)?,
        Cmd::Write { name, value } => cmd_write(&cli, name, value)?,
        Cmd::Volume { name, db } => cmd_volume(&cli, name, *db)?,
        Cmd::Adjust { name, db } => cmd_adjust(&cli, name, *db)?,
        Cmd::Describe { name } => cmd_describe(&cli, name)?,
        Cmd::Reload { path } => cmd_reload(&cli, path.clone())?,
        Cmd::CheckParams { path } => cmd_check_params(path)?,
        Cmd::Reset { hard } => cmd_reset(&cli, *hard)?,
        Cmd::SelfBoot { engaged } => cmd_self_boot(&cli, *engaged)?,
    }

    Ok(())
}

fn cmd_serve(config_path: &Path) -> Result<()> {
    let config = BridgeConfig::load(config_path)?;

    let transport = open_transport(&config.bus)?;
    let pins = PinController::from_config(&config.pins)?;
    let mut device = SigmaDsp::new(transport, pins);
    device.bring_up()?;

    let catalog = match &config.parameters.file {
        Some(path) => ParameterCatalog::from_file(path)?,
        None => ParameterCatalog::new(Vec::new())?,
    };

    let (handle, _worker) = worker::spawn(device)?;
    let mut translator = NamedTranslator::new(handle.clone(), SharedCatalog::new(catalog));
    if let Some(path) = &config.parameters.file {
        translator = translator.with_catalog_path(path);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(sigma_bridge::server::run(&config.server, handle, translator))?;
    Ok(())
}

fn cmd_init_config() -> Result<()> {
    println!("{}", BridgeConfig::default().to_pretty()?);
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let reply = control_request(cli, &ControlRequest::ListParameters)?;
    expect_ok(&reply)?;

    let names = reply["parameters"].as_array().cloned().unwrap_or_default();
    println!("Parameters: {}", names.len());
    for name in names {
        if let Some(name) = name.as_str() {
            println!("  {name}");
        }
    }
    Ok(())
}

fn cmd_read(cli: &Cli, name: &str) -> Result<()> {
    let reply = control_request(
        cli,
        &ControlRequest::ReadParameter {
            name: name.to_string(),
        },
    )?;
    expect_ok(&reply)?;
    println!("{name} = {}", reply["value"]);
    Ok(())
}

fn cmd_write(cli: &Cli, name: &str, value: &str) -> Result<()> {
    let value: ParameterValue = serde_json::from_str(value)
        .with_context(|| format!("'{value}' is not a float, integer, or switch value"))?;
    let reply = control_request(
        cli,
        &ControlRequest::WriteParameter {
            name: name.to_string(),
            value,
        },
    )?;
    expect_ok(&reply)?;

    if reply["clamped"] == true {
        println!("{name} = {} (clamped into range)", reply["value"]);
    } else {
        println!("{name} = {}", reply["value"]);
    }
    Ok(())
}

fn cmd_volume(cli: &Cli, name: &str, db: f64) -> Result<()> {
    let reply = control_request(
        cli,
        &ControlRequest::SetVolume {
            name: name.to_string(),
            db,
        },
    )?;
    expect_ok(&reply)?;
    println!(
        "{name} set to {:.2} dB",
        reply["db"].as_f64().unwrap_or(f64::NAN)
    );
    Ok(())
}

fn cmd_adjust(cli: &Cli, name: &str, db: f64) -> Result<()> {
    let reply = control_request(
        cli,
        &ControlRequest::AdjustVolume {
            name: name.to_string(),
            db,
        },
    )?;
    expect_ok(&reply)?;
    println!(
        "{name} now at {:.2} dB",
        reply["db"].as_f64().unwrap_or(f64::NAN)
    );
    Ok(())
}

fn cmd_describe(cli: &Cli, name: &str) -> Result<()> {
    let request = match name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        Some(hex) => ControlRequest::DescribeAddress {
            address: u16::from_str_radix(hex, 16)
                .with_context(|| format!("'{name}' is not a 16-bit register address"))?,
        },
        None => ControlRequest::Describe {
            name: name.to_string(),
        },
    };
    let reply = control_request(cli, &request)?;
    expect_ok(&reply)?;

    let row = &reply["parameter"];
    println!("Name     : {}", row["name"].as_str().unwrap_or(name));
    println!("Address  : 0x{:04X}", row["address"].as_u64().unwrap_or(0));
    println!("Words    : {}", row["word_count"]);
    println!("Encoding : {}", row["encoding"]);
    if let Some(cell) = row["cell"].as_str() {
        println!("Cell     : {cell}");
    }
    Ok(())
}

fn cmd_reload(cli: &Cli, path: Option<PathBuf>) -> Result<()> {
    let reply = control_request(cli, &ControlRequest::ReloadParameters { path })?;
    expect_ok(&reply)?;
    println!("Catalog reloaded: {} rows", reply["rows"]);
    Ok(())
}

fn cmd_check_params(path: &Path) -> Result<()> {
    let catalog = ParameterCatalog::from_file(path)
        .with_context(|| format!("{} did not validate", path.display()))?;

    println!("{}: {} rows", path.display(), catalog.len());
    for row in catalog.iter() {
        println!(
            "  {:<32} 0x{:04X}  {} word{}",
            row.name,
            row.address,
            row.word_count,
            if row.word_count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn cmd_reset(cli: &Cli, hard: bool) -> Result<()> {
    let request = if hard {
        ControlRequest::HardReset
    } else {
        ControlRequest::SoftReset
    };
    let reply = control_request(cli, &request)?;
    expect_ok(&reply)?;
    println!("{} reset complete", if hard { "Hard" } else { "Soft" });
    Ok(())
}

fn cmd_self_boot(cli: &Cli, engaged: bool) -> Result<()> {
    let reply = control_request(cli, &ControlRequest::SetSelfBoot { engaged })?;
    expect_ok(&reply)?;
    println!("Self-boot {}", if engaged { "engaged" } else { "released" });
    Ok(())
}

/// Send one request to the control service and read one reply line.
fn control_request(cli: &Cli, request: &ControlRequest) -> Result<serde_json::Value> {
    let mut stream = TcpStream::connect((cli.host.as_str(), cli.port)).with_context(|| {
        format!(
            "cannot reach the control service at {}:{} — is the daemon running?",
            cli.host, cli.port
        )
    })?;

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes())?;

    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply)?;
    if reply.is_empty() {
        anyhow::bail!("control service closed the connection without replying");
    }
    Ok(serde_json::from_str(&reply)?)
}

fn expect_ok(reply: &serde_json::Value) -> Result<()> {
    if reply["status"] == "ok" {
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            reply["error"].as_str().unwrap_or("unknown control error")
        )
    }
}
