use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info};
use std::io::{self, Write};
use std::process::ExitCode;

use crate::config::{read_peer_address, Config};
use crate::modbus::{DeviceAddress, ModbusClientTrait, ModbusReader, ReadResult, RtuTransport};
use crate::output::{formatter_for, ConsoleSender, TcpSender};
use crate::services::{wait_for_shutdown, PollLoop, Termination};

pub fn build_cli() -> Command {
    Command::new("modscan")
        .version(crate::VERSION)
        .about("Reads coils, inputs or registers from a Modbus RTU slave and prints or streams them")
        .arg(positional("device_id", 1, "Slave (unit) id, 1-247"))
        .arg(positional("address", 2, "Starting address"))
        .arg(positional("length", 3, "Number of points to read"))
        .arg(positional(
            "point_type",
            4,
            "1 = coil status, 2 = input status, 3 = input register, 4 = holding register",
        ))
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("DEVICE")
                .help("Serial device [default: /dev/ttyO1]"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Poll interval in milliseconds [default: 1000]"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Serial response timeout in milliseconds [default: 1000]"),
        )
        .arg(
            Arg::new("stream")
                .long("stream")
                .action(ArgAction::SetTrue)
                .help("Poll forever and publish every result to the peer"),
        )
        .arg(
            Arg::new("no-publish")
                .long("no-publish")
                .action(ArgAction::SetTrue)
                .requires("stream")
                .help("With --stream, write results to stdout instead of the peer"),
        )
        .arg(
            Arg::new("peer-file")
                .long("peer-file")
                .value_name("PATH")
                .help("File holding the peer IPv4 address [default: /etc/modscan/peer_address]"),
        )
        .arg(
            Arg::new("peer-port")
                .long("peer-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Peer TCP port [default: 5020]"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(["text", "json", "wire"])
                .default_value("text")
                .help("Single-shot output format"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("TOML settings file; flags override its values"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log every RTU frame"),
        )
}

fn positional(name: &'static str, index: usize, help: &'static str) -> Arg {
    Arg::new(name)
        .index(index)
        .required(true)
        .allow_negative_numbers(true)
        .value_parser(value_parser!(i64))
        .help(help)
}

pub fn device_address_from_matches(matches: &ArgMatches) -> Result<DeviceAddress> {
    let get = |name: &str| -> Result<i64> {
        matches
            .get_one::<i64>(name)
            .copied()
            .ok_or_else(|| anyhow!("missing argument <{}>", name))
    };
    let address = DeviceAddress::new(
        get("device_id")?,
        get("address")?,
        get("length")?,
        get("point_type")?,
    )?;
    Ok(address)
}

/// Entry point once logging is up. Returns the process exit code.
pub async fn handle_command(matches: &ArgMatches) -> Result<ExitCode> {
    let address = device_address_from_matches(matches)?;
    let config = Config::from_matches(matches).context("Failed to load settings")?;
    info!(
        "🎯 Slave {} | {} | start {} | {} points",
        address.slave_id, address.point_type, address.start_address, address.quantity
    );

    if matches.get_flag("stream") {
        run_streaming(&config, address, matches.get_flag("no-publish")).await
    } else {
        let format = matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text");
        run_single_shot(&config, address, format).await
    }
}

pub async fn run_single_shot(config: &Config, address: DeviceAddress, format: &str) -> Result<ExitCode> {
    let formatter = formatter_for(format).ok_or_else(|| anyhow!("unknown format {}", format))?;

    let mut transport = RtuTransport::establish(config.serial_settings(), address.slave_id as i64)
        .context("Modbus RTU initialization failed")?;

    let result = ReadResult::from(ModbusReader::read_address(&mut transport, &address).await);
    transport.close();

    let text = formatter.format(&address, &result);
    write_read_report(&text, result.is_success(), &mut io::stdout(), &mut io::stderr())
        .context("Failed to write read result")?;
    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Values go to `out`, a failed read to `err`.
fn write_read_report(text: &str, ok: bool, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
    if ok {
        writeln!(out, "{}", text)
    } else {
        writeln!(err, "{}", text)
    }
}

pub async fn run_streaming(config: &Config, address: DeviceAddress, to_stdout: bool) -> Result<ExitCode> {
    let peer = if to_stdout {
        None
    } else {
        Some(read_peer_address(&config.peer_file).context("Peer discovery failed")?)
    };

    let transport = RtuTransport::establish(config.serial_settings(), address.slave_id as i64)
        .context("Modbus RTU initialization failed")?;

    let summary = match peer {
        Some(peer) => {
            let connect = TcpSender::connect(peer, config.peer_port, config.connect_timeout());
            let poll = PollLoop::init(transport, address, config.poll_interval(), connect)
                .await
                .context("Peer connection failed")?;
            poll.run_until(wait_for_shutdown()).await
        }
        None => {
            let poll = PollLoop::init(transport, address, config.poll_interval(), async {
                Ok(ConsoleSender)
            })
            .await?;
            poll.run_until(wait_for_shutdown()).await
        }
    };

    match summary.reason {
        Termination::Shutdown => Ok(ExitCode::SUCCESS),
        Termination::Fatal(reason) => {
            error!("💥 Poll loop stopped: {}", reason);
            Ok(ExitCode::FAILURE)
        }
    }
}
