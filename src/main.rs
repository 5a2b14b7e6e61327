// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::{anyhow, Context, Result};
use smfbridge::engine::PlaybackMode;
use smfbridge::midi::{DeviceInput, DeviceOutput, Framing, MidiInputPort, MidiOutput};
use smfbridge::{BridgeConfig, CancelToken};
use std::env;
use std::path::PathBuf;
use tracing::{info, Level};

const DEFAULT_DEVICE: &str = "/dev/midi1";

fn print_usage() {
    println!("SMFBRIDGE - MIDI capture and playback");
    println!();
    println!("Usage: smfbridge [OPTIONS] <MODE> <FILE>");
    println!();
    println!("Modes:");
    println!("  --record, -rec           Record from the device into FILE (Ctrl+C to stop)");
    println!("  --play, -play            Play FILE to the device once");
    println!("  --play-loop, -playloop   Play FILE repeatedly until Ctrl+C");
    println!();
    println!("Options:");
    println!("  --device <PATH>          Raw MIDI device node (default {})", DEFAULT_DEVICE);
    println!("  --config <PATH>          YAML or TOML configuration file");
    println!("  --verbose                Log every event");
    if cfg!(feature = "midir") {
        println!("  --port <N>               Use midir port N instead of a device node");
        println!("  --list-ports             List midir input and output ports");
    }
    println!("  --help                   Show this help message");
}

#[derive(Debug)]
enum Command {
    Record(PathBuf),
    Play(PathBuf, PlaybackMode),
    ListPorts,
}

#[derive(Debug)]
struct Options {
    command: Command,
    device: PathBuf,
    port: Option<usize>,
    config: Option<PathBuf>,
    verbose: bool,
}

/// Parse arguments; `Ok(None)` means help was requested
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut command = None;
    let mut device = PathBuf::from(DEFAULT_DEVICE);
    let mut port: Option<usize> = None;
    let mut config = None;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", name))
        };
        match arg {
            "--record" | "-rec" => command = Some(Command::Record(value(arg)?.into())),
            "--play" | "-play" => command = Some(Command::Play(value(arg)?.into(), PlaybackMode::Once)),
            "--play-loop" | "-playloop" => {
                command = Some(Command::Play(value(arg)?.into(), PlaybackMode::Loop))
            }
            "--device" => device = value(arg)?.into(),
            "--config" => config = Some(PathBuf::from(value(arg)?)),
            "--port" => {
                let text = value(arg)?;
                port = Some(
                    text.parse()
                        .map_err(|_| anyhow!("Invalid port number: {}", text))?,
                );
            }
            "--list-ports" => command = Some(Command::ListPorts),
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
    }

    let command = command.ok_or_else(|| anyhow!("No mode given"))?;
    Ok(Some(Options {
        command,
        device,
        port,
        config,
        verbose,
    }))
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// midir hands over whole messages, so packet framing only applies to device nodes
fn transport_config(options: &Options, mut config: BridgeConfig) -> BridgeConfig {
    if options.port.is_some() && config.framing != Framing::Serial {
        info!("Using serial framing for the midir port");
        config.framing = Framing::Serial;
    }
    config
}

#[cfg(feature = "midir")]
fn open_input(options: &Options) -> Result<Box<dyn MidiInputPort>> {
    if let Some(index) = options.port {
        return Ok(Box::new(smfbridge::midi::midir_backend::MidirInput::new(index)?));
    }
    open_device_input(options)
}

#[cfg(not(feature = "midir"))]
fn open_input(options: &Options) -> Result<Box<dyn MidiInputPort>> {
    if options.port.is_some() {
        return Err(anyhow!("--port needs a build with the `midir` feature"));
    }
    open_device_input(options)
}

fn open_device_input(options: &Options) -> Result<Box<dyn MidiInputPort>> {
    let input = DeviceInput::open(&options.device)
        .with_context(|| format!("Cannot open MIDI input {:?}", options.device))?;
    info!("Using MIDI input device: {}", options.device.display());
    Ok(Box::new(input))
}

#[cfg(feature = "midir")]
fn open_output(options: &Options, config: &BridgeConfig) -> Result<Box<dyn MidiOutput>> {
    if let Some(index) = options.port {
        return Ok(Box::new(smfbridge::midi::midir_backend::MidirOutput::new(index)?));
    }
    open_device_output(options, config)
}

#[cfg(not(feature = "midir"))]
fn open_output(options: &Options, config: &BridgeConfig) -> Result<Box<dyn MidiOutput>> {
    if options.port.is_some() {
        return Err(anyhow!("--port needs a build with the `midir` feature"));
    }
    open_device_output(options, config)
}

fn open_device_output(options: &Options, config: &BridgeConfig) -> Result<Box<dyn MidiOutput>> {
    let output = DeviceOutput::open(&options.device, config.framing)
        .with_context(|| format!("Cannot open MIDI output {:?}", options.device))?;
    info!("Using MIDI output device: {}", options.device.display());
    Ok(Box::new(output))
}

#[cfg(feature = "midir")]
fn list_ports() -> Result<()> {
    smfbridge::midi::midir_backend::print_ports()
}

#[cfg(not(feature = "midir"))]
fn list_ports() -> Result<()> {
    Err(anyhow!("--list-ports needs a build with the `midir` feature"))
}

/// Blocking part of a run: acquire the transport and drive one engine
fn run(options: Options, config: BridgeConfig, cancel: CancelToken) -> Result<()> {
    match &options.command {
        Command::ListPorts => list_ports(),
        Command::Record(path) => {
            let mut input = open_input(&options)?;
            println!("Recording... Press Ctrl+C to stop.");
            let summary = smfbridge::record(path, input.as_mut(), &config, cancel)?;
            println!(
                "Recording stopped. Saved {} events to {}",
                summary.events_written,
                path.display()
            );
            Ok(())
        }
        Command::Play(path, mode) => {
            let mut output = open_output(&options, &config)?;
            println!("Playing back {} ... Ctrl+C to stop.", path.display());
            let summary = smfbridge::play(path, output.as_mut(), *mode, &config, cancel)?;
            println!("Playback finished. Sent {} events.", summary.events_sent);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args[1..]) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    init_logging(options.verbose);

    let config = match &options.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    let config = transport_config(&options, config);

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            signal_token.cancel();
        }
    });

    tokio::task::spawn_blocking(move || run(options, config, cancel))
        .await
        .context("Engine task failed")?
}
