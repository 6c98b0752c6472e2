// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # macOS KVM CLI - Command Line Interface
//!
//! Without a subcommand this starts the interactive menu. `status` and
//! `launch` cover the same ground non-interactively.

use std::{io::Write, path::PathBuf};

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::{info, LevelFilter};
use prettytable::{format, Cell, Row, Table};

use crate::{
    command::{CommandBuilder, HostInfo},
    layout::{Layout, VmState},
    menu::MenuController,
    release::{self, RELEASES},
    runner::SystemRunner,
    terminal::LineTerminal,
    KvmConfig, KvmError, KvmResult,
};

/// Build, snapshot and launch macOS guests under QEMU/KVM
#[derive(Parser, Debug)]
#[command(name = "macos-kvm")]
#[command(version)]
#[command(about = "Interactive menu for building, snapshotting and launching macOS VMs", long_about = None)]
struct Cli {
    /// Sets the level of verbosity (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Config file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Installation directory holding drives/ and firmware/
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Hypervisor binary
    #[arg(long)]
    qemu: Option<PathBuf>,

    /// Disk image utility binary
    #[arg(long)]
    qemu_img: Option<PathBuf>,

    /// Base image download helper
    #[arg(long)]
    download_helper: Option<PathBuf>,

    /// Do not clear the screen between menus
    #[arg(long)]
    no_clear: bool,

    /// Commands
    #[command(subcommand)]
    command: Option<Commands>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Show every release and its state
    Status,

    /// Build a release if needed and boot it
    Launch(LaunchArgs),
}

/// Arguments for launching a release
#[derive(Args, Debug)]
struct LaunchArgs {
    /// Release shortcut (hs, m, c)
    release: String,
}

/// Main entry point for the CLI, returns the process exit code
pub fn run() -> KvmResult<i32> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);
    info!("macos-kvm starting");

    let config = resolve_config(&cli)?;
    let builder = startup(&config)?;
    let layout = builder.layout().clone();

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => {
            let terminal = LineTerminal::stdio().with_clear_screen(config.clear_screen);
            MenuController::new(builder, SystemRunner, terminal).run()?;
            Ok(0)
        }
        Commands::Status => {
            status_table(&layout).printstd();
            Ok(0)
        }
        Commands::Launch(args) => handle_launch(builder, args),
    }
}

fn init_logging(level: &str) {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Warn,
    };

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, log_level)
        .init();
}

/// Config file first, then command-line overrides
fn resolve_config(cli: &Cli) -> KvmResult<KvmConfig> {
    let mut config = match cli.config {
        Some(ref path) => KvmConfig::load(path)?,
        None => KvmConfig::default(),
    };

    if let Some(ref dir) = cli.base_dir {
        config.base_dir = dir.clone();
    }
    if let Some(ref qemu) = cli.qemu {
        config.qemu_binary = qemu.clone();
    }
    if let Some(ref qemu_img) = cli.qemu_img {
        config.qemu_img_binary = qemu_img.clone();
    }
    if let Some(ref helper) = cli.download_helper {
        config.download_helper = helper.clone();
    }
    if cli.no_clear {
        config.clear_screen = false;
    }

    Ok(config)
}

/// Validate the installation and create the drives directory
fn startup(config: &KvmConfig) -> KvmResult<CommandBuilder> {
    config.validate()?;
    let layout = config.layout();
    layout.prepare()?;
    Ok(CommandBuilder::new(layout, config.tools(), HostInfo::detect()))
}

/// Handle launch command
fn handle_launch(builder: CommandBuilder, args: LaunchArgs) -> KvmResult<i32> {
    let release =
        release::find(&args.release).ok_or_else(|| KvmError::UnknownRelease(args.release.clone()))?;

    let ready = builder.layout().is_initialized(release);
    let mut ctl = MenuController::new(builder, SystemRunner, LineTerminal::stdio());
    if !ready {
        println!("Building {}...", release.display_name);
        ctl.provision(release)?;
    }

    let code = ctl.launch_vm(release)?;
    Ok(code.0.unwrap_or(1))
}

/// Table of every release with its state and disk image
fn status_table(layout: &Layout) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(vec![
        Cell::new("Shortcut"),
        Cell::new("Release"),
        Cell::new("State"),
        Cell::new("Disk image"),
    ]));

    for release in RELEASES {
        let state = match layout.probe(release) {
            VmState::Uninitialized => "Not built",
            VmState::Provisioning => "Incomplete",
            VmState::Initialized => "Ready",
        };
        table.add_row(Row::new(vec![
            Cell::new(release.shortcut),
            Cell::new(release.display_name),
            Cell::new(state),
            Cell::new(&layout.disk_image_path(release).display().to_string()),
        ]));
    }

    table
}
