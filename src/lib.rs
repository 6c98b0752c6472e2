// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # macOS KVM Menu Library
//!
//! Interactive front end for running macOS guests under QEMU/KVM:
//! - a fixed registry of supported releases
//! - per-release disk images with resumable provisioning
//! - snapshot create/delete/revert through `qemu-img`
//! - VM launch with a fixed hardware template
//!
//! The hypervisor, the disk utility and the base-image download helper are
//! external programs. This crate only builds their argument lists and runs
//! them synchronously.

pub mod command;
pub mod config;
pub mod error;
pub mod layout;
pub mod menu;
pub mod release;
pub mod runner;
pub mod terminal;

// CLI module (not public)
mod cli;

pub use command::{Action, CommandBuilder, HostInfo, ToolCommand, Tools};
pub use config::KvmConfig;
pub use error::{KvmError, KvmResult};
pub use layout::{Layout, VmState};
pub use menu::{MenuController, ReleaseAction, SubmenuExit};
pub use release::{ReleaseDefinition, RELEASES};
pub use runner::{ExitCode, ProcessRunner, SystemRunner, ToolOutput};
pub use terminal::{LineTerminal, Terminal};

// Export the CLI run function for bin usage
pub use cli::run;
