// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # macos-kvm
//!
//! Interactive menu that builds, snapshots and launches macOS guests under
//! QEMU/KVM.

use colored::Colorize;

fn main() {
    match macos_kvm::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            std::process::exit(1);
        }
    }
}
