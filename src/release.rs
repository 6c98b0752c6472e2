// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Release Registry
//!
//! The fixed, ordered set of guest releases the menu knows how to build.
//! Each release is identified by the flag the download helper understands
//! and a short menu shortcut.

/// Immutable description of one supported guest release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseDefinition {
    /// Human readable name shown in the menus
    pub display_name: &'static str,
    /// Flag passed to the download helper, e.g. `--mojave`
    pub identifier_flag: &'static str,
    /// Menu shortcut, lowercase
    pub shortcut: &'static str,
}

impl ReleaseDefinition {
    /// File name of the release's disk image inside the drives directory.
    pub fn image_name(&self) -> &'static str {
        self.identifier_flag.trim_matches('-')
    }
}

/// Known releases, in menu order.
pub const RELEASES: &[ReleaseDefinition] = &[
    ReleaseDefinition {
        display_name: "High Sierra",
        identifier_flag: "--high-sierra",
        shortcut: "hs",
    },
    ReleaseDefinition {
        display_name: "Mojave",
        identifier_flag: "--mojave",
        shortcut: "m",
    },
    ReleaseDefinition {
        display_name: "Catalina",
        identifier_flag: "--catalina",
        shortcut: "c",
    },
];

/// Look up a release by its shortcut, ignoring case and surrounding whitespace.
pub fn find(shortcut: &str) -> Option<&'static ReleaseDefinition> {
    let shortcut = shortcut.trim();
    RELEASES
        .iter()
        .find(|release| release.shortcut.eq_ignore_ascii_case(shortcut))
}
