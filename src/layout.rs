// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Filesystem Layout
//!
//! All paths the menu touches are derived from a single base directory:
//! - `drives/` holds one qcow2 image per release
//! - `firmware/` holds the OVMF code and vars blobs
//! - the download helper drops `ESP.qcow2` and `BaseSystem.img` in the base directory
//!
//! Release state is never cached. External tools may change these files at
//! any time, so every query goes back to the filesystem.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{release::ReleaseDefinition, KvmResult};

const PROVISIONING_SUFFIX: &str = "provisioning";

/// Where a release's VM currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// No disk image and no provisioning in flight
    Uninitialized,
    /// Provisioning was started but never completed
    Provisioning,
    /// Disk image exists and provisioning finished
    Initialized,
}

impl VmState {
    /// Verb shown in the top-level menu for this state
    pub fn menu_label(&self) -> &'static str {
        match self {
            VmState::Uninitialized => "Build",
            VmState::Provisioning => "Resume",
            VmState::Initialized => "Start",
        }
    }
}

/// Resolved directory layout of an installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base_dir: PathBuf,
    drives_dir: PathBuf,
    firmware_dir: PathBuf,
}

impl Layout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            drives_dir: base_dir.join("drives"),
            firmware_dir: base_dir.join("firmware"),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn drives_dir(&self) -> &Path {
        &self.drives_dir
    }

    /// Create the drives directory if it does not exist yet
    pub fn prepare(&self) -> KvmResult<()> {
        debug!("Ensuring drives directory {}", self.drives_dir.display());
        fs::create_dir_all(&self.drives_dir)?;
        Ok(())
    }

    /// Path of the release's system disk image
    pub fn disk_image_path(&self, release: &ReleaseDefinition) -> PathBuf {
        self.drives_dir.join(release.image_name())
    }

    /// Path of the marker that exists while a release is being provisioned
    pub fn provisioning_marker(&self, release: &ReleaseDefinition) -> PathBuf {
        self.drives_dir
            .join(format!("{}.{}", release.image_name(), PROVISIONING_SUFFIX))
    }

    pub fn esp_image(&self) -> PathBuf {
        self.base_dir.join("ESP.qcow2")
    }

    pub fn install_media(&self) -> PathBuf {
        self.base_dir.join("BaseSystem.img")
    }

    pub fn firmware_code(&self) -> PathBuf {
        self.firmware_dir.join("OVMF_CODE.fd")
    }

    pub fn firmware_vars(&self) -> PathBuf {
        self.firmware_dir.join("OVMF_VARS-1024x768.fd")
    }

    /// Probe the filesystem for the release's current state
    pub fn probe(&self, release: &ReleaseDefinition) -> VmState {
        if self.provisioning_marker(release).exists() {
            VmState::Provisioning
        } else if self.disk_image_path(release).exists() {
            VmState::Initialized
        } else {
            VmState::Uninitialized
        }
    }

    pub fn is_initialized(&self, release: &ReleaseDefinition) -> bool {
        self.probe(release) == VmState::Initialized
    }

    /// Record that provisioning has started for a release
    pub fn begin_provisioning(&self, release: &ReleaseDefinition) -> KvmResult<()> {
        self.prepare()?;
        fs::write(self.provisioning_marker(release), release.identifier_flag)?;
        Ok(())
    }

    /// Remove a disk image left behind by an interrupted provisioning run
    pub fn discard_partial_image(&self, release: &ReleaseDefinition) -> KvmResult<()> {
        let image = self.disk_image_path(release);
        match fs::remove_file(&image) {
            Ok(()) => {
                info!("Removed partial disk image {}", image.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark provisioning as complete
    pub fn finish_provisioning(&self, release: &ReleaseDefinition) -> KvmResult<()> {
        match fs::remove_file(self.provisioning_marker(release)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
