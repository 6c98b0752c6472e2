// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! Installation configuration: where things live and which binaries to run.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{command::Tools, layout::Layout, KvmError, KvmResult};

/// Menu configuration options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvmConfig {
    /// Installation directory holding `drives/`, `firmware/` and the helper script
    pub base_dir: PathBuf,
    /// Hypervisor binary
    pub qemu_binary: PathBuf,
    /// Disk image utility binary
    pub qemu_img_binary: PathBuf,
    /// Base image download helper, relative paths resolve against `base_dir`
    pub download_helper: PathBuf,
    /// Clear the screen between menu renders
    pub clear_screen: bool,
}

impl Default for KvmConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            qemu_binary: PathBuf::from("qemu-system-x86_64"),
            qemu_img_binary: PathBuf::from("qemu-img"),
            download_helper: PathBuf::from("jumpstart.sh"),
            clear_screen: true,
        }
    }
}

/// Directory containing the running executable, or the current directory
fn default_base_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl KvmConfig {
    /// Load configuration from a JSON file, missing keys take defaults
    pub fn load(path: &Path) -> KvmResult<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            KvmError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check that the installation directory is usable
    pub fn validate(&self) -> KvmResult<()> {
        if !self.base_dir.is_dir() {
            return Err(KvmError::Config(format!(
                "base directory {} does not exist",
                self.base_dir.display()
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.base_dir)
    }

    pub fn tools(&self) -> Tools {
        let download_helper = if self.download_helper.is_absolute() {
            self.download_helper.clone()
        } else {
            self.base_dir.join(&self.download_helper)
        };
        Tools {
            hypervisor: self.qemu_binary.clone(),
            disk_utility: self.qemu_img_binary.clone(),
            download_helper,
        }
    }
}
