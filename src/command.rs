// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Command Builder
//!
//! Pure construction of the argument vectors handed to the disk utility,
//! the hypervisor and the base-image download helper. Nothing here touches
//! the filesystem or spawns processes.
//!
//! The hypervisor template is reproduced flag for flag. macOS guests are
//! sensitive to the CPU model, SMC device and drive topology, so any
//! drift here changes guest behavior.

use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
};

use crate::{layout::Layout, release::ReleaseDefinition};

/// Fixed guest memory size
pub const GUEST_MEMORY: &str = "2G";
/// Size of a freshly created system disk
pub const SYSTEM_DISK_SIZE: &str = "64G";

const CPU_MODEL: &str = "Penryn,vendor=GenuineIntel,kvm=on,+sse3,+sse4.2,+aes,+xsave,+avx,\
+xsaveopt,+xsavec,+xgetbv1,+avx2,+bmi2,+smep,+bmi1,+fma,+movbe,+invtsc";
const APPLE_SMC: &str =
    "isa-applesmc,osk=ourhardworkbythesewordsguardedpleasedontsteal(c)AppleComputerInc";
const NIC: &str = "e1000-82545em,netdev=net0,id=net0,mac=52:54:00:c2:28:27";

/// Kind of external invocation to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fetch the install media for a release
    DownloadBase,
    /// Create the release's empty system disk
    CreateImage,
    /// List the snapshots stored in the system disk
    ListSnapshots,
    SnapshotCreate(String),
    SnapshotDelete(String),
    SnapshotRevert(String),
    /// Boot the release under the hypervisor
    LaunchVm,
}

/// Locations of the external programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub hypervisor: PathBuf,
    pub disk_utility: PathBuf,
    pub download_helper: PathBuf,
}

/// Host facts the hypervisor template depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
    pub cpus: usize,
}

impl HostInfo {
    /// Probe the current host.
    ///
    /// `-smp` gets every online CPU, not the affinity or cgroup quota the
    /// menu itself runs under.
    pub fn detect() -> Self {
        Self {
            cpus: online_cpus().unwrap_or(1),
        }
    }
}

#[cfg(unix)]
fn online_cpus() -> Option<usize> {
    // SAFETY: sysconf only reads a system constant.
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if count > 0 {
        Some(count as usize)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn online_cpus() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

/// A fully resolved external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl ToolCommand {
    fn new(program: &Path, cwd: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
        }
    }

    fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Short program name used in logs and error messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// `<prefix><path>` as a single argument
fn keyed_path(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}

/// Builds tool invocations for one installation
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    layout: Layout,
    tools: Tools,
    host: HostInfo,
}

impl CommandBuilder {
    pub fn new(layout: Layout, tools: Tools, host: HostInfo) -> Self {
        Self { layout, tools, host }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn build(&self, release: &ReleaseDefinition, action: &Action) -> ToolCommand {
        let image = self.layout.disk_image_path(release);
        match action {
            Action::DownloadBase => self.helper().arg(release.identifier_flag),
            Action::CreateImage => self
                .disk_utility()
                .args(["create", "-f", "qcow2"])
                .arg(&image)
                .arg(SYSTEM_DISK_SIZE),
            Action::ListSnapshots => self.disk_utility().args(["snapshot", "-l"]).arg(&image),
            Action::SnapshotCreate(name) => self.snapshot("-c", name, &image),
            Action::SnapshotDelete(name) => self.snapshot("-d", name, &image),
            Action::SnapshotRevert(name) => self.snapshot("-a", name, &image),
            Action::LaunchVm => self.launch(&image),
        }
    }

    fn helper(&self) -> ToolCommand {
        ToolCommand::new(&self.tools.download_helper, self.layout.base_dir())
    }

    fn disk_utility(&self) -> ToolCommand {
        ToolCommand::new(&self.tools.disk_utility, self.layout.base_dir())
    }

    fn snapshot(&self, flag: &str, name: &str, image: &Path) -> ToolCommand {
        self.disk_utility()
            .args(["snapshot", flag, name])
            .arg(image)
    }

    fn launch(&self, image: &Path) -> ToolCommand {
        let layout = &self.layout;
        ToolCommand::new(&self.tools.hypervisor, layout.base_dir())
            .arg("-enable-kvm")
            .args(["-m", GUEST_MEMORY])
            .args(["-machine", "q35,accel=kvm"])
            .arg("-smp")
            .arg(self.host.cpus.to_string())
            .args(["-cpu", CPU_MODEL])
            .args(["-device", APPLE_SMC])
            .args(["-smbios", "type=2"])
            .arg("-drive")
            .arg(keyed_path("if=pflash,format=raw,readonly,file=", &layout.firmware_code()))
            .arg("-drive")
            .arg(keyed_path("if=pflash,format=raw,file=", &layout.firmware_vars()))
            .args(["-vga", "qxl"])
            .args(["-device", "ich9-intel-hda", "-device", "hda-output"])
            .args(["-usb", "-device", "usb-kbd", "-device", "usb-mouse"])
            .args(["-netdev", "user,id=net0"])
            .args(["-device", NIC])
            .args(["-device", "ich9-ahci,id=sata"])
            .arg("-drive")
            .arg(keyed_path("id=ESP,if=none,format=qcow2,file=", &layout.esp_image()))
            .args(["-device", "ide-hd,bus=sata.2,drive=ESP"])
            .arg("-drive")
            .arg(keyed_path("id=InstallMedia,format=raw,if=none,file=", &layout.install_media()))
            .args(["-device", "ide-hd,bus=sata.3,drive=InstallMedia"])
            .arg("-drive")
            .arg(keyed_path("id=SystemDisk,if=none,file=", image))
            .args(["-device", "ide-hd,bus=sata.4,drive=SystemDisk"])
            .args(["-monitor", "stdio"])
    }
}
