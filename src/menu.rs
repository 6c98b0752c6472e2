// MacOS KVM Menu Implementation
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Menu Controller
//!
//! Two nested loops:
//! 1. the top-level release picker, which lists every release with its state
//! 2. the per-release submenu, which lists snapshots and dispatches actions
//!
//! Entering a release that is not yet initialized provisions it first
//! (download the base image, then create the system disk). Provisioning is
//! resumable: a failure leaves the release in the `Provisioning` state and the
//! next visit starts over from the download.
//!
//! `q` in the top-level menu returns from [`MenuController::run`]. `q` in a
//! release submenu ends the whole program without going back to the top
//! level; `b` is the way back.

use colored::Colorize;
use log::{error, info, warn};

use crate::{
    command::{Action, CommandBuilder},
    layout::{Layout, VmState},
    release::{self, ReleaseDefinition, RELEASES},
    runner::{ExitCode, ProcessRunner},
    terminal::Terminal,
    KvmResult,
};

pub const BANNER: &str = r"
                     ___  __
  /\/\   __ _  ___  /___\/ _\
 /    \ / _` |/ __|//  //\ \
/ /\/\ \ (_| | (__/ \_// _\ \
\/    \/\__,_|\___\___/  \__/
Based on: https://github.com/foxlet/macOS-Simple-KVM
";

const REMINDER: &str = "Reminder! Run this container with a line similar to this: \
sudo docker run -it --name mac -v /tmp/.X11-unix/:/tmp/.X11-unix -e DISPLAY=$DISPLAY \
--network host --privileged --device /dev/kvm -v $HOME/.Xauthority/:/root/.Xauthority \
bannsec/macos-simple-kvm";

const QUIT: &str = "q";
const PROMPT: &str = "? ";
const INVALID: &str = "Invalid selection.";

/// Actions offered in a release submenu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    RunVm,
    SnapshotCreate,
    SnapshotDelete,
    SnapshotRevert,
    Back,
    Quit,
}

/// Submenu entries as (label, shortcut, action), in display order
pub const RELEASE_OPTIONS: &[(&str, &str, ReleaseAction)] = &[
    ("Run VM", "r", ReleaseAction::RunVm),
    ("Snapshot Create", "sc", ReleaseAction::SnapshotCreate),
    ("Snapshot Delete", "sd", ReleaseAction::SnapshotDelete),
    ("Snapshot Revert", "sr", ReleaseAction::SnapshotRevert),
    ("Back", "b", ReleaseAction::Back),
    ("Quit", QUIT, ReleaseAction::Quit),
];

impl ReleaseAction {
    /// Map user input to a submenu action
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        RELEASE_OPTIONS
            .iter()
            .find(|(_, shortcut, _)| shortcut.eq_ignore_ascii_case(input))
            .map(|&(_, _, action)| action)
    }
}

/// How a release submenu was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmenuExit {
    /// Re-render the top-level menu
    Back,
    /// Stop the program without returning to the top level
    Terminate,
}

/// Interactive menu over a runner and a terminal
pub struct MenuController<R, T> {
    builder: CommandBuilder,
    runner: R,
    terminal: T,
}

impl<R: ProcessRunner, T: Terminal> MenuController<R, T> {
    pub fn new(builder: CommandBuilder, runner: R, terminal: T) -> Self {
        Self {
            builder,
            runner,
            terminal,
        }
    }

    pub fn into_parts(self) -> (R, T) {
        (self.runner, self.terminal)
    }

    fn layout(&self) -> &Layout {
        self.builder.layout()
    }

    /// Run the top-level menu until the user quits
    pub fn run(&mut self) -> KvmResult<()> {
        self.terminal.clear()?;
        self.terminal.write_line(REMINDER)?;

        loop {
            self.render_main()?;

            let selection = match self.terminal.prompt(PROMPT)? {
                Some(selection) => selection.trim().to_lowercase(),
                None => return Ok(()),
            };

            if selection == QUIT {
                info!("Quit from main menu");
                return Ok(());
            }

            let release = match release::find(&selection) {
                Some(release) => release,
                None => {
                    self.terminal.write_line(INVALID)?;
                    continue;
                }
            };

            match self.release_menu(release)? {
                SubmenuExit::Back => self.terminal.clear()?,
                SubmenuExit::Terminate => {
                    info!("Quit from {} menu", release.display_name);
                    return Ok(());
                }
            }
        }
    }

    fn render_main(&mut self) -> KvmResult<()> {
        self.terminal.write_line(BANNER)?;
        for release in RELEASES {
            let state = self.layout().probe(release);
            let line = format!(
                "{}) {} {}",
                release.shortcut,
                state.menu_label(),
                release.display_name
            );
            let line = match state {
                VmState::Initialized => line.green(),
                VmState::Provisioning => line.yellow(),
                VmState::Uninitialized => line.normal(),
            };
            self.terminal.write_line(&line.to_string())?;
        }
        self.terminal.write_line("q) Quit")
    }

    /// Enter a release's submenu, provisioning it first if needed
    pub fn release_menu(&mut self, release: &ReleaseDefinition) -> KvmResult<SubmenuExit> {
        if self.layout().probe(release) != VmState::Initialized {
            if let Err(e) = self.provision(release) {
                error!("Provisioning {} failed: {}", release.display_name, e);
                let message = format!("Could not build {}: {}", release.display_name, e);
                self.terminal.write_line(&message.red().to_string())?;
                return match self.terminal.prompt("Press enter to continue...")? {
                    Some(_) => Ok(SubmenuExit::Back),
                    None => Ok(SubmenuExit::Terminate),
                };
            }
        }

        loop {
            self.terminal.clear()?;
            self.terminal.write_line(BANNER)?;
            self.terminal.write_line(release.display_name)?;
            self.terminal
                .write_line(&"-".repeat(release.display_name.len()))?;

            let listing = self.snapshot_listing(release)?;
            self.terminal.write_line(listing.trim_matches('\n'))?;
            self.terminal.write_line("")?;

            for (label, shortcut, _) in RELEASE_OPTIONS {
                self.terminal.write_line(&format!("{}) {}", shortcut, label))?;
            }

            let selection = match self.terminal.prompt(PROMPT)? {
                Some(selection) => selection,
                None => return Ok(SubmenuExit::Terminate),
            };

            match ReleaseAction::parse(&selection) {
                Some(ReleaseAction::RunVm) => self.launch(release)?,
                Some(ReleaseAction::SnapshotCreate) => {
                    self.snapshot(release, Action::SnapshotCreate)?
                }
                Some(ReleaseAction::SnapshotDelete) => {
                    self.snapshot(release, Action::SnapshotDelete)?
                }
                Some(ReleaseAction::SnapshotRevert) => {
                    self.snapshot(release, Action::SnapshotRevert)?
                }
                Some(ReleaseAction::Back) => return Ok(SubmenuExit::Back),
                Some(ReleaseAction::Quit) => return Ok(SubmenuExit::Terminate),
                None => self.terminal.write_line(INVALID)?,
            }
        }
    }

    /// Download the base image and create the system disk
    pub fn provision(&mut self, release: &ReleaseDefinition) -> KvmResult<()> {
        let layout = self.layout().clone();
        let resuming = layout.probe(release) == VmState::Provisioning;
        info!(
            "{} provisioning of {}",
            if resuming { "Resuming" } else { "Starting" },
            release.display_name
        );

        layout.begin_provisioning(release)?;

        let download = self.builder.build(release, &Action::DownloadBase);
        self.runner.run_interactive(&download)?.check(&download)?;

        layout.discard_partial_image(release)?;
        let create = self.builder.build(release, &Action::CreateImage);
        self.runner.run_interactive(&create)?.check(&create)?;

        layout.finish_provisioning(release)?;
        info!("{} is ready", release.display_name);
        Ok(())
    }

    fn snapshot_listing(&mut self, release: &ReleaseDefinition) -> KvmResult<String> {
        let list = self.builder.build(release, &Action::ListSnapshots);
        self.runner.run_captured(&list)?.check(&list)
    }

    fn snapshot(
        &mut self,
        release: &ReleaseDefinition,
        action: fn(String) -> Action,
    ) -> KvmResult<()> {
        let name = match self.terminal.prompt("Snapshot name? ")? {
            Some(name) => name,
            None => return Ok(()),
        };
        let action = action(name);
        info!("{:?} on {}", action, release.display_name);

        let cmd = self.builder.build(release, &action);
        self.runner.run_captured(&cmd)?.check(&cmd)?;
        Ok(())
    }

    fn launch(&mut self, release: &ReleaseDefinition) -> KvmResult<()> {
        let code = self.launch_vm(release)?;
        if !code.success() {
            warn!("{} VM exited with {:?}", release.display_name, code.0);
        }
        self.terminal.prompt("Press enter to continue...")?;
        Ok(())
    }

    /// Boot the release's VM and wait for the hypervisor to exit
    pub fn launch_vm(&mut self, release: &ReleaseDefinition) -> KvmResult<ExitCode> {
        info!("Launching {}", release.display_name);
        let cmd = self.builder.build(release, &Action::LaunchVm);
        self.runner.run_interactive(&cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{HostInfo, ToolCommand, Tools},
        runner::{MockProcessRunner, ToolOutput},
        terminal::LineTerminal,
        KvmError,
    };
    use mockall::Sequence;
    use std::{ffi::OsString, fs, io::Cursor, path::PathBuf};
    use tempfile::TempDir;

    type TestTerminal = LineTerminal<Cursor<String>, Vec<u8>>;

    fn builder(base: &std::path::Path) -> CommandBuilder {
        CommandBuilder::new(
            Layout::new(base),
            Tools {
                hypervisor: PathBuf::from("qemu-system-x86_64"),
                disk_utility: PathBuf::from("qemu-img"),
                download_helper: base.join("jumpstart.sh"),
            },
            HostInfo { cpus: 2 },
        )
    }

    fn controller(
        tmp: &TempDir,
        runner: MockProcessRunner,
        input: &str,
    ) -> MenuController<MockProcessRunner, TestTerminal> {
        let terminal = LineTerminal::new(Cursor::new(input.to_string()), Vec::new())
            .with_clear_screen(false);
        MenuController::new(builder(tmp.path()), runner, terminal)
    }

    fn output(ctl: MenuController<MockProcessRunner, TestTerminal>) -> String {
        let (_, terminal) = ctl.into_parts();
        String::from_utf8(terminal.into_output()).unwrap()
    }

    fn initialized(tmp: &TempDir, shortcut: &str) -> &'static ReleaseDefinition {
        let release = release::find(shortcut).unwrap();
        let layout = Layout::new(tmp.path());
        layout.prepare().unwrap();
        fs::write(layout.disk_image_path(release), b"qcow").unwrap();
        release
    }

    fn program_is(name: &'static str) -> impl Fn(&ToolCommand) -> bool + Send + 'static {
        move |cmd: &ToolCommand| cmd.program_name() == name
    }

    #[test]
    fn parse_release_actions() {
        assert_eq!(ReleaseAction::parse("R"), Some(ReleaseAction::RunVm));
        assert_eq!(ReleaseAction::parse("sc"), Some(ReleaseAction::SnapshotCreate));
        assert_eq!(ReleaseAction::parse("SR\n"), Some(ReleaseAction::SnapshotRevert));
        assert_eq!(ReleaseAction::parse("q"), Some(ReleaseAction::Quit));
        assert_eq!(ReleaseAction::parse("x"), None);
    }

    #[test]
    fn submenu_shortcuts_are_distinct() {
        let mut shortcuts: Vec<_> = RELEASE_OPTIONS.iter().map(|(_, s, _)| *s).collect();
        shortcuts.sort_unstable();
        shortcuts.dedup();
        assert_eq!(shortcuts.len(), RELEASE_OPTIONS.len());
    }

    #[test]
    fn quit_from_main_menu_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut ctl = controller(&tmp, MockProcessRunner::new(), "Q\n");
        ctl.run().unwrap();

        let out = output(ctl);
        assert!(out.contains("hs) Build High Sierra"));
        assert!(out.contains("m) Build Mojave"));
        assert!(out.contains("c) Build Catalina"));
        assert!(out.contains("q) Quit"));
        assert!(!tmp.path().join("drives").exists());
    }

    #[test]
    fn invalid_selection_rerenders() {
        let tmp = TempDir::new().unwrap();
        let mut ctl = controller(&tmp, MockProcessRunner::new(), "zz\nq\n");
        ctl.run().unwrap();

        let out = output(ctl);
        assert_eq!(out.matches("Invalid selection.").count(), 1);
        assert_eq!(out.matches("hs) Build High Sierra").count(), 2);
        assert!(!Layout::new(tmp.path()).is_initialized(release::find("hs").unwrap()));
    }

    #[test]
    fn snapshot_create_passes_name_and_image() {
        let tmp = TempDir::new().unwrap();
        let mojave = initialized(&tmp, "m");
        let image = Layout::new(tmp.path()).disk_image_path(mojave);

        let mut runner = MockProcessRunner::new();
        let expected: Vec<OsString> = vec![
            "snapshot".into(),
            "-c".into(),
            "snap1".into(),
            image.clone().into_os_string(),
        ];
        runner
            .expect_run_captured()
            .withf(move |cmd| cmd.args == expected)
            .times(1)
            .returning(|_| Ok(ToolOutput::ok("")));
        runner
            .expect_run_captured()
            .withf(|cmd| cmd.args.get(1).map(|a| a == "-l").unwrap_or(false))
            .times(2)
            .returning(|_| Ok(ToolOutput::ok("Snapshot list:\n")));

        let mut ctl = controller(&tmp, runner, "sc\nsnap1\nq\n");
        assert_eq!(ctl.release_menu(mojave).unwrap(), SubmenuExit::Terminate);
        assert!(output(ctl).contains("Snapshot name? "));
    }

    #[test]
    fn snapshot_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let catalina = initialized(&tmp, "c");

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run_captured()
            .withf(|cmd| cmd.args.get(1).map(|a| a == "-l").unwrap_or(false))
            .returning(|_| Ok(ToolOutput::ok("")));
        runner
            .expect_run_captured()
            .withf(|cmd| cmd.args.get(1).map(|a| a == "-a").unwrap_or(false))
            .times(1)
            .returning(|_| {
                Ok(ToolOutput {
                    code: ExitCode(Some(1)),
                    stdout: String::new(),
                    stderr: "Can't find the snapshot".to_string(),
                })
            });

        let mut ctl = controller(&tmp, runner, "sr\nmissing\n");
        let err = ctl.release_menu(catalina).unwrap_err();
        assert!(matches!(err, KvmError::ToolFailed { code: Some(1), .. }));
    }

    #[test]
    fn run_vm_waits_for_enter() {
        let tmp = TempDir::new().unwrap();
        let hs = initialized(&tmp, "hs");

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run_captured()
            .returning(|_| Ok(ToolOutput::ok("")));
        runner
            .expect_run_interactive()
            .withf(program_is("qemu-system-x86_64"))
            .times(1)
            .returning(|_| Ok(ExitCode(Some(1))));

        let mut ctl = controller(&tmp, runner, "r\n\nb\n");
        assert_eq!(ctl.release_menu(hs).unwrap(), SubmenuExit::Back);
        assert!(output(ctl).contains("Press enter to continue..."));
    }

    #[test]
    fn provisioning_runs_download_then_create() {
        let tmp = TempDir::new().unwrap();
        let hs = release::find("hs").unwrap();
        let layout = Layout::new(tmp.path());
        let image = layout.disk_image_path(hs);

        let mut seq = Sequence::new();
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run_interactive()
            .withf(program_is("jumpstart.sh"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ExitCode::SUCCESS));
        runner
            .expect_run_interactive()
            .withf(program_is("qemu-img"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                fs::write(&image, b"qcow")?;
                Ok(ExitCode::SUCCESS)
            });

        let mut ctl = controller(&tmp, runner, "");
        ctl.provision(hs).unwrap();
        assert_eq!(layout.probe(hs), VmState::Initialized);
    }

    #[test]
    fn failed_download_leaves_release_resumable() {
        let tmp = TempDir::new().unwrap();
        let m = release::find("m").unwrap();

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run_interactive()
            .withf(program_is("jumpstart.sh"))
            .times(1)
            .returning(|_| Ok(ExitCode(Some(22))));

        let mut ctl = controller(&tmp, runner, "\n");
        assert_eq!(ctl.release_menu(m).unwrap(), SubmenuExit::Back);
        assert_eq!(Layout::new(tmp.path()).probe(m), VmState::Provisioning);
        assert!(output(ctl).contains("Could not build Mojave"));
    }
}
