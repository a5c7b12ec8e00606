//! Step controller for the install wizard.
//!
//! Pure state machine: [`Wizard::handle`] takes an event, moves to the next
//! state and tells the driver which action to issue next. Drivers (the
//! terminal wizard, a browser client) never pick states on their own; every
//! move past `Select` is triggered by an action result.

use crate::messages::{Failure, Lang};
use crate::outcome::{ActionOutcome, FileEntry, FilesReport, Step, VersionSet};
use crate::release::{Channel, ReleaseRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Download,
    Extract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
    Select,
    Prechecking,
    ConfirmOverwrite { files: Vec<FileEntry> },
    Processing(Phase),
    Done,
    HandedOff,
    Installed,
    RuntimeError,
    Error { message: String },
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Prechecking => "prechecking",
            Self::ConfirmOverwrite { .. } => "confirm_overwrite",
            Self::Processing(Phase::Download) => "processing(download)",
            Self::Processing(Phase::Extract) => "processing(extract)",
            Self::Done => "done",
            Self::HandedOff => "handed_off",
            Self::Installed => "installed",
            Self::RuntimeError => "runtime_error",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::HandedOff | Self::RuntimeError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallType {
    #[default]
    Master,
    Dev,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    Start,
    FilesChecked(FilesReport),
    FilesCheckFailed,
    ConfirmOverwrite,
    Cancel,
    ActionCompleted(ActionOutcome),
    TransportFailed(String),
    Handoff,
    CleanupCompleted(ActionOutcome),
    Reset,
    VersionsLoaded(VersionSet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    None,
    CheckVersions,
    CheckFiles,
    Download(ReleaseRef),
    Extract(ReleaseRef),
    Cleanup,
}

#[derive(Debug, Clone)]
pub struct Wizard {
    state: WizardState,
    lang: Lang,
    install_type: InstallType,
    selected_tag: Option<String>,
    versions: VersionSet,
    attempt: Option<ReleaseRef>,
    notice: Option<String>,
}

impl Wizard {
    pub fn new(installed: bool, runtime_ok: bool, lang: Lang) -> Self {
        let state = if !runtime_ok {
            WizardState::RuntimeError
        } else if installed {
            WizardState::Installed
        } else {
            WizardState::Select
        };
        Self {
            state,
            lang,
            install_type: InstallType::default(),
            selected_tag: None,
            versions: VersionSet::default(),
            attempt: None,
            notice: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn versions(&self) -> &VersionSet {
        &self.versions
    }

    pub fn install_type(&self) -> InstallType {
        self.install_type
    }

    pub fn selected_tag(&self) -> Option<&str> {
        self.selected_tag.as_deref()
    }

    /// Message from a failed handoff cleanup, shown without leaving the
    /// current screen.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Reference fixed for the running attempt.
    pub fn attempt(&self) -> Option<&ReleaseRef> {
        self.attempt.as_ref()
    }

    pub fn initial_command(&self) -> WizardCommand {
        match self.state {
            WizardState::Select => WizardCommand::CheckVersions,
            _ => WizardCommand::None,
        }
    }

    /// Changing the selection is only possible on the selection screen.
    pub fn choose(&mut self, install_type: InstallType) -> bool {
        if self.state != WizardState::Select {
            return false;
        }
        self.install_type = install_type;
        true
    }

    pub fn choose_tag(&mut self, tag: impl Into<String>) -> bool {
        if self.state != WizardState::Select {
            return false;
        }
        self.install_type = InstallType::Tag;
        self.selected_tag = Some(tag.into());
        true
    }

    /// The reference the current selection resolves to.
    pub fn selection(&self) -> Result<ReleaseRef, Failure> {
        match self.install_type {
            InstallType::Master => Ok(ReleaseRef::Channel(Channel::Master)),
            InstallType::Dev => Ok(ReleaseRef::Channel(Channel::Dev)),
            InstallType::Tag => ReleaseRef::parse(self.selected_tag.as_deref().unwrap_or("")),
        }
    }

    pub fn handle(&mut self, event: WizardEvent) -> WizardCommand {
        let (next, command) = self.transition(event);
        if let Some(next) = next {
            self.state = next;
        }
        command
    }

    fn transition(&mut self, event: WizardEvent) -> (Option<WizardState>, WizardCommand) {
        use WizardCommand as Cmd;
        use WizardEvent as Ev;
        use WizardState as St;

        match (&self.state, event) {
            (_, Ev::VersionsLoaded(set)) => {
                if self.selected_tag.is_none() {
                    self.selected_tag = set.tags.first().cloned();
                }
                self.versions = set;
                (None, Cmd::None)
            }
            (St::Select, Ev::Start) => match self.selection() {
                Ok(reference) => {
                    self.attempt = Some(reference);
                    (Some(St::Prechecking), Cmd::CheckFiles)
                }
                Err(failure) => (
                    Some(St::Error {
                        message: failure.localize(self.lang, ""),
                    }),
                    Cmd::None,
                ),
            },
            (St::Prechecking, Ev::FilesChecked(report)) => {
                if report.success && report.has_files {
                    (
                        Some(St::ConfirmOverwrite {
                            files: report.files,
                        }),
                        Cmd::None,
                    )
                } else {
                    self.begin_download()
                }
            }
            (St::Prechecking, Ev::FilesCheckFailed) => self.begin_download(),
            (St::ConfirmOverwrite { .. }, Ev::ConfirmOverwrite) => self.begin_download(),
            (St::ConfirmOverwrite { .. }, Ev::Cancel) => {
                self.attempt = None;
                (Some(St::Select), Cmd::None)
            }
            (St::Processing(phase), Ev::ActionCompleted(outcome)) => {
                let phase = *phase;
                self.advance(phase, outcome)
            }
            (St::Processing(_), Ev::TransportFailed(message)) => {
                (Some(self.fail(message)), Cmd::None)
            }
            (St::Error { .. }, Ev::Reset) => {
                self.attempt = None;
                (Some(St::Select), Cmd::None)
            }
            (St::Done | St::Installed, Ev::Handoff) => {
                self.notice = None;
                (None, Cmd::Cleanup)
            }
            (St::Done | St::Installed, Ev::CleanupCompleted(outcome)) => {
                if outcome.success {
                    (Some(St::HandedOff), Cmd::None)
                } else {
                    self.notice = Some(outcome.message);
                    (None, Cmd::None)
                }
            }
            _ => (None, Cmd::None),
        }
    }

    fn begin_download(&mut self) -> (Option<WizardState>, WizardCommand) {
        match self.attempt.clone() {
            Some(reference) => (
                Some(WizardState::Processing(Phase::Download)),
                WizardCommand::Download(reference),
            ),
            None => (Some(WizardState::Select), WizardCommand::None),
        }
    }

    fn advance(
        &mut self,
        phase: Phase,
        outcome: ActionOutcome,
    ) -> (Option<WizardState>, WizardCommand) {
        if !outcome.success {
            return (Some(self.fail(outcome.message)), WizardCommand::None);
        }
        let Some(reference) = self.attempt.clone() else {
            return (Some(WizardState::Select), WizardCommand::None);
        };
        match (phase, outcome.step) {
            (Phase::Download, Some(Step::Extract)) => (
                Some(WizardState::Processing(Phase::Extract)),
                WizardCommand::Extract(reference),
            ),
            (Phase::Extract, Some(Step::Done)) => (Some(WizardState::Done), WizardCommand::None),
            (_, step) => (
                Some(self.fail(format!(
                    "unexpected step '{}' after {phase:?}",
                    step.map(Step::as_str).unwrap_or("none")
                ))),
                WizardCommand::None,
            ),
        }
    }

    fn fail(&self, message: String) -> WizardState {
        if message.trim().is_empty() {
            return WizardState::Error {
                message: "Unknown error occurred".to_string(),
            };
        }
        WizardState::Error { message }
    }
}
