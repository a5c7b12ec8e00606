use std::io::{BufRead, Write};

use anyhow::{anyhow, Context, Result};
use kickstart_core::{
    Channel, FileEntry, FilesReport, InstallType, Lang, ReleaseRef, Wizard, WizardCommand,
    WizardEvent, WizardState,
};

use crate::command_flows::format_files_lines;
use crate::dispatch::{Action, ActionRequest, ActionResponse, Dispatcher};
use crate::render::TerminalRenderer;

#[derive(Debug, Clone, Default)]
pub(crate) struct InstallOptions {
    pub(crate) reference: Option<String>,
    pub(crate) assume_yes: bool,
    pub(crate) handoff: bool,
    pub(crate) handoff_url: String,
    pub(crate) lang: Lang,
}

/// Drives the wizard end to end from the terminal. `confirm` is asked before
/// existing entries are overwritten unless `assume_yes` is set.
pub(crate) fn run_install_flow(
    dispatcher: &Dispatcher,
    options: &InstallOptions,
    renderer: TerminalRenderer,
    confirm: &mut dyn FnMut(&[FileEntry]) -> Result<bool>,
) -> Result<WizardState> {
    let mut wizard = Wizard::new(
        dispatcher.is_installed(),
        dispatcher.runtime().satisfied,
        options.lang,
    );
    tracing::debug!(state = wizard.state().name(), "wizard initialized");

    let initial = wizard.state().clone();
    match initial {
        WizardState::RuntimeError => {
            return Err(anyhow!(
                "runtime requirement not met: {}",
                dispatcher.runtime().describe()
            ));
        }
        WizardState::Installed => {
            renderer.print_status(
                "warn",
                &format!("{} is already installed", dispatcher.package_name()),
            );
            if options.handoff {
                handoff(dispatcher, &mut wizard, options, renderer)?;
            }
            return Ok(wizard.state().clone());
        }
        _ => {}
    }

    if wizard.initial_command() == WizardCommand::CheckVersions {
        let loaded = execute(dispatcher, &WizardCommand::CheckVersions, options, renderer);
        if let Some(event) = loaded {
            wizard.handle(event);
        }
    }
    select_reference(&mut wizard, options.reference.as_deref());

    renderer.print_section("install");
    let mut command = wizard.handle(WizardEvent::Start);
    loop {
        if let WizardState::ConfirmOverwrite { files } = wizard.state() {
            renderer.print_status(
                "warn",
                &format!("{} existing entries will be overwritten", files.len()),
            );
            renderer.print_lines(&format_files_lines(&FilesReport::from_entries(files.clone())));
            let accepted = options.assume_yes || confirm(files)?;
            command = wizard.handle(if accepted {
                WizardEvent::ConfirmOverwrite
            } else {
                WizardEvent::Cancel
            });
            continue;
        }
        if command == WizardCommand::None {
            break;
        }
        tracing::debug!(state = wizard.state().name(), command = ?command, "wizard step");
        command = match execute(dispatcher, &command, options, renderer) {
            Some(event) => wizard.handle(event),
            None => WizardCommand::None,
        };
    }

    match wizard.state().clone() {
        WizardState::Done => {
            renderer.print_status(
                "ok",
                &format!(
                    "{} is in place; continue at {}",
                    dispatcher.package_name(),
                    options.handoff_url
                ),
            );
            if options.handoff {
                handoff(dispatcher, &mut wizard, options, renderer)?;
            }
            Ok(wizard.state().clone())
        }
        WizardState::Select => {
            renderer.print_status("warn", "installation cancelled");
            Ok(WizardState::Select)
        }
        WizardState::Error { message } => Err(anyhow!("{message}")),
        other => Err(anyhow!("install stopped in state {}", other.name())),
    }
}

fn select_reference(wizard: &mut Wizard, reference: Option<&str>) {
    let Some(reference) = reference else {
        wizard.choose(InstallType::Master);
        return;
    };
    match ReleaseRef::parse(reference) {
        Ok(ReleaseRef::Channel(Channel::Master)) => {
            wizard.choose(InstallType::Master);
        }
        Ok(ReleaseRef::Channel(Channel::Dev)) => {
            wizard.choose(InstallType::Dev);
        }
        Ok(ReleaseRef::Tag(tag)) => {
            wizard.choose_tag(tag);
        }
        // invalid input is rejected by the wizard on start
        Err(_) => {
            wizard.choose_tag(reference);
        }
    }
}

fn handoff(
    dispatcher: &Dispatcher,
    wizard: &mut Wizard,
    options: &InstallOptions,
    renderer: TerminalRenderer,
) -> Result<()> {
    let command = wizard.handle(WizardEvent::Handoff);
    if let Some(event) = execute(dispatcher, &command, options, renderer) {
        wizard.handle(event);
    }
    if let Some(notice) = wizard.notice() {
        return Err(anyhow!("{notice}"));
    }
    renderer.print_status("ok", "installer removed");
    Ok(())
}

/// Issues one wizard command and turns its response into the next event.
fn execute(
    dispatcher: &Dispatcher,
    command: &WizardCommand,
    options: &InstallOptions,
    renderer: TerminalRenderer,
) -> Option<WizardEvent> {
    let base = |action: Action| ActionRequest::new(action).with_lang(options.lang);
    match command {
        WizardCommand::None => None,
        WizardCommand::CheckVersions => {
            match dispatcher.handle(&base(Action::CheckVersions)) {
                ActionResponse::Versions(report) => Some(WizardEvent::VersionsLoaded(report.set)),
                _ => None,
            }
        }
        WizardCommand::CheckFiles => match dispatcher.handle(&base(Action::CheckFiles)) {
            ActionResponse::Files(report) => Some(WizardEvent::FilesChecked(report)),
            ActionResponse::Outcome(outcome) => {
                renderer.print_status("warn", &outcome.message);
                Some(WizardEvent::FilesCheckFailed)
            }
            ActionResponse::Versions(_) => Some(WizardEvent::FilesCheckFailed),
        },
        WizardCommand::Download(reference) => {
            let request = base(Action::Download).with_branch(reference.as_str());
            let mut progress = renderer.start_progress("download");
            let response = dispatcher.handle_with_progress(&request, &mut |current, total| {
                progress.set(current, total)
            });
            if response.success() {
                progress.finish_success();
            } else {
                progress.finish_abandon();
            }
            Some(processing_event(response, renderer))
        }
        WizardCommand::Extract(reference) => {
            let request = base(Action::Extract).with_branch(reference.as_str());
            Some(processing_event(dispatcher.handle(&request), renderer))
        }
        WizardCommand::Cleanup => match dispatcher.handle(&base(Action::Cleanup)) {
            ActionResponse::Outcome(outcome) => Some(WizardEvent::CleanupCompleted(outcome)),
            _ => None,
        },
    }
}

fn processing_event(response: ActionResponse, renderer: TerminalRenderer) -> WizardEvent {
    match response {
        ActionResponse::Outcome(outcome) => {
            if outcome.success {
                renderer.print_status("ok", &outcome.message);
            }
            WizardEvent::ActionCompleted(outcome)
        }
        _ => WizardEvent::TransportFailed("unexpected response".to_string()),
    }
}

/// Asks on stdin whether the listed entries may be overwritten.
pub(crate) fn prompt_overwrite(files: &[FileEntry]) -> Result<bool> {
    let mut stdout = std::io::stdout();
    write!(stdout, "Overwrite {} existing entries? [y/N] ", files.len())
        .and_then(|_| stdout.flush())
        .context("failed writing overwrite prompt")?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed reading overwrite answer")?;
    Ok(parse_confirmation(&answer))
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
