use anyhow::{anyhow, Result};
use kickstart_core::{ChannelVersions, FilesReport, VersionSet};

use crate::dispatch::{Action, ActionRequest, ActionResponse, Dispatcher};
use crate::render::TerminalRenderer;

/// Runs a single action and prints its result. Failed actions become an
/// error so the process exits non-zero.
pub(crate) fn run_action_command(
    dispatcher: &Dispatcher,
    request: &ActionRequest,
    json: bool,
    renderer: TerminalRenderer,
) -> Result<ActionResponse> {
    let action = Action::parse(&request.action);
    let response = if action == Some(Action::Download) && !json {
        let mut progress = renderer.start_progress("download");
        let response = dispatcher.handle_with_progress(request, &mut |current, total| {
            progress.set(current, total)
        });
        if response.success() {
            progress.finish_success();
        } else {
            progress.finish_abandon();
        }
        response
    } else {
        dispatcher.handle(request)
    };

    if json {
        println!("{}", response.to_json());
    } else {
        renderer.print_lines(&format_response_lines(&response));
    }

    if let ActionResponse::Outcome(outcome) = &response {
        if !outcome.success {
            return Err(anyhow!("{}", outcome.message));
        }
    }
    Ok(response)
}

pub(crate) fn format_response_lines(response: &ActionResponse) -> Vec<String> {
    match response {
        ActionResponse::Versions(report) => format_version_lines(&report.set),
        ActionResponse::Files(report) => format_files_lines(report),
        ActionResponse::Outcome(outcome) if outcome.success && outcome.message.is_empty() => {
            vec!["ok".to_string()]
        }
        ActionResponse::Outcome(outcome) => {
            let mut lines = vec![outcome.message.clone()];
            if let Some(step) = outcome.step {
                lines.push(format!("next step: {}", step.as_str()));
            }
            lines
        }
    }
}

pub(crate) fn format_version_lines(set: &VersionSet) -> Vec<String> {
    let ChannelVersions { master, dev } = &set.versions;
    let mut lines = vec![
        format!("master: {}", master.as_deref().unwrap_or("unknown")),
        format!("dev: {}", dev.as_deref().unwrap_or("unknown")),
    ];
    if set.tags.is_empty() {
        lines.push("tags: none".to_string());
    } else {
        lines.push(format!("tags: {}", set.tags.join(", ")));
    }
    lines
}

pub(crate) fn format_files_lines(report: &FilesReport) -> Vec<String> {
    if !report.has_files {
        return vec!["install root is empty".to_string()];
    }
    report
        .files
        .iter()
        .map(|entry| {
            let kind = if entry.is_dir() { "dir " } else { "file" };
            format!("{kind} {}", entry.name)
        })
        .collect()
}
