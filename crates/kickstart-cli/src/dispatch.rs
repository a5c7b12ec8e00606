use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use kickstart_core::{
    ActionOutcome, Failure, FilesReport, Lang, MessageKey, ReleaseRef, Step, VersionsReport,
};
use kickstart_installer::{Installer, PlacementReport, RuntimeStatus};
use kickstart_remote::ProgressFn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    CheckVersions,
    CheckFiles,
    Download,
    Extract,
    Cleanup,
}

impl Action {
    pub(crate) fn parse(input: &str) -> Option<Self> {
        match input {
            "check_versions" => Some(Self::CheckVersions),
            "check_files" => Some(Self::CheckFiles),
            "download" => Some(Self::Download),
            "extract" => Some(Self::Extract),
            "cleanup" => Some(Self::Cleanup),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CheckVersions => "check_versions",
            Self::CheckFiles => "check_files",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Form fields of one action request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct ActionRequest {
    #[serde(default)]
    pub(crate) action: String,
    #[serde(default)]
    pub(crate) branch: Option<String>,
    #[serde(default)]
    pub(crate) lang: Option<String>,
}

impl ActionRequest {
    pub(crate) fn new(action: Action) -> Self {
        Self {
            action: action.as_str().to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub(crate) fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = Some(lang.as_str().to_string());
        self
    }

    fn lang(&self) -> Lang {
        Lang::from_code(self.lang.as_deref())
    }

    /// Missing means master. An empty value is passed on and rejected.
    fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or("master")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum ActionResponse {
    Versions(VersionsReport),
    Files(FilesReport),
    Outcome(ActionOutcome),
}

impl ActionResponse {
    pub(crate) fn success(&self) -> bool {
        match self {
            Self::Versions(report) => report.success,
            Self::Files(report) => report.success,
            Self::Outcome(outcome) => outcome.success,
        }
    }

    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"message":"Unknown error occurred","step":"init"}"#.to_string()
        })
    }
}

/// Runs actions against one install root, one at a time.
pub(crate) struct Dispatcher {
    installer: Installer,
    package_name: String,
    runtime: RuntimeStatus,
    lock: Mutex<()>,
}

impl Dispatcher {
    pub(crate) fn new(
        installer: Installer,
        package_name: impl Into<String>,
        runtime: RuntimeStatus,
    ) -> Self {
        Self {
            installer,
            package_name: package_name.into(),
            runtime,
            lock: Mutex::new(()),
        }
    }

    pub(crate) fn installer(&self) -> &Installer {
        &self.installer
    }

    pub(crate) fn package_name(&self) -> &str {
        &self.package_name
    }

    pub(crate) fn runtime(&self) -> &RuntimeStatus {
        &self.runtime
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.installer.layout().is_installed()
    }

    pub(crate) fn handle(&self, request: &ActionRequest) -> ActionResponse {
        self.handle_with_progress(request, &mut |_, _| {})
    }

    pub(crate) fn handle_with_progress(
        &self,
        request: &ActionRequest,
        progress: &mut ProgressFn<'_>,
    ) -> ActionResponse {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let lang = request.lang();

        let action = Action::parse(&request.action);
        if self.is_installed() && action != Some(Action::Cleanup) {
            return self.refuse(request, Failure::new(MessageKey::AlreadyInstalled), lang);
        }
        if !self.runtime.satisfied {
            let failure = Failure::with_detail(MessageKey::RuntimeVersion, self.runtime.describe());
            return self.refuse(request, failure, lang);
        }
        let Some(action) = action else {
            tracing::warn!(action = %request.action, "unknown action");
            let failure = Failure::with_detail(MessageKey::UnknownAction, request.action.clone());
            return ActionResponse::Outcome(ActionOutcome::failed(
                failure.localize(lang, &self.package_name),
                Some(Step::Init),
            ));
        };

        tracing::info!(action = action.as_str(), branch = request.branch(), "handling action");
        match action {
            Action::CheckVersions => ActionResponse::Versions(VersionsReport {
                success: true,
                set: self.installer.versions(),
            }),
            Action::CheckFiles => match self.installer.check_files() {
                Ok(entries) => ActionResponse::Files(FilesReport::from_entries(entries)),
                Err(err) => self.failed(action, &err, lang, Some(Step::Init)),
            },
            Action::Download => match self.download(request.branch(), progress) {
                Ok(()) => ActionResponse::Outcome(ActionOutcome::advance(
                    MessageKey::DownloadOk.render(lang, &self.package_name),
                    Step::Extract,
                )),
                Err(err) => self.failed(action, &err, lang, Some(Step::Init)),
            },
            Action::Extract => match self.extract(request.branch()) {
                Ok(report) => ActionResponse::Outcome(ActionOutcome::advance(
                    self.extract_message(&report, lang),
                    Step::Done,
                )),
                Err(err) => self.failed(action, &err, lang, Some(Step::Init)),
            },
            Action::Cleanup => match self.installer.cleanup() {
                Ok(()) => ActionResponse::Outcome(ActionOutcome::ok()),
                Err(err) => self.failed(action, &err, lang, None),
            },
        }
    }

    fn download(&self, branch: &str, progress: &mut ProgressFn<'_>) -> Result<()> {
        let reference = ReleaseRef::parse(branch)?;
        let report = self.installer.download(&reference, progress)?;
        tracing::info!(
            archive = %report.archive_path.display(),
            bytes = report.bytes,
            sha256 = %report.sha256,
            "archive downloaded"
        );
        Ok(())
    }

    fn extract(&self, branch: &str) -> Result<PlacementReport> {
        let reference = ReleaseRef::parse(branch)?;
        let report = self.installer.extract(&reference)?;
        tracing::info!(
            moved = report.moved.len(),
            failed_files = report.failed_files.len(),
            skipped_self = report.skipped_self,
            "package placed"
        );
        Ok(report)
    }

    pub(crate) fn extract_message(&self, report: &PlacementReport, lang: Lang) -> String {
        let message = MessageKey::ExtractOk.render(lang, &self.package_name);
        if report.failed_files.is_empty() {
            return message;
        }
        let kept = Failure::with_detail(MessageKey::MoveFilesKept, report.failed_files.join(", "));
        format!("{message} {}", kept.localize(lang, &self.package_name))
    }

    fn refuse(&self, request: &ActionRequest, failure: Failure, lang: Lang) -> ActionResponse {
        tracing::warn!(action = %request.action, reason = failure.key.code(), "action refused");
        ActionResponse::Outcome(ActionOutcome::failed(
            failure.localize(lang, &self.package_name),
            Some(Step::Error),
        ))
    }

    fn failed(
        &self,
        action: Action,
        err: &anyhow::Error,
        lang: Lang,
        step: Option<Step>,
    ) -> ActionResponse {
        tracing::error!(action = action.as_str(), error = %format!("{err:#}"), "action failed");
        let message = localize_error(err, lang, &self.package_name);
        ActionResponse::Outcome(ActionOutcome::failed(message, step))
    }
}

/// Localized text of a user-facing failure, or the error's own text.
pub(crate) fn localize_error(err: &anyhow::Error, lang: Lang, package: &str) -> String {
    match err.downcast_ref::<Failure>() {
        Some(failure) => failure.localize(lang, package),
        None => err.to_string(),
    }
}
