use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use clap::Parser;
use kickstart_core::{
    EntryKind, FileEntry, InstallConfig, Lang, NetworkConfig, SourceConfig, Step, WizardState,
    MIN_ARCHIVE_BYTES,
};
use kickstart_installer::{InstallLayout, Installer, PlacementReport, RuntimeStatus};
use kickstart_remote::{Fetcher, ProgressFn, RequestProfile, Transport};
use tower::ServiceExt;

use super::*;
use crate::command_flows::{format_files_lines, format_response_lines, format_version_lines};
use crate::dispatch::ActionResponse;
use crate::install_flow::parse_confirmation;
use crate::logging::default_filter;
use crate::render::{render_status_line, OutputStyle};

const SELF_NAME: &str = "kickstart";

struct RoutedTransport {
    routes: HashMap<String, Vec<u8>>,
}

impl Transport for RoutedTransport {
    fn name(&self) -> &'static str {
        "routed"
    }

    fn get(&self, url: &str, _profile: &RequestProfile) -> anyhow::Result<Vec<u8>> {
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused"))
    }

    fn download(
        &self,
        url: &str,
        out: &mut File,
        profile: &RequestProfile,
        progress: &mut ProgressFn<'_>,
    ) -> anyhow::Result<u64> {
        let body = self.get(url, profile)?;
        out.write_all(&body)?;
        progress(body.len() as u64, Some(body.len() as u64));
        Ok(body.len() as u64)
    }
}

fn test_root() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let root = std::env::temp_dir().join(format!(
        "kickstart-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn package_zip(top: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    writer
        .add_directory(format!("{top}/site/"), options)
        .expect("must add dir");
    for (name, contents) in [
        ("index.php".to_string(), b"<?php // new index".to_vec()),
        ("install.php".to_string(), b"<?php // installer".to_vec()),
        ("site/config.php".to_string(), b"<?php // config".to_vec()),
        (
            "README.md".to_string(),
            vec![b'#'; MIN_ARCHIVE_BYTES as usize + 2_000],
        ),
    ] {
        writer
            .start_file(format!("{top}/{name}"), options)
            .expect("must start entry");
        writer.write_all(&contents).expect("must write entry");
    }
    writer.finish().expect("must finish zip").into_inner()
}

fn serving_routes(reference: &str) -> HashMap<String, Vec<u8>> {
    let source = SourceConfig::default();
    let mut routes = HashMap::new();
    routes.insert(
        source.archive_url(reference),
        package_zip(&format!("processwire-{reference}")),
    );
    routes
}

fn dispatcher_with(
    root: &Path,
    routes: HashMap<String, Vec<u8>>,
    runtime: RuntimeStatus,
) -> Dispatcher {
    let layout = InstallLayout::new(root, &InstallConfig::default()).with_self_name(SELF_NAME);
    let fetcher = Fetcher::with_transports(
        vec![Box::new(RoutedTransport { routes })],
        &NetworkConfig::default(),
    );
    let installer = Installer::new(layout, SourceConfig::default(), fetcher);
    Dispatcher::new(installer, "ProcessWire", runtime)
}

fn test_dispatcher(root: &Path) -> Dispatcher {
    dispatcher_with(root, serving_routes("master"), RuntimeStatus::unconstrained())
}

fn plain() -> TerminalRenderer {
    TerminalRenderer::from_style(OutputStyle::Plain)
}

fn install_options(assume_yes: bool) -> InstallOptions {
    InstallOptions {
        reference: None,
        assume_yes,
        handoff: false,
        handoff_url: "./install.php".to_string(),
        lang: Lang::En,
    }
}

fn outcome(response: ActionResponse) -> kickstart_core::ActionOutcome {
    match response {
        ActionResponse::Outcome(outcome) => outcome,
        other => panic!("expected an outcome envelope, got {other:?}"),
    }
}

fn request(action: &str) -> ActionRequest {
    ActionRequest {
        action: action.to_string(),
        ..ActionRequest::default()
    }
}

#[test]
fn unknown_action_returns_init_envelope_with_message() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    let response = dispatcher.handle(&request("reticulate"));
    let json = response.to_json();
    let result = outcome(response);

    assert!(!result.success);
    assert_eq!(result.message, "Unknown action: reticulate");
    assert_eq!(result.step, Some(Step::Init));
    assert!(json.contains("\"step\":\"init\""), "unexpected json: {json}");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn installed_root_only_permits_cleanup() {
    let root = test_root();
    fs::create_dir_all(root.join("site/assets")).expect("must create assets");
    fs::write(root.join("site/assets/installed.php"), "<?php").expect("must write marker");
    fs::write(root.join(SELF_NAME), "binary").expect("must write installer");
    let dispatcher = test_dispatcher(&root);

    let refused = outcome(
        dispatcher.handle(&ActionRequest::new(Action::Download).with_branch("master")),
    );
    assert!(!refused.success);
    assert_eq!(refused.message, "ProcessWire is already installed.");
    assert_eq!(refused.step, Some(Step::Error));
    assert!(!root.join("processwire-master.zip").exists());

    let files = outcome(dispatcher.handle(&ActionRequest::new(Action::CheckFiles)));
    assert_eq!(files.step, Some(Step::Error));

    let cleaned = outcome(dispatcher.handle(&ActionRequest::new(Action::Cleanup)));
    assert!(cleaned.success);
    assert!(!root.join(SELF_NAME).exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unmet_runtime_refuses_every_action() {
    let root = test_root();
    let runtime = RuntimeStatus {
        required: None,
        detected: Some("7.4.3".to_string()),
        satisfied: false,
    };
    let dispatcher = dispatcher_with(&root, serving_routes("master"), runtime);

    for action in ["check_versions", "check_files", "download", "cleanup"] {
        let result = outcome(dispatcher.handle(&request(action)));
        assert!(!result.success, "{action} must be refused");
        assert_eq!(result.step, Some(Step::Error));
        assert_eq!(
            result.message,
            "Runtime version requirement not met: requires *, found 7.4.3"
        );
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn invalid_branch_fails_before_touching_disk() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    for action in [Action::Download, Action::Extract] {
        let request = ActionRequest::new(action).with_branch("../etc");
        let result = outcome(dispatcher.handle(&request));
        assert!(!result.success);
        assert_eq!(result.message, "Invalid branch selected.");
        assert_eq!(result.step, Some(Step::Init));
    }
    let entries = fs::read_dir(&root).expect("must read root").count();
    assert_eq!(entries, 0);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn installed_root_is_reported_before_unmet_runtime() {
    let root = test_root();
    fs::create_dir_all(root.join("site/assets")).expect("must create assets");
    fs::write(root.join("site/assets/installed.php"), "<?php").expect("must write marker");
    let runtime = RuntimeStatus {
        required: None,
        detected: Some("5.6.0".to_string()),
        satisfied: false,
    };
    let dispatcher = dispatcher_with(&root, serving_routes("master"), runtime);

    let result = outcome(dispatcher.handle(&request("download")));
    assert!(!result.success);
    assert_eq!(result.message, "ProcessWire is already installed.");
    assert_eq!(result.step, Some(Step::Error));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn empty_branch_is_rejected_instead_of_defaulting() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    let empty = ActionRequest::new(Action::Download).with_branch("");
    let result = outcome(dispatcher.handle(&empty));
    assert!(!result.success);
    assert_eq!(result.message, "Invalid branch selected.");
    assert_eq!(result.step, Some(Step::Init));
    assert!(!root.join("processwire-master.zip").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn extract_message_names_files_left_in_staging() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    let clean = PlacementReport::default();
    assert_eq!(
        dispatcher.extract_message(&clean, Lang::En),
        "ProcessWire extracted successfully."
    );

    let partial = PlacementReport {
        failed_files: vec!["index.php".to_string(), ".htaccess".to_string()],
        ..PlacementReport::default()
    };
    assert_eq!(
        dispatcher.extract_message(&partial, Lang::En),
        "ProcessWire extracted successfully. Some files were left in the extracted directory: index.php, .htaccess"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn installer_name_is_kept_only_for_executables_in_root() {
    let root = test_root();
    let elsewhere = test_root();

    assert_eq!(
        installer_name_in_root(&root.join(SELF_NAME), &root),
        Some(SELF_NAME.to_string())
    );
    assert_eq!(installer_name_in_root(&elsewhere.join(SELF_NAME), &root), None);
    assert_eq!(
        installer_name_in_root(&root.join("bin").join(SELF_NAME), &root),
        None,
        "a missing subdirectory is not the root"
    );

    let _ = fs::remove_dir_all(&root);
    let _ = fs::remove_dir_all(&elsewhere);
}

#[test]
fn failures_are_localized_by_request_language() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    let german = outcome(dispatcher.handle(
        &ActionRequest::new(Action::Download)
            .with_branch("nope nope")
            .with_lang(Lang::De),
    ));
    assert_eq!(german.message, "Ungültiger Branch ausgewählt.");

    let mut unknown_lang = ActionRequest::new(Action::Extract).with_branch("master");
    unknown_lang.lang = Some("xx".to_string());
    let english = outcome(dispatcher.handle(&unknown_lang));
    assert_eq!(english.message, "ZIP file not found. Please restart.");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn empty_root_installs_master_end_to_end() {
    let root = test_root();
    let dispatcher = test_dispatcher(&root);

    match dispatcher.handle(&ActionRequest::new(Action::CheckFiles)) {
        ActionResponse::Files(report) => {
            assert!(report.success);
            assert!(!report.has_files);
        }
        other => panic!("expected a files report, got {other:?}"),
    }

    let downloaded = outcome(
        dispatcher.handle(&ActionRequest::new(Action::Download).with_branch("master")),
    );
    assert!(downloaded.success, "download failed: {}", downloaded.message);
    assert_eq!(downloaded.step, Some(Step::Extract));
    assert_eq!(downloaded.message, "Download successful.");

    let extracted = outcome(
        dispatcher.handle(&ActionRequest::new(Action::Extract).with_branch("master")),
    );
    assert!(extracted.success, "extract failed: {}", extracted.message);
    assert_eq!(extracted.step, Some(Step::Done));
    assert_eq!(extracted.message, "ProcessWire extracted successfully.");

    assert!(root.join("index.php").is_file());
    assert!(root.join("install.php").is_file());
    assert!(root.join("site/config.php").is_file());
    assert!(!root.join("processwire-master.zip").exists());
    assert!(!root.join("processwire-master").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_confirms_before_replacing_existing_index() {
    let root = test_root();
    fs::write(root.join("index.php"), "<?php // old index").expect("must seed index");
    let dispatcher = test_dispatcher(&root);

    match dispatcher.handle(&ActionRequest::new(Action::CheckFiles)) {
        ActionResponse::Files(report) => {
            assert_eq!(report.files, vec![FileEntry::new("index.php", EntryKind::File)]);
        }
        other => panic!("expected a files report, got {other:?}"),
    }

    let mut asked = Vec::new();
    let state = run_install_flow(
        &dispatcher,
        &install_options(false),
        plain(),
        &mut |files: &[FileEntry]| {
            asked.extend(files.iter().map(|entry| entry.name.clone()));
            Ok(true)
        },
    )
    .expect("install must succeed");

    assert_eq!(state, WizardState::Done);
    assert_eq!(asked, vec!["index.php".to_string()]);
    let index = fs::read_to_string(root.join("index.php")).expect("must read index");
    assert_eq!(index, "<?php // new index");
    assert!(root.join("site").is_dir());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_cancel_leaves_root_untouched() {
    let root = test_root();
    fs::write(root.join("index.php"), "<?php // old index").expect("must seed index");
    let dispatcher = test_dispatcher(&root);

    let state = run_install_flow(
        &dispatcher,
        &install_options(false),
        plain(),
        &mut |_: &[FileEntry]| Ok(false),
    )
    .expect("cancel is not an error");

    assert_eq!(state, WizardState::Select);
    let index = fs::read_to_string(root.join("index.php")).expect("must read index");
    assert_eq!(index, "<?php // old index");
    assert!(!root.join("processwire-master.zip").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_with_handoff_removes_installer() {
    let root = test_root();
    fs::write(root.join(SELF_NAME), "binary").expect("must write installer");
    let dispatcher = test_dispatcher(&root);
    let options = InstallOptions {
        handoff: true,
        ..install_options(true)
    };

    let state = run_install_flow(&dispatcher, &options, plain(), &mut |_: &[FileEntry]| {
        panic!("assume_yes must skip the prompt")
    })
    .expect("install must succeed");

    assert_eq!(state, WizardState::HandedOff);
    assert!(!root.join(SELF_NAME).exists());
    assert!(root.join("index.php").is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_reports_download_error() {
    let root = test_root();
    let dispatcher = dispatcher_with(&root, HashMap::new(), RuntimeStatus::unconstrained());

    let err = run_install_flow(
        &dispatcher,
        &install_options(true),
        plain(),
        &mut |_: &[FileEntry]| Ok(true),
    )
    .expect_err("download must fail");

    assert!(
        err.to_string().starts_with("Download error: "),
        "unexpected error: {err}"
    );
    assert!(!root.join("index.php").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_flow_installs_selected_tag() {
    let root = test_root();
    let dispatcher =
        dispatcher_with(&root, serving_routes("3.0.229"), RuntimeStatus::unconstrained());
    let options = InstallOptions {
        reference: Some("3.0.229".to_string()),
        ..install_options(true)
    };

    let state = run_install_flow(&dispatcher, &options, plain(), &mut |_: &[FileEntry]| Ok(true))
        .expect("install must succeed");

    assert_eq!(state, WizardState::Done);
    assert!(root.join("index.php").is_file());
    assert!(!root.join("processwire-3.0.229.zip").exists());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn check_versions_reports_tags_and_channels() {
    let root = test_root();
    let source = SourceConfig::default();
    let mut routes = HashMap::new();
    routes.insert(
        source.tags_url(),
        br#"[{"name":"3.0.229"},{"name":"3.0.228"}]"#.to_vec(),
    );
    routes.insert(
        source.raw_manifest_url("dev"),
        br#"{"name":"processwire","version":"3.0.240"}"#.to_vec(),
    );
    let dispatcher = dispatcher_with(&root, routes, RuntimeStatus::unconstrained());

    let response = dispatcher.handle(&ActionRequest::new(Action::CheckVersions));
    let json: serde_json::Value =
        serde_json::from_str(&response.to_json()).expect("must be json");
    assert_eq!(json["success"], true);
    assert_eq!(json["versions"]["master"], "3.0.229");
    assert_eq!(json["versions"]["dev"], "3.0.240");
    assert_eq!(json["tags"][1], "3.0.228");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn router_answers_post_at_any_path() {
    let root = test_root();
    let app = server::router(Arc::new(test_dispatcher(&root)));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("must build runtime");

    let body = runtime.block_on(async {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/kickstart.php")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("action=check_files&lang=fr"))
                    .expect("must build request"),
            )
            .await
            .expect("must respond");
        assert_eq!(response.status(), StatusCode::OK);
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("must read body")
    });

    let json: serde_json::Value = serde_json::from_slice(&body).expect("must be json");
    assert_eq!(json["success"], true);
    assert_eq!(json["hasFiles"], false);
    assert_eq!(json["files"], serde_json::json!([]));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn router_status_negotiates_language() {
    let root = test_root();
    let app = server::router(Arc::new(test_dispatcher(&root)));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("must build runtime");

    let body = runtime.block_on(async {
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ACCEPT_LANGUAGE, "de-DE,de;q=0.9,en;q=0.8")
                    .body(Body::empty())
                    .expect("must build request"),
            )
            .await
            .expect("must respond");
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("must read body")
    });

    let json: serde_json::Value = serde_json::from_slice(&body).expect("must be json");
    assert_eq!(json["installed"], false);
    assert_eq!(json["runtimeOk"], true);
    assert_eq!(json["lang"], "de");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn router_turns_malformed_request_into_envelope() {
    let root = test_root();
    let app = server::router(Arc::new(test_dispatcher(&root)));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("must build runtime");

    let body = runtime.block_on(async {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .expect("must build request"),
            )
            .await
            .expect("must respond");
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("must read body")
    });

    let json: serde_json::Value = serde_json::from_slice(&body).expect("must be json");
    assert_eq!(json["success"], false);
    assert_eq!(json["step"], "init");
    assert!(!json["message"].as_str().unwrap_or_default().is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn render_status_line_uses_badge_only_in_rich_mode() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "Download successful."),
        "Download successful."
    );
    let rich = render_status_line(OutputStyle::Rich, "warn", "2 existing entries");
    assert!(rich.contains("[WARN]"));
    assert!(rich.ends_with("2 existing entries"));
}

#[test]
fn response_lines_describe_files_and_versions() {
    let report = kickstart_core::FilesReport::from_entries(vec![
        FileEntry::new("site", EntryKind::Directory),
        FileEntry::new("index.php", EntryKind::File),
    ]);
    assert_eq!(
        format_files_lines(&report),
        vec!["dir  site".to_string(), "file index.php".to_string()]
    );
    assert_eq!(
        format_files_lines(&kickstart_core::FilesReport::from_entries(Vec::new())),
        vec!["install root is empty".to_string()]
    );

    let set = kickstart_core::VersionSet {
        versions: kickstart_core::ChannelVersions {
            master: Some("3.0.229".to_string()),
            dev: None,
        },
        tags: vec!["3.0.229".to_string(), "3.0.228".to_string()],
    };
    assert_eq!(
        format_version_lines(&set),
        vec![
            "master: 3.0.229".to_string(),
            "dev: unknown".to_string(),
            "tags: 3.0.229, 3.0.228".to_string(),
        ]
    );

    let lines = format_response_lines(&ActionResponse::Outcome(
        kickstart_core::ActionOutcome::advance("Download successful.", Step::Extract),
    ));
    assert_eq!(lines, vec!["Download successful.", "next step: extract"]);
}

#[test]
fn confirmation_accepts_only_yes() {
    assert!(parse_confirmation("y\n"));
    assert!(parse_confirmation(" YES "));
    assert!(!parse_confirmation("\n"));
    assert!(!parse_confirmation("nope"));
}

#[test]
fn default_filter_follows_verbosity() {
    assert_eq!(default_filter(0, false), "warn");
    assert_eq!(default_filter(0, true), "info");
    assert_eq!(default_filter(1, false), "info");
    assert_eq!(default_filter(3, false), "debug");
}

#[test]
fn cli_parses_install_and_global_flags() {
    let cli = Cli::try_parse_from([
        "kickstart",
        "install",
        "3.0.229",
        "--yes",
        "--root",
        "/srv/www",
        "-vv",
    ])
    .expect("must parse");

    assert_eq!(cli.root.as_deref(), Some(Path::new("/srv/www")));
    assert_eq!(cli.verbose, 2);
    match cli.command {
        Commands::Install {
            reference,
            yes,
            handoff,
        } => {
            assert_eq!(reference.as_deref(), Some("3.0.229"));
            assert!(yes);
            assert!(!handoff);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn completions_script_names_the_binary() {
    let mut output = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut output)
        .expect("must write completions");
    let script = String::from_utf8(output).expect("must be utf-8");
    assert!(script.contains("kickstart"));
    assert!(script.contains("check-files"));
}

#[test]
fn load_config_rejects_missing_root() {
    let root = test_root().join("missing");
    let err = load_config(Some(root.as_path()), None).expect_err("missing root must fail");
    assert!(err.to_string().contains("install root does not exist"));
}

#[test]
fn load_config_reads_root_config_file() {
    let root = test_root();
    fs::write(
        root.join("kickstart.toml"),
        "[package]\nname = \"Acme\"\n\n[server]\nbind = \"0.0.0.0:9000\"\n",
    )
    .expect("must write config");

    let (config, resolved) = load_config(Some(root.as_path()), None).expect("must load config");
    assert_eq!(config.package.name, "Acme");
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(resolved, root);

    let _ = fs::remove_dir_all(&root);
}
