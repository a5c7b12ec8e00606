mod command_flows;
mod completion;
mod dispatch;
mod install_flow;
mod logging;
mod render;
mod server;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use kickstart_core::{KickstartConfig, Lang};
use kickstart_installer::{detect_runtime, Installer};

use command_flows::run_action_command;
use completion::{write_completions_script, CliCompletionShell};
use dispatch::{Action, ActionRequest, Dispatcher};
use install_flow::{prompt_overwrite, run_install_flow, InstallOptions};
use render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(name = "kickstart")]
#[command(about = "Single-file web installer for ProcessWire", long_about = None)]
pub(crate) struct Cli {
    /// Install root. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Config file. Defaults to `<root>/kickstart.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Language of backend messages: en, de, es, fr.
    #[arg(long, global = true)]
    lang: Option<String>,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the action endpoint for a browser wizard.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    Versions {
        #[arg(long)]
        json: bool,
    },
    CheckFiles {
        #[arg(long)]
        json: bool,
    },
    Download {
        reference: String,
        #[arg(long)]
        json: bool,
    },
    Extract {
        reference: String,
        #[arg(long)]
        json: bool,
    },
    Cleanup {
        #[arg(long)]
        json: bool,
    },
    /// Download and extract in one go.
    Install {
        reference: Option<String>,
        /// Overwrite existing entries without asking.
        #[arg(long)]
        yes: bool,
        /// Remove the installer once the package is in place.
        #[arg(long)]
        handoff: bool,
    },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}

fn run_cli(cli: Cli) -> Result<()> {
    logging::init_logging(cli.verbose, matches!(cli.command, Commands::Serve { .. }));

    if let Commands::Completions { shell } = cli.command {
        return write_completions_script(shell, &mut std::io::stdout().lock());
    }

    let (config, root) = load_config(cli.root.as_deref(), cli.config.as_deref())?;
    let lang = Lang::from_code(cli.lang.as_deref());
    let dispatcher = build_dispatcher(&config, &root);
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(dispatcher, &bind)?;
        }
        Commands::Versions { json } => {
            let request = ActionRequest::new(Action::CheckVersions).with_lang(lang);
            run_action_command(&dispatcher, &request, json, renderer)?;
        }
        Commands::CheckFiles { json } => {
            let request = ActionRequest::new(Action::CheckFiles).with_lang(lang);
            run_action_command(&dispatcher, &request, json, renderer)?;
        }
        Commands::Download { reference, json } => {
            let request = ActionRequest::new(Action::Download)
                .with_branch(reference)
                .with_lang(lang);
            run_action_command(&dispatcher, &request, json, renderer)?;
        }
        Commands::Extract { reference, json } => {
            let request = ActionRequest::new(Action::Extract)
                .with_branch(reference)
                .with_lang(lang);
            run_action_command(&dispatcher, &request, json, renderer)?;
        }
        Commands::Cleanup { json } => {
            let request = ActionRequest::new(Action::Cleanup).with_lang(lang);
            run_action_command(&dispatcher, &request, json, renderer)?;
        }
        Commands::Install {
            reference,
            yes,
            handoff,
        } => {
            let options = InstallOptions {
                reference,
                assume_yes: yes,
                handoff,
                handoff_url: config.package.handoff_url.clone(),
                lang,
            };
            run_install_flow(&dispatcher, &options, renderer, &mut prompt_overwrite)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Resolves the config and the install root. `--root` wins over
/// `install.root`, which wins over the working directory.
fn load_config(
    root_flag: Option<&Path>,
    config_flag: Option<&Path>,
) -> Result<(KickstartConfig, PathBuf)> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let lookup_root = root_flag
        .map(|root| cwd.join(root))
        .unwrap_or_else(|| cwd.clone());
    let config = KickstartConfig::discover(config_flag, &lookup_root)?;

    let root = match (root_flag, config.install.root.as_deref()) {
        (Some(_), _) => lookup_root,
        (None, Some(configured)) => cwd.join(configured),
        (None, None) => cwd,
    };
    if !root.is_dir() {
        return Err(anyhow!("install root does not exist: {}", root.display()));
    }
    Ok((config, root))
}

fn build_dispatcher(config: &KickstartConfig, root: &Path) -> Dispatcher {
    let mut config = config.clone();
    if config.install.self_name.is_none() {
        config.install.self_name = std::env::current_exe()
            .ok()
            .and_then(|exe| installer_name_in_root(&exe, root));
    }
    tracing::debug!(
        root = %root.display(),
        self_name = config.install.self_name.as_deref().unwrap_or("-"),
        "install root resolved"
    );

    let runtime = detect_runtime(&config.runtime);
    if !runtime.satisfied {
        tracing::warn!(runtime = %runtime.describe(), "runtime requirement not met");
    }
    let installer = Installer::from_config(&config, root);
    Dispatcher::new(installer, config.package.name.clone(), runtime)
}

/// File name of `exe` when it lives directly in `root`. An installer run from
/// elsewhere has nothing in the root to protect or remove.
fn installer_name_in_root(exe: &Path, root: &Path) -> Option<String> {
    let exe_dir = exe.parent()?.canonicalize().ok()?;
    if exe_dir != root.canonicalize().ok()? {
        return None;
    }
    exe.file_name().map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests;
