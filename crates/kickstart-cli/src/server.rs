use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{header, HeaderMap};
use axum::routing::get;
use axum::{Json, Router};
use kickstart_core::{ActionOutcome, Lang, Step};
use serde::Serialize;

use crate::dispatch::{ActionRequest, ActionResponse, Dispatcher};

/// Initial wizard parameters for a browser client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WizardStatus {
    pub(crate) installed: bool,
    pub(crate) runtime_ok: bool,
    pub(crate) runtime_version: Option<String>,
    pub(crate) lang: Lang,
}

pub(crate) fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(wizard_status).post(run_action))
        .route("/{*path}", get(wizard_status).post(run_action))
        .with_state(dispatcher)
}

async fn wizard_status(
    State(dispatcher): State<Arc<Dispatcher>>,
    headers: HeaderMap,
) -> Json<WizardStatus> {
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    Json(WizardStatus {
        installed: dispatcher.is_installed(),
        runtime_ok: dispatcher.runtime().satisfied,
        runtime_version: dispatcher.runtime().detected.clone(),
        lang: Lang::negotiate(accept_language),
    })
}

async fn run_action(
    State(dispatcher): State<Arc<Dispatcher>>,
    form: Result<Form<ActionRequest>, FormRejection>,
) -> Json<ActionResponse> {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected action request");
            return Json(ActionResponse::Outcome(ActionOutcome::failed(
                rejection.body_text(),
                Some(Step::Init),
            )));
        }
    };

    let worker = Arc::clone(&dispatcher);
    match tokio::task::spawn_blocking(move || worker.handle(&request)).await {
        Ok(response) => Json(response),
        Err(err) => {
            tracing::error!(error = %err, "action worker panicked");
            Json(ActionResponse::Outcome(ActionOutcome::failed(
                format!("action worker failed: {err}"),
                Some(Step::Init),
            )))
        }
    }
}

pub(crate) fn serve(dispatcher: Dispatcher, bind: &str) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(serve_until_shutdown(Arc::new(dispatcher), bind))
}

async fn serve_until_shutdown(dispatcher: Arc<Dispatcher>, bind: &str) -> Result<()> {
    let root = dispatcher.installer().layout().root().display().to_string();
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to read listener address")?;
    tracing::info!(%local_addr, %root, "action endpoint listening");
    println!("serving {root} on http://{local_addr}/");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("action endpoint failed")?;
    tracing::info!("action endpoint stopped");
    Ok(())
}
