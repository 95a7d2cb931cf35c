//! services/juris/src/bin/juris.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use juris_core::domain::{Attachment, Credentials, PetitionRequest};
use juris_lib::{
    adapters::GeminiAdapter,
    ai::AiGateway,
    backend::Backend,
    config::Config,
    error::AppError,
    state::AppState,
    workflow::Shell,
};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: juris <status|draft <case.json>>";
const DEMO_LOGIN: &str = "demo@juris.app";

/// A case file for `juris draft`: the petition form plus the documents to
/// analyze, relative to the case file.
#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(flatten)]
    request: PetitionRequest,
    documents: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("{}", err);
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded.");

    // --- 2. Connect the Backend and the AI Provider ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let backend = Backend::connect(&config, http.clone()).await?;
    let provider = Arc::new(GeminiAdapter::new(
        http,
        config.gemini_api_base.clone(),
        config.gemini_api_key.clone(),
    ));
    let ai = AiGateway::from_config(provider, &config);
    if !ai.has_key() {
        info!("GEMINI_API_KEY is not set; drafting is disabled.");
    }

    // --- 3. Build the Shared AppState ---
    let state = AppState::new(backend, ai, config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("status") => status(state).await,
        Some("draft") => {
            let path = args
                .get(1)
                .ok_or_else(|| AppError::Internal(USAGE.to_string()))?;
            draft(state, Path::new(path)).await
        }
        _ => Err(AppError::Internal(USAGE.to_string())),
    }
}

async fn status(state: AppState) -> Result<(), AppError> {
    println!("backend: {}", state.backend.mode());
    println!(
        "ai: {} ({})",
        if state.ai.has_key() { "available" } else { "missing key" },
        state.ai.model()
    );

    let mut shell = Shell::new(state);
    shell.sync_auth().await?;
    match (shell.profile(), shell.usage()) {
        (Some(profile), Some(usage)) => {
            println!("user: {} <{}> [{:?}]", profile.full_name, profile.email, profile.account_status);
            println!("usage: {}/{}", usage.used_this_month, usage.monthly_limit);
        }
        _ => println!("user: signed out"),
    }
    Ok(())
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Runs the petition wizard end to end for the signed-in user, signing in
/// the demo account when nobody is.
async fn draft(state: AppState, case_path: &Path) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(case_path).await?;
    let case: CaseFile = serde_json::from_str(&raw)?;
    if case.documents.is_empty() {
        return Err(AppError::Internal(
            "the case file must list at least one document".to_string(),
        ));
    }

    if state.backend.auth().get_session().await.is_none() {
        info!("No active session; signing in the demo account.");
        state
            .backend
            .auth()
            .sign_in_with_password(Credentials {
                email: DEMO_LOGIN.to_string(),
                password: String::new(),
            })
            .await?;
    }

    let mut shell = Shell::new(state);
    shell.sync_auth().await?;
    let mut wizard = shell.open_petition_wizard()?;

    *wizard.form_mut() = case.request;
    wizard.next()?;

    let base = case_path.parent().unwrap_or_else(|| Path::new("."));
    for document in &case.documents {
        let path = base.join(document);
        let data = tokio::fs::read(&path).await?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("documento")
            .to_string();
        wizard.add_document(Attachment::new(name, mime_for(&path), data))?;
    }
    let extracted = wizard.extract().await?;
    info!(plaintiff = %extracted.plaintiff_name, "Documents analyzed.");

    wizard.next()?;
    wizard.next()?;
    wizard.generate().await?;
    wizard.next()?;
    let petition = wizard.save().await?;

    if let Some(exit) = wizard.exit() {
        shell.finish_wizard(exit).await?;
    }
    println!("saved petition {}", petition.id);
    if let Some(usage) = shell.usage() {
        println!("usage: {}/{}", usage.used_this_month, usage.monthly_limit);
    }
    Ok(())
}
