// UI layer: terminal-facing pieces around the upload task. A spinner while
// the request is in flight, a hidden token prompt, the `login` flow and
// the coloured status line printed at the end.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::{self, UploadSettings};
use crate::error::UploadError;
use crate::task::{self, Completion};

/// Fill in the token when no flag, env var or config file supplied one:
/// first from the saved token file, then by asking, if stdin is a terminal
/// and prompting is allowed. An empty token is still a valid outcome.
pub fn resolve_token(settings: &mut UploadSettings, allow_prompt: bool) -> Result<()> {
    if !settings.token.is_empty() {
        return Ok(());
    }
    let path = config::token_file_path();
    if let Some(token) = config::load_token(&path) {
        debug!(path = %path.display(), "using saved token");
        settings.token = token;
        return Ok(());
    }
    if allow_prompt && io::stdin().is_tty() {
        settings.token = Password::new()
            .with_prompt("SwaggerHub API token")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read token")?;
    }
    Ok(())
}

/// Run the upload task behind a spinner.
pub fn upload_with_spinner(
    http: &Client,
    settings: &UploadSettings,
) -> std::result::Result<Completion, UploadError> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Uploading {}...", settings.input_file.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = task::run(http, settings);
    spinner.finish_and_clear();
    result
}

/// Ask for a token (unless one was passed) and save it for later runs.
pub fn login(token: Option<String>) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None => Password::new()
            .with_prompt("SwaggerHub API token")
            .interact()
            .context("Failed to read token")?,
    };
    let path = config::token_file_path();
    config::persist_token(&path, token.trim())
        .with_context(|| format!("Failed to save token to {}", path.display()))?;
    println!("{} {}", "Token saved to".green(), path.display());
    Ok(())
}

pub fn print_completion(completion: &Completion) {
    match completion {
        Completion::Uploaded => println!("{}", "Upload successful".green()),
        Completion::Skipped { reason } => {
            println!("{} {}", "Upload skipped:".yellow(), reason)
        }
    }
}

/// `UploadError` messages already embed their cause, so only other errors
/// get the full context chain.
pub fn print_failure(err: &anyhow::Error) {
    if err.downcast_ref::<UploadError>().is_some() {
        eprintln!("{} {}", "error:".red(), err);
    } else {
        eprintln!("{} {:#}", "error:".red(), err);
    }
}
