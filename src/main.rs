// Entrypoint for the CLI.
// - Keeps `main` small: resolve settings, build the HTTP client and hand
//   both to the task.
// - Exit code 0 covers skipped failures; 1 is a fatal upload failure and
//   2 a configuration problem found before anything was sent.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swaggerhub_upload::api::{self, DefinitionFormat, Protocol};
use swaggerhub_upload::config::{self, SettingsOverlay, UploadSettings, DEFAULT_MARKER_FILE};
use swaggerhub_upload::{ui, UploadError};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "swaggerhub-upload", version)]
#[command(about = "Upload an OpenAPI definition to SwaggerHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Commands>,

    #[command(flatten)]
    upload: UploadArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a registry token for later uploads.
    Login {
        #[arg(long, env = "SWAGGERHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

#[derive(Args)]
struct UploadArgs {
    /// Config file (default: swaggerhub.toml in the project directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding Cargo.toml and swaggerhub.toml.
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    #[arg(long, env = "SWAGGERHUB_OWNER")]
    owner: Option<String>,

    #[arg(long, env = "SWAGGERHUB_API")]
    api: Option<String>,

    /// Defaults to the project's Cargo.toml version.
    #[arg(long, env = "SWAGGERHUB_VERSION")]
    api_version: Option<String>,

    /// Sent verbatim as the Authorization header.
    #[arg(long, env = "SWAGGERHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "SWAGGERHUB_INPUT_FILE")]
    input_file: Option<PathBuf>,

    #[arg(long, env = "SWAGGERHUB_SKIP_ON_ERROR")]
    skip_on_error: Option<bool>,

    #[arg(long, value_enum, env = "SWAGGERHUB_FORMAT")]
    format: Option<DefinitionFormat>,

    #[arg(long, env = "SWAGGERHUB_PRIVATE")]
    private: Option<bool>,

    #[arg(long, env = "SWAGGERHUB_HOST")]
    host: Option<String>,

    #[arg(long, env = "SWAGGERHUB_PORT")]
    port: Option<u16>,

    #[arg(long, value_enum, env = "SWAGGERHUB_PROTOCOL")]
    protocol: Option<Protocol>,

    /// Request timeout in seconds (default: none).
    #[arg(long = "timeout", env = "SWAGGERHUB_TIMEOUT")]
    timeout_secs: Option<u64>,

    /// Write a timestamp marker after the task runs. Relative paths resolve
    /// against the project directory.
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_MARKER_FILE)]
    marker: Option<PathBuf>,

    /// Never ask for a token interactively.
    #[arg(long)]
    no_prompt: bool,
}

impl UploadArgs {
    fn overlay(&self) -> SettingsOverlay {
        SettingsOverlay {
            owner: self.owner.clone(),
            api: self.api.clone(),
            version: self.api_version.clone(),
            token: self.token.clone(),
            input_file: self.input_file.clone(),
            skip_on_error: self.skip_on_error,
            format: self.format,
            private: self.private,
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol,
            timeout_secs: self.timeout_secs,
            marker_file: self.marker.clone(),
        }
    }

    fn resolve(&self) -> Result<UploadSettings> {
        let (config_path, required) = match &self.config {
            Some(path) => (path.clone(), true),
            None => (self.project_dir.join(config::CONFIG_FILE_NAME), false),
        };

        let mut settings = UploadSettings::for_project(&self.project_dir);
        settings.apply(config::load_config_file(&config_path, required)?);
        settings.apply(self.overlay().rebase_marker(&self.project_dir));
        ui::resolve_token(&mut settings, !self.no_prompt)?;
        Ok(settings)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_upload(args: &UploadArgs) -> Result<()> {
    let settings = args.resolve()?;
    let http = api::http_client().context("Failed to build HTTP client")?;
    let completion = ui::upload_with_spinner(&http, &settings)?;
    ui::print_completion(&completion);
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<UploadError>() {
        Some(UploadError::Config(_)) => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.cmd {
        Some(Commands::Login { token }) => ui::login(token),
        None => run_upload(&cli.upload),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::print_failure(&err);
            ExitCode::from(exit_code(&err))
        }
    }
}
