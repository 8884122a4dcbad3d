// Option resolution for the upload task.
//
// Layers, lowest to highest: built-in defaults, the project config file
// (`swaggerhub.toml`, table `[swaggerhub_upload]`), then environment and
// command-line flags (merged by clap in the binary). Every layer is a
// `SettingsOverlay`; `UploadSettings::apply` folds one on top of another.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::api::{
    ClientConfig, DefinitionFormat, Protocol, UploadRequest, DEFAULT_HOST, DEFAULT_PORT,
};
use crate::error::{Result, UploadError};

/// Config file looked up in the project directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "swaggerhub.toml";

/// Where `--marker` writes when no path is given.
pub const DEFAULT_MARKER_FILE: &str = "target/tmp/swaggerhub/uploadPlugin";

const TOKEN_FILE_NAME: &str = ".swaggerhub_token";

/// Fully resolved options for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub owner: String,
    pub api: String,
    pub version: String,
    pub token: String,
    pub input_file: PathBuf,
    pub skip_on_error: bool,
    pub format: DefinitionFormat,
    pub private: bool,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub timeout: Option<Duration>,
    pub marker_file: Option<PathBuf>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            owner: String::new(),
            api: String::new(),
            version: String::new(),
            token: String::new(),
            input_file: PathBuf::new(),
            skip_on_error: true,
            format: DefinitionFormat::Json,
            private: true,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::Https,
            timeout: None,
            marker_file: None,
        }
    }
}

/// A partial set of options from one source. `None` leaves the value below untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsOverlay {
    pub owner: Option<String>,
    pub api: Option<String>,
    pub version: Option<String>,
    pub token: Option<String>,
    pub input_file: Option<PathBuf>,
    pub skip_on_error: Option<bool>,
    pub format: Option<DefinitionFormat>,
    pub private: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<Protocol>,
    pub timeout_secs: Option<u64>,
    pub marker_file: Option<PathBuf>,
}

impl SettingsOverlay {
    /// Resolve relative file paths against `dir`.
    pub fn rebase(mut self, dir: &Path) -> Self {
        self.input_file = self.input_file.map(|p| rebase_path(dir, p));
        self.rebase_marker(dir)
    }

    /// Resolve only a relative marker path against `dir`. The marker lives
    /// in the project's build directory wherever the tool is run from.
    pub fn rebase_marker(mut self, dir: &Path) -> Self {
        self.marker_file = self.marker_file.map(|p| rebase_path(dir, p));
        self
    }
}

fn rebase_path(dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        dir.join(path)
    } else {
        path
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    swaggerhub_upload: SettingsOverlay,
}

impl UploadSettings {
    /// Defaults with `version` taken from the enclosing project, if any.
    pub fn for_project(project_dir: &Path) -> Self {
        UploadSettings {
            version: project_version(project_dir).unwrap_or_default(),
            ..UploadSettings::default()
        }
    }

    pub fn apply(&mut self, overlay: SettingsOverlay) {
        let SettingsOverlay {
            owner,
            api,
            version,
            token,
            input_file,
            skip_on_error,
            format,
            private,
            host,
            port,
            protocol,
            timeout_secs,
            marker_file,
        } = overlay;

        if let Some(v) = owner {
            self.owner = v;
        }
        if let Some(v) = api {
            self.api = v;
        }
        if let Some(v) = version {
            self.version = v;
        }
        if let Some(v) = token {
            self.token = v;
        }
        if let Some(v) = input_file {
            self.input_file = v;
        }
        if let Some(v) = skip_on_error {
            self.skip_on_error = v;
        }
        if let Some(v) = format {
            self.format = v;
        }
        if let Some(v) = private {
            self.private = v;
        }
        if let Some(v) = host {
            self.host = v;
        }
        if let Some(v) = port {
            self.port = v;
        }
        if let Some(v) = protocol {
            self.protocol = v;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(v) = marker_file {
            self.marker_file = Some(v);
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol,
            auth_token: self.token.clone(),
            format: self.format,
            timeout: self.timeout,
        }
    }

    pub fn upload_request(&self, content: String) -> UploadRequest {
        UploadRequest {
            api: self.api.clone(),
            owner: self.owner.clone(),
            version: self.version.clone(),
            content,
            private: self.private,
        }
    }
}

/// Load the `[swaggerhub_upload]` table from a config file.
///
/// A missing file is only an error when `required` is set (an explicit
/// `--config`). Relative paths inside the file resolve against its directory.
pub fn load_config_file(path: &Path, required: bool) -> Result<SettingsOverlay> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file");
            return Ok(SettingsOverlay::default());
        }
        Err(e) => {
            return Err(UploadError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let file: ConfigFile = toml::from_str(&text)
        .map_err(|e| UploadError::Config(format!("invalid {}: {}", path.display(), e)))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(file.swaggerhub_upload.rebase(dir))
}

/// Version of the enclosing project: `package.version` from `Cargo.toml`
/// in `project_dir`. A package with `version.workspace = true` takes
/// `workspace.package.version` from the nearest manifest, walking up from
/// `project_dir`, that has a `[workspace]` table. A virtual manifest gives
/// its own workspace version.
pub fn project_version(project_dir: &Path) -> Option<String> {
    let manifest = read_manifest(project_dir)?;
    let Some(package) = manifest.get("package") else {
        return workspace_version(&manifest);
    };
    let version = package.get("version")?;
    if let Some(v) = version.as_str() {
        return Some(v.to_string());
    }
    if version.get("workspace").and_then(|w| w.as_bool()) != Some(true) {
        return None;
    }

    let start =
        std::fs::canonicalize(project_dir).unwrap_or_else(|_| project_dir.to_path_buf());
    let root = start
        .ancestors()
        .filter_map(read_manifest)
        .find(|m| m.contains_key("workspace"))?;
    debug!(start = %start.display(), "version inherited from workspace");
    workspace_version(&root)
}

fn read_manifest(dir: &Path) -> Option<toml::Table> {
    let text = std::fs::read_to_string(dir.join("Cargo.toml")).ok()?;
    toml::from_str(&text).ok()
}

fn workspace_version(manifest: &toml::Table) -> Option<String> {
    manifest
        .get("workspace")?
        .get("package")?
        .get("version")?
        .as_str()
        .map(str::to_string)
}

/// Token file in the user's home directory, written by `login`.
pub fn token_file_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(TOKEN_FILE_NAME)
}

/// Persist a registry token for later runs.
pub fn persist_token(path: &Path, token: &str) -> std::io::Result<()> {
    std::fs::write(path, token)
}

/// Load a previously saved token. Surrounding whitespace is dropped.
pub fn load_token(path: &Path) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    let token = data.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
