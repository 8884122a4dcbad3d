// Library root
// -----------
// This crate uploads an OpenAPI/Swagger definition to SwaggerHub (or any
// registry speaking the same `/apis/{owner}/{api}` endpoint). The binary
// (`main.rs`) wires these modules into a command-line tool.
//
// Module responsibilities:
// - `api`: the upload client, its request/config types and URL building.
// - `config`: option defaults, the `swaggerhub.toml` file and token storage.
// - `task`: read the file, upload once, apply the skip-on-error policy.
// - `ui`: spinner, token prompt and status output for the terminal.
pub mod api;
pub mod config;
pub mod error;
pub mod task;
pub mod ui;

pub use api::{
    ClientConfig, DefinitionFormat, Protocol, UploadClient, UploadOutcome, UploadRequest,
};
pub use config::{SettingsOverlay, UploadSettings};
pub use error::{Result, UploadError};
pub use task::Completion;
