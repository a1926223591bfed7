//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `buildbay.toml` discovered through the usual
//! search order, and `BUILDBAY_*` environment variables.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::revision::DEFAULT_GITHUB_API_URL;
use crate::simulator::{DEFAULT_OPEN_BIN, DEFAULT_XCRUN_BIN};
use crate::storage::DEFAULT_GCS_API_URL;

/// Default cache and catalog directory.
pub const DEFAULT_WORKDIR: &str = "~/.buildbay";

/// Default app catalog file name, relative to the workdir.
pub const DEFAULT_APPS_FILE: &str = "apps.toml";

/// Default timeout applied to every storage and revision request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

const CONFIG_FILE_NAME: &str = "buildbay.toml";

/// Settings for the build cache, the app catalog, and the collaborators.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BUILDBAY",
    discovery(
        app_name = "buildbay",
        env_var = "BUILDBAY_CONFIG_PATH",
        config_file_name = "buildbay.toml",
        dotfile_name = ".buildbay.toml",
        project_file_name = "buildbay.toml"
    )
)]
pub struct BuildbayConfig {
    /// Root of the build cache. Supports tilde expansion.
    #[ortho_config(default = DEFAULT_WORKDIR.to_owned())]
    pub workdir: String,
    /// App catalog file. Relative paths are resolved against the workdir.
    #[ortho_config(default = DEFAULT_APPS_FILE.to_owned())]
    pub apps_file: String,
    /// Seconds before a storage or revision request is abandoned.
    #[ortho_config(default = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
    /// Token used for GitHub API requests. Optional for public repositories.
    pub github_token: Option<String>,
    /// GitHub REST endpoint.
    #[ortho_config(default = DEFAULT_GITHUB_API_URL.to_owned())]
    pub github_api_url: String,
    /// Google Cloud Storage JSON API endpoint.
    #[ortho_config(default = DEFAULT_GCS_API_URL.to_owned())]
    pub gcs_api_url: String,
    /// OAuth token for Google Cloud Storage. Optional for public buckets.
    pub gcs_token: Option<String>,
    /// Directory served by the `local` storage provider, one subdirectory
    /// per bucket. The provider is only registered when this is set.
    pub local_storage_root: Option<String>,
    /// Path to the `xcrun` executable.
    #[ortho_config(default = DEFAULT_XCRUN_BIN.to_owned())]
    pub xcrun_bin: String,
    /// Path to the `open` executable.
    #[ortho_config(default = DEFAULT_OPEN_BIN.to_owned())]
    pub open_bin: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl BuildbayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to {CONFIG_FILE_NAME}",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn require_optional_field(
        value: Option<&str>,
        metadata: &FieldMetadata,
    ) -> Result<(), ConfigError> {
        value.map_or(Ok(()), |present| Self::require_field(present, metadata))
    }

    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("buildbay")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and the TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for empty values and
    /// [`ConfigError::InvalidValue`] for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                self.workdir.as_str(),
                FieldMetadata::new("working directory", "BUILDBAY_WORKDIR", "workdir"),
            ),
            (
                self.apps_file.as_str(),
                FieldMetadata::new("app catalog file", "BUILDBAY_APPS_FILE", "apps_file"),
            ),
            (
                self.github_api_url.as_str(),
                FieldMetadata::new(
                    "GitHub API URL",
                    "BUILDBAY_GITHUB_API_URL",
                    "github_api_url",
                ),
            ),
            (
                self.gcs_api_url.as_str(),
                FieldMetadata::new(
                    "Cloud Storage API URL",
                    "BUILDBAY_GCS_API_URL",
                    "gcs_api_url",
                ),
            ),
            (
                self.xcrun_bin.as_str(),
                FieldMetadata::new("xcrun executable", "BUILDBAY_XCRUN_BIN", "xcrun_bin"),
            ),
            (
                self.open_bin.as_str(),
                FieldMetadata::new("open executable", "BUILDBAY_OPEN_BIN", "open_bin"),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }

        Self::require_optional_field(
            self.local_storage_root.as_deref(),
            &FieldMetadata::new(
                "local storage root",
                "BUILDBAY_LOCAL_STORAGE_ROOT",
                "local_storage_root",
            ),
        )?;

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "HTTP timeout must be at least one second: set BUILDBAY_HTTP_TIMEOUT_SECS or \
                 http_timeout_secs in {CONFIG_FILE_NAME}"
            )));
        }
        Ok(())
    }

    /// Root of the build cache with `~` expanded.
    #[must_use]
    pub fn workdir_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(expand_tilde(&self.workdir))
    }

    /// Location of the app catalog.
    #[must_use]
    pub fn apps_file_path(&self) -> Utf8PathBuf {
        let expanded = Utf8PathBuf::from(expand_tilde(&self.apps_file));
        if expanded.is_absolute() {
            expanded
        } else {
            self.workdir_path().join(expanded)
        }
    }

    /// Directory served by the local storage provider, if configured.
    #[must_use]
    pub fn local_storage_path(&self) -> Option<Utf8PathBuf> {
        self.local_storage_root
            .as_deref()
            .map(|root| Utf8PathBuf::from(expand_tilde(root)))
    }

    /// Timeout applied to network requests.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Expands a leading `~/` using `HOME`.
///
/// Paths are returned unchanged when they do not start with `~/` or when
/// `HOME` is unset.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is out of range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Invalid
    }
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
