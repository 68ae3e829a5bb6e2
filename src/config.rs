//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

const FALLBACK_HOME: &str = "/home/runner";

/// Deployment parameters merged from defaults, `dockhand.toml`, and
/// `DOCKHAND_*` environment variables. Loaded once at startup and passed
/// explicitly to every component.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "DOCKHAND")]
pub struct DeployConfig {
    /// Provider API token. Required.
    pub api_token: String,
    /// Container registry endpoint images are pushed to and pulled from.
    #[ortho_config(default = "registry.digitalocean.com".to_owned())]
    pub registry_url: String,
    /// Droplet name; also the stem for the VPC, firewall, and key names.
    #[ortho_config(default = "n8n-production".to_owned())]
    pub droplet_name: String,
    /// Fingerprint of the SSH key droplets are provisioned with. Required.
    pub ssh_key_fingerprint: String,
    /// Fully qualified domain the stack is served on. Required.
    pub domain: String,
    /// n8n version used as the image base tag.
    #[ortho_config(default = "latest".to_owned())]
    pub n8n_version: String,
    /// Webhook the monitoring script posts alerts to.
    pub slack_webhook: Option<String>,
    /// Email address the monitoring script sends alerts to.
    pub alert_email: Option<String>,
    /// n8n credential encryption key. Required.
    pub encryption_key: String,
    /// Basic-auth user protecting the n8n UI.
    #[ortho_config(default = "admin".to_owned())]
    pub basic_auth_user: String,
    /// Basic-auth password protecting the n8n UI.
    #[ortho_config(default = "n8n-admin".to_owned())]
    pub basic_auth_pass: String,
    /// Email mode rendered into the runtime environment file.
    pub email_mode: Option<String>,
    /// Path of the private key used for droplet SSH. Defaults to
    /// `~/.ssh/id_rsa` under `$HOME`.
    pub ssh_key_path: Option<String>,
    /// Inline PEM private key material, installed to `ssh_key_path` before
    /// any remote call. Useful in CI where the key arrives as a secret.
    pub ssh_private_key: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

const REQUIRED_FIELDS: [FieldMetadata; 4] = [
    FieldMetadata::new("provider API token", "DOCKHAND_API_TOKEN", "api_token"),
    FieldMetadata::new(
        "SSH key fingerprint",
        "DOCKHAND_SSH_KEY_FINGERPRINT",
        "ssh_key_fingerprint",
    ),
    FieldMetadata::new("deployment domain", "DOCKHAND_DOMAIN", "domain"),
    FieldMetadata::new(
        "n8n encryption key",
        "DOCKHAND_ENCRYPTION_KEY",
        "encryption_key",
    ),
];

impl DeployConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("dockhand")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    fn required_values(&self) -> [&str; 4] {
        [
            &self.api_token,
            &self.ssh_key_fingerprint,
            &self.domain,
            &self.encryption_key,
        ]
    }

    /// Performs semantic validation. Every missing required field is
    /// reported in a single error, with guidance on how to provide it via
    /// environment or configuration file, before any cloud call is issued.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFields`] listing each empty required
    /// field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<String> = self
            .required_values()
            .iter()
            .zip(REQUIRED_FIELDS.iter())
            .filter(|(value, _)| value.trim().is_empty())
            .map(|(_, metadata)| {
                format!(
                    "missing {}: set {} or add {} to dockhand.toml",
                    metadata.description, metadata.env_var, metadata.toml_key
                )
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields(missing))
        }
    }

    /// Resolves the SSH private key path, falling back to `~/.ssh/id_rsa`.
    #[must_use]
    pub fn resolved_ssh_key_path(&self) -> Utf8PathBuf {
        self.ssh_key_path
            .as_deref()
            .map_or_else(default_ssh_key_path, absolute_key_path)
    }

    /// Email mode for the rendered environment file, defaulting to `false`.
    #[must_use]
    pub fn email_mode_or_default(&self) -> String {
        self.email_mode
            .clone()
            .filter(|mode| !mode.trim().is_empty())
            .unwrap_or_else(|| String::from("false"))
    }
}

fn home_dir() -> Utf8PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| String::from(FALLBACK_HOME));
    Utf8PathBuf::from(home)
}

fn default_ssh_key_path() -> Utf8PathBuf {
    home_dir().join(".ssh").join("id_rsa")
}

fn absolute_key_path(path: &str) -> Utf8PathBuf {
    let candidate = Utf8PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        home_dir().join(candidate)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates one or more required configuration fields are empty.
    #[error("missing required configuration: {}", .0.join("; "))]
    MissingFields(Vec<String>),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
