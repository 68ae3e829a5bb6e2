//! Container image assembly and publication.
//!
//! Renders a Dockerfile layered on the upstream `n8nio/n8n` image, stages a
//! build context in a private temporary directory, and drives the `docker`
//! CLI through [`CommandRunner`] to build and push both the floating
//! `latest` tag and an immutable tag. Registry credentials are materialised
//! as a `config.json` inside a throwaway `DOCKER_CONFIG` directory so the
//! operator's real docker configuration is never touched.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Permissions;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::cloud::RegistryCredentials;
use crate::runner::{CommandOutput, CommandRunner, SpawnError};

/// File mode for the staged registry `config.json`.
const CONFIG_MODE: u32 = 0o600;
/// Name of the credentials file docker expects inside `DOCKER_CONFIG`.
const DOCKER_CONFIG_NAME: &str = "config.json";
/// Monitoring script staged into the build context.
const MONITOR_SCRIPT_NAME: &str = "n8n-monitor.sh";
/// Backup script staged into the build context.
const BACKUP_SCRIPT_NAME: &str = "n8n-backup.sh";

const MONITOR_SCRIPT: &str = include_str!("../ops/n8n-monitor.sh");
const BACKUP_SCRIPT: &str = include_str!("../ops/n8n-backup.sh");

/// Inputs for rendering the image Dockerfile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageSpec {
    /// Upstream n8n version the image is derived from.
    pub base_version: String,
    /// Build instant stamped into the OCI created label.
    pub created: DateTime<Utc>,
    /// Workflow credential encryption key baked into the runtime env.
    pub encryption_key: String,
    /// Basic auth user protecting the editor UI.
    pub basic_auth_user: String,
    /// Basic auth password protecting the editor UI.
    pub basic_auth_pass: String,
}

/// Fully qualified references the image is published under.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageRefs {
    /// Floating `latest` reference.
    pub latest: String,
    /// Immutable reference: the upstream version, or a build timestamp when
    /// the upstream version is itself the floating `latest`.
    pub immutable: String,
}

impl ImageRefs {
    /// Derives the publication references for a registry and version.
    #[must_use]
    pub fn for_publication(
        registry_host: &str,
        registry_name: &str,
        version: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let repository = format!("{registry_host}/{registry_name}/n8n");
        let immutable_tag = if version == "latest" {
            now.format("%Y%m%d%H%M%S").to_string()
        } else {
            version.to_owned()
        };
        Self {
            latest: format!("{repository}:latest"),
            immutable: format!("{repository}:{immutable_tag}"),
        }
    }
}

/// Renders the Dockerfile: upstream base, OS package refresh, the embedded
/// operational scripts, the production runtime environment, and OCI labels.
#[must_use]
pub fn dockerfile(spec: &ImageSpec) -> String {
    let created = spec.created.to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        r#"FROM n8nio/n8n:{version}

USER root
RUN apk upgrade --no-cache && apk add --no-cache curl postgresql-client

COPY {monitor} /usr/local/bin/n8n-monitor
COPY {backup} /usr/local/bin/n8n-backup
RUN chmod 755 /usr/local/bin/n8n-monitor /usr/local/bin/n8n-backup

ENV NODE_ENV=production
ENV N8N_PORT=5678
ENV N8N_PROTOCOL=https
ENV N8N_METRICS=true
ENV N8N_USER_FOLDER=/home/node/.n8n
ENV N8N_ENCRYPTION_KEY="{encryption_key}"
ENV N8N_BASIC_AUTH_ACTIVE=true
ENV N8N_BASIC_AUTH_USER="{basic_auth_user}"
ENV N8N_BASIC_AUTH_PASSWORD="{basic_auth_pass}"
ENV TINI_SUBREAPER=true
ENV N8N_ENFORCE_SETTINGS_FILE_PERMISSIONS=true

LABEL org.opencontainers.image.created="{created}"
LABEL org.opencontainers.image.version="{version}"

USER node
"#,
        version = spec.base_version,
        monitor = MONITOR_SCRIPT_NAME,
        backup = BACKUP_SCRIPT_NAME,
        encryption_key = spec.encryption_key,
        basic_auth_user = spec.basic_auth_user,
        basic_auth_pass = spec.basic_auth_pass,
    )
}

/// Raised when building or publishing the image fails.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Failed to stage the build context or credentials on disk.
    #[error("image workspace error: {message}")]
    Workspace {
        /// What could not be staged.
        message: String,
    },

    /// The registry returned no usable docker credentials.
    #[error("registry returned empty docker credentials")]
    MissingCredentials,

    /// The docker CLI could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// `docker build` exited unsuccessfully.
    #[error("docker build failed with exit status {status}: {output}")]
    Build {
        /// Exit status reported by docker.
        status: String,
        /// Captured diagnostic output.
        output: String,
    },

    /// `docker push` exited unsuccessfully for one of the references.
    #[error("docker push of {reference} failed with exit status {status}: {output}")]
    Push {
        /// Reference that failed to publish.
        reference: String,
        /// Exit status reported by docker.
        status: String,
        /// Captured diagnostic output.
        output: String,
    },
}

/// Builds and pushes the deployment image through the docker CLI.
#[derive(Clone, Debug)]
pub struct ImagePublisher<R> {
    runner: R,
}

impl<R: CommandRunner> ImagePublisher<R> {
    /// Creates a publisher backed by the given command runner.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Builds the image from a staged context and pushes both references.
    ///
    /// The build context and the `DOCKER_CONFIG` directory live in temporary
    /// directories that are removed when publication finishes, successfully
    /// or not. Pushes run in order `latest` then immutable; a failed second
    /// push surfaces as an error even though `latest` has already landed.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] when the credentials are empty, staging fails,
    /// the docker CLI cannot be spawned, or a build/push exits unsuccessfully.
    pub fn publish(
        &self,
        spec: &ImageSpec,
        refs: &ImageRefs,
        credentials: &RegistryCredentials,
    ) -> Result<(), ImageError> {
        if credentials.docker_config_json.is_empty() {
            return Err(ImageError::MissingCredentials);
        }

        let context = temp_dir("build context")?;
        let config = temp_dir("docker config")?;
        let context_path = utf8_temp_path(&context)?;
        let config_path = utf8_temp_path(&config)?;

        write_build_context(&context_path, spec)?;
        write_docker_config(&config_path, credentials)?;

        let env = [(
            OsString::from("DOCKER_CONFIG"),
            OsString::from(config_path.as_str()),
        )];

        tracing::info!(reference = %refs.latest, version = %spec.base_version, "building image");
        let build = self
            .runner
            .run_with_env("docker", &build_args(refs, &context_path), &env)?;
        if !build.is_success() {
            return Err(ImageError::Build {
                status: build.status_text(),
                output: diagnostic_text(&build),
            });
        }

        for reference in [&refs.latest, &refs.immutable] {
            tracing::info!(reference = %reference, "pushing image");
            let push = self.runner.run_with_env(
                "docker",
                &[OsString::from("push"), OsString::from(reference.as_str())],
                &env,
            )?;
            if !push.is_success() {
                return Err(ImageError::Push {
                    reference: (*reference).clone(),
                    status: push.status_text(),
                    output: diagnostic_text(&push),
                });
            }
        }

        Ok(())
    }
}

fn temp_dir(purpose: &str) -> Result<tempfile::TempDir, ImageError> {
    tempfile::tempdir().map_err(|err| ImageError::Workspace {
        message: format!("{purpose}: {err}"),
    })
}

fn utf8_temp_path(dir: &tempfile::TempDir) -> Result<Utf8PathBuf, ImageError> {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| ImageError::Workspace {
        message: format!("temporary path {} is not valid UTF-8", path.display()),
    })
}

fn write_build_context(path: &Utf8Path, spec: &ImageSpec) -> Result<(), ImageError> {
    let dir = open_dir(path)?;
    stage(&dir, "Dockerfile", &dockerfile(spec))?;
    stage(&dir, MONITOR_SCRIPT_NAME, MONITOR_SCRIPT)?;
    stage(&dir, BACKUP_SCRIPT_NAME, BACKUP_SCRIPT)?;
    Ok(())
}

fn write_docker_config(
    path: &Utf8Path,
    credentials: &RegistryCredentials,
) -> Result<(), ImageError> {
    let dir = open_dir(path)?;
    stage(&dir, DOCKER_CONFIG_NAME, &credentials.docker_config_json)?;
    dir.set_permissions(DOCKER_CONFIG_NAME, file_mode(CONFIG_MODE))
        .map_err(|err| workspace_error(DOCKER_CONFIG_NAME, &err))?;
    Ok(())
}

fn open_dir(path: &Utf8Path) -> Result<Dir, ImageError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| workspace_error(path.as_str(), &err))
}

fn stage(dir: &Dir, name: &str, contents: &str) -> Result<(), ImageError> {
    dir.write(name, contents)
        .map_err(|err| workspace_error(name, &err))
}

fn workspace_error(name: &str, err: &std::io::Error) -> ImageError {
    ImageError::Workspace {
        message: format!("{name}: {err}"),
    }
}

fn file_mode(bits: u32) -> Permissions {
    use std::os::unix::fs::PermissionsExt;

    Permissions::from_std(std::fs::Permissions::from_mode(bits))
}

fn build_args(refs: &ImageRefs, context: &Utf8Path) -> Vec<OsString> {
    vec![
        OsString::from("build"),
        OsString::from("-t"),
        OsString::from(refs.latest.as_str()),
        OsString::from("-t"),
        OsString::from(refs.immutable.as_str()),
        OsString::from(context.as_str()),
    ]
}

fn diagnostic_text(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_owned()
    } else {
        stderr.to_owned()
    }
}
