//! SSH key reconciliation.

use camino::{Utf8Path, Utf8PathBuf};

use super::{ReconcileError, Reconciler, api_error};
use crate::cloud::{CloudApi, SshKey};
use crate::keymat;

impl<A: CloudApi> Reconciler<A> {
    /// Ensures the deployment's SSH key is registered with the account.
    ///
    /// Matches the account inventory by fingerprint. When absent, reads the
    /// public half from `<key_path>.pub` and registers it as
    /// `{droplet_name}-key`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when the inventory cannot be listed, the
    /// public key file cannot be read, or registration fails.
    pub async fn ensure_ssh_key(
        &self,
        fingerprint: &str,
        droplet_name: &str,
        key_path: &Utf8Path,
    ) -> Result<SshKey, ReconcileError> {
        let keys = self
            .api()
            .list_ssh_keys()
            .await
            .map_err(|err| api_error("list ssh keys", err))?;
        if let Some(key) = keys.into_iter().find(|key| key.fingerprint == fingerprint) {
            tracing::debug!(id = key.id, name = %key.name, "ssh key already registered");
            return Ok(key);
        }

        let public_path = Utf8PathBuf::from(format!("{key_path}.pub"));
        let public_key =
            keymat::read_to_string_ambient(&public_path).map_err(|message| {
                ReconcileError::PublicKey {
                    path: public_path.into_string(),
                    message,
                }
            })?;

        let name = format!("{droplet_name}-key");
        tracing::info!(%name, "registering ssh key");
        self.api()
            .create_ssh_key(&name, public_key.trim())
            .await
            .map_err(|err| api_error("create ssh key", err))
    }
}
