use etl_config::shared::CredentialsConfig;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::credentials::CredentialProvider;
use crate::error::{ErrorKind, EtlResult};
use crate::{bail, etl_error};

/// Fetches the service account key from the location described by a [`CredentialsConfig`].
#[derive(Debug, Clone)]
pub struct ConfigCredentialProvider {
    config: CredentialsConfig,
}

impl ConfigCredentialProvider {
    pub fn new(config: CredentialsConfig) -> Self {
        Self { config }
    }
}

impl CredentialProvider for ConfigCredentialProvider {
    fn secret_id(&self) -> &str {
        self.config.secret_id()
    }

    async fn fetch(&self) -> EtlResult<SecretString> {
        let key = match &self.config {
            CredentialsConfig::File { path } => {
                tokio::fs::read_to_string(path).await.map_err(|err| {
                    etl_error!(
                        ErrorKind::CredentialsError,
                        "Failed to read the service account key file",
                        format!("path `{path}`"),
                        source: err
                    )
                })?
            }
            CredentialsConfig::Env { var } => std::env::var(var).map_err(|err| {
                etl_error!(
                    ErrorKind::CredentialsError,
                    "Service account key environment variable is not set",
                    format!("variable `{var}`"),
                    source: err
                )
            })?,
            CredentialsConfig::Inline {
                service_account_key,
            } => service_account_key.expose_secret().clone(),
        };

        if key.trim().is_empty() {
            bail!(
                ErrorKind::CredentialsError,
                "Service account key is empty",
                format!("secret `{}`", self.secret_id())
            );
        }

        info!(secret_id = self.secret_id(), "fetched service account key");

        Ok(SecretString::new(key))
    }
}
