use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ErrorKind, EtlResult};
use crate::{bail, etl_error};

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: String,
    client_email: String,
    private_key: String,
}

/// A parsed service account key.
///
/// The raw JSON document is kept next to the parsed fields since warehouse clients and token
/// authenticators consume the key in its original form.
#[derive(Debug, Clone)]
pub struct ServiceAccountCredentials {
    project_id: String,
    client_email: String,
    key: SecretString,
}

impl ServiceAccountCredentials {
    /// Parses a service account JSON key.
    pub fn parse(key: SecretString) -> EtlResult<Self> {
        let parsed: ServiceAccountKey =
            serde_json::from_str(key.expose_secret()).map_err(|err| {
                // The serde error may quote parts of the key, so it is not attached.
                etl_error!(
                    ErrorKind::CredentialsError,
                    "Service account key is not valid JSON",
                    format!("line {}, column {}", err.line(), err.column())
                )
            })?;

        if parsed.project_id.is_empty() || parsed.private_key.is_empty() {
            bail!(
                ErrorKind::CredentialsError,
                "Service account key is incomplete",
                format!("key of `{}` misses its project id or private key", parsed.client_email)
            );
        }

        Ok(Self {
            project_id: parsed.project_id,
            client_email: parsed.client_email,
            key,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Returns the raw JSON key.
    pub fn key(&self) -> &SecretString {
        &self.key
    }
}
