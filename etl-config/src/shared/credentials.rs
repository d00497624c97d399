use secrecy::SecretString;
use serde::Deserialize;

/// Where the warehouse service account key is fetched from at the start of each run.
///
/// The fetched blob is a service-account JSON document (project id, client email and
/// signing key). A failure to fetch it aborts the whole run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// Read the key from a file on disk.
    File {
        /// Path of the service account key file.
        path: String,
    },
    /// Read the key from an environment variable.
    Env {
        /// Name of the environment variable holding the key.
        var: String,
    },
    /// Use a key embedded in the configuration itself.
    Inline {
        /// The service account key JSON.
        service_account_key: SecretString,
    },
}

impl CredentialsConfig {
    /// Returns the identifier of the secret, used in logs and errors.
    pub fn secret_id(&self) -> &str {
        match self {
            CredentialsConfig::File { path } => path,
            CredentialsConfig::Env { var } => var,
            CredentialsConfig::Inline { .. } => "inline",
        }
    }
}
