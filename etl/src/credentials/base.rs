use std::future::Future;

use secrecy::SecretString;

use crate::error::EtlResult;

/// Trait for secret stores holding the warehouse service account key.
pub trait CredentialProvider {
    /// Returns the identifier of the secret, used in logs and errors.
    fn secret_id(&self) -> &str;

    /// Fetches the raw service account key.
    ///
    /// Failures are reported as [`crate::error::ErrorKind::CredentialsError`].
    fn fetch(&self) -> impl Future<Output = EtlResult<SecretString>> + Send;
}
