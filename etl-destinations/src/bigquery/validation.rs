use etl::bail;
use etl::error::{ErrorKind, EtlResult};

/// Maximum length of a BigQuery dataset or table identifier.
const BIGQUERY_IDENTIFIER_MAX_LENGTH: usize = 1024;

/// Validates a BigQuery dataset or table identifier.
///
/// Identifiers are sent unquoted in request paths, so only ASCII letters, digits and
/// underscores are accepted.
pub fn validate_identifier(kind: &'static str, identifier: &str) -> EtlResult<()> {
    if identifier.is_empty() || identifier.len() > BIGQUERY_IDENTIFIER_MAX_LENGTH {
        bail!(
            ErrorKind::ConfigError,
            "Invalid BigQuery identifier length",
            format!(
                "{kind} `{identifier}` must be between 1 and {BIGQUERY_IDENTIFIER_MAX_LENGTH} characters"
            )
        );
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!(
            ErrorKind::ConfigError,
            "Invalid BigQuery identifier",
            format!("{kind} `{identifier}` may only contain letters, digits and underscores")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("table", "orders_detail").is_ok());
        assert!(validate_identifier("dataset", "ecommerce_analytics").is_ok());
    }

    #[test]
    fn rejects_paths_and_empty_names() {
        for identifier in ["", "orders/../admin", "orders detail", "orders-detail"] {
            let err = validate_identifier("table", identifier).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigError, "{identifier}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let identifier = "a".repeat(BIGQUERY_IDENTIFIER_MAX_LENGTH + 1);

        assert!(validate_identifier("table", &identifier).is_err());
    }
}
