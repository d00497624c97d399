//! Downstream workflow trigger.
//!
//! A run that loaded rows starts one execution of a downstream workflow, passing the run summary
//! as the execution argument. The request is authenticated with an OAuth bearer token minted
//! from the same service account the warehouse client uses.

use std::time::Duration;

use etl::concurrency::deadline::with_deadline;
use etl::credentials::ServiceAccountCredentials;
use etl::error::{ErrorKind, EtlResult};
use etl::etl_error;
use etl::notification::{Notifier, SyncSummary};
use etl_config::shared::WorkflowNotificationConfig;
use gcp_bigquery_client::yup_oauth2::{ServiceAccountAuthenticator, parse_service_account_key};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{error, info};

/// Request body of a workflow execution.
///
/// Workflows receive their argument as a JSON encoded string.
#[derive(Debug, Serialize)]
struct ExecutionRequest {
    argument: String,
}

impl ExecutionRequest {
    fn new(summary: &SyncSummary) -> EtlResult<Self> {
        Ok(Self {
            argument: serde_json::to_string(summary)?,
        })
    }
}

/// Notifier triggering a workflow execution over HTTP.
#[derive(Debug, Clone)]
pub struct WorkflowNotifier {
    client: reqwest::Client,
    request_timeout: Duration,
    url: String,
    scopes: Vec<String>,
    credentials: ServiceAccountCredentials,
}

impl WorkflowNotifier {
    /// Creates a notifier for the configured workflow endpoint.
    pub fn new(
        config: &WorkflowNotificationConfig,
        credentials: ServiceAccountCredentials,
    ) -> EtlResult<Self> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| {
                etl_error!(
                    ErrorKind::ConfigError,
                    "Failed to build the workflow http client",
                    source: err
                )
            })?;

        Ok(Self {
            client,
            request_timeout,
            url: config.url.clone(),
            scopes: config.scopes.clone(),
            credentials,
        })
    }

    /// Mints a bearer token for the configured scopes.
    async fn access_token(&self) -> EtlResult<String> {
        let key = parse_service_account_key(self.credentials.key().expose_secret()).map_err(
            |err| {
                etl_error!(
                    ErrorKind::AuthenticationError,
                    "Service account key cannot be used for token requests",
                    source: err
                )
            },
        )?;

        let authenticator = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::AuthenticationError,
                    "Failed to build the service account authenticator",
                    source: err
                )
            })?;

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let token = authenticator.token(&scopes).await.map_err(|err| {
            etl_error!(
                ErrorKind::AuthenticationError,
                "Failed to obtain an access token",
                format!("service account `{}`", self.credentials.client_email()),
                source: err
            )
        })?;

        match token.token() {
            Some(token) => Ok(token.to_owned()),
            None => Err(etl_error!(
                ErrorKind::AuthenticationError,
                "Token response did not contain an access token",
                format!("service account `{}`", self.credentials.client_email())
            )),
        }
    }

    /// Sends one execution request authenticated with `token`.
    async fn trigger(&self, token: &str, summary: &SyncSummary) -> EtlResult<()> {
        let request = ExecutionRequest::new(summary)?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::NotificationFailed,
                    "Workflow execution request failed",
                    format!("url `{}`", self.url),
                    source: err
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            error!(%status, %body, "workflow execution request was rejected");

            return Err(etl_error!(
                ErrorKind::NotificationFailed,
                "Workflow rejected the execution request",
                format!("status {status}: {body}")
            ));
        }

        info!(run_id = %summary.run_id, total_rows = summary.total_rows, "workflow execution triggered");

        Ok(())
    }
}

impl Notifier for WorkflowNotifier {
    async fn notify(&self, summary: &SyncSummary) -> EtlResult<()> {
        let token = match with_deadline(Some(self.request_timeout), self.access_token()).await {
            Ok(token) => token?,
            Err(exceeded) => {
                return Err(etl_error!(
                    ErrorKind::OperationTimedOut,
                    "Access token was not obtained in time",
                    format!("service account `{}`", self.credentials.client_email()),
                    source: exceeded
                ));
            }
        };

        self.trigger(&token, summary).await
    }
}

#[cfg(test)]
mod tests {
    use etl::notification::StreamSummary;
    use etl::types::{StreamId, Watermark};
    use mockito::{Matcher, Server};
    use secrecy::SecretString;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    const TOKEN: &str = "test-access-token";

    /// RSA key generated for these tests only, it grants access to nothing.
    const TEST_PRIVATE_KEY: &str = include_str!("../testdata/service_account_key.pem");

    fn credentials_with_token_uri(token_uri: &str) -> ServiceAccountCredentials {
        let key = json!({
            "type": "service_account",
            "project_id": "shop-analytics",
            "private_key_id": "key-id",
            "private_key": TEST_PRIVATE_KEY,
            "client_email": "etl@shop-analytics.iam.gserviceaccount.com",
            "client_id": "1",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri
        });

        ServiceAccountCredentials::parse(SecretString::new(key.to_string())).unwrap()
    }

    fn credentials() -> ServiceAccountCredentials {
        credentials_with_token_uri("https://oauth2.googleapis.com/token")
    }

    fn notifier(url: String) -> WorkflowNotifier {
        notifier_with_credentials(url, credentials())
    }

    fn notifier_with_credentials(
        url: String,
        credentials: ServiceAccountCredentials,
    ) -> WorkflowNotifier {
        let config = WorkflowNotificationConfig {
            url,
            scopes: vec![WorkflowNotificationConfig::DEFAULT_SCOPE.to_string()],
            request_timeout_ms: WorkflowNotificationConfig::DEFAULT_REQUEST_TIMEOUT_MS,
        };

        WorkflowNotifier::new(&config, credentials).unwrap()
    }

    fn summary() -> SyncSummary {
        SyncSummary::new(
            Uuid::nil(),
            vec![StreamSummary {
                stream_id: StreamId::new("orders"),
                destination_table: "orders".to_string(),
                rows_loaded: 3,
                watermark: Watermark::parse("2024-01-02 08:30:00").unwrap(),
            }],
        )
    }

    #[tokio::test]
    async fn summary_is_sent_as_json_string_argument() {
        let summary = summary();
        let argument = serde_json::to_string(&summary).unwrap();

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/executions")
            .match_header("Authorization", format!("Bearer {TOKEN}").as_str())
            .match_body(Matcher::Json(json!({ "argument": argument })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        notifier(format!("{}/executions", server.url()))
            .trigger(TOKEN, &summary)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn argument_carries_the_run_message() {
        let request = ExecutionRequest::new(&summary()).unwrap();
        let argument: serde_json::Value = serde_json::from_str(&request.argument).unwrap();

        assert_eq!(argument["message"], "synced 3 rows: orders=3");
        assert_eq!(argument["total_rows"], 3);
        assert_eq!(argument["streams"][0]["stream_id"], "orders");
        assert_eq!(argument["streams"][0]["watermark"], "2024-01-02 08:30:00");
    }

    #[tokio::test]
    async fn non_success_status_fails_with_status_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/executions")
            .with_status(403)
            .with_body("permission denied")
            .create_async()
            .await;

        let err = notifier(format!("{}/executions", server.url()))
            .trigger(TOKEN, &summary())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.kind(), ErrorKind::NotificationFailed);
        let detail = err.detail().unwrap();
        assert!(detail.contains("403"), "{detail}");
        assert!(detail.contains("permission denied"), "{detail}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_notification() {
        let err = notifier("http://127.0.0.1:1/executions".to_string())
            .trigger(TOKEN, &summary())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotificationFailed);
    }

    #[tokio::test]
    async fn notify_sends_the_minted_token() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::Regex("grant_type=".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"minted-token","token_type":"Bearer","expires_in":3600}"#)
            .create_async()
            .await;
        let workflow_mock = server
            .mock("POST", "/executions")
            .match_header("Authorization", "Bearer minted-token")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let credentials = credentials_with_token_uri(&format!("{}/token", server.url()));

        notifier_with_credentials(format!("{}/executions", server.url()), credentials)
            .notify(&summary())
            .await
            .unwrap();

        token_mock.assert_async().await;
        workflow_mock.assert_async().await;
    }

    #[tokio::test]
    async fn failing_token_endpoint_fails_before_triggering() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#)
            .create_async()
            .await;
        let workflow_mock = server
            .mock("POST", "/executions")
            .expect(0)
            .create_async()
            .await;
        let credentials = credentials_with_token_uri(&format!("{}/token", server.url()));

        let err = notifier_with_credentials(format!("{}/executions", server.url()), credentials)
            .notify(&summary())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        token_mock.assert_async().await;
        workflow_mock.assert_async().await;
    }
}
