//! Cloud Storage collaborator for the GCS tool server.
//!
//! [`GcsStorage`] implements [`gcs_mcp_core::StorageClient`] over the JSON
//! API; [`TokenProvider`] turns a validated credential choice into bearer
//! tokens.

pub mod auth;
pub mod gcs;

use std::time::Duration;

pub use auth::{AuthError, TokenProvider};
pub use gcs::{DEFAULT_ENDPOINT, GcsStorage};

/// Connect timeout for every backend request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by the storage and token calls.
///
/// `request_timeout` bounds each request end to end. Redirects are never
/// followed: credentials and subject tokens only go to validated endpoints.
pub fn http_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("gcs-mcp-server/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_client_does_not_follow_redirects() {
        let trusted = MockServer::start().await;
        let elsewhere = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(307)
                    .insert_header("location", format!("{}/steal", elsewhere.uri()).as_str()),
            )
            .mount(&trusted)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&elsewhere)
            .await;

        let client = http_client(Duration::from_secs(5)).expect("client");
        let response = client
            .post(format!("{}/token", trusted.uri()))
            .body("subject_token=secret")
            .send()
            .await
            .expect("send");

        assert_eq!(response.status().as_u16(), 307);
        let forwarded = elsewhere.received_requests().await.expect("recorded");
        assert!(forwarded.is_empty());
    }
}
