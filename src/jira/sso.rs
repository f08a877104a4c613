//! The browser-emulation login flow.
//!
//! The tracker offers no token API for scripted login; the only way in
//! is the same SAML redirect dance a browser performs. One forward pass
//! with no retries: each step is gated on a token scraped from the
//! previous response while cookies accumulate in the client's jar. The
//! caller persists the jar once the pass completes.

use std::fmt;

use reqwest::StatusCode;
use tracing::debug;

use super::scrape;
use crate::config::JiraConfig;

/// Username and password submitted during the handshake.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which handshake request was in flight when a transport error hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LoginPage,
    IdentityProvider,
    Credentials,
    AssertionConsumer,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::LoginPage => "login page",
            Step::IdentityProvider => "identity provider",
            Step::Credentials => "credential submission",
            Step::AssertionConsumer => "assertion consumer",
        })
    }
}

/// How a handshake pass failed.
///
/// The `Missing*` variants mean a page no longer carries the field the
/// flow expects, which is how remote login-flow changes show up here.
/// A missing `SAMLResponse` usually means the identity provider
/// re-rendered its form because the credentials were wrong.
#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    #[error("login page returned status {status}")]
    Unreachable { status: StatusCode },

    #[error("login page carries no SAMLRequest field")]
    MissingSamlRequest,

    #[error("identity provider page carries no form action")]
    MissingFormAction,

    #[error("credential response carries no SAMLResponse field")]
    MissingSamlResponse,

    #[error("assertion consumer rejected the login with status {status}")]
    Rejected { status: StatusCode },

    #[error("{step} request failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: reqwest::Error,
    },
}

impl SsoError {
    fn transport(step: Step, source: reqwest::Error) -> Self {
        Self::Transport { step, source }
    }
}

/// Runs the full handshake over `http`, whose cookie jar collects the
/// session along the way.
pub async fn authenticate(
    http: &reqwest::Client,
    config: &JiraConfig,
    credentials: &Credentials,
) -> Result<(), SsoError> {
    // The login page seeds the jar and carries the request token.
    debug!("GET {}", config.login_url);
    let response = http
        .get(&config.login_url)
        .send()
        .await
        .map_err(|e| SsoError::transport(Step::LoginPage, e))?;
    if response.status() != StatusCode::OK {
        return Err(SsoError::Unreachable {
            status: response.status(),
        });
    }
    let body = response
        .text()
        .await
        .map_err(|e| SsoError::transport(Step::LoginPage, e))?;

    let Some(saml_request) = scrape::field_value(&body, "textarea", "SAMLRequest") else {
        return Err(SsoError::MissingSamlRequest);
    };

    // Hand the request token to the identity provider; it answers with
    // its own login form.
    let body = post_form(
        http,
        Step::IdentityProvider,
        &config.saml_endpoint,
        &[("SAMLRequest", saml_request.as_str())],
    )
    .await?;
    let Some(action) = scrape::form_action(&body) else {
        return Err(SsoError::MissingFormAction);
    };

    let body = post_form(
        http,
        Step::Credentials,
        &action,
        &[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ],
    )
    .await?;

    let Some(saml_response) = scrape::input_value(&body, "SAMLResponse") else {
        return Err(SsoError::MissingSamlResponse);
    };

    // Closing the loop: the signed assertion goes back to the tracker,
    // which answers with the session cookies.
    debug!("POST {}", config.assertion_consumer);
    let response = http
        .post(&config.assertion_consumer)
        .form(&[("SAMLResponse", saml_response.as_str())])
        .send()
        .await
        .map_err(|e| SsoError::transport(Step::AssertionConsumer, e))?;
    if response.status() != StatusCode::OK {
        return Err(SsoError::Rejected {
            status: response.status(),
        });
    }
    Ok(())
}

async fn post_form(
    http: &reqwest::Client,
    step: Step,
    url: &str,
    form: &[(&str, &str)],
) -> Result<String, SsoError> {
    debug!("POST {url}");
    let response = http
        .post(url)
        .form(form)
        .send()
        .await
        .map_err(|e| SsoError::transport(step, e))?;
    response
        .text()
        .await
        .map_err(|e| SsoError::transport(step, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> JiraConfig {
        JiraConfig {
            base_url: server.uri(),
            login_url: format!("{}/login.jsp", server.uri()),
            saml_endpoint: format!("{}/idp/saml", server.uri()),
            assertion_consumer: format!("{}/assert", server.uri()),
            ..JiraConfig::default()
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "alice".into(),
            password: "s3cret".into(),
        }
    }

    fn login_page() -> String {
        r#"<html><body>
            <textarea name="SAMLRequest">request-token-1</textarea>
        </body></html>"#
            .to_string()
    }

    fn idp_page(server: &MockServer) -> String {
        format!(
            r#"<html><body>
                <form method="post" action="{}/idp/login">
                    <input name="username"/><input name="password"/>
                </form>
            </body></html>"#,
            server.uri()
        )
    }

    fn assertion_page() -> String {
        r#"<html><body><div><form>
            <input type="hidden" name="SAMLResponse" value="response-token-9"/>
        </form></div></body></html>"#
            .to_string()
    }

    /// Mounts steps one through five of a working handshake.
    async fn mount_ladder(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_page()))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/saml"))
            .and(body_string_contains("SAMLRequest=request-token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(idp_page(server)))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/login"))
            .and(body_string_contains("username=alice"))
            .and(body_string_contains("password=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(assertion_page()))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_handshake_succeeds() {
        let server = MockServer::start().await;
        mount_ladder(&server).await;
        Mock::given(method("POST"))
            .and(path("/assert"))
            .and(body_string_contains("SAMLResponse=response-token-9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_login_page_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SsoError::Unreachable { status } if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn missing_request_token_stops_before_any_post() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"),
            )
            .mount(&server)
            .await;
        // No later step may run once the token is missing.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::MissingSamlRequest));
    }

    #[tokio::test]
    async fn actionless_identity_provider_page_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_page()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/saml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><form id=\"broken\"></form></body></html>"),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::MissingFormAction));
    }

    #[tokio::test]
    async fn rejected_credentials_leave_no_response_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(ResponseTemplate::new(200).set_body_string(login_page()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/saml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(idp_page(&server)))
            .mount(&server)
            .await;
        // The provider re-renders its login form instead of issuing a token.
        Mock::given(method("POST"))
            .and(path("/idp/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(idp_page(&server)))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::MissingSamlResponse));
    }

    #[tokio::test]
    async fn assertion_consumer_rejection_is_login_failure() {
        let server = MockServer::start().await;
        mount_ladder(&server).await;
        Mock::given(method("POST"))
            .and(path("/assert"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = authenticate(&http, &test_config(&server), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SsoError::Rejected { status } if status.as_u16() == 401
        ));
    }
}
