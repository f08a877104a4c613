//! Client for the issue tracker that sits behind SSO.
//!
//! `connect` restores the saved session and probes a protected
//! resource with it; only when the probe fails does it run the login
//! handshake and persist the refreshed jar. The jar is owned here and
//! shared with the `reqwest` client, and `connect` consumes the
//! session store, so one store backs at most one live session.

mod scrape;
pub mod sso;

pub use sso::{Credentials, SsoError};

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use reqwest_cookie_store::CookieStoreMutex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::JiraConfig;
use crate::model::Issue;
use crate::session::{self, SessionStore};

/// Why a connection attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("session store: {0}")]
    Session(#[from] session::StoreError),

    #[error(transparent)]
    Sso(#[from] SsoError),

    #[error("login did not finish within {after:?}")]
    Cancelled { after: Duration },

    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised by issue lookups on an already-connected client.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("issue {0} not found")]
    NotFound(String),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    base: String,
    config: JiraConfig,
    jar: Arc<CookieStoreMutex>,
    store: SessionStore,
}

impl Client {
    /// Restores the saved session and authenticates if it no longer
    /// grants access. A fresh login overwrites the saved jar; failing
    /// to write it fails the call even though the in-memory session
    /// would have worked.
    pub async fn connect(
        config: JiraConfig,
        store: SessionStore,
        credentials: &Credentials,
    ) -> Result<Self, ConnectError> {
        let jar = Arc::new(CookieStoreMutex::new(store.load()?));
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()?;
        let client = Self {
            http,
            base: config.base_url.trim_end_matches('/').to_string(),
            config,
            jar,
            store,
        };

        if client.probe().await {
            debug!("saved session still valid, skipping login");
            return Ok(client);
        }

        info!("no usable session, running the login handshake");
        sso::authenticate(&client.http, &client.config, credentials).await?;
        client.save_session()?;
        Ok(client)
    }

    /// [`Client::connect`] under a deadline. Hitting the deadline
    /// cancels the attempt wherever it is; the result is a
    /// cancellation, never mistaken for a protocol failure.
    pub async fn connect_with_deadline(
        config: JiraConfig,
        store: SessionStore,
        credentials: &Credentials,
        deadline: Duration,
    ) -> Result<Self, ConnectError> {
        match tokio::time::timeout(deadline, Self::connect(config, store, credentials)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Cancelled { after: deadline }),
        }
    }

    /// Fetches one issue and flattens the wire shape into [`Issue`].
    pub async fn get_issue(&self, key: &str) -> Result<Issue, RequestError> {
        let url = format!("{}/rest/api/2/issue/{key}", self.base);
        debug!("GET {url}");
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RequestError::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(RequestError::Status {
                status: response.status(),
                url,
            });
        }
        let wire: WireIssue = response.json().await?;
        Ok(wire.into_issue())
    }

    /// Whether the current jar grants access to a known protected
    /// resource. Any failure reads as "no", and the real story then
    /// comes out of the handshake.
    async fn probe(&self) -> bool {
        let url = format!(
            "{}/rest/api/2/project/{}",
            self.base, self.config.probe_project
        );
        debug!("GET {url}");
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("probe failed: {e}");
                false
            }
        }
    }

    fn save_session(&self) -> Result<(), session::StoreError> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.save(&jar)
    }
}

// ── Wire shapes ──

#[derive(Debug, Deserialize)]
struct WireIssue {
    key: String,
    fields: WireFields,
}

#[derive(Debug, Deserialize)]
struct WireFields {
    #[serde(default)]
    summary: String,
    issuetype: Option<Named>,
    priority: Option<Named>,
    status: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

impl WireIssue {
    fn into_issue(self) -> Issue {
        Issue {
            key: self.key,
            summary: self.fields.summary,
            kind: self.fields.issuetype.map(|n| n.name).unwrap_or_default(),
            priority: self.fields.priority.map(|n| n.name),
            status: self.fields.status.map(|n| n.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
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

    fn test_store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("cookies.json"))
    }

    /// Mounts a working login flow that hands out a session cookie at
    /// the end.
    async fn mount_login_flow(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<textarea name="SAMLRequest">tok</textarea>"#),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/saml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<form action="{}/idp/login"></form>"#,
                server.uri()
            )))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/idp/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<input name="SAMLResponse" value="signed"/>"#),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/assert"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "JSESSIONID=abc123; Path=/"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn valid_session_skips_the_handshake() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "OLM" })))
            .expect(1)
            .mount(&server)
            .await;
        // The probe succeeded, so no login request of any kind may go out.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let jar_path = store.path().to_path_buf();

        Client::connect(test_config(&server), store, &credentials())
            .await
            .unwrap();

        // Nothing new to persist on the skip path.
        assert!(!jar_path.exists());
    }

    #[tokio::test]
    async fn failed_probe_runs_handshake_and_saves_jar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        mount_login_flow(&server).await;

        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let jar_path = store.path().to_path_buf();

        Client::connect(test_config(&server), store, &credentials())
            .await
            .unwrap();

        let saved = std::fs::read_to_string(jar_path).unwrap();
        assert!(saved.contains("JSESSIONID"), "session cookie not saved: {saved}");
    }

    #[tokio::test]
    async fn unwritable_jar_path_fails_the_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        mount_login_flow(&server).await;

        // A regular file where the jar's parent directory should go
        // makes the final persist step fail after a clean handshake.
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let store = SessionStore::new(blocker.join("cookies.json"));

        let err = Client::connect(test_config(&server), store, &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Session(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn handshake_failure_surfaces_as_sso_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>moved</html>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = Client::connect(test_config(&server), test_store(&dir), &credentials())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Sso(SsoError::MissingSamlRequest)));
    }

    #[tokio::test]
    async fn deadline_cancels_a_stalled_connect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login.jsp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<textarea name="SAMLRequest">tok</textarea>"#)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = Client::connect_with_deadline(
            test_config(&server),
            test_store(&dir),
            &credentials(),
            Duration::from_millis(150),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConnectError::Cancelled { .. }));
    }

    async fn connected_client(server: &MockServer) -> Client {
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/OLM"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "key": "OLM" })))
            .mount(server)
            .await;
        let dir = TempDir::new().unwrap();
        Client::connect(test_config(server), test_store(&dir), &credentials())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn get_issue_flattens_the_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OLM-1378"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "OLM-1378",
                "fields": {
                    "summary": "Upgrade path broken",
                    "issuetype": { "name": "Bug" },
                    "priority": { "name": "Critical" },
                    "status": { "name": "In Progress" }
                }
            })))
            .mount(&server)
            .await;

        let issue = connected_client(&server)
            .await
            .get_issue("OLM-1378")
            .await
            .unwrap();
        assert_eq!(issue.key, "OLM-1378");
        assert_eq!(issue.kind, "Bug");
        assert_eq!(issue.status.as_deref(), Some("In Progress"));
    }

    #[tokio::test]
    async fn issue_optional_fields_may_be_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/OLM-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "OLM-1",
                "fields": { "summary": "minimal" }
            })))
            .mount(&server)
            .await;

        let issue = connected_client(&server).await.get_issue("OLM-1").await.unwrap();
        assert_eq!(issue.kind, "");
        assert_eq!(issue.priority, None);
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/NOPE-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = connected_client(&server)
            .await
            .get_issue("NOPE-1")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::NotFound(key) if key == "NOPE-1"));
    }
}
