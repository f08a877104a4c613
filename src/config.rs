//! Crosstie configuration.
//!
//! Loaded from `~/.crosstie/config.toml`. Every setting has a
//! compiled-in default, so the file is optional and a partial file
//! overrides only the keys it names. The defaults point at the Red Hat
//! trackers this tool grew up against.

use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bugzilla: BugzillaConfig,
    pub jira: JiraConfig,
    pub github: GithubConfig,
    pub backport: BackportConfig,
}

/// Connection settings for the primary bug tracker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BugzillaConfig {
    /// REST API root.
    pub endpoint: String,
}

/// Connection settings for the issue tracker behind SSO.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JiraConfig {
    /// Tracker root, used for API calls once authenticated.
    pub base_url: String,
    /// Login page that starts the SSO handshake.
    pub login_url: String,
    /// Identity-provider endpoint the login request token is submitted to.
    pub saml_endpoint: String,
    /// Service endpoint the signed assertion is submitted to.
    pub assertion_consumer: String,
    /// Project key fetched to check whether a saved session still works.
    pub probe_project: String,
    /// External-tracker URLs that identify links into this system.
    pub tracker_urls: Vec<String>,
}

/// How GitHub links are recognized and opened.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GithubConfig {
    /// External-tracker URLs that identify GitHub links.
    pub host_urls: Vec<String>,
    /// Base URL for opening pull requests in a browser.
    pub browse_url: String,
}

/// Scope of the backport candidate search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BackportConfig {
    pub product: String,
    pub component: String,
    pub classification: String,
    /// Statuses a bug can hold while still needing a backport.
    pub statuses: Vec<String>,
    /// Release streams offered when no explicit target is given.
    pub default_targets: Vec<String>,
}

impl Default for BugzillaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://bugzilla.redhat.com".into(),
        }
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: "https://issues.redhat.com".into(),
            login_url: "https://issues.redhat.com/login.jsp?os_destination=%2Fdefault.jsp".into(),
            saml_endpoint: "https://sso.redhat.com/auth/realms/redhat-external/protocol/saml"
                .into(),
            assertion_consumer: "https://sso.jboss.org/login?provider=RedHatExternalProvider"
                .into(),
            probe_project: "OLM".into(),
            tracker_urls: vec![
                "https://jira.coreos.com/".into(),
                "https://issues.redhat.com/".into(),
            ],
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            host_urls: vec!["https://github.com/".into()],
            browse_url: "https://github.com/".into(),
        }
    }
}

impl Default for BackportConfig {
    fn default() -> Self {
        Self {
            product: "OpenShift Container Platform".into(),
            component: "OLM".into(),
            classification: "Red Hat".into(),
            statuses: ["NEW", "ASSIGNED", "POST", "MODIFIED", "ON_DEV", "ON_QA"]
                .map(String::from)
                .to_vec(),
            default_targets: vec!["4.5.0".into()],
        }
    }
}

impl Config {
    /// Load config from `~/.crosstie/config.toml`, falling back to the
    /// built-in defaults when the file is absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::path().ok_or("could not determine home directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.crosstie/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".crosstie").join("config.toml"))
    }
}
