//! CLI interface for Crosstie.
//!
//! Non-interactive by default: arguments in, tables out, warnings on
//! stderr. Prompting happens only in the login commands; a bug command
//! missing a credential fails and says which login command to run, so
//! unattended runs never block on stdin.
//!
//! Commands split into two groups:
//!
//! - `crosstie login bugzilla|jira` — store credentials in the OS
//!   keyring so later commands run unattended.
//! - `crosstie bug <command> <id>` — look up a bug and the work hanging
//!   off it: pull requests, foreign-tracker issues, backport state.

mod format;

use std::io;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::bugzilla;
use crate::config::Config;
use crate::credentials::{self, CredentialStore};
use crate::jira::{self, Credentials};
use crate::model::PullRef;
use crate::session::SessionStore;

/// Crosstie — follow a bug across the trackers it spans.
#[derive(Debug, Parser)]
#[command(name = "crosstie", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Print debug logs to stderr. `RUST_LOG` takes precedence.
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Bug tracker API key. Overrides the keyring and is saved back to it.
    #[arg(short = 'k', long, global = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Issue tracker username. Overrides the keyring and is saved back to it.
    #[arg(short = 'u', long, global = true, value_name = "USER")]
    jira_user: Option<String>,

    /// Issue tracker password. Overrides the keyring and is saved back to it.
    #[arg(short = 'p', long, global = true, value_name = "PASS")]
    jira_pass: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: following a fix across systems
  1. crosstie login bugzilla
     → stores the bug tracker API key in the OS keyring
  2. crosstie bug show 1813344
  3. crosstie bug prs 1813344
     → the GitHub pull requests linked to the bug
  4. crosstie bug sync 1813344 --timeout 30
     → logs into the issue tracker (SSO) and prints the linked issue

Backports:
  crosstie bug backport list
  crosstie bug backport set 1813344 4.5.0"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store tracker credentials in the OS keyring.
    Login {
        #[command(subcommand)]
        tracker: LoginTarget,
    },

    /// Look up a bug and everything linked to it.
    Bug {
        #[command(subcommand)]
        command: BugCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum LoginTarget {
    /// Save the bug tracker API key.
    Bugzilla,

    /// Save the issue tracker username and password, then log in once
    /// so the session is cached for later commands.
    Jira,
}

#[derive(Debug, Subcommand)]
pub enum BugCommand {
    /// Show one bug.
    Show {
        /// Bug id in the primary tracker.
        id: u32,
    },

    /// List the GitHub pull requests linked to a bug.
    ///
    /// Plain issue links are skipped; identifiers that should name a
    /// pull request but don't are reported on stderr without failing
    /// the command.
    Prs {
        id: u32,

        /// Also open each pull request in the browser.
        #[arg(long)]
        open: bool,
    },

    /// List the foreign-tracker issue keys linked to a bug.
    Issues { id: u32 },

    /// Fetch the linked issues from the foreign tracker, logging in
    /// through SSO when the saved session no longer works.
    Sync {
        id: u32,

        /// Give up if connecting takes longer than this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Backport bookkeeping on the internal whiteboard.
    Backport {
        #[command(subcommand)]
        command: BackportCommand,
    },

    /// Open the bug in a browser.
    Open { id: u32 },
}

#[derive(Debug, Subcommand)]
pub enum BackportCommand {
    /// List open backport candidates with their recorded targets.
    List {
        /// Restrict the search to these target releases.
        /// Defaults to the configured release streams.
        #[arg(long = "versions", value_name = "VERSION")]
        versions: Vec<String>,
    },

    /// Record a bug's backport target on its whiteboard.
    Set { id: u32, version: String },
}

/// Run the CLI, returning an error message on failure.
pub async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config::load()?;
    let keyring = credentials::Keyring;

    match cli.command {
        Command::Login { tracker } => match tracker {
            LoginTarget::Bugzilla => cmd_login_bugzilla(&keyring, cli.api_key),
            LoginTarget::Jira => {
                cmd_login_jira(&config, &keyring, cli.jira_user, cli.jira_pass).await
            }
        },
        Command::Bug { command } => match command {
            BugCommand::Show { id } => {
                let client = bugzilla_client(&config, &keyring, cli.api_key)?;
                cmd_show(&client, id).await
            }
            BugCommand::Prs { id, open } => {
                let client = bugzilla_client(&config, &keyring, cli.api_key)?;
                cmd_prs(&client, &config, id, open).await
            }
            BugCommand::Issues { id } => {
                let client = bugzilla_client(&config, &keyring, cli.api_key)?;
                cmd_issues(&client, id).await
            }
            BugCommand::Sync { id, timeout } => {
                let client = bugzilla_client(&config, &keyring, cli.api_key)?;
                cmd_sync(
                    &config,
                    &client,
                    &keyring,
                    cli.jira_user,
                    cli.jira_pass,
                    id,
                    timeout.map(Duration::from_secs),
                )
                .await
            }
            BugCommand::Backport { command } => {
                let client = bugzilla_client(&config, &keyring, cli.api_key)?;
                match command {
                    BackportCommand::List { versions } => {
                        cmd_backport_list(&client, &config, versions).await
                    }
                    BackportCommand::Set { id, version } => {
                        cmd_backport_set(&client, id, &version).await
                    }
                }
            }
            BugCommand::Open { id } => cmd_open(&config, id),
        },
    }
}

/// Route logs to stderr so tables on stdout stay clean. `--debug`
/// raises the default level; an explicit `RUST_LOG` wins outright.
fn init_logging(debug: bool) {
    let default = if debug { "crosstie=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// ── Credential resolution ──

/// Flag value, else keyring. A key that arrived by flag is saved for
/// next time. With neither the command fails and names the login
/// command to run; bug commands never prompt, so an unattended run
/// errors out instead of blocking on stdin.
fn resolve_api_key(
    store: &dyn CredentialStore,
    flag: Option<String>,
) -> Result<String, String> {
    if let Some(key) = flag {
        save_secret(store, credentials::BUGZILLA_API_KEY, &key)?;
        return Ok(key);
    }
    load_secret(store, credentials::BUGZILLA_API_KEY)?.ok_or_else(|| {
        not_configured("bug tracker API key", "crosstie login bugzilla", "--api-key")
    })
}

fn resolve_jira_credentials(
    store: &dyn CredentialStore,
    user_flag: Option<String>,
    pass_flag: Option<String>,
) -> Result<Credentials, String> {
    let username = resolve_one(
        store,
        credentials::JIRA_USERNAME,
        user_flag,
        "issue tracker username",
        "--jira-user",
    )?;
    let password = resolve_one(
        store,
        credentials::JIRA_PASSWORD,
        pass_flag,
        "issue tracker password",
        "--jira-pass",
    )?;
    Ok(Credentials { username, password })
}

fn resolve_one(
    store: &dyn CredentialStore,
    account: &str,
    flag: Option<String>,
    what: &str,
    flag_name: &str,
) -> Result<String, String> {
    if let Some(value) = flag {
        save_secret(store, account, &value)?;
        return Ok(value);
    }
    load_secret(store, account)?
        .ok_or_else(|| not_configured(what, "crosstie login jira", flag_name))
}

fn not_configured(what: &str, login: &str, flag: &str) -> String {
    format!("no {what} configured; run '{login}' or pass {flag}")
}

fn load_secret(store: &dyn CredentialStore, account: &str) -> Result<Option<String>, String> {
    store
        .load(account)
        .map_err(|e| format!("failed to read {account} from the keyring: {e}"))
}

fn save_secret(store: &dyn CredentialStore, account: &str, value: &str) -> Result<(), String> {
    store
        .save(account, value)
        .map_err(|e| format!("failed to store {account} in the keyring: {e}"))
}

fn prompt_line(label: &str) -> Result<String, String> {
    eprint!("{label}");
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("failed to read input: {e}"))?;
    Ok(line.trim().to_string())
}

fn prompt_secret(label: &str) -> Result<String, String> {
    rpassword::prompt_password(label).map_err(|e| format!("failed to read secret: {e}"))
}

fn bugzilla_client(
    config: &Config,
    store: &dyn CredentialStore,
    api_key_flag: Option<String>,
) -> Result<bugzilla::Client, String> {
    let api_key = resolve_api_key(store, api_key_flag)?;
    bugzilla::Client::new(config, api_key).map_err(|e| format!("failed to build client: {e}"))
}

fn session_store() -> Result<SessionStore, String> {
    let path = SessionStore::default_path().ok_or("could not determine home directory")?;
    Ok(SessionStore::new(path))
}

// ── Commands ──

fn cmd_login_bugzilla(store: &dyn CredentialStore, key: Option<String>) -> Result<(), String> {
    let key = match key {
        Some(key) => key,
        None => prompt_secret("Bug tracker API key: ")?,
    };
    save_secret(store, credentials::BUGZILLA_API_KEY, &key)?;
    eprintln!("API key saved to the keyring");
    Ok(())
}

async fn cmd_login_jira(
    config: &Config,
    store: &dyn CredentialStore,
    user: Option<String>,
    pass: Option<String>,
) -> Result<(), String> {
    let username = match user {
        Some(user) => user,
        None => prompt_line("Issue tracker username: ")?,
    };
    let password = match pass {
        Some(pass) => pass,
        None => prompt_secret("Issue tracker password: ")?,
    };
    save_secret(store, credentials::JIRA_USERNAME, &username)?;
    save_secret(store, credentials::JIRA_PASSWORD, &password)?;

    let session = session_store()?;
    let jar_path = session.path().to_path_buf();
    jira::Client::connect(config.jira.clone(), session, &Credentials { username, password })
        .await
        .map_err(|e| format!("login failed: {e}"))?;
    eprintln!("Logged in; session saved to {}", jar_path.display());
    Ok(())
}

async fn cmd_show(client: &bugzilla::Client, id: u32) -> Result<(), String> {
    let bug = client
        .get_bug(id)
        .await
        .map_err(|e| format!("failed to fetch bug {id}: {e}"))?;
    print!("{}", format::render(&format::bug_columns(), &[bug]));
    Ok(())
}

async fn cmd_prs(
    client: &bugzilla::Client,
    config: &Config,
    id: u32,
    open: bool,
) -> Result<(), String> {
    let found = client
        .pull_requests_on_bug(id)
        .await
        .map_err(|e| format!("failed to fetch links for bug {id}: {e}"))?;

    // Bad identifiers are tracker data problems, not reasons to hide
    // the good ones.
    for err in &found.malformed {
        eprintln!("warning: {err}");
    }

    if found.pulls.is_empty() {
        println!("No pull requests linked to bug {id}");
        return Ok(());
    }
    for pull in &found.pulls {
        println!("{pull}");
    }

    if open {
        for pull in &found.pulls {
            let url = pull_url(&config.github.browse_url, pull);
            webbrowser::open(&url).map_err(|e| format!("failed to open {url}: {e}"))?;
        }
    }
    Ok(())
}

async fn cmd_issues(client: &bugzilla::Client, id: u32) -> Result<(), String> {
    let issues = client
        .jira_issues_on_bug(id)
        .await
        .map_err(|e| format!("failed to fetch links for bug {id}: {e}"))?;

    if issues.is_empty() {
        println!("No issues linked to bug {id}");
        return Ok(());
    }
    for issue in &issues {
        println!("{}", issue.key());
    }
    Ok(())
}

async fn cmd_sync(
    config: &Config,
    client: &bugzilla::Client,
    store: &dyn CredentialStore,
    user_flag: Option<String>,
    pass_flag: Option<String>,
    id: u32,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let refs = client
        .jira_issues_on_bug(id)
        .await
        .map_err(|e| format!("failed to fetch links for bug {id}: {e}"))?;
    if refs.is_empty() {
        return Err(format!("bug {id} has no linked issue"));
    }

    let credentials = resolve_jira_credentials(store, user_flag, pass_flag)?;
    let session = session_store()?;
    let jira = match timeout {
        Some(deadline) => {
            jira::Client::connect_with_deadline(config.jira.clone(), session, &credentials, deadline)
                .await
        }
        None => jira::Client::connect(config.jira.clone(), session, &credentials).await,
    }
    .map_err(|e| format!("failed to connect to the issue tracker: {e}"))?;

    let mut issues = Vec::with_capacity(refs.len());
    for reference in &refs {
        debug!("syncing {}", reference.key());
        let issue = jira
            .get_issue(reference.key())
            .await
            .map_err(|e| format!("failed to fetch issue {}: {e}", reference.key()))?;
        issues.push(issue);
    }
    print!("{}", format::render(&format::issue_columns(), &issues));
    Ok(())
}

async fn cmd_backport_list(
    client: &bugzilla::Client,
    config: &Config,
    versions: Vec<String>,
) -> Result<(), String> {
    let target_releases = if versions.is_empty() {
        config.backport.default_targets.clone()
    } else {
        versions
    };
    let query = bugzilla::SearchQuery {
        classification: config.backport.classification.clone(),
        product: config.backport.product.clone(),
        component: config.backport.component.clone(),
        statuses: config.backport.statuses.clone(),
        target_releases,
    };

    let bugs = client
        .search_bugs(&query)
        .await
        .map_err(|e| format!("search failed: {e}"))?;

    if bugs.is_empty() {
        println!("No open backport candidates");
        return Ok(());
    }
    print!("{}", format::render(&format::backport_columns(), &bugs));
    Ok(())
}

async fn cmd_backport_set(client: &bugzilla::Client, id: u32, version: &str) -> Result<(), String> {
    let whiteboard = format!("backport-to: {version}");
    client
        .update_whiteboard(id, &whiteboard)
        .await
        .map_err(|e| format!("failed to update bug {id}: {e}"))?;
    eprintln!("Bug {id} marked for backport to {version}");
    Ok(())
}

fn cmd_open(config: &Config, id: u32) -> Result<(), String> {
    let url = format!(
        "{}/show_bug.cgi?id={id}",
        config.bugzilla.endpoint.trim_end_matches('/')
    );
    webbrowser::open(&url).map_err(|e| format!("failed to open {url}: {e}"))?;
    eprintln!("Opened {url}");
    Ok(())
}

fn pull_url(base: &str, pull: &PullRef) -> String {
    format!(
        "{}/{}/{}/pull/{}",
        base.trim_end_matches('/'),
        pull.org,
        pull.repo,
        pull.number
    )
}
