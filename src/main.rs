mod bugzilla;
mod cli;
mod config;
mod credentials;
mod jira;
mod links;
mod model;
mod session;

use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
