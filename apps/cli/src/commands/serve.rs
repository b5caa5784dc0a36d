//! Serve command implementation.

use std::net::SocketAddr;

use anyhow::{Context, Result};

use super::ProjectArgs;

pub async fn execute(project: &ProjectArgs, address: Option<SocketAddr>) -> Result<()> {
    let mut config = project.load_config()?;
    if let Some(address) = address {
        config.server.address = address;
    }

    loanboard_server::run(&config).await.context("Server terminated with an error")
}
