//! # Status and Health Subcommands
//!
//! Read-only calls: the status snapshot or comprehensive results of one
//! session, and the service health check.

use anyhow::{Context, Result};
use clap::Args;
use idv_client::{RemoteVerificationClient, VerificationClient};
use idv_core::VerificationId;

/// Arguments for `idv status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Verification id returned by `start`.
    pub verification_id: String,

    /// Fetch comprehensive results instead of the status snapshot.
    #[arg(long)]
    pub results: bool,
}

/// Entry point for `idv status`.
pub async fn run_status(args: &StatusArgs, client: &VerificationClient) -> Result<u8> {
    let id = VerificationId::new(args.verification_id.as_str())?;
    let json = if args.results {
        let results = client
            .get_results(&id)
            .await
            .with_context(|| format!("fetching results for {id}"))?;
        serde_json::to_string_pretty(&results)?
    } else {
        let snapshot = client
            .get_status(&id)
            .await
            .with_context(|| format!("fetching status for {id}"))?;
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{json}");
    Ok(0)
}

/// Entry point for `idv health`.
pub async fn run_health(client: &VerificationClient) -> Result<u8> {
    let health = client.health_check().await.context("checking API health")?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    if health.status.eq_ignore_ascii_case("ok") || health.status.eq_ignore_ascii_case("healthy")
    {
        Ok(0)
    } else {
        tracing::warn!(status = %health.status, "API reports degraded health");
        Ok(1)
    }
}
