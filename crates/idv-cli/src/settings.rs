//! # Connection and Workflow Settings
//!
//! Client configuration comes from the environment (`IDV_*` variables)
//! with command-line overrides. Workflow configuration comes from an
//! optional YAML file; absent fields take their defaults.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use idv_client::{ClientConfig, VerificationClient};
use idv_flow::{PollPhase, WorkflowConfig};

/// Flags shared by every subcommand that talks to the API.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// API base URL. Overrides `IDV_BASE_URL`.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Force sandbox mode on or off. Overrides `IDV_SANDBOX`.
    #[arg(long, global = true)]
    pub sandbox: Option<bool>,

    /// Per-request timeout in seconds. Overrides `IDV_TIMEOUT_SECS`.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

impl ConnectionArgs {
    /// Apply the command-line overrides on top of `config`.
    pub fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig> {
        if let Some(base_url) = &self.base_url {
            let mut rebased = ClientConfig::new(base_url, config.api_key.as_str())
                .context("invalid --base-url")?;
            rebased.timeout_secs = config.timeout_secs;
            rebased.sandbox = config.sandbox;
            config = rebased;
        }
        if let Some(sandbox) = self.sandbox {
            config.sandbox = Some(sandbox);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        Ok(config)
    }

    /// Build an API client from the environment plus overrides.
    pub fn client(&self) -> Result<Arc<VerificationClient>> {
        let config = ClientConfig::from_env().context("loading API configuration")?;
        let config = self.apply(config)?;
        tracing::debug!(
            base_url = %config.base_url,
            sandbox = config.is_sandbox(),
            "API client configured"
        );
        Ok(Arc::new(VerificationClient::new(config)?))
    }
}

/// Load workflow configuration from `path`, or defaults when absent.
pub fn load_workflow_config(path: Option<&Path>) -> Result<WorkflowConfig> {
    let Some(path) = path else {
        return Ok(WorkflowConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow config {}", path.display()))?;
    let config: WorkflowConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing workflow config {}", path.display()))?;
    check_workflow_config(&config)?;
    tracing::debug!(path = %path.display(), "loaded workflow config");
    Ok(config)
}

/// Reject values the engine cannot run with.
pub fn check_workflow_config(config: &WorkflowConfig) -> Result<()> {
    let threshold = config.cross_validation_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        bail!("cross_validation_threshold must be within 0..=1, got {threshold}");
    }
    if config.accepted_document_types.is_empty() {
        bail!("accepted_document_types must not be empty");
    }
    if config.max_file_bytes == 0 {
        bail!("max_file_bytes must be positive");
    }
    for phase in [
        PollPhase::FrontDocument,
        PollPhase::BackDocument,
        PollPhase::CrossValidation,
        PollPhase::LiveCapture,
    ] {
        let policy = config.poll_policy(phase);
        if policy.interval_ms == 0 || policy.timeout_ms == 0 {
            bail!("{phase} polling needs a positive interval and timeout");
        }
        if policy.interval_ms > policy.timeout_ms {
            bail!("{phase} polling interval exceeds its timeout");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn absent_path_gives_defaults() {
        let config = load_workflow_config(None).unwrap();
        assert_eq!(config, WorkflowConfig::default());
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let file = yaml_file(
            "require_back_of_id: false\n\
             cross_validation_threshold: 0.8\n\
             accepted_document_types: [passport]\n\
             polling:\n  live_capture:\n    interval_ms: 500\n    timeout_ms: 30000\n",
        );
        let config = load_workflow_config(Some(file.path())).unwrap();
        assert!(!config.require_back_of_id);
        assert_eq!(config.cross_validation_threshold, 0.8);
        assert_eq!(config.poll_policy(PollPhase::LiveCapture).interval_ms, 500);
        assert_eq!(
            config.poll_policy(PollPhase::CrossValidation),
            WorkflowConfig::default().poll_policy(PollPhase::CrossValidation)
        );
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let file = yaml_file("cross_validation_threshold: 1.5\n");
        let err = load_workflow_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("cross_validation_threshold"));
    }

    #[test]
    fn interval_longer_than_timeout_is_rejected() {
        let file = yaml_file("polling:\n  front_document:\n    interval_ms: 5000\n    timeout_ms: 1000\n");
        assert!(load_workflow_config(Some(file.path())).is_err());
    }

    #[test]
    fn unreadable_path_names_the_file() {
        let err = load_workflow_config(Some(Path::new("/nonexistent/workflow.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/workflow.yaml"));
    }

    #[test]
    fn overrides_replace_environment_values() {
        let base = ClientConfig::new("https://api.example.com", "key-1").unwrap();
        let args = ConnectionArgs {
            base_url: Some("http://localhost:9000".into()),
            sandbox: Some(false),
            timeout_secs: Some(7),
        };
        let config = args.apply(base).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:9000/");
        assert_eq!(config.api_key.as_str(), "key-1");
        assert_eq!(config.timeout_secs, 7);
        assert!(!config.is_sandbox());
    }

    #[test]
    fn bad_base_url_is_reported() {
        let base = ClientConfig::new("https://api.example.com", "key-1").unwrap();
        let args = ConnectionArgs {
            base_url: Some("not a url".into()),
            ..ConnectionArgs::default()
        };
        assert!(args.apply(base).is_err());
    }
}
