//! # idv-client -- Typed Rust client for the identity-verification API
//!
//! Thin wrapper over the remote verification service: start a session,
//! upload front/back document images, upload a live selfie frame and poll
//! status. Non-2xx responses are mapped onto [`ClientError`] so callers can
//! distinguish user-correctable rejections from transient faults.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/api/verify/start` | Open a verification session |
//! | POST   | `/api/verify/document` | Upload front of document |
//! | POST   | `/api/verify/back-of-id` | Upload back of document |
//! | POST   | `/api/verify/live-capture` | Upload live selfie frame |
//! | POST   | `/api/verify/generate-live-token` | Issue live-capture challenge |
//! | GET    | `/api/verify/status/{id}` | Poll session status |
//! | GET    | `/api/verify/results/{id}` | Comprehensive results |
//! | GET    | `/api/health` | Service health |
//!
//! ## Seam
//!
//! The workflow engine depends on [`RemoteVerificationClient`], not on
//! [`VerificationClient`], so it can be driven by a scripted fake in tests.
//! Start and uploads are never retried automatically; only read-only calls
//! go through [`retry::retry_transient`].

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use retry::{retry_transient, Backoff, RetryPolicy};
pub use types::{
    CrossValidationResults, DocumentUpload, HealthStatus, LiveCaptureUpload, LiveToken,
    RemoteStatus, SessionContext, StartResponse, StatusSnapshot, UploadReceipt,
    VerificationResults,
};

use std::time::Duration;

use async_trait::async_trait;
use idv_core::VerificationId;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::StatusEnvelope;

/// Version reported in `User-Agent` and `X-SDK-Version`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Operations the workflow engine needs from the remote service.
#[async_trait]
pub trait RemoteVerificationClient: Send + Sync {
    /// Open a session. Not idempotent: call exactly once per session.
    async fn start(&self, context: &SessionContext) -> Result<VerificationId, ClientError>;

    async fn upload_front_document(
        &self,
        verification_id: &VerificationId,
        upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError>;

    async fn upload_back_document(
        &self,
        verification_id: &VerificationId,
        upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError>;

    async fn upload_live_capture(
        &self,
        verification_id: &VerificationId,
        upload: &LiveCaptureUpload,
    ) -> Result<UploadReceipt, ClientError>;

    async fn generate_live_token(
        &self,
        verification_id: &VerificationId,
        challenge_type: Option<&str>,
    ) -> Result<LiveToken, ClientError>;

    /// Read-only status observation. Safe to call repeatedly.
    async fn get_status(&self, verification_id: &VerificationId)
        -> Result<StatusSnapshot, ClientError>;
}

/// HTTP implementation of [`RemoteVerificationClient`].
#[derive(Debug, Clone)]
pub struct VerificationClient {
    http: reqwest::Client,
    base_url: Url,
    sandbox: bool,
    read_retry: RetryPolicy,
}

impl VerificationClient {
    /// Create a new client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(config.api_key.as_str()).map_err(|_| {
            ConfigError::InvalidValue("api_key".into(), "not a valid header value".into())
        })?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("x-sdk-version"),
            HeaderValue::from_static(CLIENT_VERSION),
        );
        headers.insert(
            HeaderName::from_static("x-sdk-language"),
            HeaderValue::from_static("rust"),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("idv-client/{CLIENT_VERSION}"))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let sandbox = config.is_sandbox();
        tracing::debug!(base_url = %config.base_url, sandbox, "verification client ready");

        Ok(Self {
            http,
            base_url: config.base_url,
            sandbox,
            read_retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy used for results and health reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// Whether requests carry the `sandbox` flag.
    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_sandbox(&self, form: Form) -> Form {
        if self.sandbox {
            form.text("sandbox", "true")
        } else {
            form
        }
    }

    /// Fetch comprehensive results for a session.
    pub async fn get_results(
        &self,
        verification_id: &VerificationId,
    ) -> Result<VerificationResults, ClientError> {
        let endpoint = format!("GET /api/verify/results/{verification_id}");
        let url = self.endpoint_url(&format!("api/verify/results/{verification_id}"));
        let (url, endpoint) = (&url, &endpoint);

        retry_transient(self.read_retry, endpoint, || async move {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| http_error(endpoint, e))?;
            read_json(endpoint, resp).await
        })
        .await
    }

    /// Check service reachability. A 404 means the deployment has no
    /// health route and is reported as `ok`.
    pub async fn health_check(&self) -> Result<HealthStatus, ClientError> {
        let endpoint = "GET /api/health";
        let url = self.endpoint_url("api/health");
        let url = &url;

        let result = retry_transient(self.read_retry, endpoint, || async move {
            let resp = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| http_error(endpoint, e))?;
            read_json::<HealthStatus>(endpoint, resp).await
        })
        .await;

        match result {
            Err(ClientError::NotFound { .. }) => {
                tracing::debug!("health route not found; assuming service is up");
                Ok(HealthStatus::assumed_ok())
            }
            other => other,
        }
    }

    async fn upload_document(
        &self,
        path: &str,
        part_name: &'static str,
        verification_id: &VerificationId,
        upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError> {
        let endpoint = format!("POST /{path}");
        let url = self.endpoint_url(path);

        let file = Part::bytes(upload.file.bytes().to_vec())
            .file_name(upload.file.file_name().to_string())
            .mime_str(upload.file.content_type().mime())
            .map_err(|e| http_error(&endpoint, e))?;
        let mut form = Form::new()
            .text("verification_id", verification_id.to_string())
            .text("document_type", upload.document_type.as_str());
        if let Some(metadata) = &upload.metadata {
            form = form.text("metadata", metadata.to_string());
        }
        let form = self.with_sandbox(form).part(part_name, file);

        tracing::info!(
            %verification_id,
            document_type = %upload.document_type,
            size = upload.file.len(),
            "uploading {part_name}"
        );

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        read_json(&endpoint, resp).await
    }
}

#[async_trait]
impl RemoteVerificationClient for VerificationClient {
    async fn start(&self, context: &SessionContext) -> Result<VerificationId, ClientError> {
        let endpoint = "POST /api/verify/start";
        let url = self.endpoint_url("api/verify/start");

        let mut params = vec![("user_id", context.session_token.as_str())];
        if self.sandbox {
            params.push(("sandbox", "true"));
        }

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        let started: StartResponse = read_json(endpoint, resp).await?;

        let id = VerificationId::new(started.verification_id).map_err(|e| {
            ClientError::InvalidResponse {
                endpoint: endpoint.into(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!(verification_id = %id, status = %started.status, "verification session started");
        Ok(id)
    }

    async fn upload_front_document(
        &self,
        verification_id: &VerificationId,
        upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError> {
        self.upload_document("api/verify/document", "document", verification_id, upload)
            .await
    }

    async fn upload_back_document(
        &self,
        verification_id: &VerificationId,
        upload: &DocumentUpload,
    ) -> Result<UploadReceipt, ClientError> {
        self.upload_document("api/verify/back-of-id", "back_of_id", verification_id, upload)
            .await
    }

    async fn upload_live_capture(
        &self,
        verification_id: &VerificationId,
        upload: &LiveCaptureUpload,
    ) -> Result<UploadReceipt, ClientError> {
        let endpoint = "POST /api/verify/live-capture";
        let url = self.endpoint_url("api/verify/live-capture");

        let image = Part::bytes(upload.frame.bytes().to_vec())
            .file_name("selfie.jpg")
            .mime_str(upload.frame.content_type().mime())
            .map_err(|e| http_error(endpoint, e))?;
        let mut form = Form::new().text("verification_id", verification_id.to_string());
        if let Some(challenge) = &upload.challenge_response {
            form = form.text("challenge_response", challenge.clone());
        }
        let form = self.with_sandbox(form).part("live_image", image);

        tracing::info!(%verification_id, size = upload.frame.bytes().len(), "uploading live capture");

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    async fn generate_live_token(
        &self,
        verification_id: &VerificationId,
        challenge_type: Option<&str>,
    ) -> Result<LiveToken, ClientError> {
        let endpoint = "POST /api/verify/generate-live-token";
        let url = self.endpoint_url("api/verify/generate-live-token");

        let mut params = vec![("verification_id", verification_id.as_str())];
        if let Some(challenge) = challenge_type {
            params.push(("challenge_type", challenge));
        }

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    async fn get_status(
        &self,
        verification_id: &VerificationId,
    ) -> Result<StatusSnapshot, ClientError> {
        let endpoint = format!("GET /api/verify/status/{verification_id}");
        let url = self.endpoint_url(&format!("api/verify/status/{verification_id}"));

        let mut request = self.http.get(&url);
        if self.sandbox {
            request = request.query(&[("sandbox", "true")]);
        }
        let resp = request.send().await.map_err(|e| http_error(&endpoint, e))?;
        let envelope: StatusEnvelope = read_json(&endpoint, resp).await?;
        let snapshot = envelope.into_snapshot();
        tracing::debug!(%verification_id, status = %snapshot.status, "status observed");
        Ok(snapshot)
    }
}

fn http_error(endpoint: &str, source: reqwest::Error) -> ClientError {
    ClientError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::from_status(endpoint, status, body));
    }

    resp.json().await.map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.to_string(),
        source: e,
    })
}
