//! Image host client for product photos.
//!
//! Uploads take a base64 data URI straight from the admin panel. Every
//! request is signed: the signed parameters are sorted by key, joined as
//! `k=v&k2=v2`, the API secret is appended, and the SHA-256 hex digest of
//! the result is sent as `signature` alongside `signature_algorithm=sha256`.

use std::collections::BTreeMap;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::MediaConfig;
use crate::services::catalog::ProductImage;

/// Upper bound on the base64 payload of a data URI.
pub const MAX_DATA_URI_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_TYPES: [&str; 4] = ["png", "jpeg", "webp", "gif"];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("image host request failed: {0}")]
    Upstream(String),
}

impl crate::error::ErrorCode for MediaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "E_INVALID_IMAGE",
            Self::Upstream(_) => "E_MEDIA_UPSTREAM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
}

impl From<UploadedImage> for ProductImage {
    fn from(img: UploadedImage) -> Self {
        Self { url: img.url, public_id: img.public_id }
    }
}

/// Check that `data_uri` is a base64 image of an allowed type and size.
///
/// # Errors
///
/// `InvalidImage` describing the first problem found.
pub fn validate_data_uri(data_uri: &str) -> Result<(), MediaError> {
    let rest = data_uri
        .strip_prefix("data:image/")
        .ok_or_else(|| MediaError::InvalidImage("expected a data:image/ URI".into()))?;
    let (kind, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| MediaError::InvalidImage("expected base64 encoding".into()))?;
    if !ALLOWED_TYPES.contains(&kind) {
        return Err(MediaError::InvalidImage(format!("unsupported image type: {kind}")));
    }
    if payload.is_empty() {
        return Err(MediaError::InvalidImage("empty image".into()));
    }
    if payload.len() > MAX_DATA_URI_BYTES {
        return Err(MediaError::InvalidImage("image exceeds 10 MiB".into()));
    }
    if !payload.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')) {
        return Err(MediaError::InvalidImage("payload is not base64".into()));
    }
    Ok(())
}

/// SHA-256 request signature over sorted `params` plus `secret`.
#[must_use]
pub fn sign_params(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{joined}{secret}").as_bytes()))
}

#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    config: MediaConfig,
}

impl std::fmt::Debug for MediaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClient")
            .field("cloud_name", &self.config.cloud_name)
            .field("folder", &self.config.folder)
            .finish_non_exhaustive()
    }
}

impl From<MediaConfig> for MediaClient {
    fn from(config: MediaConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl MediaClient {
    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{action}", self.config.api_base, self.config.cloud_name)
    }

    fn signed_form(&self, mut params: BTreeMap<&'static str, String>) -> Vec<(&'static str, String)> {
        params.insert("timestamp", time::OffsetDateTime::now_utc().unix_timestamp().to_string());
        let signature = sign_params(&params, &self.config.api_secret);
        let mut form = params.into_iter().collect::<Vec<_>>();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_owned()));
        form
    }

    async fn post(&self, action: &str, form: &[(&str, String)]) -> Result<reqwest::Response, MediaError> {
        let resp = self
            .http
            .post(self.endpoint(action))
            .form(form)
            .send()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MediaError::Upstream(format!("{status}: {body}")));
        }
        Ok(resp)
    }

    /// Upload a data URI into the configured folder.
    ///
    /// # Errors
    ///
    /// `InvalidImage` before any network call, otherwise `Upstream`.
    pub async fn upload(&self, data_uri: &str) -> Result<UploadedImage, MediaError> {
        validate_data_uri(data_uri)?;
        let mut params = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        let mut form = self.signed_form(params);
        form.push(("file", data_uri.to_owned()));

        let uploaded = self
            .post("upload", &form)
            .await?
            .json::<UploadedImage>()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        tracing::info!(public_id = %uploaded.public_id, "image uploaded");
        Ok(uploaded)
    }

    /// Delete an uploaded image. A missing image is not an error.
    ///
    /// # Errors
    ///
    /// `Upstream` on transport failure or an unexpected result.
    pub async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_owned());
        let form = self.signed_form(params);

        let resp = self
            .post("destroy", &form)
            .await?
            .json::<DestroyResponse>()
            .await
            .map_err(|e| MediaError::Upstream(e.to_string()))?;
        match resp.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Upstream(format!("destroy returned {other}"))),
        }
    }
}
