//! Identity-document images: upload, time-limited download links, removal.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::domain::{EmployeeId, ImageKind};
use tracing::{debug, warn};
use url::Url;

use crate::{
    backend::ObjectStore,
    error::{ClientError, ClientResult},
};

pub const DEFAULT_BUCKET: &str = "cnic-images";
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn validate(&self) -> ClientResult<()> {
        if !self.content_type.starts_with("image/") {
            return Err(ClientError::validation("Please select an image file"));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClientError::validation("Image must be less than 5MB"));
        }
        Ok(())
    }

    fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub path: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SignedUrlBroker {
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    ttl: Duration,
}

impl SignedUrlBroker {
    pub fn new(objects: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            bucket: bucket.into(),
            ttl: SIGNED_URL_TTL,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object path inside the bucket for a stored reference, which is either
    /// a signed URL (`.../<bucket>/<path>?token=...`) or a bare path.
    pub fn object_path(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Ok(url) = Url::parse(reference) {
            let segments: Vec<&str> = url.path_segments()?.collect();
            let start = segments.iter().position(|segment| *segment == self.bucket)?;
            let path = segments.get(start + 1..)?.join("/");
            return (!path.is_empty()).then_some(path);
        }

        let marker = format!("{}/", self.bucket);
        let path = match reference.split_once(marker.as_str()) {
            Some((_, rest)) => rest,
            None => reference,
        };
        let path = path.split('?').next().unwrap_or_default().trim_matches('/');
        (!path.is_empty()).then(|| path.to_string())
    }

    pub async fn sign(&self, path: &str) -> ClientResult<SignedUrl> {
        let issued_at = Utc::now();
        let url = self
            .objects
            .create_signed_url(&self.bucket, path, self.ttl)
            .await?;
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|err| ClientError::validation(err.to_string()))?;
        Ok(SignedUrl {
            url,
            path: path.to_string(),
            issued_at,
            expires_at: issued_at + ttl,
        })
    }

    /// Signs a fresh link for a stored reference.
    pub async fn resign(&self, reference: &str) -> ClientResult<SignedUrl> {
        let path = self
            .object_path(reference)
            .ok_or_else(|| ClientError::validation("Invalid URL format"))?;
        self.sign(&path).await
    }

    /// Like [`Self::resign`] but falls back to the original link on failure.
    pub async fn refresh(&self, reference: &str) -> String {
        match self.resign(reference).await {
            Ok(signed) => signed.url,
            Err(err) => {
                warn!(error = %err, "storage: signed URL refresh failed; keeping original");
                reference.to_string()
            }
        }
    }

    /// Re-signs an optional reference; `None` stays `None`.
    pub async fn resign_optional(&self, reference: Option<&str>) -> ClientResult<Option<String>> {
        match reference {
            Some(reference) => Ok(Some(self.resign(reference).await?.url)),
            None => Ok(None),
        }
    }

    pub async fn upload(
        &self,
        owner: EmployeeId,
        kind: ImageKind,
        image: ImageUpload,
    ) -> ClientResult<SignedUrl> {
        image.validate()?;
        let path = format!(
            "{owner}/{}-{}.{}",
            kind.as_str(),
            Utc::now().timestamp_millis(),
            image.extension()
        );
        self.objects
            .upload(&self.bucket, &path, &image.content_type, image.bytes)
            .await?;
        debug!(owner = %owner, kind = kind.as_str(), path = %path, "storage: image uploaded");
        self.sign(&path).await
    }

    pub async fn upload_optional(
        &self,
        owner: EmployeeId,
        kind: ImageKind,
        image: Option<ImageUpload>,
    ) -> ClientResult<Option<SignedUrl>> {
        match image {
            Some(image) => Ok(Some(self.upload(owner, kind, image).await?)),
            None => Ok(None),
        }
    }

    /// Removes the object a reference points at; unresolvable references
    /// are skipped.
    pub async fn delete(&self, reference: Option<&str>) -> ClientResult<()> {
        let Some(path) = reference.and_then(|reference| self.object_path(reference)) else {
            return Ok(());
        };
        self.objects.remove(&self.bucket, vec![path]).await
    }
}

#[cfg(test)]
#[path = "tests/signed_url_tests.rs"]
mod tests;
