//! [`ObjectStore`] over the Firebase Storage REST API (v0).
//!
//! Requests carry the signed-in user's ID token as
//! `Authorization: Firebase <token>`, so bucket security rules apply exactly
//! as they would for the web SDK.

use super::{ObjectStore, StorageError, StoredObject};
use futures::future::try_join_all;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    name: String,
    #[serde(rename = "downloadTokens", default)]
    download_tokens: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

pub struct FirebaseStorage {
    // ---
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
    id_token: String,
}

impl FirebaseStorage {
    // ---
    pub fn new(
        http: reqwest::Client,
        bucket: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        // ---
        Self::with_endpoint(http, DEFAULT_STORAGE_ENDPOINT, bucket, id_token)
    }

    /// Same as [`FirebaseStorage::new`] but against another host, such as the
    /// storage emulator.
    pub fn with_endpoint(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        // ---
        Self {
            http,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            id_token: id_token.into(),
        }
    }

    /// `{endpoint}/v0/b/{bucket}/o`, with the object name appended as one
    /// percent-encoded segment when given.
    fn objects_url(&self, object: Option<&str>) -> Result<Url, StorageError> {
        // ---
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StorageError::Transport(format!("bad endpoint: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Transport("endpoint cannot be a base".to_string()))?;
            segments.pop_if_empty().extend(["v0", "b", self.bucket.as_str(), "o"]);
            if let Some(name) = object {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn download_url(&self, name: &str, token: Option<&str>) -> Result<String, StorageError> {
        // ---
        let mut url = self.objects_url(Some(name))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url.into())
    }

    fn authorization(&self) -> String {
        format!("Firebase {}", self.id_token)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<reqwest::Response, StorageError> {
        // ---
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn metadata(&self, path: &str) -> Result<StoredObject, StorageError> {
        // ---
        let url = self.objects_url(Some(path))?;
        let meta: ObjectMetadata = self
            .send(self.http.get(url), path)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        self.stored_object(meta)
    }

    fn stored_object(&self, meta: ObjectMetadata) -> Result<StoredObject, StorageError> {
        // ---
        // Several tokens may be issued; any one of them works.
        let token = meta
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next())
            .filter(|t| !t.is_empty());

        Ok(StoredObject {
            download_url: self.download_url(&meta.name, token)?,
            path: meta.name,
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for FirebaseStorage {
    // ---
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        // ---
        let url = self.objects_url(None)?;
        let request = self
            .http
            .post(url)
            .query(&[("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        let meta: ObjectMetadata = self
            .send(request, path)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        self.stored_object(meta)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        // ---
        let url = self.objects_url(Some(path))?;
        let bytes = self
            .send(self.http.get(url).query(&[("alt", "media")]), path)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        // ---
        let url = self.objects_url(None)?;
        let listing: ListResponse = self
            .send(self.http.get(url).query(&[("prefix", prefix)]), prefix)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        // Listings carry no download tokens; fetch each object's metadata.
        try_join_all(listing.items.iter().map(|item| self.metadata(&item.name))).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        // ---
        let url = self.objects_url(Some(path))?;
        self.send(self.http.delete(url), path).await?;
        Ok(())
    }
}
