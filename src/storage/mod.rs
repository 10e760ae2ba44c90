//! Per-user photo storage for try-on inputs and results.
//!
//! Objects live under `users/{uid}/try-on/{category}/{millis}-{token}.{ext}`.
//! The millisecond prefix orders listings, the token keeps two uploads in the
//! same millisecond apart. Keys made here carry a 13 character token and a
//! short lower-case extension; existing objects written by the web client
//! have tokens of 1 to 13 characters and whatever extension the file had, so
//! parsing accepts both. The server only uses
//! [`StorageKey::parse`] to check that paths named in a try-on request belong to
//! the caller; the rest of the module is used by clients of the bucket.

mod firebase;

use crate::domain::{GarmentCategory, TryOnRequest};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use firebase::{FirebaseStorage, DEFAULT_STORAGE_ENDPOINT};

const ROOT: &str = "users";
const SCOPE: &str = "try-on";

const TOKEN_LEN: usize = 13;
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_EXT_LEN: usize = 8;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    // ---
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The path is well formed but belongs to another user or category.
    #[error("path is outside the caller's namespace: {0}")]
    OutsideNamespace(String),

    #[error("object not found: {0}")]
    NotFound(String),

    /// The storage service answered with a non-success status.
    #[error("storage service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("storage service unreachable: {0}")]
    Transport(String),
}

// ============================================================================
// Keys
// ============================================================================

/// Folder a photo is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    // ---
    Model,
    Cloth,
    Results,
}

impl PhotoCategory {
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            PhotoCategory::Model => "model",
            PhotoCategory::Cloth => "cloth",
            PhotoCategory::Results => "results",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        // ---
        match segment {
            "model" => Some(PhotoCategory::Model),
            "cloth" => Some(PhotoCategory::Cloth),
            "results" => Some(PhotoCategory::Results),
            _ => None,
        }
    }
}

/// A parsed or freshly generated object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    // ---
    pub user_id: String,
    pub category: PhotoCategory,
    /// Upload time in milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    pub token: String,
    /// File extension without the dot, as it appears in the path.
    pub ext: String,
}

fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty() && !user_id.contains('/')
}

fn normalize_ext(ext: &str) -> Option<String> {
    // ---
    let valid = (1..=MAX_EXT_LEN).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

fn random_token() -> String {
    // ---
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

impl StorageKey {
    /// New key for an upload happening now.
    ///
    /// # Errors
    /// Returns `InvalidKey` for an empty user id, one containing `/`, or an
    /// extension that is not 1 to 8 ASCII alphanumerics.
    pub fn generate(
        user_id: &str,
        category: PhotoCategory,
        ext: &str,
    ) -> Result<Self, StorageError> {
        // ---
        if !valid_user_id(user_id) {
            return Err(StorageError::InvalidKey(format!("bad user id {user_id:?}")));
        }
        let ext = normalize_ext(ext)
            .ok_or_else(|| StorageError::InvalidKey(format!("bad extension {ext:?}")))?;

        Ok(Self {
            user_id: user_id.to_string(),
            category,
            timestamp_millis: Utc::now().timestamp_millis(),
            token: random_token(),
            ext,
        })
    }

    /// Recover the parts of an object path.
    ///
    /// Accepts keys from [`StorageKey::generate`] and the looser shape
    /// uploaded by the web client: a `[0-9a-z]` token of 1 to 13 characters
    /// and any non-empty extension, kept verbatim.
    pub fn parse(path: &str) -> Result<Self, StorageError> {
        // ---
        let bad = || StorageError::InvalidKey(path.to_string());

        let parts: Vec<&str> = path.split('/').collect();
        let [root, user_id, scope, category, file] = parts.as_slice() else {
            return Err(bad());
        };
        if *root != ROOT || *scope != SCOPE || !valid_user_id(user_id) {
            return Err(bad());
        }
        let category = PhotoCategory::from_segment(category).ok_or_else(bad)?;

        let (millis, rest) = file.split_once('-').ok_or_else(bad)?;
        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let timestamp_millis: i64 = millis.parse().map_err(|_| bad())?;

        let (token, ext) = rest.rsplit_once('.').ok_or_else(bad)?;
        let token_ok = (1..=TOKEN_LEN).contains(&token.len())
            && token.bytes().all(|b| TOKEN_ALPHABET.contains(&b));
        if !token_ok || ext.is_empty() {
            return Err(bad());
        }

        Ok(Self {
            user_id: user_id.to_string(),
            category,
            timestamp_millis,
            token: token.to_string(),
            ext: ext.to_string(),
        })
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }

    /// True when the key sits in `user_id`'s folder for `category`.
    pub fn is_owned_by(&self, user_id: &str, category: PhotoCategory) -> bool {
        self.user_id == user_id && self.category == category
    }

    fn content_type(&self) -> &'static str {
        // ---
        match self.ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ROOT}/{}/{SCOPE}/{}/{}-{}.{}",
            self.user_id,
            self.category.as_str(),
            self.timestamp_millis,
            self.token,
            self.ext
        )
    }
}

/// Folder prefix (with trailing slash) holding one user's photos of a category.
pub fn category_prefix(user_id: &str, category: PhotoCategory) -> String {
    format!("{ROOT}/{user_id}/{SCOPE}/{}/", category.as_str())
}

// ============================================================================
// Object store seam
// ============================================================================

/// An object as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub download_url: String,
}

/// Minimal blob store the photo library runs on.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    // ---
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Every object whose path starts with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Photo library
// ============================================================================

/// A photo in the caller's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPhoto {
    pub path: String,
    pub download_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One signed-in user's view of the bucket.
pub struct PhotoLibrary<S> {
    // ---
    store: S,
    user_id: String,
}

impl<S: ObjectStore> PhotoLibrary<S> {
    // ---
    pub fn new(store: S, user_id: impl Into<String>) -> Self {
        // ---
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    fn owned_key(&self, path: &str, category: PhotoCategory) -> Result<StorageKey, StorageError> {
        // ---
        let key = StorageKey::parse(path)?;
        if !key.is_owned_by(&self.user_id, category) {
            return Err(StorageError::OutsideNamespace(path.to_string()));
        }
        Ok(key)
    }

    /// Store `bytes` under a fresh key in `category`.
    pub async fn upload(
        &self,
        category: PhotoCategory,
        bytes: Vec<u8>,
        ext: &str,
    ) -> Result<StoredPhoto, StorageError> {
        // ---
        let key = StorageKey::generate(&self.user_id, category, ext)?;
        let path = key.to_string();

        tracing::debug!(%path, len = bytes.len(), "Uploading photo");
        let object = self.store.put(&path, bytes, key.content_type()).await?;

        Ok(StoredPhoto {
            path: object.path,
            download_url: object.download_url,
            uploaded_at: key.uploaded_at().unwrap_or_else(Utc::now),
        })
    }

    /// Photos in `category`, newest first. Objects whose names do not follow
    /// the key scheme are skipped.
    pub async fn list(&self, category: PhotoCategory) -> Result<Vec<StoredPhoto>, StorageError> {
        // ---
        let prefix = category_prefix(&self.user_id, category);
        let objects = self.store.list(&prefix).await?;

        let mut photos: Vec<(i64, StoredPhoto)> = objects
            .into_iter()
            .filter_map(|object| {
                let key = match self.owned_key(&object.path, category) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::debug!("Skipping foreign object: {}", err);
                        return None;
                    }
                };
                let uploaded_at = key.uploaded_at()?;
                Some((
                    key.timestamp_millis,
                    StoredPhoto {
                        path: object.path,
                        download_url: object.download_url,
                        uploaded_at,
                    },
                ))
            })
            .collect();

        photos.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(photos.into_iter().map(|(_, photo)| photo).collect())
    }

    /// Remove one of the caller's photos.
    ///
    /// # Errors
    /// `OutsideNamespace` if the path belongs to anyone else; nothing is sent
    /// to the store in that case.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        // ---
        let key = StorageKey::parse(path)?;
        if key.user_id != self.user_id {
            return Err(StorageError::OutsideNamespace(path.to_string()));
        }
        self.store.delete(path).await
    }

    /// Fetch a stored model photo and garment photo and package them as a
    /// try-on call with base64 image content.
    pub async fn prepare_try_on(
        &self,
        model_path: &str,
        cloth_path: &str,
        category: GarmentCategory,
        description: &str,
    ) -> Result<TryOnRequest, StorageError> {
        // ---
        self.owned_key(model_path, PhotoCategory::Model)?;
        self.owned_key(cloth_path, PhotoCategory::Cloth)?;

        let (model, garment) =
            tokio::try_join!(self.store.get(model_path), self.store.get(cloth_path))?;

        let engine = base64::engine::general_purpose::STANDARD;
        Ok(TryOnRequest {
            model_image: engine.encode(model),
            garment_image: engine.encode(garment),
            category,
            description: description.to_string(),
        })
    }
}
