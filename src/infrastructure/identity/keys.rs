//! Signing keys of the identity provider.
//!
//! The remote source caches the published JWK set for as long as the
//! provider's `Cache-Control: max-age` allows. An unknown key id forces an
//! early refresh, but at most once per [`MIN_REFRESH_INTERVAL`]. When a
//! refresh fails the previous keys keep being served and the next attempt
//! waits another [`MIN_REFRESH_INTERVAL`]; only a source that never loaded
//! keys reports [`KeyError`].

use anyhow::{Context, Result};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Used when the provider sends no usable `max-age`.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Shortest gap between two fetches triggered by unknown key ids.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
#[error("signing keys unavailable: {0}")]
pub struct KeyError(String);

/// Where verification keys come from.
pub enum KeySource {
    // ---
    /// JWK set fetched over HTTP and cached.
    Remote(RemoteJwks),

    /// Fixed keys by key id.
    Static(HashMap<String, DecodingKey>),
}

impl KeySource {
    /// Remote JWK set at `url`, fetched lazily on first use.
    pub fn remote(http: reqwest::Client, url: impl Into<String>) -> Self {
        // ---
        KeySource::Remote(RemoteJwks {
            http,
            url: url.into(),
            cache: RwLock::new(None),
        })
    }

    /// Static RSA public keys given as `(kid, PEM)` pairs.
    ///
    /// # Errors
    /// Returns an error if any PEM does not hold an RSA public key.
    pub fn from_rsa_pems<'a>(pems: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Result<Self> {
        // ---
        let mut keys = HashMap::new();
        for (kid, pem) in pems {
            let key = DecodingKey::from_rsa_pem(pem)
                .with_context(|| format!("Invalid RSA public key for kid {kid}"))?;
            keys.insert(kid.to_string(), key);
        }
        Ok(KeySource::Static(keys))
    }

    /// Key for `kid`, or `None` when the provider does not publish it.
    pub async fn key_for(&self, kid: &str) -> Result<Option<DecodingKey>, KeyError> {
        // ---
        match self {
            KeySource::Static(keys) => Ok(keys.get(kid).cloned()),
            KeySource::Remote(remote) => remote.key_for(kid).await,
        }
    }
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    max_age: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        // ---
        self.fetched_at.elapsed() < self.max_age
    }

    fn may_refresh_early(&self) -> bool {
        // ---
        self.fetched_at.elapsed() >= MIN_REFRESH_INTERVAL
    }

    /// `Some(answer)` when the cache can answer for `kid` without a fetch.
    fn answer(&self, kid: &str) -> Option<Option<DecodingKey>> {
        // ---
        if !self.is_fresh() {
            return None;
        }
        match self.keys.get(kid) {
            Some(key) => Some(Some(key.clone())),
            None if self.may_refresh_early() => None,
            None => Some(None),
        }
    }
}

pub struct RemoteJwks {
    http: reqwest::Client,
    url: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl RemoteJwks {
    async fn key_for(&self, kid: &str) -> Result<Option<DecodingKey>, KeyError> {
        // ---
        if let Some(answer) = self.cache.read().await.as_ref().and_then(|c| c.answer(kid)) {
            return Ok(answer);
        }

        let mut cache = self.cache.write().await;

        // Another request may have refreshed while we waited for the lock.
        if let Some(answer) = cache.as_ref().and_then(|c| c.answer(kid)) {
            return Ok(answer);
        }

        match self.fetch().await {
            Ok(fresh) => {
                let key = fresh.keys.get(kid).cloned();
                *cache = Some(fresh);
                Ok(key)
            }
            Err(err) => {
                let Some(stale) = cache.as_mut() else {
                    return Err(err);
                };
                tracing::warn!("Refreshing signing keys failed, serving cached set: {}", err);
                stale.fetched_at = Instant::now();
                stale.max_age = MIN_REFRESH_INTERVAL;
                Ok(stale.keys.get(kid).cloned())
            }
        }
    }

    async fn fetch(&self) -> Result<CachedKeys, KeyError> {
        // ---
        tracing::debug!(url = %self.url, "Fetching identity provider signing keys");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeyError(e.to_string()))?;

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_MAX_AGE);

        let jwks: JwkSet = response.json().await.map_err(|e| KeyError(e.to_string()))?;

        let keys: HashMap<String, DecodingKey> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let kid = jwk.common.key_id.clone()?;
                match DecodingKey::from_jwk(jwk) {
                    Ok(key) => Some((kid, key)),
                    Err(err) => {
                        tracing::warn!(%kid, "Skipping unusable signing key: {}", err);
                        None
                    }
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(KeyError("provider published no usable keys".to_string()));
        }

        tracing::info!(count = keys.len(), ?max_age, "Loaded identity provider signing keys");

        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            max_age,
        })
    }
}

/// Extract `max-age` seconds from a `Cache-Control` header value.
fn parse_max_age(value: &str) -> Option<Duration> {
    // ---
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
