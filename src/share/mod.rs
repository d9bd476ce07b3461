//! Signed, expiring share links.
//!
//! A link proves that its holder was allowed, before a fixed expiry, to fetch
//! one exact path. No server-side state is involved: the expiry and an HMAC
//! over `"<path>:<expiry>"` travel in the query string.
//!
//! ```text
//! https://host/pdf/<document_id>?exp=<unix seconds>&sig=<base64url HMAC-SHA256>
//! ```

pub mod signature;

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use tracing::warn;
use url::Url;

pub use signature::{compute_signature, sign, validate};

/// Secret used when none is configured. Links signed with it are forgeable.
pub const DEFAULT_SECRET: &str = "change-me";

/// Bytes escaped in the target segment of an issued URL
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Why a presented link was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkRejection {
    #[error("missing signature")]
    MissingSignature,

    #[error("invalid expiration")]
    InvalidExpiration,

    #[error("link expired")]
    Expired { expired_at: i64 },

    #[error("invalid signature")]
    InvalidSignature,
}

/// A freshly issued link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    /// Absolute URL including the signature
    pub url: String,

    /// Path that was signed, e.g. `/pdf/<id>` (not percent-encoded)
    pub path: String,

    /// When the link stops working
    pub expires_at: DateTime<Utc>,
}

/// A link that passed both the expiry and the signature check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLink {
    pub path: String,
    pub expires_at: i64,
}

/// Issues and checks share links for stored PDFs
#[derive(Clone)]
pub struct ShareService {
    secret: Vec<u8>,
    base_url: String,
    /// Path component of `base_url`, stripped again when verifying
    base_path: String,
    ttl: Duration,
}

impl std::fmt::Debug for ShareService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareService")
            .field("base_url", &self.base_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ShareService {
    pub fn new(secret: impl Into<Vec<u8>>, base_url: impl Into<String>, ttl: Duration) -> Self {
        let secret = secret.into();
        if secret == DEFAULT_SECRET.as_bytes() {
            warn!("Share links are signed with the default secret; set SHARE_SECRET");
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base_path = Url::parse(&base_url)
            .ok()
            .and_then(|url| decode_path(url.path()))
            .map(|path| path.trim_end_matches('/').to_string())
            .unwrap_or_default();

        Self {
            secret,
            base_url,
            base_path,
            ttl,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path a link for `target_id` points at
    pub fn target_path(target_id: &str) -> String {
        format!("/pdf/{}", target_id)
    }

    /// Issue a link for `target_id` valid for the configured TTL
    pub fn issue(&self, target_id: &str) -> SharedLink {
        self.issue_at(target_id, Utc::now())
    }

    /// Issue a link as if the current time were `now`
    pub fn issue_at(&self, target_id: &str, now: DateTime<Utc>) -> SharedLink {
        // Links carry whole seconds
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_secs = now.timestamp().saturating_add(ttl_secs);
        let expires_at = Utc
            .timestamp_opt(expires_secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        // The signature covers the decoded path; only the URL is escaped
        let path = Self::target_path(target_id);
        let signature = compute_signature(&path, expires_secs, &self.secret);
        let encoded = utf8_percent_encode(target_id, PATH_SEGMENT);

        SharedLink {
            url: format!(
                "{}/pdf/{}?exp={}&sig={}",
                self.base_url, encoded, expires_secs, signature
            ),
            path,
            expires_at,
        }
    }

    /// Signature check only
    pub fn validate(&self, path: &str, expires_at: i64, signature: &str) -> bool {
        validate(path, expires_at, signature, &self.secret)
    }

    /// Expiry check, then signature check
    pub fn verify(
        &self,
        path: &str,
        expires_at: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkRejection> {
        if expires_at < now.timestamp() {
            return Err(LinkRejection::Expired {
                expired_at: expires_at,
            });
        }
        if !self.validate(path, expires_at, signature) {
            return Err(LinkRejection::InvalidSignature);
        }
        Ok(())
    }

    /// Verify a full URL or a bare `/path?exp=..&sig=..`
    pub fn verify_url(&self, link: &str, now: DateTime<Utc>) -> Result<VerifiedLink, LinkRejection> {
        let parsed = match Url::parse(link) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost")
                .and_then(|base| base.join(link))
                .map_err(|_| LinkRejection::InvalidSignature)?,
            Err(_) => return Err(LinkRejection::InvalidSignature),
        };

        let mut exp = None;
        let mut sig = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "exp" => exp = Some(value.into_owned()),
                "sig" => sig = Some(value.into_owned()),
                _ => {}
            }
        }

        let (exp, sig) = match (exp, sig) {
            (Some(exp), Some(sig)) if !exp.is_empty() && !sig.is_empty() => (exp, sig),
            _ => return Err(LinkRejection::MissingSignature),
        };
        let expires_at: i64 = exp.parse().map_err(|_| LinkRejection::InvalidExpiration)?;

        let decoded = decode_path(parsed.path()).ok_or(LinkRejection::InvalidSignature)?;
        let path = self.strip_base_path(&decoded).to_string();
        self.verify(&path, expires_at, &sig, now)?;

        Ok(VerifiedLink { path, expires_at })
    }

    /// Remove the base URL's own path so only the signed part remains.
    ///
    /// Bare links without the prefix are returned unchanged.
    fn strip_base_path<'a>(&self, path: &'a str) -> &'a str {
        if self.base_path.is_empty() {
            return path;
        }
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

/// Percent-decode a URL path, `None` if it is not UTF-8
fn decode_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
