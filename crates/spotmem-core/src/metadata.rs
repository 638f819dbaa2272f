//! Interface to a remote track metadata service.
//!
//! The engine only needs name, artist and length for a track id it cannot
//! describe from the window title, plus cover art on request. The web client
//! behind this interface lives outside this crate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub name: String,
    pub artist: String,
    /// Length in milliseconds
    pub length: Option<u32>,
}

impl TrackMetadata {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            length: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

pub trait MetadataProvider: Send + Sync {
    /// Look up a track; `Ok(None)` when the service does not know it
    fn track_metadata(&self, track_id: &str) -> Result<Option<TrackMetadata>>;

    /// Cover art image bytes
    fn cover_art(&self, _track_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Renew the access token after [`Error::TokenExpired`]
    fn refresh_token(&self) -> Result<()> {
        Err(Error::TokenExpired)
    }
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for Box<P> {
    fn track_metadata(&self, track_id: &str) -> Result<Option<TrackMetadata>> {
        (**self).track_metadata(track_id)
    }

    fn cover_art(&self, track_id: &str) -> Result<Option<Vec<u8>>> {
        (**self).cover_art(track_id)
    }

    fn refresh_token(&self) -> Result<()> {
        (**self).refresh_token()
    }
}

/// Refreshes the token and retries once when a call fails with an expired token.
pub struct TokenRetry<P> {
    inner: P,
}

impl<P: MetadataProvider> TokenRetry<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn call<T>(&self, f: impl Fn(&P) -> Result<T>) -> Result<T> {
        match f(&self.inner) {
            Err(Error::TokenExpired) => {
                debug!("Access token expired, refreshing");
                self.inner.refresh_token()?;
                f(&self.inner)
            }
            other => other,
        }
    }
}

impl<P: MetadataProvider> MetadataProvider for TokenRetry<P> {
    fn track_metadata(&self, track_id: &str) -> Result<Option<TrackMetadata>> {
        self.call(|p| p.track_metadata(track_id))
    }

    fn cover_art(&self, track_id: &str) -> Result<Option<Vec<u8>>> {
        self.call(|p| p.cover_art(track_id))
    }

    fn refresh_token(&self) -> Result<()> {
        self.inner.refresh_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct ExpiringProvider {
        expired: AtomicBool,
        calls: AtomicUsize,
        refreshes: AtomicUsize,
        refresh_works: bool,
    }

    impl ExpiringProvider {
        fn expired(refresh_works: bool) -> Self {
            Self {
                expired: AtomicBool::new(true),
                refresh_works,
                ..Default::default()
            }
        }
    }

    impl MetadataProvider for ExpiringProvider {
        fn track_metadata(&self, track_id: &str) -> Result<Option<TrackMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.expired.load(Ordering::SeqCst) {
                return Err(Error::TokenExpired);
            }
            Ok(Some(TrackMetadata::new(track_id, "Artist").with_length(1000)))
        }

        fn refresh_token(&self) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_works {
                self.expired.store(false, Ordering::SeqCst);
                Ok(())
            } else {
                Err(Error::Metadata("refresh rejected".into()))
            }
        }
    }

    #[test]
    fn test_retries_once_after_refresh() {
        let provider = TokenRetry::new(ExpiringProvider::expired(true));
        let metadata = provider.track_metadata("abc").unwrap().unwrap();

        assert_eq!(metadata.name, "abc");
        let inner = provider.into_inner();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.refreshes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_failure_is_returned() {
        let provider = TokenRetry::new(ExpiringProvider::expired(false));
        let result = provider.track_metadata("abc");

        assert!(matches!(result, Err(Error::Metadata(_))));
        assert_eq!(provider.into_inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_refresh_when_token_valid() {
        let provider = TokenRetry::new(ExpiringProvider::default());
        assert!(provider.track_metadata("abc").unwrap().is_some());
        assert_eq!(provider.cover_art("abc").unwrap(), None);
        assert_eq!(provider.into_inner().refreshes.load(Ordering::SeqCst), 0);
    }
}
