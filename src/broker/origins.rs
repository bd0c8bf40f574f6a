//! Accepted origins
//!
//! Cross-document peers identify themselves by origin (`scheme://host[:port]`).
//! The allow-list always holds the host's own origin; other entries are added
//! and removed explicitly. Origins are compared in their normalised ASCII
//! serialization, so `http://Host:80/` and `http://host` are the same entry.

use tracing::{debug, warn};
use url::Url;

/// Normalise an origin string, or `None` if it is not a bare http(s) origin.
pub fn normalize_origin(origin: &str) -> Option<String> {
    let trimmed = origin.trim();
    if trimmed.is_empty() {
        return None;
    }
    let url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;
    if !url.username().is_empty()
        || url.password().is_some()
        || url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
    {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

#[derive(Debug, Clone)]
pub struct AcceptedOrigins {
    host: String,
    extra: Vec<String>,
}

impl AcceptedOrigins {
    /// Create the list with `host_origin` as its implicit entry.
    pub fn new(host_origin: &str) -> Self {
        let host = match normalize_origin(host_origin) {
            Some(normalized) => normalized,
            None => {
                warn!("Host origin '{host_origin}' is not a valid origin; keeping it verbatim");
                host_origin.trim().to_string()
            }
        };
        Self {
            host,
            extra: Vec::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Add an origin. Invalid origins are logged and ignored; duplicates are
    /// a no-op. Returns whether the list changed.
    pub fn add(&mut self, origin: &str) -> bool {
        let Some(normalized) = normalize_origin(origin) else {
            warn!("Ignoring invalid accepted origin '{origin}'");
            return false;
        };
        if self.contains_normalized(&normalized) {
            debug!("Origin {normalized} is already accepted");
            return false;
        }
        debug!("Accepting origin {normalized}");
        self.extra.push(normalized);
        true
    }

    /// Remove a previously added origin. The host origin cannot be removed.
    pub fn remove(&mut self, origin: &str) -> bool {
        let Some(normalized) = normalize_origin(origin) else {
            warn!("Ignoring removal of invalid origin '{origin}'");
            return false;
        };
        if normalized == self.host {
            warn!("The host origin {normalized} is always accepted and cannot be removed");
            return false;
        }
        let before = self.extra.len();
        self.extra.retain(|o| *o != normalized);
        self.extra.len() != before
    }

    pub fn contains(&self, origin: &str) -> bool {
        normalize_origin(origin).is_some_and(|normalized| self.contains_normalized(&normalized))
    }

    /// Host origin first, then added origins in insertion order.
    pub fn list(&self) -> Vec<String> {
        std::iter::once(self.host.clone())
            .chain(self.extra.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        1 + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn contains_normalized(&self, normalized: &str) -> bool {
        self.host == normalized || self.extra.iter().any(|o| o == normalized)
    }
}
