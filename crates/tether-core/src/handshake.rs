//! Upgrade-time origin policy.

use url::Url;

use crate::error::HandshakeError;
use crate::transport::HandshakeRequest;

/// How a service validates the upgrade request before accepting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakePolicy {
    /// Require an absolute-URL `Origin` header, as browsers send.
    #[default]
    CheckOrigin,
    /// Accept every upgrade; for non-browser clients.
    AllowAll,
}

impl HandshakePolicy {
    /// Picks the policy from the non-browser flag.
    pub fn from_allow_non_browser(allow_non_browser: bool) -> Self {
        if allow_non_browser {
            Self::AllowAll
        } else {
            Self::CheckOrigin
        }
    }

    /// Validates the upgrade request.
    ///
    /// Returns the resolved origin, or `None` when the policy accepts
    /// without looking at it.
    pub fn check(&self, request: &HandshakeRequest) -> Result<Option<String>, HandshakeError> {
        match self {
            Self::AllowAll => Ok(None),
            Self::CheckOrigin => resolve_origin(request).map(Some),
        }
    }
}

fn resolve_origin(request: &HandshakeRequest) -> Result<String, HandshakeError> {
    let raw = request
        .header("origin")
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "null")
        .ok_or(HandshakeError::NullOrigin)?;

    let url = Url::parse(raw).map_err(|e| HandshakeError::InvalidOrigin {
        origin: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !url.has_host() {
        return Err(HandshakeError::InvalidOrigin {
            origin: raw.to_string(),
            reason: "origin has no host".into(),
        });
    }

    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_empty_origin_is_null() {
        let policy = HandshakePolicy::CheckOrigin;
        for request in [
            HandshakeRequest::new("/ws"),
            HandshakeRequest::new("/ws").with_header("Origin", ""),
            HandshakeRequest::new("/ws").with_header("Origin", "null"),
        ] {
            assert!(matches!(
                policy.check(&request),
                Err(HandshakeError::NullOrigin)
            ));
        }
    }

    #[test]
    fn test_allow_all_skips_the_check() {
        let policy = HandshakePolicy::from_allow_non_browser(true);
        assert_eq!(policy, HandshakePolicy::AllowAll);
        let request = HandshakeRequest::new("/ws").with_header("Origin", "");
        assert_eq!(policy.check(&request).unwrap(), None);
    }

    #[test]
    fn test_valid_origin_is_resolved() {
        let policy = HandshakePolicy::from_allow_non_browser(false);
        let request =
            HandshakeRequest::new("/ws").with_header("ORIGIN", "https://Example.com:8443/app");
        assert_eq!(
            policy.check(&request).unwrap().as_deref(),
            Some("https://example.com:8443")
        );
    }

    #[test]
    fn test_unparsable_origin_is_invalid() {
        let request = HandshakeRequest::new("/ws").with_header("origin", "not a url");
        assert!(matches!(
            HandshakePolicy::CheckOrigin.check(&request),
            Err(HandshakeError::InvalidOrigin { .. })
        ));

        let request = HandshakeRequest::new("/ws").with_header("origin", "mailto:a@b.c");
        assert!(matches!(
            HandshakePolicy::CheckOrigin.check(&request),
            Err(HandshakeError::InvalidOrigin { .. })
        ));
    }
}
