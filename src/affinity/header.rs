//! Custom header affinity mode.
//!
//! The key travels in a header (setting `CustomHeaderName`, default
//! `X-Proxy-Affinity`) that the client echoes back on later requests.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::affinity::SessionAffinityProvider;
use crate::config::SessionAffinityOptions;

const DEFAULT_HEADER_NAME: &str = "x-proxy-affinity";

#[derive(Debug, Default, Clone, Copy)]
pub struct CustomHeaderAffinityProvider;

impl CustomHeaderAffinityProvider {
    pub const MODE: &'static str = "CustomHeader";
}

fn header_name(options: &SessionAffinityOptions) -> Option<HeaderName> {
    let name = options
        .settings
        .get("CustomHeaderName")
        .map(String::as_str)
        .unwrap_or(DEFAULT_HEADER_NAME);
    match HeaderName::from_bytes(name.as_bytes()) {
        Ok(name) => Some(name),
        Err(_) => {
            tracing::warn!(header = %name, "Invalid affinity header name");
            None
        }
    }
}

impl SessionAffinityProvider for CustomHeaderAffinityProvider {
    fn mode(&self) -> &str {
        Self::MODE
    }

    fn extract_key(&self, request: &HeaderMap, options: &SessionAffinityOptions) -> Option<String> {
        let name = header_name(options)?;
        request
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    }

    fn write_key(&self, response: &mut HeaderMap, options: &SessionAffinityOptions, key: &str) {
        let Some(name) = header_name(options) else { return };
        match HeaderValue::from_str(key) {
            Ok(value) => {
                response.insert(name, value);
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Affinity key is not a valid header value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_header_round_trip() {
        let provider = CustomHeaderAffinityProvider;
        let options = SessionAffinityOptions::default();
        let mut headers = HeaderMap::new();

        provider.write_key(&mut headers, &options, "d7");
        provider.write_key(&mut headers, &options, "d7");
        assert_eq!(headers.get_all("x-proxy-affinity").iter().count(), 1);
        assert_eq!(provider.extract_key(&headers, &options).as_deref(), Some("d7"));
    }

    #[test]
    fn test_custom_header_name() {
        let provider = CustomHeaderAffinityProvider;
        let mut options = SessionAffinityOptions::default();
        options.settings.insert("CustomHeaderName".into(), "X-Sticky".into());
        let mut headers = HeaderMap::new();

        provider.write_key(&mut headers, &options, "d1");
        assert_eq!(headers["x-sticky"], "d1");
        assert!(headers.get(DEFAULT_HEADER_NAME).is_none());
    }

    #[test]
    fn test_invalid_header_name_is_inert() {
        let provider = CustomHeaderAffinityProvider;
        let mut options = SessionAffinityOptions::default();
        options.settings.insert("CustomHeaderName".into(), "bad header".into());
        let mut headers = HeaderMap::new();

        provider.write_key(&mut headers, &options, "d1");
        assert!(headers.is_empty());
        assert_eq!(provider.extract_key(&headers, &options), None);
    }
}
