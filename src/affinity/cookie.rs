//! Cookie affinity mode.
//!
//! Settings:
//! - `CookieName` (default `.Proxy.Affinity`)
//! - `CookiePath` (default `/`)
//! - `CookieDomain` (unset by default)
//! - `HttpOnly` (default `true`)
//! - `Secure` (default `false`)

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use url::form_urlencoded;

use crate::affinity::SessionAffinityProvider;
use crate::config::SessionAffinityOptions;

const DEFAULT_COOKIE_NAME: &str = ".Proxy.Affinity";

#[derive(Debug, Default, Clone, Copy)]
pub struct CookieAffinityProvider;

impl CookieAffinityProvider {
    pub const MODE: &'static str = "Cookie";
}

fn cookie_name(options: &SessionAffinityOptions) -> &str {
    options
        .settings
        .get("CookieName")
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_COOKIE_NAME)
}

fn flag(options: &SessionAffinityOptions, key: &str, default: bool) -> bool {
    options
        .settings
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn encode(key: &str) -> String {
    form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

fn decode(value: &str) -> String {
    form_urlencoded::parse(format!("k={value}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

impl SessionAffinityProvider for CookieAffinityProvider {
    fn mode(&self) -> &str {
        Self::MODE
    }

    fn extract_key(&self, request: &HeaderMap, options: &SessionAffinityOptions) -> Option<String> {
        let name = cookie_name(options);
        request
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| decode(v.trim_matches('"')))
    }

    fn write_key(&self, response: &mut HeaderMap, options: &SessionAffinityOptions, key: &str) {
        let name = cookie_name(options);
        let path = options.settings.get("CookiePath").map(String::as_str).unwrap_or("/");

        let mut cookie = format!("{}={}; Path={}", name, encode(key), path);
        if let Some(domain) = options.settings.get("CookieDomain") {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if flag(options, "HttpOnly", true) {
            cookie.push_str("; HttpOnly");
        }
        if flag(options, "Secure", false) {
            cookie.push_str("; Secure");
        }

        let value = match HeaderValue::from_str(&cookie) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(cookie = %name, error = %e, "Invalid affinity cookie, not set");
                return;
            }
        };

        // Keep cookies set by others, drop our previous one.
        let prefix = format!("{name}=");
        let others: Vec<HeaderValue> = response
            .get_all(SET_COOKIE)
            .iter()
            .filter(|v| !v.to_str().is_ok_and(|s| s.starts_with(&prefix)))
            .cloned()
            .collect();
        response.remove(SET_COOKIE);
        for other in others {
            response.append(SET_COOKIE, other);
        }
        response.append(SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(settings: &[(&str, &str)]) -> SessionAffinityOptions {
        SessionAffinityOptions {
            enabled: true,
            mode: CookieAffinityProvider::MODE.into(),
            settings: settings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_write_is_idempotent() {
        let provider = CookieAffinityProvider;
        let options = options(&[]);
        let mut response = HeaderMap::new();
        response.append(SET_COOKIE, HeaderValue::from_static("session=abc; Path=/"));

        provider.write_key(&mut response, &options, "d1");
        let first: Vec<_> = response.get_all(SET_COOKIE).iter().cloned().collect();
        provider.write_key(&mut response, &options, "d1");
        let second: Vec<_> = response.get_all(SET_COOKIE).iter().cloned().collect();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], "session=abc; Path=/");
        assert_eq!(second[1], ".Proxy.Affinity=d1; Path=/; HttpOnly");
    }

    #[test]
    fn test_settings_shape_cookie() {
        let provider = CookieAffinityProvider;
        let options = options(&[
            ("CookieName", "sticky"),
            ("CookiePath", "/api"),
            ("CookieDomain", "example.com"),
            ("HttpOnly", "false"),
            ("Secure", "true"),
        ]);
        let mut response = HeaderMap::new();
        provider.write_key(&mut response, &options, "d1");
        assert_eq!(response[SET_COOKIE], "sticky=d1; Path=/api; Domain=example.com; Secure");
    }

    #[test]
    fn test_key_is_encoded() {
        let provider = CookieAffinityProvider;
        let options = options(&[]);
        let mut response = HeaderMap::new();
        provider.write_key(&mut response, &options, "pod a;b");
        assert_eq!(response[SET_COOKIE], ".Proxy.Affinity=pod+a%3Bb; Path=/; HttpOnly");

        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_static("other=1; .Proxy.Affinity=pod+a%3Bb"));
        assert_eq!(provider.extract_key(&request, &options).as_deref(), Some("pod a;b"));
    }

    #[test]
    fn test_extract_ignores_other_cookies() {
        let provider = CookieAffinityProvider;
        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_static("a=1; b=2"));
        assert_eq!(provider.extract_key(&request, &options(&[])), None);
    }
}
