//! A single active probe.
//!
//! The probe is a plain `GET` to the destination's probe address joined
//! with the cluster's probe path. Whatever comes back is handed to the
//! policy untouched; this module never looks at status codes.

use std::time::Duration;
use axum::body::Body;
use axum::http::{header, uri::InvalidUri, Method, Request, Response, Uri};
use thiserror::Error;
use tokio::time;

use crate::cluster::destination::DestinationConfig;
use crate::cluster::transport::HttpTransport;

/// Why a probe produced no response.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe uri '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: InvalidUri,
    },

    #[error("probe request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Exactly one of response or error.
pub type ProbeOutcome = Result<Response<Body>, ProbeError>;

const USER_AGENT: &str = "proxy-runtime-health-check";

/// Join a destination's probe address with the probe path.
pub fn probe_uri(config: &DestinationConfig, path: &str) -> String {
    let base = config.probe_address().as_str().trim_end_matches('/');
    format!("{}/{}", base, path.trim_start_matches('/'))
}

/// Send one probe, bounded by `timeout`.
///
/// On expiry the in-flight request future is dropped, which cancels it.
pub async fn send_probe(
    transport: &HttpTransport,
    config: &DestinationConfig,
    path: &str,
    timeout: Duration,
) -> ProbeOutcome {
    let uri_string = probe_uri(config, path);
    let uri: Uri = uri_string
        .parse()
        .map_err(|source| ProbeError::InvalidUri { uri: uri_string.clone(), source })?;

    let mut request = Request::new(Body::empty());
    *request.method_mut() = Method::GET;
    *request.uri_mut() = uri;
    request
        .headers_mut()
        .insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

    match time::timeout(timeout, transport.request(request)).await {
        Ok(Ok(response)) => Ok(response.map(Body::new)),
        Ok(Err(e)) => Err(ProbeError::Transport(e)),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
