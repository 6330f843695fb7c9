//! Outbound HTTP transport shared by a cluster's probes and forwarded traffic.

use std::time::Duration;
use axum::body::Body;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::config::HttpClientOptions;

/// Cloning is cheap; clones share one connection pool.
pub type HttpTransport = Client<HttpConnector, Body>;

/// Build a pooled client from cluster settings.
pub fn build_transport(options: &HttpClientOptions) -> HttpTransport {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(options.connect_timeout_ms.map(Duration::from_millis));

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(options.pool_max_idle_per_host)
        .build(connector)
}
