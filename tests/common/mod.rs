//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use proxy_runtime::cluster::{ClusterConfig, Destination};
use proxy_runtime::config::{ClusterOptions, DestinationOptions};
use proxy_runtime::health::{ActiveHealthCheckPolicy, ProbeError, ProbeOutcome};

/// A loopback backend that records the path of every request it receives.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Start a backend answering every request with `status` and an empty body.
pub async fn start_mock_backend(status: u16) -> MockBackend {
    start_programmable_backend(move |_| async move { (status, String::new()) }).await
}

/// Start a backend whose response is computed per request from its path.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let Some(path) = read_request_path(&mut socket).await else {
                    return;
                };
                recorded.lock().unwrap().push(path.clone());

                let (status, body) = f(path).await;
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    503 => "Service Unavailable",
                    _ => "Unknown",
                };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend { addr, requests }
}

/// Start a backend that accepts and reads requests but never answers.
pub async fn start_silent_backend() -> MockBackend {
    start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        (200, String::new())
    })
    .await
}

/// A loopback address with nothing listening on it.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines().next()?.split_whitespace().nth(1).map(str::to_string)
}

/// Poll `condition` until it holds or `deadline` elapses.
pub async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// What a [`RecordingPolicy`] saw for one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Status(u16),
    Timeout,
    Error,
}

/// One call to [`RecordingPolicy::probing_completed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub cluster: String,
    pub destination: String,
    pub outcome: Observed,
}

/// A health check policy that records every outcome and changes nothing.
pub struct RecordingPolicy {
    name: String,
    observations: Mutex<Vec<Observation>>,
    panic_on: Option<String>,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self::named(Self::NAME)
    }
}

impl RecordingPolicy {
    pub const NAME: &'static str = "Recording";

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            observations: Mutex::new(Vec::new()),
            panic_on: None,
        }
    }

    /// Panic when called for destination `destination_id`.
    pub fn panicking_on(destination_id: &str) -> Self {
        Self {
            panic_on: Some(destination_id.to_string()),
            ..Self::default()
        }
    }

    pub fn observations(&self) -> Vec<Observation> {
        let mut observations = self.observations.lock().unwrap().clone();
        observations.sort_by(|a, b| (&a.cluster, &a.destination).cmp(&(&b.cluster, &b.destination)));
        observations
    }
}

impl ActiveHealthCheckPolicy for RecordingPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn probing_completed(&self, cluster: &ClusterConfig, destination: &Destination, outcome: &ProbeOutcome) {
        if self.panic_on.as_deref() == Some(destination.id()) {
            panic!("policy failure for {}", destination.id());
        }
        let outcome = match outcome {
            Ok(response) => Observed::Status(response.status().as_u16()),
            Err(ProbeError::Timeout(_)) => Observed::Timeout,
            Err(_) => Observed::Error,
        };
        self.observations.lock().unwrap().push(Observation {
            cluster: cluster.id().to_string(),
            destination: destination.id().to_string(),
            outcome,
        });
    }
}

/// Cluster options with active checks set as given and one destination per address.
pub fn cluster_options(id: &str, enabled: bool, policy: &str, addresses: &[String]) -> ClusterOptions {
    let mut options = ClusterOptions::new(id);
    options.health_check.active.enabled = enabled;
    options.health_check.active.policy = policy.to_string();
    options.health_check.active.timeout_ms = Some(1_000);
    for (i, address) in addresses.iter().enumerate() {
        options.destinations.push(DestinationOptions {
            id: format!("{id}-d{i}"),
            address: address.clone(),
            probe_address: None,
        });
    }
    options
}
