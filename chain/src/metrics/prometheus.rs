//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed chain metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Chain-engine-related Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the peer
/// node's `Chain::add` call sites and match player.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Total blocks that linearly extended the tip.
    pub blocks_appended_total: IntCounter,
    /// Total depth-1 forks that won the tie-break and replaced the tip.
    pub blocks_reorganized_total: IntCounter,
    /// Total candidate blocks rejected by `Chain::add`.
    pub blocks_rejected_total: IntCounter,
    /// Wall-clock time spent in `mine`, in seconds.
    pub mine_duration_seconds: Histogram,
    /// Total matches that reached a declared result.
    pub matches_completed_total: IntCounter,
}

impl ChainMetrics {
    /// Registers chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_appended_total = IntCounter::with_opts(Opts::new(
            "blocks_appended_total",
            "Total blocks that linearly extended the tip",
        ))?;
        registry.register(Box::new(blocks_appended_total.clone()))?;

        let blocks_reorganized_total = IntCounter::with_opts(Opts::new(
            "blocks_reorganized_total",
            "Total depth-1 forks that won the tie-break and replaced the tip",
        ))?;
        registry.register(Box::new(blocks_reorganized_total.clone()))?;

        let blocks_rejected_total = IntCounter::with_opts(Opts::new(
            "blocks_rejected_total",
            "Total candidate blocks rejected by Chain::add",
        ))?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let mine_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mine_duration_seconds",
                "Wall-clock time spent searching for a proof-of-work nonce, in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(mine_duration_seconds.clone()))?;

        let matches_completed_total = IntCounter::with_opts(Opts::new(
            "matches_completed_total",
            "Total matches that reached a declared result",
        ))?;
        registry.register(Box::new(matches_completed_total.clone()))?;

        Ok(Self {
            blocks_appended_total,
            blocks_reorganized_total,
            blocks_rejected_total,
            mine_duration_seconds,
            matches_completed_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the main handle you pass around in a node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("rps_chain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.blocks_appended_total.inc();
        metrics.blocks_reorganized_total.inc();
        metrics.blocks_rejected_total.inc();
        metrics.mine_duration_seconds.observe(0.045);
        metrics.matches_completed_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.blocks_appended_total.inc();
        let text = registry.gather_text();
        assert!(text.contains("blocks_appended_total"));
    }
}
