//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: strict limit for the login proxy (~10/min)
//! - `write_rate_limit`: ~1 rps with a burst of 50 for every non-read request

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Keyed limiter state is pruned once it tracks this many clients.
const MAX_TRACKED_CLIENTS: usize = 10_000;

const WRITE_BURST: NonZeroU32 = match NonZeroU32::new(50) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Client IP from proxy headers, falling back to the socket peer.
///
/// Requests with neither (in-process tests) share the unspecified address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    header_ip("cf-connecting-ip")
        .or_else(|| header_ip("x-forwarded-for"))
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// `tower_governor` key extractor built on [`client_ip`].
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &axum::http::Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(client_ip(req.headers(), peer))
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for the login proxy: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(6)` and `burst_size(5)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
#[allow(clippy::expect_used)]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Per-IP limiter for write requests.
pub struct WriteLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl WriteLimiter {
    /// 1 request per second replenish, burst of 50.
    #[must_use]
    pub fn new() -> Self {
        Self::with_quota(Quota::per_second(NonZeroU32::MIN).allow_burst(WRITE_BURST))
    }

    #[must_use]
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

impl Default for WriteLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject write requests over the per-IP quota. Reads pass through.
pub async fn write_rate_limit(
    State(limiter): State<Arc<WriteLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    if !limiter.check(ip) {
        tracing::warn!(%ip, path = %request.uri().path(), "Write rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = ([10, 0, 0, 2], 4000).into();

        assert_eq!(client_ip(&headers, Some(peer)), IpAddr::from([203, 0, 113, 7]));
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), IpAddr::from([10, 0, 0, 2]));
        assert_eq!(
            client_ip(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_write_limiter_enforces_burst() {
        let quota = Quota::per_hour(NonZeroU32::MIN).allow_burst(NonZeroU32::MIN.saturating_add(1));
        let limiter = WriteLimiter::with_quota(quota);
        let ip = IpAddr::from([192, 0, 2, 1]);

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));
        assert!(limiter.check(IpAddr::from([192, 0, 2, 2])));
    }
}
