//! Per-client request limiting and the anonymous search quota.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;

use crate::AppState;
use crate::auth::claims_from_headers;
use crate::error::ApiError;

/// Caller address used to key limits.
///
/// This is the peer address. `X-Forwarded-For` is read only when the peer is
/// one of `trusted_proxies`; then the nearest hop that is not itself a
/// trusted proxy is the caller.
pub fn client_address(
    headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>, trusted_proxies: &[IpAddr],
) -> String {
    let Some(ConnectInfo(addr)) = peer else {
        return "unknown".into();
    };
    let peer_ip = addr.ip();
    if !trusted_proxies.contains(&peer_ip) {
        return peer_ip.to_string();
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();
    hops.iter()
        .rev()
        .find(|hop| !hop.parse::<IpAddr>().is_ok_and(|ip| trusted_proxies.contains(&ip)))
        .or(hops.first())
        .map_or_else(|| peer_ip.to_string(), |hop| (*hop).to_string())
}

/// Sliding-window limiter keyed by caller.
#[derive(Debug)]
pub struct RequestLimiter {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RequestLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { requests: Mutex::new(HashMap::new()), max_requests, window }
    }

    /// Record a request; false once the caller has used up the window.
    pub async fn allow(&self, key: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();
        requests.retain(|_, seen| {
            while seen.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
                seen.pop_front();
            }
            !seen.is_empty()
        });

        let seen = requests.entry(key.to_string()).or_default();
        if seen.len() >= self.max_requests {
            return false;
        }
        seen.push_back(now);
        true
    }

    /// Callers with requests inside the current window.
    pub async fn tracked(&self) -> usize {
        self.requests.lock().await.len()
    }
}

/// Searches an anonymous client may run per window before signing in.
#[derive(Debug)]
pub struct SearchQuota {
    used: Mutex<HashMap<String, (u32, Instant)>>,
    limit: u32,
    window: Duration,
}

impl SearchQuota {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { used: Mutex::new(HashMap::new()), limit, window }
    }

    /// Count one anonymous search, rejecting it once the limit is reached.
    pub async fn consume(&self, client: &str) -> Result<u32, ApiError> {
        let mut used = self.used.lock().await;
        let now = Instant::now();
        used.retain(|_, (_, started)| now.duration_since(*started) < self.window);

        let entry = used.entry(client.to_string()).or_insert((0, now));
        if entry.0 >= self.limit {
            return Err(ApiError::RateLimited(format!(
                "Search limit of {} reached. Sign in to continue searching.",
                self.limit
            )));
        }
        entry.0 += 1;
        Ok(self.limit - entry.0)
    }

    /// Give back a search that produced no results for the client.
    pub async fn refund(&self, client: &str) {
        if let Some((count, _)) = self.used.lock().await.get_mut(client) {
            *count = count.saturating_sub(1);
        }
    }

    /// Signing in clears the client's anonymous count.
    pub async fn reset(&self, client: &str) {
        self.used.lock().await.remove(client);
    }

    pub async fn used(&self, client: &str) -> u32 {
        self.used.lock().await.get(client).map(|(count, _)| *count).unwrap_or(0)
    }

    /// Clients with a count inside the current window.
    pub async fn tracked(&self) -> usize {
        self.used.lock().await.len()
    }
}

/// Middleware applying [`RequestLimiter`] to every API request.
///
/// Authenticated callers are keyed by user id, others by address.
pub async fn limit_requests(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let key = match claims_from_headers(&state, request.headers()) {
        Ok(Some(claims)) => format!("user:{}", claims.user_id),
        _ => client_address(
            request.headers(),
            request.extensions().get::<ConnectInfo<SocketAddr>>(),
            &state.config.trusted_proxies,
        ),
    };
    if !state.limiter.allow(&key).await {
        tracing::warn!(client = %key, "request limit exceeded");
        return Err(ApiError::RateLimited("Rate limit exceeded. Please try again later.".into()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_limiter_blocks_after_max() {
        let limiter = RequestLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        assert!(limiter.allow("b").await);
    }

    #[tokio::test]
    async fn test_limiter_window_slides() {
        let limiter = RequestLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.allow("a").await);
    }

    #[tokio::test]
    async fn test_quota_blocks_after_exactly_limit() {
        let quota = SearchQuota::new(2, Duration::from_secs(3600));
        assert_eq!(quota.consume("1.2.3.4").await.unwrap(), 1);
        assert_eq!(quota.consume("1.2.3.4").await.unwrap(), 0);
        assert!(matches!(quota.consume("1.2.3.4").await, Err(ApiError::RateLimited(_))));
        assert_eq!(quota.used("1.2.3.4").await, 2);

        quota.reset("1.2.3.4").await;
        assert_eq!(quota.used("1.2.3.4").await, 0);
        assert!(quota.consume("1.2.3.4").await.is_ok());
    }

    #[tokio::test]
    async fn test_quota_refund() {
        let quota = SearchQuota::new(2, Duration::from_secs(3600));
        quota.consume("1.2.3.4").await.unwrap();
        quota.refund("1.2.3.4").await;
        assert_eq!(quota.used("1.2.3.4").await, 0);
        quota.refund("1.2.3.4").await;
        assert_eq!(quota.used("1.2.3.4").await, 0);
        quota.refund("5.6.7.8").await;
        assert_eq!(quota.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_expired_clients_are_pruned() {
        let limiter = RequestLimiter::new(5, Duration::from_millis(50));
        let quota = SearchQuota::new(2, Duration::from_millis(50));
        for i in 0..20 {
            let key = format!("10.0.0.{i}");
            assert!(limiter.allow(&key).await);
            quota.consume(&key).await.unwrap();
        }
        assert_eq!(limiter.tracked().await, 20);
        assert_eq!(quota.tracked().await, 20);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.allow("10.0.0.99").await);
        quota.consume("10.0.0.99").await.unwrap();
        assert_eq!(limiter.tracked().await, 1);
        assert_eq!(quota.tracked().await, 1);
    }

    #[test]
    fn test_client_address_ignores_forwarded_header_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, None, &[]), "unknown");

        let peer = ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 5000)));
        assert_eq!(client_address(&headers, Some(&peer), &[]), "198.51.100.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_address(&headers, Some(&peer), &[]), "198.51.100.7");

        let other_proxy: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(client_address(&headers, Some(&peer), &[other_proxy]), "198.51.100.7");
    }

    #[test]
    fn test_client_address_behind_trusted_proxy() {
        let proxy: IpAddr = "10.0.0.7".parse().unwrap();
        let inner: IpAddr = "10.0.0.8".parse().unwrap();
        let peer = ConnectInfo(SocketAddr::new(proxy, 5000));

        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some(&peer), &[proxy]), "10.0.0.7");

        // A client-supplied first hop is skipped in favor of the hop the proxy appended.
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.1.1.1, 203.0.113.9, 10.0.0.8"));
        assert_eq!(client_address(&headers, Some(&peer), &[proxy, inner]), "203.0.113.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.8"));
        assert_eq!(client_address(&headers, Some(&peer), &[proxy, inner]), "10.0.0.8");
    }
}
