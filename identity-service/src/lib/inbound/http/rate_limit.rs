//! Fixed-window request limiter keyed by client address.
//!
//! Each address gets `max_requests` per window; once spent, every request
//! until the window rolls over is rejected. Internal callers are exempted
//! through configuration only.

use std::collections::HashMap;
use std::collections::HashSet;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::Response;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use super::handlers::ApiError;
use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::inbound::http::router::AppState;

/// Run a cleanup of stale windows every this many checks.
const CLEANUP_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

pub struct FixedWindowRateLimiter {
    enabled: bool,
    window: Duration,
    max_requests: u32,
    exempt: HashSet<IpAddr>,
    windows: Mutex<HashMap<IpAddr, Window>>,
    checks: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: config.enabled,
            window: Duration::seconds(config.window_seconds as i64),
            max_requests: config.max_requests,
            exempt: config.exempt_addresses.iter().copied().collect(),
            windows: Mutex::new(HashMap::new()),
            checks: AtomicU64::new(0),
            clock,
        }
    }

    /// Count a request from `ip` and decide whether it may proceed.
    pub fn check(&self, ip: IpAddr) -> RateLimitDecision {
        if !self.enabled || self.exempt.contains(&ip) {
            return RateLimitDecision::Allowed;
        }

        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if self.checks.fetch_add(1, Ordering::Relaxed) % CLEANUP_INTERVAL == 0 {
            windows.retain(|_, w| now - w.started_at < self.window);
        }

        let window = windows.entry(ip).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now - window.started_at >= self.window {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            let remaining = (window.started_at + self.window - now).num_seconds().max(1);
            return RateLimitDecision::Limited {
                retry_after_seconds: remaining as u64,
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed
    }
}

/// Middleware applying the limiter to the routes it wraps.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match state.rate_limiter.check(ip) {
        RateLimitDecision::Allowed => Ok(next.run(req).await),
        RateLimitDecision::Limited {
            retry_after_seconds,
        } => {
            tracing::warn!(
                client = %ip,
                path = %req.uri().path(),
                "Rate limit exceeded"
            );
            Err(ApiError::TooManyRequests {
                retry_after_seconds,
            })
        }
    }
}
