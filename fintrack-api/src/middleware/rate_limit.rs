/// Global request rate limiting
///
/// Sliding-window limiter backed by a Redis sorted set per identity. Every request adds a
/// member scored with its arrival time; members older than the window are pruned before
/// counting. The check-and-add is a single Lua script so concurrent requests cannot both
/// slip under the limit.
///
/// Identity is `user:{id}` when the request carries a valid access token and
/// `ip:{address}` otherwise (first `X-Forwarded-For` entry).
///
/// The limiter is best-effort: with no Redis configured, or on any Redis failure, the
/// request passes through.
///
/// # Response Headers
///
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in the current window
/// - `X-RateLimit-Reset`: Unix timestamp (seconds) when a slot frees up
/// - `Retry-After`: on 429 only

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fintrack_shared::auth::{jwt::validate_access_token, middleware::bearer_token};
use redis::aio::ConnectionManager;
use std::time::Duration;
use uuid::Uuid;

use crate::{app::AppState, error::ApiError};

/// Requests allowed per window
pub const DEFAULT_LIMIT: u32 = 60;

/// Window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

const KEY_PREFIX: &str = "fintrack:ratelimit";

/// Prunes, counts and conditionally records a request in one round trip
///
/// KEYS[1] = sorted set key
/// ARGV[1] = now (ms), ARGV[2] = window (ms), ARGV[3] = limit, ARGV[4] = member
///
/// Returns {allowed (0/1), remaining, ms until a slot frees}
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
local count = redis.call('ZCARD', key)

if count < limit then
    redis.call('ZADD', key, now, ARGV[4])
    redis.call('PEXPIRE', key, window)
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    local reset = window
    if oldest[2] then
        reset = tonumber(oldest[2]) + window - now
    end
    return {1, limit - count - 1, reset}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local reset = window
if oldest[2] then
    reset = tonumber(oldest[2]) + window - now
end
return {0, 0, reset}
"#;

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,

    /// Milliseconds until the oldest request leaves the window
    pub reset_after_ms: u64,
}

impl RateLimitDecision {
    /// Whole seconds a client should wait, never less than one
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_after_ms.div_ceil(1000).max(1)
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_at = Utc::now().timestamp() as u64 + self.retry_after_secs();

        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(self.remaining));
        headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at));
    }
}

/// Redis-backed sliding-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }

    /// Opens a managed connection to `url`
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    pub fn with_limit(mut self, limit: u32, window: Duration) -> Self {
        self.limit = limit;
        self.window = window;
        self
    }

    /// Records a request for `identity` and reports whether it fits in the window
    pub async fn check(&self, identity: &str) -> Result<RateLimitDecision, redis::RedisError> {
        let mut conn = self.conn.clone();
        let now_ms = Utc::now().timestamp_millis();

        let (allowed, remaining, reset_after_ms): (i64, i64, i64) =
            redis::Script::new(SLIDING_WINDOW_SCRIPT)
                .key(format!("{}:{}", KEY_PREFIX, identity))
                .arg(now_ms)
                .arg(self.window.as_millis() as i64)
                .arg(self.limit)
                .arg(format!("{}-{}", now_ms, Uuid::new_v4().simple()))
                .invoke_async(&mut conn)
                .await?;

        Ok(RateLimitDecision {
            allowed: allowed == 1,
            limit: self.limit,
            remaining: remaining.max(0) as u32,
            reset_after_ms: reset_after_ms.max(0) as u64,
        })
    }
}

/// First `X-Forwarded-For` entry
fn client_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Identity a request is counted against
///
/// Token errors are ignored here; authentication rejects them later where required.
pub fn rate_limit_identity(headers: &HeaderMap, jwt_secret: &str) -> String {
    if let Some(claims) =
        bearer_token(headers).and_then(|token| validate_access_token(token, jwt_secret).ok())
    {
        return format!("user:{}", claims.sub);
    }

    format!("ip:{}", client_ip(headers).unwrap_or("127.0.0.1"))
}

/// Rate limiting middleware
///
/// Wire with `axum::middleware::from_fn_with_state(state, rate_limit_layer)`.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let identity = rate_limit_identity(request.headers(), &state.config.jwt.secret);

    let decision = match limiter.check(&identity).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, allowing request");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        tracing::info!(identity = %identity, "Rate limit exceeded");

        let mut response = ApiError::RateLimitExceeded {
            retry_after: decision.retry_after_secs(),
            message: "Too many requests, please try again later.".to_string(),
        }
        .into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}
