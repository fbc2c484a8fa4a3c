/// HTTP middleware
///
/// - `auth`: bearer authentication and subscription-tier guards
/// - `rate_limit`: Redis sliding-window limiter applied to every route
/// - `security`: security response headers

pub mod auth;
pub mod rate_limit;
pub mod security;
