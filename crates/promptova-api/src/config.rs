//! API configuration.

use std::time::Duration;

use url::Url;

/// Default front end origin, used for CORS and checkout redirects.
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Request budget for one client IP over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Browser front end; checkout success and cancel pages live under it.
    pub frontend_url: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Budget for every `/api` route
    pub api_rate_limit: RateLimit,
    /// Budget for the routes that call an AI provider
    pub generation_rate_limit: RateLimit,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Firebase uids allowed to call the admin routes
    pub admin_uids: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            cors_origins: vec![DEFAULT_FRONTEND_URL.to_string()],
            api_rate_limit: RateLimit::new(100, Duration::from_secs(15 * 60)),
            generation_rate_limit: RateLimit::new(20, Duration::from_secs(60 * 60)),
            request_timeout: Duration::from_secs(120),
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
            admin_uids: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let frontend_url = std::env::var("FRONTEND_URL")
            .ok()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| Url::parse(u).is_ok())
            .unwrap_or(defaults.frontend_url);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec![frontend_url.clone()]);

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT")
                .or_else(|| env_parse("PORT"))
                .unwrap_or(defaults.port),
            frontend_url,
            cors_origins,
            api_rate_limit: RateLimit::new(
                env_parse("RATE_LIMIT_API_MAX").unwrap_or(defaults.api_rate_limit.max_requests),
                env_parse("RATE_LIMIT_API_WINDOW_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.api_rate_limit.window),
            ),
            generation_rate_limit: RateLimit::new(
                env_parse("RATE_LIMIT_GENERATION_MAX")
                    .unwrap_or(defaults.generation_rate_limit.max_requests),
                env_parse("RATE_LIMIT_GENERATION_WINDOW_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.generation_rate_limit.window),
            ),
            request_timeout: env_parse("REQUEST_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            admin_uids: std::env::var("ADMIN_UIDS")
                .map(|s| {
                    s.split(',')
                        .map(|uid| uid.trim().to_string())
                        .filter(|uid| !uid.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Whether `uid` may call the admin routes.
    pub fn is_admin(&self, uid: &str) -> bool {
        self.admin_uids.iter().any(|admin| admin == uid)
    }

    /// Absolute front end URL for `path` (e.g. `/dashboard?success=true`).
    pub fn frontend_link(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url, path)
    }
}
