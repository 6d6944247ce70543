use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub paddle_webhook_secret: String,
    pub webhook_tolerance_secs: Option<i64>,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            paddle_webhook_secret: env::var("PADDLE_WEBHOOK_SECRET")
                .unwrap_or_else(|_| {
                    warn!("PADDLE_WEBHOOK_SECRET not set, using empty value");
                    String::new()
                }),
            webhook_tolerance_secs: match env::var("PADDLE_WEBHOOK_TOLERANCE_SECS") {
                Ok(raw) => match raw.trim().parse::<i64>() {
                    Ok(secs) if secs > 0 => Some(secs),
                    _ => {
                        warn!("PADDLE_WEBHOOK_TOLERANCE_SECS is not a positive integer, ignoring: {}", raw);
                        None
                    }
                },
                Err(_) => None,
            },
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or_else(|| {
                    warn!("SERVER_PORT not set or invalid, using default");
                    3000
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty() && self.is_payment_configured()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.paddle_webhook_secret.is_empty()
    }
}
