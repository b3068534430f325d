use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use env_helpers::{get_env, get_env_default};
use url::Url;

use crate::{
    application::{
        ports::payment_gateway::GatewayConfig,
        use_cases::payment_callback::DEFAULT_MAX_RETRY_ATTEMPTS,
    },
    domain::{entities::payment::Currency, services::payment_service::PaymentLimits},
    infra::error::InfraError,
};

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub payment_limits: PaymentLimits,
    /// Raw `GATEWAY_PROVIDER` value; resolved by [`AppConfig::gateway_provider`].
    pub gateway_provider: String,
    pub gateway: GatewayCheckoutConfig,
    /// How often the expiry sweep runs.
    pub expire_interval_secs: u64,
    /// Upper bound on payments expired per sweep. 0 means unbounded.
    pub expire_batch_size: usize,
    pub callback_retry_interval_secs: u64,
    pub callback_retry_batch_size: i64,
    /// Attempts before a queued callback is abandoned.
    pub callback_retry_max_attempts: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from((Ipv4Addr::LOCALHOST, 3001)),
        );

        let defaults = PaymentLimits::default();
        let payment_ttl_minutes: i64 = get_env_default(
            "PAYMENT_TTL_MINUTES",
            defaults.payment_ttl.num_minutes(),
        );
        let payment_limits = PaymentLimits {
            min_amount: get_env_default("PAYMENT_MIN_AMOUNT", defaults.min_amount),
            max_amount: get_env_default("PAYMENT_MAX_AMOUNT", defaults.max_amount),
            allowed_currencies: Currency::ALL.to_vec(),
            payment_ttl: Duration::minutes(payment_ttl_minutes),
        };

        // Checkout links are handed to browsers, so they must at least parse.
        let gateway = GatewayCheckoutConfig {
            terminal: get_env("GATEWAY_TERMINAL"),
            back_link: get_env::<Url>("GATEWAY_BACK_LINK").to_string(),
            post_link: get_env::<Url>("GATEWAY_POST_LINK").to_string(),
            widget_url: get_env::<Url>("GATEWAY_WIDGET_URL").to_string(),
        };

        Self {
            database_url,
            bind_addr,
            payment_limits,
            gateway_provider: get_env_default("GATEWAY_PROVIDER", String::new()),
            gateway,
            expire_interval_secs: get_env_default("EXPIRE_INTERVAL_SECS", 60),
            expire_batch_size: get_env_default("EXPIRE_BATCH_SIZE", 500),
            callback_retry_interval_secs: get_env_default("CALLBACK_RETRY_INTERVAL_SECS", 30),
            callback_retry_batch_size: get_env_default("CALLBACK_RETRY_BATCH_SIZE", 50),
            callback_retry_max_attempts: get_env_default(
                "CALLBACK_RETRY_MAX_ATTEMPTS",
                DEFAULT_MAX_RETRY_ATTEMPTS,
            ),
        }
    }

    /// Rejects combinations that would make every payment invalid or stall the jobs.
    pub fn validate(&self) -> Result<(), InfraError> {
        self.gateway_provider()?;

        let limits = &self.payment_limits;
        if limits.min_amount <= 0 {
            return Err(invalid("PAYMENT_MIN_AMOUNT", "must be positive"));
        }
        if limits.max_amount < limits.min_amount {
            return Err(invalid(
                "PAYMENT_MAX_AMOUNT",
                "must not be below PAYMENT_MIN_AMOUNT",
            ));
        }
        if limits.payment_ttl <= Duration::zero() {
            return Err(invalid("PAYMENT_TTL_MINUTES", "must be positive"));
        }
        if self.expire_interval_secs == 0 {
            return Err(invalid("EXPIRE_INTERVAL_SECS", "must be positive"));
        }
        if self.callback_retry_interval_secs == 0 {
            return Err(invalid("CALLBACK_RETRY_INTERVAL_SECS", "must be positive"));
        }
        if self.callback_retry_batch_size <= 0 {
            return Err(invalid("CALLBACK_RETRY_BATCH_SIZE", "must be positive"));
        }
        if self.callback_retry_max_attempts <= 0 {
            return Err(invalid("CALLBACK_RETRY_MAX_ATTEMPTS", "must be positive"));
        }
        Ok(())
    }

    pub fn expire_batch_limit(&self) -> Option<usize> {
        (self.expire_batch_size > 0).then_some(self.expire_batch_size)
    }

    /// The gateway must be chosen explicitly. There is no fallback, so a
    /// missing setting never ends up settling payments against the dummy.
    pub fn gateway_provider(&self) -> Result<GatewayProvider, InfraError> {
        let raw = self.gateway_provider.trim();
        if raw.is_empty() {
            return Err(invalid("GATEWAY_PROVIDER", "must be set"));
        }
        raw.parse::<GatewayProvider>()
            .map_err(|_| invalid("GATEWAY_PROVIDER", &format!("unknown provider '{}'", raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayProvider {
    /// In-process gateway that settles every issued invoice. Development only.
    Dummy,
}

impl FromStr for GatewayProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dummy" => Ok(GatewayProvider::Dummy),
            other => Err(format!("unknown gateway provider: {}", other)),
        }
    }
}

fn invalid(var: &'static str, reason: &str) -> InfraError {
    InfraError::ConfigInvalid {
        var,
        reason: reason.to_string(),
    }
}

/// Checkout widget parameters returned to clients with every auth token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCheckoutConfig {
    pub terminal: String,
    pub back_link: String,
    pub post_link: String,
    pub widget_url: String,
}

impl GatewayConfig for GatewayCheckoutConfig {
    fn terminal(&self) -> &str {
        &self.terminal
    }

    fn back_link(&self) -> &str {
        &self.back_link
    }

    fn post_link(&self) -> &str {
        &self.post_link
    }

    fn widget_url(&self) -> &str {
        &self.widget_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_app_config as config;

    #[test]
    fn default_limits_are_valid() {
        assert!(config().validate().is_ok());
        assert_eq!(config().expire_batch_limit(), None);
    }

    #[test]
    fn inverted_amount_bounds_are_rejected() {
        let mut config = config();
        config.payment_limits.max_amount = config.payment_limits.min_amount - 1;
        assert!(matches!(
            config.validate(),
            Err(InfraError::ConfigInvalid {
                var: "PAYMENT_MAX_AMOUNT",
                ..
            })
        ));
    }

    #[test]
    fn gateway_provider_must_be_explicit() {
        let mut config = config();
        config.gateway_provider = String::new();
        assert!(matches!(
            config.validate(),
            Err(InfraError::ConfigInvalid {
                var: "GATEWAY_PROVIDER",
                ..
            })
        ));

        config.gateway_provider = "stripe".into();
        assert!(matches!(
            config.gateway_provider(),
            Err(InfraError::ConfigInvalid {
                var: "GATEWAY_PROVIDER",
                ..
            })
        ));

        config.gateway_provider = " Dummy ".into();
        assert_eq!(config.gateway_provider().unwrap(), GatewayProvider::Dummy);
    }

    #[test]
    fn zero_retry_attempts_are_rejected() {
        let mut config = config();
        config.callback_retry_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
