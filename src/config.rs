//! Application configuration loaded from environment variables.
//!
//! `.env` is read first (via dotenvy) when present.
//!
//! ## Required Variables
//!
//! - `AVAILABILITY_API_URL` - Base URL of the backend Availability Service
//!
//! ## Optional Variables
//!
//! - `LISTEN_ADDR` - Bind address (default: `0.0.0.0:3000`)
//! - `AVAILABILITY_API_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `AVAILABILITY_FETCH_RETRIES` - Automatic retries of transient fetch failures (default: 0)
//! - `LATE_FEE_PER_HOUR` - Late-return fee per overage hour, minor units (default: 15000)
//! - `GRACE_HOURS` - Overage hours billed hourly before a full day is charged (default: 6)
//! - `VEHICLE_TYPES_TTL_SECS` - Vehicle-type catalog cache TTL (default: 600)
//! - `RUST_LOG` - Log filter (default: `motorent_web=info,tower_http=info`)

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::availability::RetryPolicy;
use crate::pricing::models::{GRACE_HOURS, LATE_FEE_PER_HOUR};
use crate::pricing::PricingPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub availability_api_url: String,
    pub availability_api_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub pricing_policy: PricingPolicy,
    pub vehicle_types_ttl: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let availability_api_url =
            get("AVAILABILITY_API_URL").context("AVAILABILITY_API_URL must be set")?;
        if !(availability_api_url.starts_with("http://")
            || availability_api_url.starts_with("https://"))
        {
            bail!(
                "AVAILABILITY_API_URL must be an http(s) URL, got '{}'",
                availability_api_url
            );
        }

        let late_fee_per_hour: Decimal = parse_or(&get, "LATE_FEE_PER_HOUR", LATE_FEE_PER_HOUR)?;
        if late_fee_per_hour < Decimal::ZERO {
            bail!("LATE_FEE_PER_HOUR must not be negative");
        }
        let grace_hours: i64 = parse_or(&get, "GRACE_HOURS", GRACE_HOURS)?;
        if !(0..24).contains(&grace_hours) {
            bail!("GRACE_HOURS must be between 0 and 23, got {}", grace_hours);
        }

        Ok(Self {
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            availability_api_url,
            availability_api_timeout: Duration::from_secs(parse_or(
                &get,
                "AVAILABILITY_API_TIMEOUT_SECS",
                10,
            )?),
            retry_policy: RetryPolicy {
                max_retries: parse_or(&get, "AVAILABILITY_FETCH_RETRIES", 0)?,
                ..RetryPolicy::none()
            },
            pricing_policy: PricingPolicy {
                late_fee_per_hour,
                grace_hours,
            },
            vehicle_types_ttl: Duration::from_secs(parse_or(&get, "VEHICLE_TYPES_TTL_SECS", 600)?),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
