use crate::domain::Money;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Platform fee taken from order value, in percent.
    pub platform_fee_pct: Money,
    /// COD handling fee taken from collected cash, in percent.
    pub cod_handling_fee_pct: Money,
    /// Partner compensation rate per kilometre.
    pub partner_rate_per_km: Money,
    /// Payout provider endpoint; absent means transfers are simulated.
    pub payout_gateway_url: Option<String>,
    pub batch_tick_secs: u64,
    pub tier_eval_tick_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let platform_fee_pct = parse_pct(&env_map, "PLATFORM_FEE_PCT", "5")?;
        let cod_handling_fee_pct = parse_pct(&env_map, "COD_HANDLING_FEE_PCT", "2")?;

        let partner_rate_per_km = env_map
            .get("PARTNER_RATE_PER_KM")
            .map(|s| s.as_str())
            .unwrap_or("9")
            .parse::<Money>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PARTNER_RATE_PER_KM".to_string(),
                    "must be a valid decimal".to_string(),
                )
            })?;
        if partner_rate_per_km.is_negative() {
            return Err(ConfigError::InvalidValue(
                "PARTNER_RATE_PER_KM".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let payout_gateway_url = env_map.get("PAYOUT_GATEWAY_URL").cloned();

        let batch_tick_secs = parse_secs(&env_map, "BATCH_TICK_SECS", "300")?;
        let tier_eval_tick_secs = parse_secs(&env_map, "TIER_EVAL_TICK_SECS", "86400")?;

        Ok(Config {
            port,
            database_path,
            platform_fee_pct,
            cod_handling_fee_pct,
            partner_rate_per_km,
            payout_gateway_url,
            batch_tick_secs,
            tier_eval_tick_secs,
        })
    }
}

fn parse_pct(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Money, ConfigError> {
    let pct = env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<Money>()
        .map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid decimal".to_string())
        })?;

    if pct.is_negative() || pct > Money::from_i64(100) {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be between 0 and 100".to_string(),
        ));
    }
    Ok(pct)
}

fn parse_secs(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string()))
}
