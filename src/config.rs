use crate::domain::{AmountError, BasisPoints, PricingMode};
use std::collections::HashMap;
use thiserror::Error;

/// Service configuration, loaded from the environment.
///
/// Fee caps bound what vault creators may configure; the pricing modes pick
/// which quote field each valuation reads.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Quote field used for cash-settlement NAV. Defaults to bid so the fund
    /// never overpays cash redeemers versus in-kind ones.
    pub cash_nav_mode: PricingMode,
    pub max_deposit_fee_bps: BasisPoints,
    pub max_perf_fee_bps: BasisPoints,
    pub max_early_exit_fee_bps: BasisPoints,
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

        let cash_nav_mode = match env_map
            .get("CASH_NAV_MODE")
            .map(|s| s.as_str())
            .unwrap_or("bid")
        {
            "bid" => PricingMode::Bid,
            "mid" => PricingMode::Mid,
            "ask" => PricingMode::Ask,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CASH_NAV_MODE".to_string(),
                    format!("must be bid, mid, or ask, got {}", other),
                ))
            }
        };

        let max_deposit_fee_bps = parse_bps(&env_map, "MAX_DEPOSIT_FEE_BPS", "300")?;
        let max_perf_fee_bps = parse_bps(&env_map, "MAX_PERF_FEE_BPS", "3000")?;
        let max_early_exit_fee_bps = parse_bps(&env_map, "MAX_EARLY_EXIT_FEE_BPS", "500")?;

        Ok(Config {
            port,
            database_path,
            cash_nav_mode,
            max_deposit_fee_bps,
            max_perf_fee_bps,
            max_early_exit_fee_bps,
        })
    }
}

fn parse_bps(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<BasisPoints, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    BasisPoints::parse(raw).map_err(|e: AmountError| {
        ConfigError::InvalidValue(key.to_string(), e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cash_nav_mode, PricingMode::Bid);
        assert_eq!(config.max_deposit_fee_bps.as_u16(), 300);
        assert_eq!(config.max_perf_fee_bps.as_u16(), 3000);
        assert_eq!(config.max_early_exit_fee_bps.as_u16(), 500);
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_cash_nav_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("CASH_NAV_MODE".to_string(), "last".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CASH_NAV_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fee_cap_must_be_below_ten_thousand() {
        let mut env_map = setup_required_env();
        env_map.insert("MAX_PERF_FEE_BPS".to_string(), "10000".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_PERF_FEE_BPS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
