use std::env;

use chrono::FixedOffset;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    /// Search radius used when a match request does not supply one.
    pub default_radius_km: f64,
    /// Presence older than this counts as offline for candidate search.
    pub presence_stale_secs: i64,
    /// Wall-clock offset for pricing time rules. Rio Grande runs UTC-3
    /// year-round, so a fixed offset stands in for the zone.
    pub pricing_utc_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let offset_hours: i32 = parse_or_default("PRICING_UTC_OFFSET_HOURS", -3)?;
        let pricing_utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Internal(format!(
                "PRICING_UTC_OFFSET_HOURS out of range: {offset_hours}"
            ))
        })?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", 2.0)?,
            presence_stale_secs: parse_or_default("PRESENCE_STALE_SECS", 30)?,
            pricing_utc_offset,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            default_radius_km: 2.0,
            presence_stale_secs: 30,
            pricing_utc_offset: FixedOffset::west_opt(3 * 3600)
                .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid")),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
