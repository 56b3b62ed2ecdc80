//! Fare pricing: base fare plus per-km, floored by a minimum, scaled by
//! time-window and weather multipliers, rounded to a configured step.
//!
//! `compute_price` is pure: same inputs and evaluation time always produce
//! the same quote, so estimates are reproducible for auditing.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRule {
    pub name: String,
    /// HH:MM, inclusive.
    pub start: String,
    /// HH:MM, exclusive. `start > end` wraps past midnight; `start == end`
    /// matches all day.
    pub end: String,
    pub multiplier: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRule {
    pub enabled: bool,
    pub multiplier: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km: f64,
    pub minimum_fare: f64,
    pub rounding: f64,
    pub time_rules: Vec<TimeRule>,
    pub weather_rule: WeatherRule,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 900.0,
            per_km: 950.0,
            minimum_fare: 2_500.0,
            rounding: 50.0,
            time_rules: vec![TimeRule {
                name: "Nocturno".to_string(),
                start: "22:00".to_string(),
                end: "06:00".to_string(),
                multiplier: 1.15,
                enabled: true,
            }],
            weather_rule: WeatherRule {
                enabled: false,
                multiplier: 1.2,
                label: "Viento/Nieve".to_string(),
            },
        }
    }
}

/// Every input that went into a quote, surfaced to end users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub base_fare: f64,
    pub per_km: f64,
    pub minimum_fare: f64,
    pub distance_km: f64,
    /// Unrounded `max(minimum_fare, base_fare + distance * per_km)`.
    pub base_price: f64,
    pub time_multiplier: f64,
    pub weather_multiplier: f64,
    pub rounding: f64,
    pub time_rule_name: Option<String>,
    pub weather_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub base: f64,
    #[serde(rename = "final")]
    pub final_price: f64,
    pub breakdown: PricingBreakdown,
}

/// Rounds to the nearest multiple of `step`; steps of 1 or below behave as
/// plain integer rounding.
pub fn round_to(value: f64, step: f64) -> f64 {
    if !step.is_finite() || step <= 1.0 {
        return value.round();
    }
    (value / step).round() * step
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Half-open `[start, end)` minute-of-day check, wrapping past midnight when
/// `start > end`. `start == end` matches unconditionally. Malformed bounds
/// never match.
pub fn is_time_in_range(now: NaiveTime, start_hhmm: &str, end_hhmm: &str) -> bool {
    let (Some(start), Some(end)) = (parse_hhmm(start_hhmm), parse_hhmm(end_hhmm)) else {
        return false;
    };

    let current = now.hour() * 60 + now.minute();

    if start == end {
        return true;
    }

    if start < end {
        current >= start && current < end
    } else {
        current >= start || current < end
    }
}

fn time_multiplier(now: NaiveTime, rules: &[TimeRule]) -> (f64, Option<&str>) {
    let mut best: Option<&TimeRule> = None;
    for rule in rules {
        if !rule.enabled || !is_time_in_range(now, &rule.start, &rule.end) {
            continue;
        }
        // Highest multiplier wins; first rule in config order breaks ties.
        if best.is_none_or(|current| rule.multiplier > current.multiplier) {
            best = Some(rule);
        }
    }

    match best {
        Some(rule) => (rule.multiplier, Some(rule.name.as_str())),
        None => (1.0, None),
    }
}

fn weather_multiplier(rule: &WeatherRule) -> (f64, Option<&str>) {
    if !rule.enabled {
        return (1.0, None);
    }
    (rule.multiplier.max(1.0), Some(rule.label.as_str()))
}

pub fn compute_price(distance_km: f64, config: &PricingConfig, local_now: NaiveTime) -> Quote {
    let base_price = (config.base_fare + distance_km * config.per_km).max(config.minimum_fare);
    let (time, time_rule_name) = time_multiplier(local_now, &config.time_rules);
    let (weather, weather_label) = weather_multiplier(&config.weather_rule);

    let final_price = round_to(base_price * time * weather, config.rounding);

    Quote {
        base: round_to(base_price, config.rounding),
        final_price,
        breakdown: PricingBreakdown {
            base_fare: config.base_fare,
            per_km: config.per_km,
            minimum_fare: config.minimum_fare,
            distance_km,
            base_price,
            time_multiplier: time,
            weather_multiplier: weather,
            rounding: config.rounding,
            time_rule_name: time_rule_name.map(str::to_string),
            weather_label: weather_label.map(str::to_string),
        },
    }
}

const ALLOWED_ROUNDING_STEPS: [f64; 4] = [1.0, 10.0, 50.0, 100.0];

/// Admin-side validation before a config replace.
pub fn validate(config: &PricingConfig) -> Result<(), String> {
    if !(config.base_fare.is_finite() && config.base_fare > 0.0) {
        return Err("base_fare must be positive".to_string());
    }
    if !(config.per_km.is_finite() && config.per_km > 0.0) {
        return Err("per_km must be positive".to_string());
    }
    if !(config.minimum_fare.is_finite() && config.minimum_fare > 0.0) {
        return Err("minimum_fare must be positive".to_string());
    }
    if !ALLOWED_ROUNDING_STEPS.contains(&config.rounding) {
        return Err("rounding must be 1, 10, 50 or 100".to_string());
    }

    for rule in &config.time_rules {
        if parse_hhmm(&rule.start).is_none() || parse_hhmm(&rule.end).is_none() {
            return Err(format!("time rule '{}' has invalid HH:MM bounds", rule.name));
        }
        if !(1.0..=2.0).contains(&rule.multiplier) {
            return Err(format!(
                "time rule '{}' multiplier out of range (1.0 - 2.0)",
                rule.name
            ));
        }
    }

    if !(1.0..=2.0).contains(&config.weather_rule.multiplier) {
        return Err("weather multiplier out of range (1.0 - 2.0)".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn night_rule_is_half_open_and_wraps_midnight() {
        assert!(!is_time_in_range(at(21, 59), "22:00", "06:00"));
        assert!(is_time_in_range(at(22, 0), "22:00", "06:00"));
        assert!(is_time_in_range(at(23, 0), "22:00", "06:00"));
        assert!(is_time_in_range(at(5, 59), "22:00", "06:00"));
        assert!(!is_time_in_range(at(6, 0), "22:00", "06:00"));
    }

    #[test]
    fn equal_bounds_match_all_day() {
        assert!(is_time_in_range(at(0, 0), "09:00", "09:00"));
        assert!(is_time_in_range(at(14, 30), "09:00", "09:00"));
    }

    #[test]
    fn malformed_bounds_never_match() {
        assert!(!is_time_in_range(at(12, 0), "9:00", "17:00"));
        assert!(!is_time_in_range(at(12, 0), "24:00", "06:00"));
        assert!(!is_time_in_range(at(12, 0), "22:00", "06:60"));
    }

    #[test]
    fn daytime_ride_uses_flat_multipliers() {
        let quote = compute_price(3.2, &PricingConfig::default(), at(14, 0));

        assert_eq!(quote.breakdown.base_price, 3_940.0);
        assert_eq!(quote.breakdown.time_multiplier, 1.0);
        assert_eq!(quote.breakdown.weather_multiplier, 1.0);
        assert_eq!(quote.final_price, 3_950.0);
        assert!(quote.breakdown.time_rule_name.is_none());
        assert!(quote.breakdown.weather_label.is_none());
    }

    #[test]
    fn night_ride_applies_nocturno_multiplier() {
        let quote = compute_price(3.2, &PricingConfig::default(), at(23, 0));

        assert_eq!(quote.breakdown.time_multiplier, 1.15);
        assert_eq!(quote.breakdown.time_rule_name.as_deref(), Some("Nocturno"));
        // round(3940 * 1.15, 50) = round(4531, 50)
        assert_eq!(quote.final_price, 4_550.0);
    }

    #[test]
    fn short_ride_is_floored_by_minimum_fare() {
        let quote = compute_price(0.5, &PricingConfig::default(), at(14, 0));

        assert_eq!(quote.breakdown.base_price, 2_500.0);
        assert!(quote.final_price >= 2_500.0 - quote.breakdown.rounding / 2.0);
    }

    #[test]
    fn weather_multiplier_never_discounts() {
        let mut config = PricingConfig::default();
        config.weather_rule.enabled = true;
        config.weather_rule.multiplier = 0.5;

        let quote = compute_price(3.2, &config, at(14, 0));
        assert_eq!(quote.breakdown.weather_multiplier, 1.0);
        assert_eq!(
            quote.breakdown.weather_label.as_deref(),
            Some("Viento/Nieve")
        );
    }

    #[test]
    fn highest_multiplier_wins_first_rule_breaks_ties() {
        let mut config = PricingConfig::default();
        config.time_rules = vec![
            TimeRule {
                name: "Pico".to_string(),
                start: "00:00".to_string(),
                end: "00:00".to_string(),
                multiplier: 1.3,
                enabled: true,
            },
            TimeRule {
                name: "Valle".to_string(),
                start: "00:00".to_string(),
                end: "00:00".to_string(),
                multiplier: 1.3,
                enabled: true,
            },
            TimeRule {
                name: "Suave".to_string(),
                start: "00:00".to_string(),
                end: "00:00".to_string(),
                multiplier: 1.1,
                enabled: true,
            },
        ];

        let quote = compute_price(3.2, &config, at(12, 0));
        assert_eq!(quote.breakdown.time_multiplier, 1.3);
        assert_eq!(quote.breakdown.time_rule_name.as_deref(), Some("Pico"));
    }

    #[test]
    fn disabled_rules_are_ignored() {
        let mut config = PricingConfig::default();
        config.time_rules[0].enabled = false;

        let quote = compute_price(3.2, &config, at(23, 0));
        assert_eq!(quote.breakdown.time_multiplier, 1.0);
    }

    #[test]
    fn identical_inputs_yield_identical_quotes() {
        let config = PricingConfig::default();
        let first = compute_price(7.31, &config, at(23, 15));
        let second = compute_price(7.31, &config, at(23, 15));
        assert_eq!(first, second);
    }

    #[test]
    fn unit_step_rounds_to_nearest_integer() {
        assert_eq!(round_to(4_531.4, 1.0), 4_531.0);
        assert_eq!(round_to(4_531.4, 0.0), 4_531.0);
        assert_eq!(round_to(4_531.0, 50.0), 4_550.0);
        assert_eq!(round_to(4_524.9, 50.0), 4_500.0);
    }

    #[test]
    fn validate_rejects_bad_configs() {
        let mut config = PricingConfig::default();
        config.rounding = 25.0;
        assert!(validate(&config).is_err());

        let mut config = PricingConfig::default();
        config.time_rules[0].start = "25:00".to_string();
        assert!(validate(&config).is_err());

        let mut config = PricingConfig::default();
        config.time_rules[0].multiplier = 2.5;
        assert!(validate(&config).is_err());

        assert!(validate(&PricingConfig::default()).is_ok());
    }
}
