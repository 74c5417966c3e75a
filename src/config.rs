//! Environment-driven configuration, loaded once at startup and held
//! read-only for the process lifetime.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Penalty coefficients for the soft objective, one per tier label.
///
/// Defaults are the production values; every field can be overridden via
/// a `SCHEDULER_PENALTY_*` / `SCHEDULER_BONUS_*` environment variable.
#[derive(Clone, Debug)]
pub struct PenaltyWeights {
    // Tier 1 — near-hard
    pub unavailability: i64,
    pub below_ideal_strong: i64,
    pub above_ideal_strong: i64,
    pub zero_shifts: i64,
    /// "Everyone blocked this slot" tie-breaker: heaviest closer first.
    pub unavailability_fairness: i64,
    /// Escalation per additional violation on the same person.
    pub unavailability_repeat: i64,
    // Tier 2
    pub consecutive_days: i64,
    // Tier 3 — fairness
    pub ideal_soft: i64,
    pub history_fairness: i64,
    pub duty_type_fairness: i64,
    pub night_fairness: i64,
    pub weekend_slot_fairness: i64,
    pub segment_fairness: i64,
    // Tier 4 — comfort
    pub weekly_clustering: i64,
    pub two_shifts_same_day: i64,
    pub consecutive_nights: i64,
    pub full_day: i64,
    // Tier 5 — preferences
    pub dislikes_weekend: i64,
    pub likes_night: i64,
    pub likes_morning: i64,
    pub likes_evening: i64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            unavailability: 200_000,
            below_ideal_strong: 140_000,
            above_ideal_strong: 120_000,
            zero_shifts: 80_000,
            unavailability_fairness: 1_000,
            unavailability_repeat: 25_000,
            consecutive_days: 7_000,
            ideal_soft: 4_000,
            history_fairness: 3_000,
            duty_type_fairness: 1_000,
            night_fairness: 1_000,
            weekend_slot_fairness: 50,
            segment_fairness: 1_000,
            weekly_clustering: 100,
            two_shifts_same_day: 100,
            consecutive_nights: 100,
            full_day: 100,
            dislikes_weekend: 10,
            likes_night: 5,
            likes_morning: 5,
            likes_evening: 5,
        }
    }
}

/// Application settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_port: u16,
    pub time_limit_seconds: u64,
    pub random_seed: u64,
    pub weights: PenaltyWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            time_limit_seconds: 60,
            random_seed: 42,
            weights: PenaltyWeights::default(),
        }
    }
}

impl Config {
    /// Loads settings from the environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = PenaltyWeights::default();
        let weights = PenaltyWeights {
            unavailability: env_or("SCHEDULER_PENALTY_UNAVAILABILITY", defaults.unavailability)?,
            below_ideal_strong: env_or(
                "SCHEDULER_PENALTY_BELOW_IDEAL_STRONG",
                defaults.below_ideal_strong,
            )?,
            above_ideal_strong: env_or(
                "SCHEDULER_PENALTY_ABOVE_IDEAL_STRONG",
                defaults.above_ideal_strong,
            )?,
            zero_shifts: env_or("SCHEDULER_PENALTY_ZERO_SHIFTS", defaults.zero_shifts)?,
            unavailability_fairness: env_or(
                "SCHEDULER_PENALTY_UNAVAILABILITY_FAIRNESS",
                defaults.unavailability_fairness,
            )?,
            unavailability_repeat: env_or(
                "SCHEDULER_PENALTY_UNAVAILABILITY_REPEAT",
                defaults.unavailability_repeat,
            )?,
            consecutive_days: env_or(
                "SCHEDULER_PENALTY_CONSECUTIVE_DAYS",
                defaults.consecutive_days,
            )?,
            ideal_soft: env_or("SCHEDULER_PENALTY_IDEAL_SOFT", defaults.ideal_soft)?,
            history_fairness: env_or(
                "SCHEDULER_PENALTY_HISTORY_FAIRNESS",
                defaults.history_fairness,
            )?,
            duty_type_fairness: env_or(
                "SCHEDULER_PENALTY_DUTY_TYPE_FAIRNESS",
                defaults.duty_type_fairness,
            )?,
            night_fairness: env_or("SCHEDULER_PENALTY_NIGHT_FAIRNESS", defaults.night_fairness)?,
            weekend_slot_fairness: env_or(
                "SCHEDULER_PENALTY_WEEKEND_SLOT_FAIRNESS",
                defaults.weekend_slot_fairness,
            )?,
            segment_fairness: env_or(
                "SCHEDULER_PENALTY_SEGMENT_FAIRNESS",
                defaults.segment_fairness,
            )?,
            weekly_clustering: env_or(
                "SCHEDULER_PENALTY_WEEKLY_CLUSTERING",
                defaults.weekly_clustering,
            )?,
            two_shifts_same_day: env_or(
                "SCHEDULER_PENALTY_TWO_SHIFTS_SAME_DAY",
                defaults.two_shifts_same_day,
            )?,
            consecutive_nights: env_or(
                "SCHEDULER_PENALTY_CONSECUTIVE_NIGHTS",
                defaults.consecutive_nights,
            )?,
            full_day: env_or("SCHEDULER_PENALTY_FULL_DAY", defaults.full_day)?,
            dislikes_weekend: env_or(
                "SCHEDULER_PENALTY_DISLIKES_WEEKEND",
                defaults.dislikes_weekend,
            )?,
            likes_night: env_or("SCHEDULER_BONUS_LIKES_NIGHT", defaults.likes_night)?,
            likes_morning: env_or("SCHEDULER_BONUS_LIKES_MORNING", defaults.likes_morning)?,
            likes_evening: env_or("SCHEDULER_BONUS_LIKES_EVENING", defaults.likes_evening)?,
        };

        Ok(Self {
            listen_port: env_or("PORT", 8080)?,
            time_limit_seconds: env_or("SCHEDULER_TIME_LIMIT_SECONDS", 60)?,
            random_seed: env_or("SCHEDULER_RANDOM_SEED", 42)?,
            weights,
        })
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_seconds)
    }
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} must be a valid number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
