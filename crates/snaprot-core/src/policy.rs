use std::num::NonZeroU32;

use serde::Serialize;

use crate::config::KeepConfig;
use crate::generation::Generation;

/// Number of slots each generation keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub hourly: NonZeroU32,
    pub daily: NonZeroU32,
    pub weekly: NonZeroU32,
    pub monthly: NonZeroU32,
    pub yearly: NonZeroU32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hourly: default_count(Generation::Hourly),
            daily: default_count(Generation::Daily),
            weekly: default_count(Generation::Weekly),
            monthly: default_count(Generation::Monthly),
            yearly: default_count(Generation::Yearly),
        }
    }
}

impl RetentionPolicy {
    /// Override the retained count for one generation.
    #[must_use]
    pub const fn with_count(mut self, generation: Generation, count: NonZeroU32) -> Self {
        match generation {
            Generation::Hourly => self.hourly = count,
            Generation::Daily => self.daily = count,
            Generation::Weekly => self.weekly = count,
            Generation::Monthly => self.monthly = count,
            Generation::Yearly => self.yearly = count,
        }
        self
    }

    #[must_use]
    pub const fn retained_count(&self, generation: Generation) -> u32 {
        match generation {
            Generation::Hourly => self.hourly.get(),
            Generation::Daily => self.daily.get(),
            Generation::Weekly => self.weekly.get(),
            Generation::Monthly => self.monthly.get(),
            Generation::Yearly => self.yearly.get(),
        }
    }

    /// Highest index that may persist after pruning.
    #[must_use]
    pub const fn max_index(&self, generation: Generation) -> u32 {
        self.retained_count(generation) - 1
    }
}

impl From<&KeepConfig> for RetentionPolicy {
    fn from(keep: &KeepConfig) -> Self {
        let overrides = [
            (Generation::Hourly, keep.hourly),
            (Generation::Daily, keep.daily),
            (Generation::Weekly, keep.weekly),
            (Generation::Monthly, keep.monthly),
            (Generation::Yearly, keep.yearly),
        ];
        overrides
            .into_iter()
            .fold(Self::default(), |policy, (generation, count)| match count {
                Some(count) => policy.with_count(generation, count),
                None => policy,
            })
    }
}

const fn default_count(generation: Generation) -> NonZeroU32 {
    match NonZeroU32::new(generation.default_retained()) {
        Some(count) => count,
        None => NonZeroU32::MIN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).expect("non-zero")
    }

    #[test]
    fn defaults_match_the_documented_counts() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.retained_count(Generation::Hourly), 24);
        assert_eq!(policy.retained_count(Generation::Daily), 7);
        assert_eq!(policy.retained_count(Generation::Weekly), 5);
        assert_eq!(policy.retained_count(Generation::Monthly), 12);
        assert_eq!(policy.retained_count(Generation::Yearly), 100);
    }

    #[test]
    fn max_index_is_one_below_the_count() {
        let policy = RetentionPolicy::default().with_count(Generation::Hourly, count(3));
        assert_eq!(policy.max_index(Generation::Hourly), 2);

        let single = RetentionPolicy::default().with_count(Generation::Daily, count(1));
        assert_eq!(single.max_index(Generation::Daily), 0);
    }

    #[test]
    fn keep_config_overrides_only_what_it_names() {
        let keep = KeepConfig {
            daily: Some(count(14)),
            ..KeepConfig::default()
        };
        let policy = RetentionPolicy::from(&keep);
        assert_eq!(policy.retained_count(Generation::Daily), 14);
        assert_eq!(policy.retained_count(Generation::Hourly), 24);
        assert_eq!(policy.retained_count(Generation::Yearly), 100);
    }
}
