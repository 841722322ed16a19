//! Reward Tier Calculator - turnover slabs to reward credits
//!
//! | Slab (cumulative turnover consumed) | Credits |
//! |-------------------------------------|---------|
//! | first 200,000                       | 10      |
//! | next 500,000 (up to 700,000)        | 15      |
//! | next 1,000,000 (up to 1,700,000)    | 20      |
//! | each further full 2,000,000         | 25      |
//!
//! Slab sizes are in whole currency units. A slab pays only when fully
//! covered. Pure: no state is read or written here.

use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, Credits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slab {
    /// Turnover consumed by this slab, whole currency units
    pub size: u64,
    pub credits: Credits,
}

/// How consolidation turns the current tier into wallet credits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPolicy {
    /// Award only tier credits not granted by an earlier run
    #[default]
    Delta,
    /// Award the full tier credits on every run
    Cumulative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    #[serde(default = "default_slabs")]
    pub slabs: Vec<Slab>,
    /// Applied repeatedly once every fixed slab is covered
    #[serde(default = "default_repeating")]
    pub repeating: Option<Slab>,
}

fn default_slabs() -> Vec<Slab> {
    vec![
        Slab {
            size: 200_000,
            credits: 10,
        },
        Slab {
            size: 500_000,
            credits: 15,
        },
        Slab {
            size: 1_000_000,
            credits: 20,
        },
    ]
}

fn default_repeating() -> Option<Slab> {
    Some(Slab {
        size: 2_000_000,
        credits: 25,
    })
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            slabs: default_slabs(),
            repeating: default_repeating(),
        }
    }
}

impl RewardSchedule {
    pub fn validate(&self) -> Result<(), String> {
        if self.slabs.iter().any(|s| s.size == 0) {
            return Err("reward slab size must be positive".into());
        }
        if matches!(self.repeating, Some(Slab { size: 0, .. })) {
            return Err("repeating slab size must be positive".into());
        }
        Ok(())
    }

    /// Credits earned by `turnover` whole currency units.
    pub fn credits_for(&self, turnover: u64) -> Credits {
        let mut remaining = turnover;
        let mut credits: Credits = 0;

        for slab in &self.slabs {
            if remaining < slab.size {
                return credits;
            }
            remaining -= slab.size;
            credits = credits.saturating_add(slab.credits);
        }

        if let Some(step) = self.repeating {
            if step.size > 0 {
                credits = credits.saturating_add((remaining / step.size).saturating_mul(step.credits));
            }
        }
        credits
    }

    /// Credits earned by a turnover held in the smallest currency unit.
    /// A unit scale beyond `u64` leaves no whole units, so no credits.
    pub fn credits_for_amount(&self, turnover: Amount, currency_decimals: u32) -> Credits {
        match 10u64.checked_pow(currency_decimals) {
            Some(scale) => self.credits_for(turnover / scale),
            None => 0,
        }
    }
}

/// Reward settings used by a consolidation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub policy: CreditPolicy,
    /// Decimal places of the smallest currency unit
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u32,
    #[serde(flatten)]
    pub schedule: RewardSchedule,
}

/// Largest decimals value whose scale fits in a u64
pub const MAX_CURRENCY_DECIMALS: u32 = 18;

fn default_currency_decimals() -> u32 {
    2
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            policy: CreditPolicy::default(),
            currency_decimals: default_currency_decimals(),
            schedule: RewardSchedule::default(),
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.currency_decimals > MAX_CURRENCY_DECIMALS {
            return Err(format!(
                "currency_decimals {} exceeds {}",
                self.currency_decimals, MAX_CURRENCY_DECIMALS
            ));
        }
        self.schedule.validate()
    }

    /// Tier credits for a turnover in the smallest currency unit
    pub fn tier_credits(&self, turnover: Amount) -> Credits {
        self.schedule
            .credits_for_amount(turnover, self.currency_decimals)
    }
}

/// Credits to add to a wallet this run under `policy`.
///
/// Returns `(award, new_granted_basis)`.
pub fn credits_to_award(
    policy: CreditPolicy,
    tier_credits: Credits,
    already_granted: Credits,
) -> (Credits, Credits) {
    match policy {
        CreditPolicy::Cumulative => (tier_credits, already_granted.max(tier_credits)),
        CreditPolicy::Delta => {
            let award = tier_credits.saturating_sub(already_granted);
            (award, already_granted.max(tier_credits))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let s = RewardSchedule::default();
        assert_eq!(s.credits_for(0), 0);
        assert_eq!(s.credits_for(150_000), 0);
        assert_eq!(s.credits_for(199_999), 0);
        assert_eq!(s.credits_for(200_000), 10);
        assert_eq!(s.credits_for(699_999), 10);
        assert_eq!(s.credits_for(700_000), 25);
        assert_eq!(s.credits_for(1_700_000), 45);
        assert_eq!(s.credits_for(3_699_999), 45);
        assert_eq!(s.credits_for(3_700_000), 70);
        assert_eq!(s.credits_for(7_700_000), 120);
    }

    #[test]
    fn test_minor_units() {
        let s = RewardSchedule::default();
        // 200,000.00 in cents
        assert_eq!(s.credits_for_amount(20_000_000, 2), 10);
        assert_eq!(s.credits_for_amount(19_999_999, 2), 0);
        assert_eq!(s.credits_for_amount(700_000, 0), 25);
    }

    #[test]
    fn test_oversized_unit_scale_earns_nothing() {
        let s = RewardSchedule::default();
        assert_eq!(s.credits_for_amount(u64::MAX, 20), 0);
        assert_eq!(s.credits_for_amount(u64::MAX, 19), 0);
    }

    #[test]
    fn test_without_repeating_slab() {
        let s = RewardSchedule {
            repeating: None,
            ..Default::default()
        };
        assert_eq!(s.credits_for(100_000_000), 45);
    }

    #[test]
    fn test_huge_turnover_saturates() {
        let s = RewardSchedule {
            slabs: vec![],
            repeating: Some(Slab {
                size: 1,
                credits: u64::MAX,
            }),
        };
        assert_eq!(s.credits_for(10), u64::MAX);
    }

    #[test]
    fn test_validate() {
        assert!(RewardSchedule::default().validate().is_ok());
        let bad = RewardSchedule {
            slabs: vec![Slab { size: 0, credits: 1 }],
            repeating: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_reward_config_yaml() {
        let cfg: RewardConfig = serde_yaml::from_str(
            "policy: cumulative\ncurrency_decimals: 0\nrepeating: null\n",
        )
        .unwrap();
        assert_eq!(cfg.policy, CreditPolicy::Cumulative);
        assert_eq!(cfg.schedule.slabs.len(), 3);
        assert_eq!(cfg.schedule.repeating, None);
        assert_eq!(cfg.tier_credits(1_700_000), 45);

        let defaults: RewardConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(defaults, RewardConfig::default());
        assert_eq!(defaults.tier_credits(20_000_000), 10);

        let bad = RewardConfig {
            currency_decimals: 30,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_delta_policy() {
        assert_eq!(credits_to_award(CreditPolicy::Delta, 25, 0), (25, 25));
        assert_eq!(credits_to_award(CreditPolicy::Delta, 25, 25), (0, 25));
        assert_eq!(credits_to_award(CreditPolicy::Delta, 45, 25), (20, 45));
        // turnover dropped after a restructure: no clawback, basis kept
        assert_eq!(credits_to_award(CreditPolicy::Delta, 10, 25), (0, 25));
    }

    #[test]
    fn test_cumulative_policy() {
        assert_eq!(credits_to_award(CreditPolicy::Cumulative, 25, 0), (25, 25));
        assert_eq!(credits_to_award(CreditPolicy::Cumulative, 25, 25), (25, 25));
    }
}
