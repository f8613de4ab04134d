//! Resource identifiers, the bounded resource ledger, and the power log.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{STOCK_DECIMALS, STOCK_FLOOR, VITAL_MAX, VITAL_MIN};
use crate::numbers::round_to_places;

/// One of the six tracked quantities of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resource {
    #[serde(rename = "O2")]
    Oxygen,
    #[serde(rename = "H2O")]
    Water,
    Food,
    Power,
    Health,
    Morale,
}

impl Resource {
    pub const ALL: [Self; 6] = [
        Self::Oxygen,
        Self::Water,
        Self::Food,
        Self::Power,
        Self::Health,
        Self::Morale,
    ];

    /// Depletable stocks, in aggregate order.
    pub const STOCKS: [Self; 4] = [Self::Oxygen, Self::Water, Self::Food, Self::Power];

    /// Resources whose exhaustion ends a run.
    pub const FATAL: [Self; 4] = [Self::Oxygen, Self::Water, Self::Food, Self::Health];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oxygen => "O2",
            Self::Water => "H2O",
            Self::Food => "Food",
            Self::Power => "Power",
            Self::Health => "Health",
            Self::Morale => "Morale",
        }
    }

    #[must_use]
    pub const fn is_stock(self) -> bool {
        matches!(self, Self::Oxygen | Self::Water | Self::Food | Self::Power)
    }

    #[must_use]
    pub const fn is_vital(self) -> bool {
        matches!(self, Self::Health | Self::Morale)
    }

    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::Oxygen | Self::Water | Self::Food | Self::Health
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O2" => Ok(Self::Oxygen),
            "H2O" => Ok(Self::Water),
            "Food" => Ok(Self::Food),
            "Power" => Ok(Self::Power),
            "Health" => Ok(Self::Health),
            "Morale" => Ok(Self::Morale),
            _ => Err(()),
        }
    }
}

/// Named per-resource deltas, applied together by [`ResourceLedger::apply_changes`].
pub type ResourceDelta = BTreeMap<Resource, f64>;

/// Fatal resources that were driven below zero before a clamp.
pub type FailureSet = SmallVec<[Resource; 4]>;

/// The six live quantities of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    #[serde(rename = "O2")]
    pub oxygen: f64,
    #[serde(rename = "H2O")]
    pub water: f64,
    #[serde(rename = "Food")]
    pub food: f64,
    #[serde(rename = "Power")]
    pub power: f64,
    #[serde(rename = "Health")]
    pub health: f64,
    #[serde(rename = "Morale")]
    pub morale: f64,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self {
            oxygen: 0.0,
            water: 0.0,
            food: 0.0,
            power: 0.0,
            health: VITAL_MAX,
            morale: VITAL_MAX,
        }
    }
}

impl ResourceLedger {
    #[must_use]
    pub const fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Oxygen => self.oxygen,
            Resource::Water => self.water,
            Resource::Food => self.food,
            Resource::Power => self.power,
            Resource::Health => self.health,
            Resource::Morale => self.morale,
        }
    }

    pub const fn slot_mut(&mut self, resource: Resource) -> &mut f64 {
        match resource {
            Resource::Oxygen => &mut self.oxygen,
            Resource::Water => &mut self.water,
            Resource::Food => &mut self.food,
            Resource::Power => &mut self.power,
            Resource::Health => &mut self.health,
            Resource::Morale => &mut self.morale,
        }
    }

    /// Add one delta and round the result to two decimals.
    pub fn apply(&mut self, resource: Resource, delta: f64) {
        let slot = self.slot_mut(resource);
        *slot = round_to_places(*slot + delta, STOCK_DECIMALS);
    }

    /// Add every delta present, rounding each touched resource to two decimals.
    ///
    /// Resources absent from `changes` are left bit-for-bit untouched.
    pub fn apply_changes(&mut self, changes: &ResourceDelta) {
        for (&resource, &delta) in changes {
            self.apply(resource, delta);
        }
    }

    /// Floor every quantity at zero (vitals are also capped at 100) and report
    /// fatal resources that were negative before flooring.
    pub fn clamp_and_check(&mut self) -> FailureSet {
        let mut failures = FailureSet::new();
        for resource in Resource::ALL {
            let slot = self.slot_mut(resource);
            if *slot < STOCK_FLOOR {
                *slot = STOCK_FLOOR;
                if resource.is_fatal() {
                    failures.push(resource);
                }
            }
            if resource.is_vital() {
                *slot = slot.clamp(VITAL_MIN, VITAL_MAX);
            }
        }
        failures
    }

    /// Sum of the four depletable stocks.
    #[must_use]
    pub fn aggregate(&self) -> f64 {
        self.oxygen + self.water + self.food + self.power
    }

    #[must_use]
    pub const fn stocks(&self) -> StockSnapshot {
        StockSnapshot {
            oxygen: self.oxygen,
            water: self.water,
            food: self.food,
            power: self.power,
        }
    }

    /// First fatal resource that is exhausted, checked in `Resource::FATAL` order.
    #[must_use]
    pub fn exhausted_fatal(&self) -> Option<Resource> {
        Resource::FATAL
            .into_iter()
            .find(|&resource| self.get(resource) <= 0.0)
    }
}

/// Copy of the four depletable stocks, taken right after run initialization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StockSnapshot {
    #[serde(rename = "O2")]
    pub oxygen: f64,
    #[serde(rename = "H2O")]
    pub water: f64,
    #[serde(rename = "Food")]
    pub food: f64,
    #[serde(rename = "Power")]
    pub power: f64,
}

/// Stocks captured before the first tick; the baseline for efficiency scoring.
pub type InitialSnapshot = StockSnapshot;

impl StockSnapshot {
    #[must_use]
    pub fn aggregate(&self) -> f64 {
        self.oxygen + self.water + self.food + self.power
    }
}

/// Append-only per-day power production and consumption.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerLog {
    #[serde(rename = "dailyPowerProduced")]
    pub produced: Vec<f64>,
    #[serde(rename = "dailyPowerConsumed")]
    pub consumed: Vec<f64>,
}

impl PowerLog {
    pub fn record(&mut self, produced: f64, consumed: f64) {
        self.produced.push(produced);
        self.consumed.push(consumed);
    }

    /// Cumulative produced minus cumulative consumed over every logged day.
    #[must_use]
    pub fn balance(&self) -> f64 {
        self.produced.iter().sum::<f64>() - self.consumed.iter().sum::<f64>()
    }

    #[must_use]
    pub fn days_logged(&self) -> usize {
        self.produced.len()
    }
}
