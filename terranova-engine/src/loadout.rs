//! Pre-launch loadout costing and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::CREW_CAPACITY_KEY;
use crate::data::{CrewCostRules, Design};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadoutError {
    #[error("a loadout needs at least one crew member")]
    EmptyCrew,
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("required module {0} is not installed")]
    MissingRequired(String),
    #[error("crew of {crew} exceeds habitat capacity of {capacity}")]
    OverCapacity { crew: u32, capacity: u32 },
    #[error("loadout costs {total} points, budget is {budget}")]
    OverBudget { total: u32, budget: u32 },
}

/// Itemised point cost of a loadout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadoutCost {
    pub crew_points: u32,
    pub module_points: u32,
    pub total: u32,
    pub budget: u32,
}

impl LoadoutCost {
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.total)
    }
}

/// Points for `crew` members: the first few at the base rate, the rest at the
/// extra rate.
#[must_use]
pub fn crew_cost(rules: &CrewCostRules, crew: u32) -> u32 {
    let base = crew.min(rules.base_members);
    let extra = crew.saturating_sub(rules.base_members);
    base.saturating_mul(rules.per_base_member)
        .saturating_add(extra.saturating_mul(rules.per_extra_member))
}

/// Check a crew and module selection against the catalog.
///
/// # Errors
///
/// Returns the first rule the loadout breaks, checked in the order: crew
/// size, unknown modules, required modules, habitat capacity, budget.
pub fn validate_loadout(
    design: &Design,
    crew: u32,
    modules: &[String],
) -> Result<LoadoutCost, LoadoutError> {
    if crew == 0 {
        return Err(LoadoutError::EmptyCrew);
    }

    let mut module_points = 0_u32;
    let mut capacity = 0_u32;
    for id in modules {
        let module = design
            .find_component_by_id(id)
            .ok_or_else(|| LoadoutError::UnknownModule(id.clone()))?;
        module_points = module_points.saturating_add(module.cost);
        capacity = capacity.saturating_add(module.capacity_for(CREW_CAPACITY_KEY));
    }

    if let Some(missing) = design
        .rules
        .protected_modules
        .iter()
        .find(|required| !modules.contains(required))
    {
        return Err(LoadoutError::MissingRequired(missing.clone()));
    }

    if crew > capacity {
        return Err(LoadoutError::OverCapacity { crew, capacity });
    }

    let crew_points = crew_cost(&design.rules.crew_cost, crew);
    let total = crew_points.saturating_add(module_points);
    let budget = design.game.points_budget;
    if total > budget {
        return Err(LoadoutError::OverBudget { total, budget });
    }

    Ok(LoadoutCost {
        crew_points,
        module_points,
        total,
        budget,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> Design {
        Design::load_from_static().unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn crew_cost_steps_up_after_base_members() {
        let rules = CrewCostRules::default();
        assert_eq!(crew_cost(&rules, 1), 4);
        assert_eq!(crew_cost(&rules, 3), 12);
        assert_eq!(crew_cost(&rules, 4), 18);
        assert_eq!(crew_cost(&rules, 5), 24);
    }

    #[test]
    fn itemises_a_valid_loadout() {
        let cost = validate_loadout(
            &design(),
            3,
            &ids(&["hab_dome", "battery", "solar_array", "lss_bio"]),
        )
        .unwrap();
        assert_eq!(cost.crew_points, 12);
        assert_eq!(cost.module_points, 20 + 6 + 8 + 15);
        assert_eq!(cost.total, 61);
        assert_eq!(cost.remaining(), 39);
    }

    #[test]
    fn rejects_broken_loadouts() {
        let design = design();
        assert_eq!(
            validate_loadout(&design, 0, &ids(&["hab_dome"])),
            Err(LoadoutError::EmptyCrew)
        );
        assert_eq!(
            validate_loadout(&design, 3, &ids(&["hab_dome", "warp_core"])),
            Err(LoadoutError::UnknownModule("warp_core".to_string()))
        );
        assert_eq!(
            validate_loadout(&design, 3, &ids(&["battery"])),
            Err(LoadoutError::MissingRequired("hab_dome".to_string()))
        );
        assert_eq!(
            validate_loadout(&design, 5, &ids(&["hab_dome"])),
            Err(LoadoutError::OverCapacity {
                crew: 5,
                capacity: 4
            })
        );
        assert_eq!(
            validate_loadout(
                &design,
                4,
                &ids(&["hab_dome", "n_gen", "lss_bio", "agri_pod", "shield_reg", "medbay"])
            ),
            Err(LoadoutError::OverBudget {
                total: 18 + 20 + 22 + 15 + 12 + 12 + 10,
                budget: 100
            })
        );
    }
}
