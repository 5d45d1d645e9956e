//! Patient conditions and the named catalog they are drawn from.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, TheatreError};

/// Name given to the condition used when only one is configured.
pub const DEFAULT_CONDITION: &str = "DEFAULT";

/// Immutable description of a class of patients.
///
/// Lower priority values are more urgent. The arrival portion is a relative
/// weight renormalised across the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatientCondition {
    /// Urgency when requesting a station (lower is more urgent)
    pub priority: i32,
    /// Relative arrival weight
    pub arrival_portion: f64,
    /// Mean of the mortality divisor draw, zero for no mortality
    pub mortality_rate: f64,
    /// Multipliers for preparation, operation and recovery time
    pub service_multipliers: [f64; 3],
}

impl Default for PatientCondition {
    fn default() -> Self {
        Self {
            priority: 1,
            arrival_portion: 1.0,
            mortality_rate: 0.0,
            service_multipliers: [1.0, 1.0, 1.0],
        }
    }
}

impl fmt::Display for PatientCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [prep, op, rec] = self.service_multipliers;
        write!(
            f,
            "[{}, {}, {}, [{prep}, {op}, {rec}]]",
            self.priority, self.arrival_portion, self.mortality_rate
        )
    }
}

/// Index of a condition inside a [`ConditionCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionId(usize);

impl ConditionId {
    /// Returns position of the condition in catalog order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Validated, ordered set of named patient conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCatalog {
    entries: Vec<(String, PatientCondition)>,
}

impl ConditionCatalog {
    /// Creates catalog from named conditions, validating each entry.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - Catalog empty, portions sum to zero,
    ///   or a condition carries negative or non-finite parameters
    pub fn new(entries: Vec<(String, PatientCondition)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(TheatreError::configuration(
                "at least one patient condition is required",
            ));
        }

        for (name, condition) in &entries {
            if !(condition.arrival_portion.is_finite() && condition.arrival_portion >= 0.0) {
                return Err(TheatreError::configuration(format!(
                    "condition '{name}' has invalid arrival portion {}",
                    condition.arrival_portion
                )));
            }
            if !(condition.mortality_rate.is_finite() && condition.mortality_rate >= 0.0) {
                return Err(TheatreError::configuration(format!(
                    "condition '{name}' has invalid mortality rate {}",
                    condition.mortality_rate
                )));
            }
            if let Some(multiplier) = condition
                .service_multipliers
                .iter()
                .find(|m| !(m.is_finite() && **m >= 0.0))
            {
                return Err(TheatreError::configuration(format!(
                    "condition '{name}' has invalid service multiplier {multiplier}"
                )));
            }
        }

        let total: f64 = entries.iter().map(|(_, c)| c.arrival_portion).sum();
        if total <= 0.0 {
            return Err(TheatreError::configuration(
                "arrival portions of patient conditions sum to zero",
            ));
        }

        Ok(Self { entries })
    }

    /// Creates catalog from a configuration map.
    ///
    /// A single entry keeps its name; it becomes the universal default.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - See [`ConditionCatalog::new`]
    pub fn from_map(conditions: &BTreeMap<String, PatientCondition>) -> Result<Self> {
        Self::new(
            conditions
                .iter()
                .map(|(name, condition)| (name.clone(), *condition))
                .collect(),
        )
    }

    /// Returns the condition every patient receives when only one exists.
    pub fn universal(&self) -> Option<ConditionId> {
        (self.entries.len() == 1).then_some(ConditionId(0))
    }

    /// Returns number of conditions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether catalog is empty (never true for a validated catalog).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up condition by id.
    pub fn get(&self, id: ConditionId) -> Option<&PatientCondition> {
        self.entries.get(id.0).map(|(_, condition)| condition)
    }

    /// Returns name of condition.
    pub fn name(&self, id: ConditionId) -> Option<&str> {
        self.entries.get(id.0).map(|(name, _)| name.as_str())
    }

    /// Iterates conditions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (ConditionId, &str, &PatientCondition)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (name, condition))| (ConditionId(index), name.as_str(), condition))
    }
}

impl Default for ConditionCatalog {
    fn default() -> Self {
        Self {
            entries: vec![(DEFAULT_CONDITION.to_string(), PatientCondition::default())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(priority: i32, portion: f64) -> PatientCondition {
        PatientCondition {
            priority,
            arrival_portion: portion,
            ..PatientCondition::default()
        }
    }

    #[test]
    fn test_single_condition_is_universal() {
        let catalog = ConditionCatalog::default();
        assert_eq!(catalog.universal(), Some(ConditionId(0)));
        assert_eq!(catalog.name(ConditionId(0)), Some(DEFAULT_CONDITION));
    }

    #[test]
    fn test_multiple_conditions_have_no_universal_default() {
        let catalog = ConditionCatalog::new(vec![
            ("mild".to_string(), condition(5, 0.7)),
            ("severe".to_string(), condition(1, 0.3)),
        ])
        .unwrap();

        assert_eq!(catalog.universal(), None);
        assert_eq!(catalog.name(ConditionId(1)), Some("severe"));
        assert_eq!(catalog.get(ConditionId(1)).map(|c| c.priority), Some(1));
    }

    #[test]
    fn test_zero_total_portion_rejected() {
        let result = ConditionCatalog::new(vec![
            ("a".to_string(), condition(1, 0.0)),
            ("b".to_string(), condition(2, 0.0)),
        ]);
        assert!(matches!(result, Err(TheatreError::Configuration { .. })));
    }

    #[test]
    fn test_negative_parameters_rejected() {
        let negative_rate = PatientCondition {
            mortality_rate: -0.5,
            ..PatientCondition::default()
        };
        assert!(ConditionCatalog::new(vec![("x".to_string(), negative_rate)]).is_err());

        let negative_multiplier = PatientCondition {
            service_multipliers: [1.0, -2.0, 1.0],
            ..PatientCondition::default()
        };
        assert!(ConditionCatalog::new(vec![("x".to_string(), negative_multiplier)]).is_err());

        assert!(ConditionCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_display_matches_tuple_notation() {
        assert_eq!(PatientCondition::default().to_string(), "[1, 1, 0, [1, 1, 1]]");
    }
}
