//! Patient records and their timestamped phase history.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use theatre_core::ConditionId;
use thiserror::Error;

use crate::deterministic::VirtualTime;

/// Status of a patient inside the facility.
///
/// Declaration order is the order of the linear chain; `Deceased` branches
/// off `InPreparation` and `InOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Waiting,
    InPreparation,
    Prepared,
    InOperation,
    Operated,
    InRecovery,
    Recovered,
    Deceased,
}

impl Phase {
    /// Every phase in chain order.
    pub const ALL: [Phase; 8] = [
        Phase::Waiting,
        Phase::InPreparation,
        Phase::Prepared,
        Phase::InOperation,
        Phase::Operated,
        Phase::InRecovery,
        Phase::Recovered,
        Phase::Deceased,
    ];

    /// Returns whether no transition leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Recovered | Phase::Deceased)
    }

    /// Returns whether `next` may directly follow this phase.
    pub fn allows(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Waiting, Phase::InPreparation)
                | (Phase::InPreparation, Phase::Prepared)
                | (Phase::InPreparation, Phase::Deceased)
                | (Phase::Prepared, Phase::InOperation)
                | (Phase::InOperation, Phase::Operated)
                | (Phase::InOperation, Phase::Deceased)
                | (Phase::Operated, Phase::InRecovery)
                | (Phase::InRecovery, Phase::Recovered)
        )
    }

    /// Returns lowercase name for log messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::InPreparation => "in preparation",
            Phase::Prepared => "prepared",
            Phase::InOperation => "in operation",
            Phase::Operated => "operated",
            Phase::InRecovery => "in recovery",
            Phase::Recovered => "recovered",
            Phase::Deceased => "deceased",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique patient number, assigned in arrival order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patient-{}", self.0)
    }
}

/// Service durations in hours, drawn once when the patient arrives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceTimes {
    pub preparation: f64,
    pub operation: f64,
    pub recovery: f64,
}

impl ServiceTimes {
    /// Time to live for a mortality divisor draw.
    ///
    /// The budget is the untreated preparation and operation time divided by
    /// the draw; a zero or unusable divisor means the patient cannot die.
    pub fn time_to_live(&self, divisor: f64) -> f64 {
        if divisor > 0.0 && divisor.is_finite() {
            (self.preparation + self.operation) / divisor
        } else {
            f64::INFINITY
        }
    }
}

/// Errors raised by an invalid phase transition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhaseError {
    #[error("{patient} cannot move from {from} to {to}")]
    InvalidTransition {
        patient: PatientId,
        from: Phase,
        to: Phase,
    },

    #[error("{patient} cannot enter {phase} at {at}, previous transition was at {previous}")]
    TimeRegression {
        patient: PatientId,
        phase: Phase,
        at: VirtualTime,
        previous: VirtualTime,
    },
}

/// One patient: identity, condition, service times and phase history.
///
/// The history only grows along valid transitions and ends in at most one
/// terminal phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    id: PatientId,
    condition: ConditionId,
    priority: i32,
    service_times: ServiceTimes,
    mortality_deadline: f64,
    timestamps: BTreeMap<Phase, VirtualTime>,
    current: Phase,
    last_change: VirtualTime,
}

impl PatientRecord {
    /// Creates a patient waiting since `arrival`.
    pub fn new(
        id: PatientId,
        condition: ConditionId,
        priority: i32,
        service_times: ServiceTimes,
        mortality_deadline: f64,
        arrival: VirtualTime,
    ) -> Self {
        Self {
            id,
            condition,
            priority,
            service_times,
            mortality_deadline,
            timestamps: BTreeMap::from([(Phase::Waiting, arrival)]),
            current: Phase::Waiting,
            last_change: arrival,
        }
    }

    pub fn id(&self) -> PatientId {
        self.id
    }

    pub fn condition(&self) -> ConditionId {
        self.condition
    }

    /// Returns urgency used for every station request.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn service_times(&self) -> &ServiceTimes {
        &self.service_times
    }

    /// Returns time to live measured from arrival, `+inf` for immortal patients.
    pub fn mortality_deadline(&self) -> f64 {
        self.mortality_deadline
    }

    /// Returns current phase.
    pub fn phase(&self) -> Phase {
        self.current
    }

    /// Returns time the patient started waiting.
    pub fn arrival(&self) -> VirtualTime {
        self.timestamps
            .get(&Phase::Waiting)
            .copied()
            .unwrap_or(self.last_change)
    }

    /// Returns whether the patient recovered or died.
    pub fn is_finished(&self) -> bool {
        self.current.is_terminal()
    }

    /// Returns time the patient entered `phase`, if it did.
    pub fn timestamp(&self, phase: Phase) -> Option<VirtualTime> {
        self.timestamps.get(&phase).copied()
    }

    /// Returns hours between entering `from` and entering `to`.
    pub fn elapsed_between(&self, from: Phase, to: Phase) -> Option<f64> {
        Some(self.timestamp(to)?.since(self.timestamp(from)?))
    }

    /// Iterates entered phases in chain order.
    pub fn history(&self) -> impl Iterator<Item = (Phase, VirtualTime)> + '_ {
        self.timestamps.iter().map(|(phase, at)| (*phase, *at))
    }

    /// Returns remaining time to live at `now`.
    pub fn time_to_live(&self, now: VirtualTime) -> f64 {
        self.mortality_deadline - now.since(self.arrival())
    }

    /// Records entry into `phase` at `at`.
    ///
    /// # Errors
    ///
    /// - `PhaseError::InvalidTransition` - `phase` does not follow the current phase
    /// - `PhaseError::TimeRegression` - `at` lies before the previous transition
    pub fn enter(&mut self, phase: Phase, at: VirtualTime) -> Result<(), PhaseError> {
        if !self.current.allows(phase) {
            return Err(PhaseError::InvalidTransition {
                patient: self.id,
                from: self.current,
                to: phase,
            });
        }
        if at < self.last_change {
            return Err(PhaseError::TimeRegression {
                patient: self.id,
                phase,
                at,
                previous: self.last_change,
            });
        }

        self.timestamps.insert(phase, at);
        self.current = phase;
        self.last_change = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use theatre_core::ConditionCatalog;

    use super::*;

    fn hours(value: f64) -> VirtualTime {
        VirtualTime::from_hours(value)
    }

    fn patient(deadline: f64) -> PatientRecord {
        let condition = ConditionCatalog::default()
            .universal()
            .expect("default catalog has one condition");
        let times = ServiceTimes {
            preparation: 5.0,
            operation: 3.0,
            recovery: 10.0,
        };
        PatientRecord::new(PatientId(7), condition, 1, times, deadline, hours(2.0))
    }

    #[test]
    fn test_full_recovery_chain() {
        let mut record = patient(f64::INFINITY);
        let chain = [
            (Phase::InPreparation, 2.0),
            (Phase::Prepared, 7.0),
            (Phase::InOperation, 9.0),
            (Phase::Operated, 12.0),
            (Phase::InRecovery, 12.0),
            (Phase::Recovered, 22.0),
        ];
        for (phase, at) in chain {
            record.enter(phase, hours(at)).unwrap();
        }

        assert!(record.is_finished());
        assert_eq!(record.elapsed_between(Phase::Waiting, Phase::Prepared), Some(5.0));
        assert_eq!(record.elapsed_between(Phase::Waiting, Phase::Recovered), Some(20.0));
        assert_eq!(record.history().count(), 7);
        assert_eq!(record.timestamp(Phase::Deceased), None);
    }

    #[test]
    fn test_nothing_follows_a_terminal_phase() {
        let mut record = patient(1.0);
        record.enter(Phase::InPreparation, hours(2.0)).unwrap();
        record.enter(Phase::Deceased, hours(3.0)).unwrap();

        for phase in Phase::ALL {
            assert!(record.enter(phase, hours(4.0)).is_err());
        }
        assert_eq!(record.phase(), Phase::Deceased);
    }

    #[test]
    fn test_skipping_a_phase_rejected() {
        let mut record = patient(f64::INFINITY);
        let result = record.enter(Phase::InOperation, hours(3.0));

        assert_eq!(
            result,
            Err(PhaseError::InvalidTransition {
                patient: PatientId(7),
                from: Phase::Waiting,
                to: Phase::InOperation,
            })
        );
        assert_eq!(record.phase(), Phase::Waiting);
    }

    #[test]
    fn test_time_cannot_run_backwards() {
        let mut record = patient(f64::INFINITY);
        let result = record.enter(Phase::InPreparation, hours(1.0));

        assert!(matches!(result, Err(PhaseError::TimeRegression { .. })));
        assert_eq!(record.timestamp(Phase::InPreparation), None);
    }

    #[test]
    fn test_death_only_from_service_phases() {
        let dying_from: Vec<Phase> = Phase::ALL
            .into_iter()
            .filter(|phase| phase.allows(Phase::Deceased))
            .collect();
        assert_eq!(dying_from, vec![Phase::InPreparation, Phase::InOperation]);
    }

    #[test]
    fn test_time_to_live_counts_from_arrival() {
        let record = patient(10.0);
        assert_eq!(record.time_to_live(hours(2.0)), 10.0);
        assert_eq!(record.time_to_live(hours(9.0)), 3.0);
        assert!(patient(f64::INFINITY).time_to_live(hours(1e6)).is_infinite());
    }

    #[test]
    fn test_mortality_divisor() {
        let times = ServiceTimes {
            preparation: 5.0,
            operation: 3.0,
            recovery: 1.0,
        };
        assert_eq!(times.time_to_live(4.0), 2.0);
        assert!(times.time_to_live(0.0).is_infinite());
        assert!(times.time_to_live(f64::NAN).is_infinite());
    }
}
