use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::{Escalations, IncidentType};
use crate::error::{AppError, INVALID_TIMESTAMP};
use crate::normalize::timestamps::wire;

fn checkpoint(created_at: OffsetDateTime, step: Duration) -> Result<OffsetDateTime, AppError> {
    created_at.checked_add(step).ok_or_else(|| {
        AppError::new(
            INVALID_TIMESTAMP,
            "Escalation checkpoint is outside the representable date range",
        )
        .with_details(format!("created_at={created_at}; step={step}"))
    })
}

/// Escalation checkpoints for an incident: `created_at + h`, `+ 2h`, `+ 3h`.
///
/// `h` is 4 hours for BACKBONE and PRIMARY and 12 hours for GPON. POP has no policy and gets
/// no checkpoints. Never reads the clock.
pub fn compute_escalations(
    incident_type: IncidentType,
    created_at: OffsetDateTime,
) -> Result<Escalations, AppError> {
    let Some(interval) = incident_type.escalation_interval() else {
        return Ok(Escalations::NONE);
    };

    Ok(Escalations {
        first: Some(checkpoint(created_at, interval)?),
        second: Some(checkpoint(created_at, interval * 2)?),
        third: Some(checkpoint(created_at, interval * 3)?),
    })
}

/// Where a card stands relative to its checkpoints at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EscalationStatus {
    /// The type has no escalation policy.
    NoPolicy,
    /// `reached` checkpoints are behind us; the next one is `next_level`, due at `due_at`.
    Pending {
        reached: u8,
        next_level: u8,
        #[serde(with = "wire")]
        due_at: OffsetDateTime,
    },
    /// All three checkpoints have passed.
    Exhausted,
}

impl EscalationStatus {
    pub fn reached(&self) -> u8 {
        match self {
            EscalationStatus::NoPolicy => 0,
            EscalationStatus::Pending { reached, .. } => *reached,
            EscalationStatus::Exhausted => 3,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.reached() > 0
    }
}

/// Classify escalations at `now`. A checkpoint is reached once `now >= checkpoint`.
pub fn escalation_status(escalations: &Escalations, now: OffsetDateTime) -> EscalationStatus {
    if escalations.is_none() {
        return EscalationStatus::NoPolicy;
    }

    let mut reached = 0u8;
    for (idx, at) in escalations.as_array().iter().enumerate() {
        match at {
            Some(at) if now >= *at => reached = idx as u8 + 1,
            Some(at) => {
                return EscalationStatus::Pending {
                    reached,
                    next_level: idx as u8 + 1,
                    due_at: *at,
                }
            }
            None => {}
        }
    }
    EscalationStatus::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn pop_has_no_policy() {
        let esc = compute_escalations(IncidentType::Pop, datetime!(2024-01-01 0:00 UTC)).unwrap();
        assert_eq!(esc, Escalations::NONE);
        assert_eq!(
            escalation_status(&esc, datetime!(2030-01-01 0:00 UTC)),
            EscalationStatus::NoPolicy
        );
    }

    #[test]
    fn status_walks_through_levels() {
        let created = datetime!(2024-01-01 0:00 UTC);
        let esc = compute_escalations(IncidentType::Backbone, created).unwrap();

        assert_eq!(
            escalation_status(&esc, created),
            EscalationStatus::Pending {
                reached: 0,
                next_level: 1,
                due_at: datetime!(2024-01-01 4:00 UTC),
            }
        );
        let at_first = escalation_status(&esc, datetime!(2024-01-01 4:00 UTC));
        assert_eq!(at_first.reached(), 1);
        assert!(at_first.is_overdue());
        assert_eq!(
            escalation_status(&esc, datetime!(2024-01-01 12:00 UTC)),
            EscalationStatus::Exhausted
        );
    }

    #[test]
    fn overflow_fails_closed() {
        let last_day =
            time::PrimitiveDateTime::new(time::Date::MAX, time::Time::MIDNIGHT).assume_utc();
        let err = compute_escalations(IncidentType::Gpon, last_day).unwrap_err();
        assert_eq!(err.code, INVALID_TIMESTAMP);
    }
}
