use std::str::FromStr;

use super::booking::BookingError;
use crate::models::{Appointment, User};

/// Whether a reschedule may land on a slot another SCHEDULED appointment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RescheduleConflictPolicy {
    #[default]
    Allow,
    Reject,
}

impl FromStr for RescheduleConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown reschedule conflict policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Update,
    Cancel,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingPolicy {
    /// Off: any authenticated caller may cancel any appointment.
    pub cancel_requires_ownership: bool,
    pub reschedule_conflicts: RescheduleConflictPolicy,
}

impl SchedulingPolicy {
    /// Ownership rule for mutating operations: a practitioner may only touch
    /// appointments assigned to them. Patients are not restricted.
    pub fn authorize(
        &self,
        actor: &User,
        appointment: &Appointment,
        mutation: Mutation,
    ) -> Result<(), BookingError> {
        if mutation == Mutation::Cancel && !self.cancel_requires_ownership {
            return Ok(());
        }

        if actor.is_practitioner() && appointment.psychologist_id != actor.id {
            return Err(BookingError::Forbidden(mutation));
        }
        Ok(())
    }

    pub fn rejects_reschedule_conflicts(&self) -> bool {
        self.reschedule_conflicts == RescheduleConflictPolicy::Reject
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{AppointmentStatus, Slot, UserKind};

    fn user(kind: UserKind) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Someone".into(),
            email: "someone@example.com".into(),
            kind,
        }
    }

    fn owned_by(psychologist_id: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            psychologist_id,
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            time: Slot::At0900,
            status: AppointmentStatus::Scheduled,
        }
    }

    #[test]
    fn practitioner_can_update_own_but_not_others() {
        let policy = SchedulingPolicy::default();
        let doc = user(UserKind::Practitioner);

        assert!(policy.authorize(&doc, &owned_by(doc.id), Mutation::Update).is_ok());
        assert_matches!(
            policy.authorize(&doc, &owned_by(Uuid::new_v4()), Mutation::Update),
            Err(BookingError::Forbidden(Mutation::Update))
        );
    }

    #[test]
    fn patients_are_not_restricted() {
        let policy = SchedulingPolicy {
            cancel_requires_ownership: true,
            ..Default::default()
        };
        let patient = user(UserKind::Patient);
        let other = owned_by(Uuid::new_v4());

        assert!(policy.authorize(&patient, &other, Mutation::Update).is_ok());
        assert!(policy.authorize(&patient, &other, Mutation::Cancel).is_ok());
    }

    #[test]
    fn cancel_ownership_is_opt_in() {
        let doc = user(UserKind::Practitioner);
        let other = owned_by(Uuid::new_v4());

        let open = SchedulingPolicy::default();
        assert!(open.authorize(&doc, &other, Mutation::Cancel).is_ok());

        let strict = SchedulingPolicy {
            cancel_requires_ownership: true,
            ..Default::default()
        };
        assert_matches!(
            strict.authorize(&doc, &other, Mutation::Cancel),
            Err(BookingError::Forbidden(Mutation::Cancel))
        );
    }

    #[test]
    fn parses_reschedule_policy() {
        assert_eq!("Reject".parse::<RescheduleConflictPolicy>(), Ok(RescheduleConflictPolicy::Reject));
        assert_eq!(" allow ".parse::<RescheduleConflictPolicy>(), Ok(RescheduleConflictPolicy::Allow));
        assert!("maybe".parse::<RescheduleConflictPolicy>().is_err());
    }
}
