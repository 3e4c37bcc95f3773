use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::policy::{Mutation, SchedulingPolicy};
use crate::models::{
    Appointment, CreateAppointmentRequest, Slot, UpdateAppointmentRequest, User, free_slots,
};
use crate::notify::{Notice, Notifier, NotifyError, Recipient};
use crate::store::{AppointmentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("appointment {0} not found")]
    NotFound(Uuid),
    #[error("slot {time} on {date} is not available")]
    SlotNotAvailable { date: NaiveDate, time: Slot },
    #[error("not allowed to {0:?} this appointment")]
    Forbidden(Mutation),
    #[error("a canceled appointment cannot be scheduled again")]
    Revival,
    #[error(transparent)]
    Store(StoreError),
    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken { date, time } => BookingError::SlotNotAvailable { date, time },
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::Revival(_) => BookingError::Revival,
            other => BookingError::Store(other),
        }
    }
}

/// Why a notification was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PatientUnresolved,
    PractitionerUnresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    /// The mutation did not call for one (e.g. an update that kept date and time).
    NotRequired,
    Skipped(SkipReason),
}

/// Result of a state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutated {
    pub appointment: Appointment,
    pub notification: NotificationOutcome,
}

pub struct BookingService<'a> {
    store: &'a dyn AppointmentStore,
    notifier: &'a dyn Notifier,
    policy: &'a SchedulingPolicy,
}

impl<'a> BookingService<'a> {
    pub fn new(
        store: &'a dyn AppointmentStore,
        notifier: &'a dyn Notifier,
        policy: &'a SchedulingPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Practitioners see their own calendar; anyone else sees the
    /// appointments of the patient record sharing their email, if any.
    pub async fn list(&self, actor: &User) -> Result<Vec<Appointment>, BookingError> {
        if actor.is_practitioner() {
            return Ok(self.store.list_for_practitioner(actor.id).await?);
        }

        let Some(patient) = self.store.find_patient_by_email(&actor.email).await? else {
            debug!(user_id = %actor.id, "no patient record for user; empty listing");
            return Ok(Vec::new());
        };
        Ok(self.store.list_for_patient(patient.id).await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        req: CreateAppointmentRequest,
    ) -> Result<Mutated, BookingError> {
        let appointment = match self.store.insert_scheduled(req.into()).await {
            Ok(a) => a,
            Err(StoreError::SlotTaken { date, time }) => {
                info!(%date, %time, by = %actor.id, "slot already taken");
                return Err(BookingError::SlotNotAvailable { date, time });
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            appointment_id = %appointment.id,
            psychologist_id = %appointment.psychologist_id,
            by = %actor.id,
            "appointment scheduled"
        );

        let notification = match self.store.find_patient(appointment.patient_id).await? {
            Some(patient) => {
                let notice = Notice::Booked {
                    recipient: Recipient {
                        email: patient.email,
                        name: patient.name,
                    },
                    date: appointment.date,
                    time: appointment.time,
                };
                self.send(&appointment, notice).await?
            }
            None => skipped(&appointment, SkipReason::PatientUnresolved),
        };

        Ok(Mutated {
            appointment,
            notification,
        })
    }

    pub async fn update(
        &self,
        actor: &User,
        appointment_id: Uuid,
        changes: &UpdateAppointmentRequest,
    ) -> Result<Mutated, BookingError> {
        let current = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))?;

        self.policy.authorize(actor, &current, Mutation::Update)?;

        // The store re-reads the row under its write lock and patches that.
        let revision = self
            .store
            .update_appointment(appointment_id, changes, self.policy.rejects_reschedule_conflicts())
            .await?;
        let moved = revision.moved();
        let appointment = revision.after;
        debug!(appointment_id = %appointment.id, by = %actor.id, moved, "appointment updated");

        let notification = if !moved {
            NotificationOutcome::NotRequired
        } else {
            match self.store.find_patient(appointment.patient_id).await? {
                Some(patient) => {
                    let notice = Notice::Rescheduled {
                        recipient: Recipient {
                            email: patient.email,
                            name: patient.name,
                        },
                        date: appointment.date,
                        time: appointment.time,
                    };
                    self.send(&appointment, notice).await?
                }
                None => skipped(&appointment, SkipReason::PatientUnresolved),
            }
        };

        Ok(Mutated {
            appointment,
            notification,
        })
    }

    pub async fn cancel(&self, actor: &User, appointment_id: Uuid) -> Result<Mutated, BookingError> {
        let current = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound(appointment_id))?;

        self.policy.authorize(actor, &current, Mutation::Cancel)?;

        let appointment = self.store.cancel_appointment(appointment_id).await?;
        info!(appointment_id = %appointment.id, by = %actor.id, "appointment canceled");

        let patient = self.store.find_patient(appointment.patient_id).await?;
        let practitioner = self.store.find_user(appointment.psychologist_id).await?;

        let notification = match (patient, practitioner) {
            (Some(patient), Some(practitioner)) => {
                let notice = Notice::Canceled {
                    recipient: Recipient {
                        email: patient.email,
                        name: patient.name,
                    },
                    practitioner_name: practitioner.name,
                };
                self.send(&appointment, notice).await?
            }
            (None, _) => skipped(&appointment, SkipReason::PatientUnresolved),
            (Some(_), None) => skipped(&appointment, SkipReason::PractitionerUnresolved),
        };

        Ok(Mutated {
            appointment,
            notification,
        })
    }

    /// Free slots for one practitioner on one day, in day order. The
    /// practitioner is not checked for existence.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
        psychologist_id: Uuid,
    ) -> Result<Vec<Slot>, BookingError> {
        let occupied = self.store.occupied_slots(psychologist_id, date).await?;
        Ok(free_slots(&occupied))
    }

    // The mutation is already committed; a delivery failure is reported, not undone.
    async fn send(
        &self,
        appointment: &Appointment,
        notice: Notice,
    ) -> Result<NotificationOutcome, BookingError> {
        if let Err(e) = self.notifier.deliver(&notice).await {
            error!(
                appointment_id = %appointment.id,
                kind = notice.kind(),
                error = %e,
                "notification delivery failed"
            );
            return Err(e.into());
        }
        Ok(NotificationOutcome::Sent)
    }
}

fn skipped(appointment: &Appointment, reason: SkipReason) -> NotificationOutcome {
    warn!(appointment_id = %appointment.id, ?reason, "notification skipped");
    NotificationOutcome::Skipped(reason)
}
