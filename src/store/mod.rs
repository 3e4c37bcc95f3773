use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Appointment, NewAppointment, Patient, Slot, UpdateAppointmentRequest, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot {time} on {date} is already scheduled")]
    SlotTaken { date: NaiveDate, time: Slot },
    #[error("appointment {0} not found")]
    NotFound(Uuid),
    #[error("appointment {0} is canceled and cannot be scheduled again")]
    Revival(Uuid),
    #[error("row decode error: {0}")]
    Corrupt(String),
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An appointment as it was when the write locked it, and as it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub before: Appointment,
    pub after: Appointment,
}

impl Revision {
    pub fn moved(&self) -> bool {
        self.before.date != self.after.date || self.before.time != self.after.time
    }

    pub fn changed_slot(&self) -> bool {
        self.moved() || self.before.psychologist_id != self.after.psychologist_id
    }
}

/// Persistence for users, patients, sessions and appointments.
///
/// `insert_scheduled` and `update_appointment` with `reject_conflicts` must
/// check and write atomically: two callers racing for the same
/// (practitioner, date, slot) cannot both succeed. Writes to an existing
/// appointment read the current row under the same lock they write with, so
/// no caller writes back a stale copy.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// User owning a live session whose token hashes to `token_hash`.
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<User>, StoreError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError>;

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError>;

    async fn find_appointment(&self, appointment_id: Uuid)
    -> Result<Option<Appointment>, StoreError>;

    async fn list_for_practitioner(
        &self,
        psychologist_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    /// Claims the slot and inserts a SCHEDULED appointment, or fails with
    /// `StoreError::SlotTaken`.
    async fn insert_scheduled(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    /// Applies the fields present in `changes` to the current row.
    ///
    /// Fails with `Revival` if the row is canceled and `changes` sets it
    /// SCHEDULED. With `reject_conflicts`, a SCHEDULED appointment whose
    /// slot changes must not land on a slot held by another one.
    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        changes: &UpdateAppointmentRequest,
        reject_conflicts: bool,
    ) -> Result<Revision, StoreError>;

    /// Flips the status to CANCELED, leaving every other field as stored.
    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, StoreError>;

    /// Slots held by SCHEDULED appointments of one practitioner on one day.
    async fn occupied_slots(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, StoreError>;
}
