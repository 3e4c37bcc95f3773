use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AppointmentStore, Revision, StoreError};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, Patient, Slot, UpdateAppointmentRequest, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    patients: HashMap<Uuid, Patient>,
    // token hash -> user id
    sessions: HashMap<String, Uuid>,
    appointments: Vec<Appointment>,
}

impl Tables {
    fn slot_holder(&self, candidate: &Appointment) -> Option<&Appointment> {
        self.appointments.iter().find(|a| {
            a.id != candidate.id
                && a.is_scheduled()
                && a.psychologist_id == candidate.psychologist_id
                && a.date == candidate.date
                && a.time == candidate.time
        })
    }
}

/// In-process store. One lock covers every table, so check-then-write
/// sequences are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    pub async fn add_patient(&self, patient: Patient) {
        self.tables.lock().await.patients.insert(patient.id, patient);
    }

    pub async fn add_session(&self, token_hash: impl Into<String>, user_id: Uuid) {
        self.tables
            .lock()
            .await
            .sessions
            .insert(token_hash.into(), user_id);
    }

    pub async fn appointments(&self) -> Vec<Appointment> {
        self.tables.lock().await.appointments.clone()
    }
}

fn sorted(mut rows: Vec<Appointment>) -> Vec<Appointment> {
    rows.sort_by_key(|a| (a.date, a.time));
    rows
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(token_hash)
            .and_then(|user_id| tables.users.get(user_id))
            .cloned())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        Ok(self.tables.lock().await.patients.get(&patient_id).cloned())
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .patients
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn find_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned())
    }

    async fn list_for_practitioner(
        &self,
        psychologist_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(sorted(
            tables
                .appointments
                .iter()
                .filter(|a| a.psychologist_id == psychologist_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(sorted(
            tables
                .appointments
                .iter()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }

    async fn insert_scheduled(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.lock().await;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            psychologist_id: new.psychologist_id,
            date: new.date,
            time: new.time,
            status: AppointmentStatus::Scheduled,
        };

        if tables.slot_holder(&appointment).is_some() {
            return Err(StoreError::SlotTaken {
                date: appointment.date,
                time: appointment.time,
            });
        }

        tables.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        changes: &UpdateAppointmentRequest,
        reject_conflicts: bool,
    ) -> Result<Revision, StoreError> {
        let mut tables = self.tables.lock().await;

        let before = tables
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned()
            .ok_or(StoreError::NotFound(appointment_id))?;
        if changes.revives(&before) {
            return Err(StoreError::Revival(appointment_id));
        }

        let mut after = before.clone();
        changes.apply_to(&mut after);
        let revision = Revision { before, after };

        if reject_conflicts
            && revision.changed_slot()
            && revision.after.is_scheduled()
            && tables.slot_holder(&revision.after).is_some()
        {
            return Err(StoreError::SlotTaken {
                date: revision.after.date,
                time: revision.after.time,
            });
        }

        if let Some(row) = tables.appointments.iter_mut().find(|a| a.id == appointment_id) {
            *row = revision.after.clone();
        }
        Ok(revision)
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or(StoreError::NotFound(appointment_id))?;
        row.status = AppointmentStatus::Canceled;
        Ok(row.clone())
    }

    async fn occupied_slots(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .appointments
            .iter()
            .filter(|a| a.is_scheduled() && a.psychologist_id == psychologist_id && a.date == date)
            .map(|a| a.time)
            .collect())
    }
}
