use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify::Notifier;
use crate::services::policy::SchedulingPolicy;
use crate::store::AppointmentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AppointmentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub policy: SchedulingPolicy,
}

/* -------------------------
   Slots
--------------------------*/

/// Daily time labels that can be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "09:00")]
    At0900,
    #[serde(rename = "10:00")]
    At1000,
    #[serde(rename = "11:00")]
    At1100,
    #[serde(rename = "14:00")]
    At1400,
    #[serde(rename = "15:00")]
    At1500,
    #[serde(rename = "16:00")]
    At1600,
    #[serde(rename = "17:00")]
    At1700,
}

impl Slot {
    /// Every bookable slot, in day order.
    pub const ALL: [Slot; 7] = [
        Slot::At0900,
        Slot::At1000,
        Slot::At1100,
        Slot::At1400,
        Slot::At1500,
        Slot::At1600,
        Slot::At1700,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::At0900 => "09:00",
            Slot::At1000 => "10:00",
            Slot::At1100 => "11:00",
            Slot::At1400 => "14:00",
            Slot::At1500 => "15:00",
            Slot::At1600 => "16:00",
            Slot::At1700 => "17:00",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown slot label: {0:?}")]
pub struct UnknownSlot(pub String);

impl FromStr for Slot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s.trim())
            .ok_or_else(|| UnknownSlot(s.to_string()))
    }
}

/// Slots not present in `occupied`, keeping day order.
pub fn free_slots(occupied: &[Slot]) -> Vec<Slot> {
    Slot::ALL
        .into_iter()
        .filter(|slot| !occupied.contains(slot))
        .collect()
}

/* -------------------------
   Entities
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Canceled = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
pub enum UserKind {
    Patient = 0,
    Practitioner = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub time: Slot,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn is_scheduled(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }
}

/// Fields needed to insert a fresh appointment; status is always SCHEDULED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub time: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub kind: UserKind,
}

impl User {
    pub fn is_practitioner(&self) -> bool {
        self.kind == UserKind::Practitioner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub date: NaiveDate,
    pub time: Slot,
}

impl From<CreateAppointmentRequest> for NewAppointment {
    fn from(req: CreateAppointmentRequest) -> Self {
        NewAppointment {
            patient_id: req.patient_id,
            psychologist_id: req.psychologist_id,
            date: req.date,
            time: req.time,
        }
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub psychologist_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time: Option<Slot>,
    pub status: Option<AppointmentStatus>,
}

impl UpdateAppointmentRequest {
    /// True when applying this patch would move a canceled appointment back
    /// to SCHEDULED.
    pub fn revives(&self, current: &Appointment) -> bool {
        current.status == AppointmentStatus::Canceled
            && self.status == Some(AppointmentStatus::Scheduled)
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(patient_id) = self.patient_id {
            appointment.patient_id = patient_id;
        }
        if let Some(psychologist_id) = self.psychologist_id {
            appointment.psychologist_id = psychologist_id;
        }
        if let Some(date) = self.date {
            appointment.date = date;
        }
        if let Some(time) = self.time {
            appointment.time = time;
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub psychologist_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            psychologist_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: Slot::At1000,
            status: AppointmentStatus::Scheduled,
        }
    }

    #[test]
    fn free_slots_on_empty_day_is_the_full_list() {
        let labels: Vec<&str> = free_slots(&[]).into_iter().map(Slot::as_str).collect();
        assert_eq!(
            labels,
            ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00", "17:00"]
        );
    }

    #[test]
    fn free_slots_keeps_day_order() {
        let free = free_slots(&[Slot::At1500, Slot::At1000]);
        assert_eq!(
            free,
            vec![Slot::At0900, Slot::At1100, Slot::At1400, Slot::At1600, Slot::At1700]
        );
    }

    #[test]
    fn slot_labels_parse_and_serialize() {
        assert_eq!("14:00".parse::<Slot>().unwrap(), Slot::At1400);
        assert!("12:00".parse::<Slot>().is_err());
        assert_eq!(serde_json::to_string(&Slot::At0900).unwrap(), "\"09:00\"");
        let parsed: Slot = serde_json::from_str("\"17:00\"").unwrap();
        assert_eq!(parsed, Slot::At1700);
    }

    #[test]
    fn appointment_json_shape() {
        let a = appointment();
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["date"], "2025-03-10");
        assert_eq!(v["time"], "10:00");
        assert_eq!(v["status"], "SCHEDULED");
    }

    #[test]
    fn partial_update_only_touches_present_fields() {
        let mut a = appointment();
        let before = a.clone();
        let req: UpdateAppointmentRequest =
            serde_json::from_str(r#"{"date":"2025-03-12"}"#).unwrap();
        req.apply_to(&mut a);

        assert_eq!(a.date, NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(a.time, before.time);
        assert_eq!(a.status, before.status);
        assert_eq!(a.psychologist_id, before.psychologist_id);
    }

    #[test]
    fn only_an_explicit_scheduled_status_revives() {
        let mut canceled = appointment();
        canceled.status = AppointmentStatus::Canceled;

        let revive = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Scheduled),
            ..Default::default()
        };
        let move_only = UpdateAppointmentRequest {
            time: Some(Slot::At1400),
            ..Default::default()
        };
        assert!(revive.revives(&canceled));
        assert!(!move_only.revives(&canceled));
        assert!(!revive.revives(&appointment()));
    }
}
