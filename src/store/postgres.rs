use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{AppointmentStore, Revision, StoreError};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, Patient, Slot, UpdateAppointmentRequest, User,
};

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    patient_id: Uuid,
    psychologist_id: Uuid,
    appointment_date: NaiveDate,
    slot_time: String,
    status: AppointmentStatus,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let time: Slot = row
            .slot_time
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("appointment {}: {e}", row.appointment_id)))?;

        Ok(Appointment {
            id: row.appointment_id,
            patient_id: row.patient_id,
            psychologist_id: row.psychologist_id,
            date: row.appointment_date,
            time,
            status: row.status,
        })
    }
}

fn into_appointments(rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, StoreError> {
    rows.into_iter().map(Appointment::try_from).collect()
}

const APPOINTMENT_COLUMNS: &str =
    "appointment_id, patient_id, psychologist_id, appointment_date, slot_time, status";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Serializes writers of one (practitioner, date, slot) until the
/// transaction ends.
async fn lock_slot(
    tx: &mut Transaction<'_, Postgres>,
    psychologist_id: Uuid,
    date: NaiveDate,
    time: Slot,
) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("{psychologist_id}/{date}/{time}"))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn slot_holder(
    tx: &mut Transaction<'_, Postgres>,
    psychologist_id: Uuid,
    date: NaiveDate,
    time: Slot,
    exclude: Option<Uuid>,
) -> Result<Option<Uuid>, StoreError> {
    let holder: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT appointment_id
        FROM appointment
        WHERE psychologist_id = $1
          AND appointment_date = $2
          AND slot_time = $3
          AND status = $4
          AND ($5::uuid IS NULL OR appointment_id <> $5)
        LIMIT 1
        "#,
    )
    .bind(psychologist_id)
    .bind(date)
    .bind(time.as_str())
    .bind(AppointmentStatus::Scheduled)
    .bind(exclude)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(holder)
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct SessionLookupRow {
            session_token_id: Uuid,
            #[sqlx(flatten)]
            user: User,
        }

        let row: Option<SessionLookupRow> = sqlx::query_as(
            r#"
            SELECT st.session_token_id,
                   u.user_id AS id, u.display_name AS name, u.email, u.kind
            FROM session_token st
            JOIN app_user u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Touch last_seen_at (best-effort)
        if let Err(e) = sqlx::query(
            r#"
            UPDATE session_token
            SET last_seen_at = now()
            WHERE session_token_id = $1
            "#,
        )
        .bind(row.session_token_id)
        .execute(&self.pool)
        .await
        {
            tracing::debug!(error = %e, "failed to touch session");
        }

        Ok(Some(row.user))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id AS id, display_name AS name, email, kind
            FROM app_user
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        let patient = sqlx::query_as::<_, Patient>(
            r#"
            SELECT patient_id AS id, full_name AS name, email
            FROM patient
            WHERE patient_id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(patient)
    }

    async fn find_patient_by_email(&self, email: &str) -> Result<Option<Patient>, StoreError> {
        let patient = sqlx::query_as::<_, Patient>(
            r#"
            SELECT patient_id AS id, full_name AS name, email
            FROM patient
            WHERE email = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(patient)
    }

    async fn find_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1");
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn list_for_practitioner(
        &self,
        psychologist_id: Uuid,
    ) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment \
             WHERE psychologist_id = $1 \
             ORDER BY appointment_date ASC, slot_time ASC"
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(psychologist_id)
            .fetch_all(&self.pool)
            .await?;
        into_appointments(rows)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment \
             WHERE patient_id = $1 \
             ORDER BY appointment_date ASC, slot_time ASC"
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        into_appointments(rows)
    }

    async fn insert_scheduled(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tx = self.pool.begin().await?;

        lock_slot(&mut tx, new.psychologist_id, new.date, new.time).await?;
        if slot_holder(&mut tx, new.psychologist_id, new.date, new.time, None)
            .await?
            .is_some()
        {
            return Err(StoreError::SlotTaken {
                date: new.date,
                time: new.time,
            });
        }

        let sql = format!(
            "INSERT INTO appointment (patient_id, psychologist_id, appointment_date, slot_time, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {APPOINTMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(new.patient_id)
            .bind(new.psychologist_id)
            .bind(new.date)
            .bind(new.time.as_str())
            .bind(AppointmentStatus::Scheduled)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn update_appointment(
        &self,
        appointment_id: Uuid,
        changes: &UpdateAppointmentRequest,
        reject_conflicts: bool,
    ) -> Result<Revision, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1 FOR UPDATE"
        );
        let before: Appointment = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(appointment_id))?
            .try_into()?;
        if changes.revives(&before) {
            return Err(StoreError::Revival(appointment_id));
        }

        let mut after = before.clone();
        changes.apply_to(&mut after);
        let mut revision = Revision { before, after };

        if reject_conflicts && revision.changed_slot() && revision.after.is_scheduled() {
            let target = &revision.after;
            let (doc, date, time) = (target.psychologist_id, target.date, target.time);
            lock_slot(&mut tx, doc, date, time).await?;
            if slot_holder(&mut tx, doc, date, time, Some(appointment_id))
                .await?
                .is_some()
            {
                return Err(StoreError::SlotTaken { date, time });
            }
        }

        let sql = format!(
            "UPDATE appointment \
             SET patient_id = $2, psychologist_id = $3, appointment_date = $4, \
                 slot_time = $5, status = $6, updated_at = now() \
             WHERE appointment_id = $1 \
             RETURNING {APPOINTMENT_COLUMNS}"
        );
        let target = &revision.after;
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .bind(target.patient_id)
            .bind(target.psychologist_id)
            .bind(target.date)
            .bind(target.time.as_str())
            .bind(target.status)
            .fetch_one(&mut *tx)
            .await?;
        revision.after = row.try_into()?;

        tx.commit().await?;
        Ok(revision)
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, StoreError> {
        let sql = format!(
            "UPDATE appointment \
             SET status = $2, updated_at = now() \
             WHERE appointment_id = $1 \
             RETURNING {APPOINTMENT_COLUMNS}"
        );
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .bind(AppointmentStatus::Canceled)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(appointment_id))?
            .try_into()
    }

    async fn occupied_slots(
        &self,
        psychologist_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, StoreError> {
        let labels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT slot_time
            FROM appointment
            WHERE appointment_date = $1
              AND psychologist_id = $2
              AND status = $3
            "#,
        )
        .bind(date)
        .bind(psychologist_id)
        .bind(AppointmentStatus::Scheduled)
        .fetch_all(&self.pool)
        .await?;

        labels
            .iter()
            .map(|label| {
                label
                    .parse::<Slot>()
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .collect()
    }
}
