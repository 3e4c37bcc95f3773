//! Runs against a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use uuid::Uuid;

use clinic_scheduling::{
    db,
    models::{AppointmentStatus, NewAppointment, Slot, UpdateAppointmentRequest},
    store::{AppointmentStore, PgStore, StoreError},
};

async fn store() -> PgStore {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::connect_pg(&url, 16).await.unwrap();
    db::migrate(&pool).await.unwrap();
    PgStore::new(pool)
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 4).unwrap()
}

fn booking(psychologist_id: Uuid, date: NaiveDate, time: Slot) -> NewAppointment {
    NewAppointment {
        patient_id: Uuid::new_v4(),
        psychologist_id,
        date,
        time,
    }
}

fn move_to(time: Slot) -> UpdateAppointmentRequest {
    UpdateAppointmentRequest {
        time: Some(time),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_claims_for_one_slot_have_one_winner() {
    let store = Arc::new(store().await);
    let doc = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert_scheduled(booking(doc, day(), Slot::At1700)).await
        }));
    }

    let mut won = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_matches!(e, StoreError::SlotTaken { time: Slot::At1700, .. }),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(store.occupied_slots(doc, day()).await.unwrap(), vec![Slot::At1700]);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn rejecting_update_skips_its_own_row() {
    let store = store().await;
    let doc = Uuid::new_v4();

    let nine = store.insert_scheduled(booking(doc, day(), Slot::At0900)).await.unwrap();
    let ten = store.insert_scheduled(booking(doc, day(), Slot::At1000)).await.unwrap();

    assert_matches!(
        store.update_appointment(ten.id, &move_to(Slot::At0900), true).await,
        Err(StoreError::SlotTaken { time: Slot::At0900, .. })
    );

    let same_slot = UpdateAppointmentRequest {
        time: Some(Slot::At0900),
        patient_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    let revision = store.update_appointment(nine.id, &same_slot, true).await.unwrap();
    assert_eq!(revision.after.time, Slot::At0900);
    assert_eq!(revision.after.patient_id, same_slot.patient_id.unwrap());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn listing_orders_by_date_then_slot() {
    let store = store().await;
    let doc = Uuid::new_v4();
    let earlier = day().pred_opt().unwrap();

    for (date, time) in [
        (day(), Slot::At1700),
        (day(), Slot::At0900),
        (earlier, Slot::At1400),
        (day(), Slot::At1100),
    ] {
        store.insert_scheduled(booking(doc, date, time)).await.unwrap();
    }

    let order: Vec<(NaiveDate, Slot)> = store
        .list_for_practitioner(doc)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.date, a.time))
        .collect();
    assert_eq!(
        order,
        vec![
            (earlier, Slot::At1400),
            (day(), Slot::At0900),
            (day(), Slot::At1100),
            (day(), Slot::At1700),
        ]
    );
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn updates_patch_the_stored_row() {
    let store = store().await;
    let doc = Uuid::new_v4();
    let booked = store.insert_scheduled(booking(doc, day(), Slot::At1500)).await.unwrap();

    let canceled = store.cancel_appointment(booked.id).await.unwrap();
    assert_eq!(canceled.status, AppointmentStatus::Canceled);
    store.insert_scheduled(booking(doc, day(), Slot::At1500)).await.unwrap();

    let relink = UpdateAppointmentRequest {
        patient_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    let revision = store.update_appointment(booked.id, &relink, false).await.unwrap();
    assert_eq!(revision.after.status, AppointmentStatus::Canceled);

    let revive = UpdateAppointmentRequest {
        status: Some(AppointmentStatus::Scheduled),
        ..Default::default()
    };
    assert_matches!(
        store.update_appointment(booked.id, &revive, false).await,
        Err(StoreError::Revival(id)) if id == booked.id
    );
    assert_eq!(store.occupied_slots(doc, day()).await.unwrap(), vec![Slot::At1500]);

    let missing = Uuid::new_v4();
    assert_matches!(
        store.cancel_appointment(missing).await,
        Err(StoreError::NotFound(id)) if id == missing
    );
}
