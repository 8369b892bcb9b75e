//! End-to-end deadline scenarios driven through the public lifecycle manager, including
//! concurrent writers racing on the same records.

mod common {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime};

    use wohngeld_casework::casework::{
        Client, ClientId, DeadlineLifecycleManager, InMemoryClientStore, InMemoryDeadlineStore,
        LifecycleConfig,
    };

    pub(super) type Manager = DeadlineLifecycleManager<InMemoryClientStore, InMemoryDeadlineStore>;

    pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub(super) fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(8, 0, 0).expect("valid time")
    }

    pub(super) fn setup() -> (Arc<Manager>, Arc<InMemoryDeadlineStore>) {
        let clients = Arc::new(InMemoryClientStore::with_clients([
            Client::new(ClientId(1), "Beispiel", "Maria"),
            Client::new(ClientId(2), "Neumann", "Jonas"),
        ]));
        let deadlines = Arc::new(InMemoryDeadlineStore::default());
        let manager = Arc::new(DeadlineLifecycleManager::new(
            clients,
            Arc::clone(&deadlines),
            &LifecycleConfig::default(),
        ));
        (manager, deadlines)
    }
}

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use common::{at, date, setup};
use wohngeld_casework::casework::{
    ClientId, CreateDeadline, DeadlineKind, DeadlineStatus, DeadlineStore, LifecycleError,
};

fn renewal(client: u64, due: chrono::NaiveDate, reminder: Option<chrono::NaiveDate>) -> CreateDeadline {
    CreateDeadline {
        client_id: ClientId(client),
        kind: DeadlineKind::Renewal,
        due_date: due,
        reminder_date: reminder,
        description: Some("Weiterbewilligung 2025".to_string()),
    }
}

#[test]
fn deadline_moves_from_reminder_to_overdue_to_completed() {
    let (manager, deadlines) = setup();
    let cancel = AtomicBool::new(false);
    let deadline = manager
        .create(
            renewal(1, date(2025, 1, 10), Some(date(2025, 1, 1))),
            at(2024, 12, 1),
        )
        .expect("created");

    manager.sweep(at(2024, 12, 31), &cancel).expect("sweep");
    assert_eq!(manager.get(deadline.id).expect("get").status, DeadlineStatus::Open);

    manager.sweep(at(2025, 1, 2), &cancel).expect("sweep");
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::Reminder
    );

    manager.sweep(at(2025, 1, 10), &cancel).expect("sweep");
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::Reminder
    );

    manager.sweep(at(2025, 1, 11), &cancel).expect("sweep");
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::Overdue
    );

    let outcome = manager
        .complete(deadline.id, true, at(2025, 1, 20))
        .expect("late completion");
    assert_eq!(outcome.completed.status, DeadlineStatus::Completed);
    let follow_up = outcome.follow_up.expect("renewal recurs");
    assert_eq!(follow_up.due_date, date(2026, 1, 20));

    let report = manager.sweep(at(2027, 1, 1), &cancel).expect("sweep");
    assert_eq!(report.overdue, 1);
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::Completed
    );
    assert_eq!(
        deadlines
            .list_by_status(DeadlineStatus::Overdue)
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn concurrent_completions_produce_exactly_one_follow_up() {
    let (manager, deadlines) = setup();
    let deadline = manager
        .create(renewal(1, date(2025, 2, 28), None), at(2025, 1, 6))
        .expect("created");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.complete(deadline.id, true, at(2025, 3, 1)))
        })
        .collect();

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.join().expect("worker finished") {
            Ok(outcome) => {
                completed += 1;
                assert_eq!(
                    outcome.follow_up.expect("follow-up").due_date,
                    date(2026, 3, 1)
                );
            }
            Err(LifecycleError::InvalidTransition { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(rejected, 7);
    assert_eq!(deadlines.list_by_client(ClientId(1)).expect("list").len(), 2);
}

#[test]
fn concurrent_sweeps_apply_each_transition_once() {
    let (manager, _) = setup();
    let mut ids = Vec::new();
    for day in 1..=20 {
        let client = if day % 2 == 0 { 1 } else { 2 };
        let deadline = manager
            .create(renewal(client, date(2025, 1, day), None), at(2024, 12, 1))
            .expect("created");
        ids.push(deadline.id);
    }

    let now = at(2025, 1, 11);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.sweep(now, &AtomicBool::new(false)))
        })
        .collect();

    let mut overdue = 0;
    let mut reminded = 0;
    for handle in handles {
        let report = handle.join().expect("worker finished").expect("sweep");
        overdue += report.overdue;
        reminded += report.reminded;
    }

    // Due on 1..=10 January lapsed, the rest sit inside their 14-day reminder window.
    assert_eq!(overdue, 10);
    assert_eq!(reminded, 10);
    for (index, id) in ids.iter().enumerate() {
        let expected = if index < 10 {
            DeadlineStatus::Overdue
        } else {
            DeadlineStatus::Reminder
        };
        assert_eq!(manager.get(*id).expect("get").status, expected);
    }
    assert_eq!(manager.overdue_for(Some(ClientId(2))).expect("overdue").count(), 5);
}

#[test]
fn operator_progress_survives_reminder_window() {
    let (manager, _) = setup();
    let cancel = AtomicBool::new(false);
    let deadline = manager
        .create(renewal(2, date(2025, 6, 30), None), at(2025, 1, 6))
        .expect("created");
    assert_eq!(deadline.reminder_date, Some(date(2025, 6, 16)));

    manager
        .set_status(deadline.id, DeadlineStatus::InProgress, at(2025, 6, 1))
        .expect("in progress");
    manager.sweep(at(2025, 6, 20), &cancel).expect("sweep");
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::InProgress
    );

    manager.sweep(at(2025, 7, 1), &cancel).expect("sweep");
    assert_eq!(
        manager.get(deadline.id).expect("get").status,
        DeadlineStatus::Overdue
    );
}
