//! Payroll-period lock scenarios: the lock refuses every mutation, freezes
//! finalized sessions, and only reopens with an audited reason.

mod support;

use support::{day, ts, Engine};
use timecard_engine::error::{codes, EngineError};
use timecard_engine::models::ot_session::{OtSessionStatus, ReviewAction};
use timecard_engine::services::AttendanceReviewAction;

#[tokio::test]
async fn locked_period_refuses_every_mutation() {
    let engine = Engine::new();
    let user = engine.add_user("ops");
    let admin = engine.add_admin();

    engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 0))
        .await
        .expect("lock");

    let err = engine
        .attendance
        .check_in(user, None, None, ts(2024, 3, 20, 9, 0))
        .await
        .expect_err("check-in into a locked month");
    assert!(matches!(err, EngineError::PeriodLocked { year: 2024, month: 3 }));

    let err = engine
        .overtime
        .start(user, ts(2024, 3, 20, 18, 0))
        .await
        .expect_err("ot start into a locked month");
    assert!(matches!(err, EngineError::PeriodLocked { .. }));
}

#[tokio::test]
async fn locking_twice_is_rejected() {
    let engine = Engine::new();
    let admin = engine.add_admin();

    engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 0))
        .await
        .expect("first lock");
    let err = engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 5))
        .await
        .expect_err("second lock");
    assert_eq!(err.code(), codes::PERIOD_ALREADY_LOCKED);
}

#[tokio::test]
async fn lock_freezes_finalized_sessions_and_unlock_thaws_them() {
    let engine = Engine::new();
    let user = engine.add_user("ops");
    let admin = engine.add_admin();

    let session = engine
        .overtime
        .start(user, ts(2024, 3, 15, 18, 0))
        .await
        .expect("start");
    engine
        .overtime
        .end(session.id, ts(2024, 3, 15, 21, 0))
        .await
        .expect("end");

    engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 0))
        .await
        .expect("lock");
    let frozen = engine.sessions.get(session.id).expect("session");
    assert_eq!(frozen.status, OtSessionStatus::Locked);
    // Frozen hours remain payable history but accept no review.
    assert_eq!(frozen.payable_hours(), 3.0);
    let err = engine
        .overtime
        .review(
            session.id,
            admin,
            ReviewAction::Rejected,
            None,
            None,
            ts(2024, 4, 1, 10, 0),
        )
        .await
        .expect_err("review of a locked session");
    assert_eq!(err.code(), codes::SESSION_NOT_REVIEWABLE);

    engine
        .review
        .unlock_period(
            2024,
            3,
            admin,
            "re-running march payroll after a rate correction",
            ts(2024, 4, 2, 9, 0),
        )
        .await
        .expect("unlock");
    let thawed = engine.sessions.get(session.id).expect("session");
    assert_eq!(thawed.status, OtSessionStatus::Approved);
}

#[tokio::test]
async fn unlock_demands_a_substantial_reason() {
    let engine = Engine::new();
    let admin = engine.add_admin();

    engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 0))
        .await
        .expect("lock");

    let err = engine
        .review
        .unlock_period(2024, 3, admin, "oops", ts(2024, 4, 2, 9, 0))
        .await
        .expect_err("thin reason");
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .review
        .unlock_period(2024, 4, admin, "april was never locked in the first place", ts(2024, 4, 2, 9, 0))
        .await
        .expect_err("not locked");
    assert_eq!(err.code(), codes::PERIOD_NOT_LOCKED);
}

#[tokio::test]
async fn mutations_resume_after_an_audited_unlock() {
    let engine = Engine::new();
    let user = engine.add_user("ops");
    let admin = engine.add_admin();

    engine
        .attendance
        .check_in(user, None, None, ts(2024, 3, 15, 9, 0))
        .await
        .expect("check-in");
    engine.auto_checkout.run(ts(2024, 3, 15, 23, 0)).await;

    engine
        .review
        .lock_period(2024, 3, admin, ts(2024, 4, 1, 9, 0))
        .await
        .expect("lock");

    let pending = engine
        .review
        .pending_reviews(day(2024, 3, 1), day(2024, 3, 31))
        .await
        .expect("pending queue");
    let err = engine
        .review
        .review_attendance(
            pending[0].id,
            admin,
            AttendanceReviewAction::Accept,
            None,
            ts(2024, 4, 1, 10, 0),
        )
        .await
        .expect_err("review inside a locked month");
    assert!(matches!(err, EngineError::PeriodLocked { .. }));

    engine
        .review
        .unlock_period(
            2024,
            3,
            admin,
            "resolving the outstanding march correction",
            ts(2024, 4, 2, 9, 0),
        )
        .await
        .expect("unlock");
    engine
        .review
        .review_attendance(
            pending[0].id,
            admin,
            AttendanceReviewAction::Accept,
            None,
            ts(2024, 4, 2, 9, 5),
        )
        .await
        .expect("review after unlock");
}
