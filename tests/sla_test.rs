//! SLA resolution priority and exclusion-window slack.

use caseflow_rs::config::FeatureFlags;
use caseflow_rs::engine::sla::{DEFAULT_ALLOWED_SECONDS, resolve_allowed_seconds};
use caseflow_rs::model::process::{ExclusionKind, ExclusionWindow, Role, SlaRecord, StepDefinition};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap()
}

fn step(default_allowed_seconds: Option<i64>) -> StepDefinition {
    StepDefinition {
        id: Uuid::new_v4(),
        process_id: Uuid::new_v4(),
        sequence_order: 1,
        responsible_role: Some(Role::Clerk),
        default_allowed_seconds,
    }
}

fn record(step_id: Uuid, role: Option<Role>, allowed_seconds: i64) -> SlaRecord {
    SlaRecord {
        id: Uuid::new_v4(),
        step_id,
        role,
        allowed_seconds,
        active: true,
    }
}

fn window(step_id: Option<Uuid>, length_hours: i64) -> ExclusionWindow {
    ExclusionWindow {
        id: Uuid::new_v4(),
        kind: ExclusionKind::Holiday,
        step_id,
        starts_at: now() - Duration::hours(1),
        ends_at: now() - Duration::hours(1) + Duration::hours(length_hours),
        active: true,
    }
}

// ---------------------------------------------------------------------------
// Priority chain
// ---------------------------------------------------------------------------

#[test]
fn step_default_wins_over_records() {
    let step = step(Some(7200));
    let records = [record(step.id, None, 3600)];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &records,
        &[],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 7200);
}

#[test]
fn role_matching_record_preferred() {
    let step = step(None);
    let records = [
        record(step.id, None, 3600),
        record(step.id, Some(Role::Clerk), 5400),
    ];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &records,
        &[],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 5400);
}

#[test]
fn first_active_record_without_role_match() {
    let step = step(None);
    let records = [
        record(step.id, Some(Role::HeadOfDepartment), 5400),
        record(step.id, None, 3600),
    ];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &records,
        &[],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 5400);
}

#[test]
fn records_for_other_steps_are_ignored() {
    let step = step(None);
    let records = [record(Uuid::new_v4(), Some(Role::Clerk), 60)];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &records,
        &[],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, DEFAULT_ALLOWED_SECONDS);
}

#[test]
fn global_fallback_is_24_hours() {
    let step = step(None);
    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &[],
        &[],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 86_400);
}

// ---------------------------------------------------------------------------
// Exclusion windows
// ---------------------------------------------------------------------------

#[test]
fn overlapping_window_adds_its_duration() {
    let step = step(Some(7200));
    let windows = [window(Some(step.id), 4)];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &[],
        &windows,
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 7200 + 4 * 3600);
}

#[test]
fn multiple_windows_add_their_mean_once() {
    let step = step(Some(7200));
    // 2h and 4h windows both overlapping now: mean is 3h.
    let windows = [window(None, 2), window(Some(step.id), 4)];

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &[],
        &windows,
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 7200 + 3 * 3600);
}

#[test]
fn non_overlapping_and_foreign_windows_add_nothing() {
    let step = step(Some(7200));
    let mut past = window(Some(step.id), 2);
    past.starts_at = now() - Duration::hours(10);
    past.ends_at = now() - Duration::hours(8);
    let foreign = window(Some(Uuid::new_v4()), 6);

    let allowed = resolve_allowed_seconds(
        &step,
        Some(Role::Clerk),
        &[],
        &[past, foreign],
        &FeatureFlags::default(),
        now(),
    );
    assert_eq!(allowed, 7200);
}

#[test]
fn exclusions_flag_off_disables_slack() {
    let step = step(Some(7200));
    let windows = [window(Some(step.id), 4)];
    let flags = FeatureFlags {
        sla_exclusions: false,
        ..FeatureFlags::default()
    };

    let allowed = resolve_allowed_seconds(&step, Some(Role::Clerk), &[], &windows, &flags, now());
    assert_eq!(allowed, 7200);
}
