use chrono::{Duration, TimeZone, Utc};
use chrono_tz::Tz;
use duedash_core::dashboard::{AnalyticsPeriod, build_dashboard};
use duedash_core::datastore::DataStore;
use duedash_core::datetime::Clock;
use duedash_core::error::DashError;
use duedash_core::filter::ListQuery;
use duedash_core::task::{Status, Task};
use tempfile::tempdir;

#[test]
fn datastore_toggle_and_dashboard() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let now = Utc
        .with_ymd_and_hms(2024, 2, 15, 18, 30, 0)
        .single()
        .expect("valid timestamp");
    let clock = Clock::new(now, Tz::UTC);

    let mut edit = Task::new_pending(1, "Edit vlog".to_string(), now - Duration::hours(2));
    edit.category = Some("Video".to_string());
    edit.tags = vec!["youtube".to_string()];

    let mut script = Task::new_pending(2, "Write script".to_string(), now - Duration::days(1));
    script.category = Some("Writing".to_string());
    script.due_date = Some(clock.today + Duration::days(3));

    let tasks = store.add_task(vec![], edit).expect("add first task");
    let tasks = store.add_task(tasks, script).expect("add second task");
    assert_eq!(store.next_id(&tasks), 3);

    let outcome = store.toggle_task(1, now).expect("toggle task");
    assert_eq!(outcome.previous, Status::Pending);
    assert_eq!(outcome.current, Status::Completed);

    let err = store.toggle_task(99, now).expect_err("missing task");
    assert_eq!(
        err.downcast_ref::<DashError>(),
        Some(&DashError::TaskNotFound(99))
    );

    let tasks = store.load_tasks().expect("reload tasks");
    assert_eq!(tasks.len(), 2);
    assert!(tasks[0].is_completed());

    let query = ListQuery::parse(&["+youtube".to_string()], clock.today, 20).expect("parse query");
    let (page, info) = query.apply(&tasks);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, 1);
    assert_eq!(info.total_count, 1);

    let view = build_dashboard(&tasks, &clock, AnalyticsPeriod::Week).expect("dashboard");
    assert_eq!(view.summary.total, 2);
    assert_eq!(view.summary.completed, 1);
    assert_eq!(view.summary.upcoming, 1);
    assert_eq!(view.recent[0].time_ago, "2 hr ago");
    assert_eq!(view.recent[1].time_ago, "1 day ago");
    assert_eq!(view.calendar.cells().len(), 42);
    assert_eq!(view.analytics.len(), 7);
    assert_eq!(view.analytics.iter().map(|p| p.count).sum::<usize>(), 2);
    assert_eq!(view.categories.categories.len(), 2);
    assert_eq!(view.categories.percentage_total(), 100.0);
}
