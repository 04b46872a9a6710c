//! Figures behind the dashboard page:
//! activity series, category shares,
//! summary counts and today's tasks.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{
  CalendarGrid,
  build_grid
};
use crate::datetime::{
  Clock,
  local_date
};
use crate::error::DashError;
use crate::relative::format_relative;
use crate::task::{
  Status,
  Task
};

/// Rows the dashboard shows under
/// "today" before linking to the list.
pub const RECENT_TASK_LIMIT: usize = 4;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsPeriod {
  Week,
  Month,
  Year
}

impl AnalyticsPeriod {
  /// Lowercase name, as serialized.
  pub fn as_str(&self) -> &'static str {
    match self {
      | AnalyticsPeriod::Week => "week",
      | AnalyticsPeriod::Month => "month",
      | AnalyticsPeriod::Year => "year"
    }
  }

  pub fn days(&self) -> i64 {
    match self {
      | AnalyticsPeriod::Week => 7,
      | AnalyticsPeriod::Month => 30,
      | AnalyticsPeriod::Year => 365
    }
  }
}

impl FromStr for AnalyticsPeriod {
  type Err = DashError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "week" => {
        Ok(AnalyticsPeriod::Week)
      }
      | "month" => {
        Ok(AnalyticsPeriod::Month)
      }
      | "year" => {
        Ok(AnalyticsPeriod::Year)
      }
      | other => {
        Err(DashError::invalid(format!(
          "unknown analytics period: \
           {other}"
        )))
      }
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct AnalyticsPoint {
  pub date:  NaiveDate,
  pub day:   String,
  pub count: usize
}

/// Tasks created per local day over the
/// period ending `today`, oldest first.
#[tracing::instrument(skip(tasks))]
pub fn analytics_series(
  tasks: &[Task],
  period: AnalyticsPeriod,
  today: NaiveDate,
  tz: Tz
) -> Vec<AnalyticsPoint> {
  let mut per_day: BTreeMap<
    NaiveDate,
    usize
  > = BTreeMap::new();
  for created in tasks
    .iter()
    .filter_map(|task| task.created_at)
  {
    *per_day
      .entry(local_date(created, tz))
      .or_default() += 1;
  }

  (0..period.days())
    .rev()
    .filter_map(|offset| {
      today.checked_sub_signed(
        Duration::days(offset)
      )
    })
    .map(|date| {
      AnalyticsPoint {
        date,
        day: date.format("%a").to_string(),
        count: per_day
          .get(&date)
          .copied()
          .unwrap_or(0)
      }
    })
    .collect()
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct CategoryShare {
  pub name:       String,
  pub count:      usize,
  pub percentage: f64
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct CategoryBreakdown {
  pub categories: Vec<CategoryShare>,
  pub total:      usize
}

impl CategoryBreakdown {
  /// Figure shown in the doughnut centre.
  pub fn percentage_total(&self) -> f64 {
    round_tenth(
      self
        .categories
        .iter()
        .map(|c| c.percentage)
        .sum()
    )
  }
}

/// Share of all tasks held by each named
/// category. Uncategorised tasks count
/// towards the total only.
pub fn category_breakdown(
  tasks: &[Task]
) -> CategoryBreakdown {
  let mut counts: BTreeMap<
    &str,
    usize
  > = BTreeMap::new();
  for name in tasks
    .iter()
    .filter_map(|t| t.category.as_deref())
  {
    *counts.entry(name).or_default() += 1;
  }

  let total = tasks.len();
  let categories = counts
    .into_iter()
    .map(|(name, count)| {
      CategoryShare {
        name: name.to_string(),
        count,
        percentage: round_tenth(
          count as f64 / total as f64
            * 100.0
        )
      }
    })
    .collect();

  CategoryBreakdown {
    categories,
    total
  }
}

fn round_tenth(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Default,
)]
pub struct SummaryStats {
  pub total:     usize,
  pub ongoing:   usize,
  pub upcoming:  usize,
  pub pending:   usize,
  pub completed: usize
}

pub fn summary_stats(
  tasks: &[Task],
  today: NaiveDate
) -> SummaryStats {
  tasks.iter().fold(
    SummaryStats {
      total: tasks.len(),
      ..SummaryStats::default()
    },
    |mut stats, task| {
      match task.status {
        | Status::Pending => {
          stats.pending += 1
        }
        | Status::Progress => {
          stats.ongoing += 1
        }
        | Status::Completed => {
          stats.completed += 1
        }
      }
      if task.is_upcoming(today) {
        stats.upcoming += 1;
      }
      stats
    }
  )
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct TaskLine {
  pub id:        u64,
  pub title:     String,
  pub status:    Status,
  pub time_ago:  String,
  pub completed: bool
}

impl TaskLine {
  fn from_task(
    task: &Task,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      id:        task.id,
      title:     task.title.clone(),
      status:    task.status,
      time_ago:  format_relative(
        task.created_at,
        now
      ),
      completed: task.is_completed()
    }
  }
}

fn newest_first<'a>(
  tasks: impl Iterator<Item = &'a Task>
) -> Vec<&'a Task> {
  let mut sorted: Vec<&Task> =
    tasks.collect();
  sorted.sort_by(|a, b| {
    b.created_at
      .cmp(&a.created_at)
      .then_with(|| b.id.cmp(&a.id))
  });
  sorted
}

/// Tasks created on today's local date,
/// newest first.
pub fn today_tasks(
  tasks: &[Task],
  now: DateTime<Utc>,
  today: NaiveDate,
  tz: Tz
) -> Vec<TaskLine> {
  let lines: Vec<TaskLine> =
    newest_first(tasks.iter().filter(
      |task| {
        task.created_at.is_some_and(
          |created| {
            local_date(created, tz)
              == today
          }
        )
      }
    ))
    .into_iter()
    .map(|task| {
      TaskLine::from_task(task, now)
    })
    .collect();
  debug!(
    count = lines.len(),
    "collected today's tasks"
  );
  lines
}

pub fn recent_tasks(
  tasks: &[Task],
  now: DateTime<Utc>,
  limit: usize
) -> Vec<TaskLine> {
  newest_first(tasks.iter())
    .into_iter()
    .take(limit)
    .map(|task| {
      TaskLine::from_task(task, now)
    })
    .collect()
}

/// Everything the dashboard page shows
/// in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
  pub summary:    SummaryStats,
  pub recent:     Vec<TaskLine>,
  pub calendar:   CalendarGrid,
  pub period:     AnalyticsPeriod,
  pub analytics:  Vec<AnalyticsPoint>,
  pub categories: CategoryBreakdown
}

#[tracing::instrument(skip(tasks, clock))]
pub fn build_dashboard(
  tasks: &[Task],
  clock: &Clock,
  period: AnalyticsPeriod
) -> Result<DashboardView, DashError> {
  let calendar = build_grid(
    clock.today.month0(),
    clock.today.year(),
    clock.today
  )?;

  Ok(DashboardView {
    summary: summary_stats(
      tasks,
      clock.today
    ),
    recent: recent_tasks(
      tasks,
      clock.now,
      RECENT_TASK_LIMIT
    ),
    calendar,
    period,
    analytics: analytics_series(
      tasks,
      period,
      clock.today,
      clock.tz
    ),
    categories: category_breakdown(
      tasks
    )
  })
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  fn task(
    id: u64,
    created: DateTime<Utc>,
    category: Option<&str>
  ) -> Task {
    let mut task = Task::new_pending(
      id,
      format!("task {id}"),
      created
    );
    task.category =
      category.map(str::to_string);
    task
  }

  #[test]
  fn week_series_counts_per_day() {
    let tasks = vec![
      task(1, now(), None),
      task(
        2,
        now() - Duration::hours(1),
        None
      ),
      task(
        3,
        now() - Duration::days(6),
        None
      ),
      task(
        4,
        now() - Duration::days(7),
        None
      ),
    ];

    let series = analytics_series(
      &tasks,
      AnalyticsPeriod::Week,
      today(),
      chrono_tz::UTC
    );
    assert_eq!(series.len(), 7);
    assert_eq!(
      series[0].date,
      NaiveDate::from_ymd_opt(2026, 2, 11)
        .expect("valid date")
    );
    assert_eq!(series[0].day, "Wed");
    assert_eq!(series[0].count, 1);
    assert_eq!(series[6].day, "Tue");
    assert_eq!(series[6].count, 2);
    assert_eq!(
      series
        .iter()
        .map(|p| p.count)
        .sum::<usize>(),
      3
    );
  }

  #[test]
  fn period_lengths() {
    for (period, days) in [
      (AnalyticsPeriod::Week, 7),
      (AnalyticsPeriod::Month, 30),
      (AnalyticsPeriod::Year, 365)
    ] {
      assert_eq!(
        analytics_series(
          &[],
          period,
          today(),
          chrono_tz::UTC
        )
        .len(),
        days
      );
    }
    assert!(
      "fortnight"
        .parse::<AnalyticsPeriod>()
        .is_err()
    );
    for period in [
      AnalyticsPeriod::Week,
      AnalyticsPeriod::Month,
      AnalyticsPeriod::Year
    ] {
      assert_eq!(
        period.as_str().parse::<AnalyticsPeriod>(),
        Ok(period)
      );
      assert_eq!(
        serde_json::to_value(period)
          .expect("serialize period"),
        period.as_str()
      );
    }
  }

  #[test]
  fn category_shares_are_of_all_tasks() {
    let tasks = vec![
      task(1, now(), Some("UX/UI")),
      task(2, now(), Some("UX/UI")),
      task(3, now(), Some("Video")),
      task(4, now(), None),
      task(5, now(), Some("Photo")),
      task(6, now(), Some("UX/UI")),
    ];
    let breakdown =
      category_breakdown(&tasks);
    assert_eq!(breakdown.total, 6);
    let names: Vec<&str> = breakdown
      .categories
      .iter()
      .map(|c| c.name.as_str())
      .collect();
    assert_eq!(
      names,
      vec!["Photo", "UX/UI", "Video"]
    );
    assert_eq!(
      breakdown.categories[1].percentage,
      50.0
    );
    assert_eq!(
      breakdown.categories[0].percentage,
      16.7
    );
    assert_eq!(
      breakdown.percentage_total(),
      83.4
    );
  }

  #[test]
  fn empty_breakdown() {
    let breakdown =
      category_breakdown(&[]);
    assert!(breakdown.categories.is_empty());
    assert_eq!(breakdown.total, 0);
    assert_eq!(
      breakdown.percentage_total(),
      0.0
    );
  }

  #[test]
  fn summary_counts_statuses() {
    let mut tasks = vec![
      task(1, now(), None),
      task(2, now(), None),
      task(3, now(), None),
      task(4, now(), None),
    ];
    tasks[0].status = Status::Progress;
    tasks[1].status = Status::Completed;
    tasks[2].due_date =
      NaiveDate::from_ymd_opt(2026, 3, 1);

    assert_eq!(
      summary_stats(&tasks, today()),
      SummaryStats {
        total:     4,
        ongoing:   1,
        upcoming:  1,
        pending:   2,
        completed: 1
      }
    );
  }

  #[test]
  fn today_tasks_are_newest_first() {
    let mut tasks = vec![
      task(
        1,
        now() - Duration::hours(3),
        None
      ),
      task(
        2,
        now() - Duration::minutes(5),
        None
      ),
      task(
        3,
        now() - Duration::days(1),
        None
      ),
    ];
    tasks[0].status = Status::Completed;

    let lines = today_tasks(
      &tasks,
      now(),
      today(),
      chrono_tz::UTC
    );
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].id, 2);
    assert_eq!(lines[0].time_ago, "5 min ago");
    assert_eq!(lines[1].time_ago, "3 hr ago");
    assert!(lines[1].completed);
  }

  #[test]
  fn recent_tasks_respects_limit() {
    let tasks: Vec<Task> = (1..=6)
      .map(|id| {
        task(
          id,
          now() - Duration::days(id as i64),
          None
        )
      })
      .collect();
    let lines = recent_tasks(
      &tasks,
      now(),
      RECENT_TASK_LIMIT
    );
    let ids: Vec<u64> =
      lines.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(lines[0].time_ago, "1 day ago");
  }

  #[test]
  fn dashboard_view_bundles_sections() {
    let tasks = vec![
      task(1, now(), Some("Video")),
      task(
        2,
        now() - Duration::days(2),
        None
      ),
    ];
    let clock = Clock::new(
      now(),
      chrono_tz::UTC
    );
    let view = build_dashboard(
      &tasks,
      &clock,
      AnalyticsPeriod::Week
    )
    .expect("dashboard");

    assert_eq!(view.summary.total, 2);
    assert_eq!(view.recent.len(), 2);
    assert_eq!(view.calendar.month(), 1);
    assert_eq!(view.calendar.year(), 2026);
    let idx = view
      .calendar
      .today_index()
      .expect("today shown");
    assert_eq!(
      view.calendar.cells()[idx].day_number,
      17
    );
    assert_eq!(view.analytics.len(), 7);
    assert_eq!(
      view.categories.categories.len(),
      1
    );
  }
}
