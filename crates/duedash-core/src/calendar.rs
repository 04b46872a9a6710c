use chrono::{
  Datelike,
  Duration,
  NaiveDate
};
use serde::Serialize;
use tracing::trace;

use crate::error::DashError;

/// Cells in every rendered month: six
/// weeks of seven days.
pub const GRID_CELLS: usize = 42;

pub const GRID_COLUMNS: usize = 7;

pub const WEEKDAY_LABELS: [&str;
  GRID_COLUMNS] = [
  "Sun", "Mon", "Tue", "Wed", "Thu",
  "Fri", "Sat"
];

const MONTH_NAMES: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December"
];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MonthRelation {
  Previous,
  Current,
  Next
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct DayCell {
  pub day_number:     u32,
  pub month_relation: MonthRelation,
  pub is_today:       bool
}

impl DayCell {
  fn filler(
    day_number: u32,
    month_relation: MonthRelation
  ) -> Self {
    Self {
      day_number,
      month_relation,
      is_today: false
    }
  }

  pub fn is_filler(&self) -> bool {
    self.month_relation
      != MonthRelation::Current
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub struct CalendarGrid {
  month: u32,
  year:  i32,
  cells: Vec<DayCell>
}

impl CalendarGrid {
  /// Zero-based month this grid displays.
  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn cells(&self) -> &[DayCell] {
    &self.cells
  }

  /// Rows of seven cells, Sunday first.
  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[DayCell]>
  {
    self.cells.chunks(GRID_COLUMNS)
  }

  pub fn today_index(
    &self
  ) -> Option<usize> {
    self
      .cells
      .iter()
      .position(|cell| cell.is_today)
  }

  pub fn title(&self) -> String {
    format!(
      "{} {}",
      month_name(self.month),
      self.year
    )
  }
}

/// Builds the fixed-size month grid for
/// a zero-based `month`.
///
/// Leading cells carry the tail of the
/// previous month, trailing cells count
/// up from 1 into the next month.
#[tracing::instrument(level = "trace")]
pub fn build_grid(
  month: u32,
  year: i32,
  today: NaiveDate
) -> Result<CalendarGrid, DashError> {
  if month > 11 {
    return Err(DashError::invalid(
      format!(
        "month must be within 0..=11, \
         got {month}"
      )
    ));
  }

  let month1 = month + 1;
  let first =
    first_day_of_month(year, month1)
      .ok_or_else(|| {
        DashError::invalid(format!(
          "unrepresentable month \
           {year}-{month1:02}"
        ))
      })?;
  let days_in_current =
    days_in_month(year, month1)
      .ok_or_else(|| {
        DashError::invalid(format!(
          "unrepresentable month end \
           {year}-{month1:02}"
        ))
      })?;
  let (prev_month, prev_year) =
    shift_month(month, year, -1);
  let days_in_prev = days_in_month(
    prev_year,
    prev_month + 1
  )
  .ok_or_else(|| {
    DashError::invalid(format!(
      "unrepresentable previous month \
       for {year}-{month1:02}"
    ))
  })?;

  let first_weekday = first
    .weekday()
    .num_days_from_sunday();

  let mut cells =
    Vec::with_capacity(GRID_CELLS);

  for day in (days_in_prev
    - first_weekday
    + 1)
    ..=days_in_prev
  {
    cells.push(DayCell::filler(
      day,
      MonthRelation::Previous
    ));
  }

  for day in 1..=days_in_current {
    let is_today = today.year() == year
      && today.month() == month1
      && today.day() == day;
    cells.push(DayCell {
      day_number: day,
      month_relation:
        MonthRelation::Current,
      is_today
    });
  }

  let mut next_day = 1;
  while cells.len() < GRID_CELLS {
    cells.push(DayCell::filler(
      next_day,
      MonthRelation::Next
    ));
    next_day += 1;
  }

  trace!(
    year,
    month,
    first_weekday,
    days_in_current,
    days_in_prev,
    "built calendar grid"
  );

  Ok(CalendarGrid {
    month,
    year,
    cells
  })
}

/// Parses the `YYYY-MM-DD` form used
/// for an explicit reference day.
pub fn parse_calendar_date(
  raw: &str
) -> Result<NaiveDate, DashError> {
  NaiveDate::parse_from_str(
    raw.trim(),
    "%Y-%m-%d"
  )
  .map_err(|err| {
    DashError::invalid(format!(
      "malformed date {raw:?}: {err}"
    ))
  })
}

/// Moves a zero-based month by `step`
/// months, carrying into the year.
pub fn shift_month(
  month: u32,
  year: i32,
  step: i32
) -> (u32, i32) {
  let total = i64::from(year) * 12
    + i64::from(month)
    + i64::from(step);
  let new_year = total.div_euclid(12);
  let new_month =
    total.rem_euclid(12) as u32;
  let new_year = i32::try_from(new_year)
    .unwrap_or(if step < 0 {
      i32::MIN
    } else {
      i32::MAX
    });
  (new_month, new_year)
}

pub fn month_name(
  month: u32
) -> &'static str {
  MONTH_NAMES
    .get(month as usize)
    .copied()
    .unwrap_or("Unknown")
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> Option<NaiveDate> {
  let (next_year, next_month) =
    if month >= 12 {
      (year.checked_add(1)?, 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(
    next_year, next_month
  )?
  .checked_sub_signed(Duration::days(
    1
  ))
}

/// Number of days in a one-based month.
pub fn days_in_month(
  year: i32,
  month: u32
) -> Option<u32> {
  last_day_of_month(year, month)
    .map(|date| date.day())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn date(
    year: i32,
    month: u32,
    day: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .expect("valid date")
  }

  #[test]
  fn february_2024_marks_the_fifteenth()
  {
    let grid =
      build_grid(1, 2024, date(2024, 2, 15))
        .expect("valid grid");

    assert_eq!(
      grid.cells().len(),
      GRID_CELLS
    );
    // 2024-02-01 is a Thursday.
    let leading = grid
      .cells()
      .iter()
      .take_while(|cell| {
        cell.month_relation
          == MonthRelation::Previous
      })
      .count();
    assert_eq!(leading, 4);

    let idx = grid
      .today_index()
      .expect("today present");
    let cell = grid.cells()[idx];
    assert_eq!(cell.day_number, 15);
    assert_eq!(
      cell.month_relation,
      MonthRelation::Current
    );
    assert_eq!(idx, leading + 14);

    let current = grid
      .cells()
      .iter()
      .filter(|cell| !cell.is_filler())
      .count();
    assert_eq!(current, 29);
  }

  #[test]
  fn every_month_fills_the_grid() {
    let today = date(2026, 10, 14);
    for year in [1999, 2000, 2023, 2024, 2100]
    {
      for month in 0..12 {
        let grid =
          build_grid(month, year, today)
            .expect("valid grid");
        assert_eq!(
          grid.cells().len(),
          GRID_CELLS,
          "{year}-{month}"
        );
        assert_eq!(grid.weeks().count(), 6);
      }
    }
  }

  #[test]
  fn previous_filler_counts_up_to_month_end()
  {
    // March 2026 starts on a Sunday,
    // April 2026 on a Wednesday.
    let today = date(2026, 10, 14);
    let march =
      build_grid(2, 2026, today)
        .expect("valid grid");
    assert_eq!(
      march.cells()[0],
      DayCell {
        day_number:     1,
        month_relation:
          MonthRelation::Current,
        is_today:       false
      }
    );

    let april =
      build_grid(3, 2026, today)
        .expect("valid grid");
    let prev: Vec<u32> = april
      .cells()
      .iter()
      .filter(|cell| {
        cell.month_relation
          == MonthRelation::Previous
      })
      .map(|cell| cell.day_number)
      .collect();
    assert_eq!(prev, vec![29, 30, 31]);
  }

  #[test]
  fn january_rolls_back_to_december() {
    // 2025-01-01 is a Wednesday.
    let grid = build_grid(
      0,
      2025,
      date(2026, 10, 14)
    )
    .expect("valid grid");
    let prev: Vec<u32> = grid
      .cells()
      .iter()
      .take(3)
      .map(|cell| cell.day_number)
      .collect();
    assert_eq!(prev, vec![29, 30, 31]);
    assert!(grid.cells()[..3].iter().all(
      |cell| cell.month_relation
        == MonthRelation::Previous
    ));
  }

  #[test]
  fn current_days_are_contiguous() {
    let grid = build_grid(
      8,
      2026,
      date(2026, 10, 14)
    )
    .expect("valid grid");
    let days: Vec<u32> = grid
      .cells()
      .iter()
      .filter(|cell| !cell.is_filler())
      .map(|cell| cell.day_number)
      .collect();
    assert_eq!(
      days,
      (1..=30).collect::<Vec<_>>()
    );
  }

  #[test]
  fn next_filler_is_numbered_from_one() {
    let grid = build_grid(
      1,
      2024,
      date(2024, 2, 15)
    )
    .expect("valid grid");
    let next: Vec<u32> = grid
      .cells()
      .iter()
      .filter(|cell| {
        cell.month_relation
          == MonthRelation::Next
      })
      .map(|cell| cell.day_number)
      .collect();
    // 4 leading + 29 current.
    assert_eq!(
      next,
      (1..=9).collect::<Vec<_>>()
    );
  }

  #[test]
  fn today_outside_the_month_marks_nothing()
  {
    let grid = build_grid(
      1,
      2024,
      date(2024, 3, 1)
    )
    .expect("valid grid");
    assert_eq!(grid.today_index(), None);

    let other_year = build_grid(
      1,
      2023,
      date(2024, 2, 15)
    )
    .expect("valid grid");
    assert_eq!(
      other_year.today_index(),
      None
    );
  }

  #[test]
  fn every_day_marks_exactly_one_cell() {
    for year in [2023, 2024] {
      let mut day = date(year, 1, 1);
      while day.year() == year {
        let grid = build_grid(
          day.month0(),
          year,
          day
        )
        .expect("valid grid");
        let marked = grid
          .cells()
          .iter()
          .filter(|c| c.is_today)
          .count();
        assert_eq!(marked, 1, "{day}");

        let (next_month, next_year) =
          shift_month(day.month0(), year, 1);
        let next = build_grid(
          next_month,
          next_year,
          day
        )
        .expect("valid grid");
        assert!(
          next
            .cells()
            .iter()
            .all(|c| !c.is_today),
          "{day}"
        );

        day = day
          .succ_opt()
          .expect("next day");
      }
    }
  }

  #[test]
  fn rejects_out_of_range_month() {
    let err = build_grid(
      12,
      2024,
      date(2024, 2, 15)
    )
    .expect_err("month 12 is invalid");
    assert!(matches!(
      err,
      DashError::InvalidArgument(_)
    ));
  }

  #[test]
  fn rejects_unrepresentable_year() {
    let err = build_grid(
      0,
      i32::MAX,
      date(2024, 2, 15)
    )
    .expect_err("year out of range");
    assert!(matches!(
      err,
      DashError::InvalidArgument(_)
    ));
  }

  #[test]
  fn parses_reference_dates() {
    assert_eq!(
      parse_calendar_date("2024-02-15")
        .expect("valid date"),
      date(2024, 2, 15)
    );
    assert!(matches!(
      parse_calendar_date("2024-02-30"),
      Err(DashError::InvalidArgument(_))
    ));
    assert!(
      parse_calendar_date("yesterday-ish")
        .is_err()
    );
  }

  #[test]
  fn shift_month_carries_years() {
    assert_eq!(
      shift_month(0, 2025, -1),
      (11, 2024)
    );
    assert_eq!(
      shift_month(11, 2025, 1),
      (0, 2026)
    );
    assert_eq!(
      shift_month(5, 2025, -30),
      (11, 2022)
    );
    assert_eq!(
      shift_month(5, 2025, 0),
      (5, 2025)
    );
  }

  #[test]
  fn month_lengths_follow_leap_years() {
    assert_eq!(days_in_month(2024, 2), Some(29));
    assert_eq!(days_in_month(2023, 2), Some(28));
    assert_eq!(days_in_month(1900, 2), Some(28));
    assert_eq!(days_in_month(2000, 2), Some(29));
    assert_eq!(days_in_month(2025, 12), Some(31));
  }

  #[test]
  fn grid_title_names_the_month() {
    let grid = build_grid(
      1,
      2024,
      date(2024, 2, 15)
    )
    .expect("valid grid");
    assert_eq!(grid.title(), "February 2024");
  }
}
