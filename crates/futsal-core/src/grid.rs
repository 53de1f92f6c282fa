use std::collections::{
  BTreeSet,
  HashMap
};

use chrono::Weekday;
use thiserror::Error;
use tracing::warn;

use crate::availability::SelectionError;
use crate::booking::BookingRecord;
use crate::datetime::{
  CalendarDay,
  days_in_month,
  first_day_of_month,
  shift_months,
  start_of_week
};
use crate::slot::{
  OperatingHours,
  SlotLabel
};

/// Six weeks of seven days, so the grid
/// never reshapes between months.
pub const GRID_CELLS: usize = 42;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum WeekStart {
  #[default]
  Sunday,
  Monday
}

impl WeekStart {
  #[must_use]
  pub fn parse(raw: &str) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "sunday" | "sun" => {
        Some(WeekStart::Sunday)
      }
      | "monday" | "mon" => {
        Some(WeekStart::Monday)
      }
      | _ => None
    }
  }

  #[must_use]
  pub fn weekday(self) -> Weekday {
    match self {
      | WeekStart::Sunday => Weekday::Sun,
      | WeekStart::Monday => Weekday::Mon
    }
  }

  #[must_use]
  pub fn labels(self) -> [&'static str; 7] {
    match self {
      | WeekStart::Sunday => {
        ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"]
      }
      | WeekStart::Monday => {
        ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"]
      }
    }
  }

  fn leading_blanks(
    self,
    first: Weekday
  ) -> usize {
    match self {
      | WeekStart::Sunday => {
        first.num_days_from_sunday()
          as usize
      }
      | WeekStart::Monday => {
        first.num_days_from_monday()
          as usize
      }
    }
  }
}

/// One square of the month grid.
/// `day_number == None` marks padding
/// that belongs to a neighbouring month.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct CalendarCell {
  pub day_number:  Option<u32>,
  pub date:        Option<CalendarDay>,
  pub is_today:    bool,
  pub is_selected: bool,
  pub is_past:     bool,
  pub has_booking: bool
}

impl CalendarCell {
  fn blank() -> Self {
    Self::default()
  }

  /// Padding and past days cannot be
  /// picked.
  #[must_use]
  pub fn is_selectable(&self) -> bool {
    self.date.is_some() && !self.is_past
  }
}

/// Sunday-first month grid of
/// [`GRID_CELLS`] cells.
#[must_use]
pub fn build_month_grid(
  year: i32,
  month: u32,
  today: CalendarDay,
  selected: Option<CalendarDay>,
  records: &[BookingRecord]
) -> Vec<CalendarCell> {
  build_month_grid_with(
    WeekStart::Sunday,
    year,
    month,
    today,
    selected,
    records
  )
}

#[must_use]
pub fn build_month_grid_with(
  week_start: WeekStart,
  year: i32,
  month: u32,
  today: CalendarDay,
  selected: Option<CalendarDay>,
  records: &[BookingRecord]
) -> Vec<CalendarCell> {
  let marked: BTreeSet<CalendarDay> =
    records
      .iter()
      .filter_map(BookingRecord::day)
      .collect();

  let Some(first) =
    first_day_of_month(year, month)
  else {
    warn!(
      year,
      month,
      "month out of range; rendering blank grid"
    );
    return vec![
      CalendarCell::blank();
      GRID_CELLS
    ];
  };

  let leading =
    week_start.leading_blanks(
      first.weekday()
    );
  let mut cells: Vec<CalendarCell> = (0
    ..leading)
    .map(|_| CalendarCell::blank())
    .collect();

  for day_number in
    1..=days_in_month(year, month)
  {
    let Some(date) = CalendarDay::from_ymd(
      year, month, day_number
    ) else {
      continue;
    };
    cells.push(CalendarCell {
      day_number:  Some(day_number),
      date:        Some(date),
      is_today:    date == today,
      is_selected: selected == Some(date),
      is_past:     date < today,
      has_booking: marked.contains(&date)
    });
  }

  cells.resize(
    GRID_CELLS,
    CalendarCell::blank()
  );
  cells
}

type Placed<'a> = HashMap<
  (CalendarDay, u32),
  Vec<&'a BookingRecord>
>;

fn place_records(
  records: &[BookingRecord]
) -> Placed<'_> {
  let mut placed: Placed<'_> =
    HashMap::new();
  for record in records {
    if let Ok(cell) = record.placement() {
      placed
        .entry(cell)
        .or_default()
        .push(record);
    }
  }
  placed
}

#[derive(Debug, Clone)]
pub struct WeekRow<'a> {
  pub slot:  SlotLabel,
  /// One entry per day of the week.
  pub cells: Vec<Vec<&'a BookingRecord>>
}

#[derive(Debug, Clone)]
pub struct WeekGrid<'a> {
  pub days: Vec<CalendarDay>,
  pub rows: Vec<WeekRow<'a>>
}

/// Seven days starting at the week that
/// contains `focus`, one row per slot.
#[must_use]
pub fn build_week_grid<'a>(
  focus: CalendarDay,
  week_start: WeekStart,
  hours: &OperatingHours,
  records: &'a [BookingRecord]
) -> WeekGrid<'a> {
  let first =
    start_of_week(focus, week_start.weekday());
  let days: Vec<CalendarDay> = (0_i64..7)
    .map(|offset| first.add_days(offset))
    .collect();
  let mut placed = place_records(records);

  let rows = hours
    .slots()
    .into_iter()
    .map(|slot| {
      let cells = days
        .iter()
        .map(|day| {
          placed
            .remove(&(*day, slot.hour()))
            .unwrap_or_default()
        })
        .collect();
      WeekRow { slot, cells }
    })
    .collect();

  WeekGrid { days, rows }
}

#[derive(Debug, Clone)]
pub struct DayRow<'a> {
  pub slot:     SlotLabel,
  pub bookings: Vec<&'a BookingRecord>
}

#[derive(Debug, Clone)]
pub struct DayView<'a> {
  pub day:           CalendarDay,
  pub rows:          Vec<DayRow<'a>>,
  /// Records dated on this day that fall
  /// outside the slot rows.
  pub outside_hours: Vec<&'a BookingRecord>
}

#[must_use]
pub fn build_day_view<'a>(
  day: CalendarDay,
  hours: &OperatingHours,
  records: &'a [BookingRecord]
) -> DayView<'a> {
  let mut placed = place_records(records);

  let rows = hours
    .slots()
    .into_iter()
    .map(|slot| {
      let bookings = placed
        .remove(&(day, slot.hour()))
        .unwrap_or_default();
      DayRow { slot, bookings }
    })
    .collect();

  let outside_hours = records
    .iter()
    .filter(|record| {
      record.day() == Some(day)
        && !record
          .slot_hour()
          .is_some_and(|hour| {
            hours.contains(hour)
          })
    })
    .collect();

  DayView {
    day,
    rows,
    outside_hours
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum CalendarView {
  #[default]
  Month,
  Week,
  Day
}

impl CalendarView {
  #[must_use]
  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "month" => Some(Self::Month),
      | "week" => Some(Self::Week),
      | "day" => Some(Self::Day),
      | _ => None
    }
  }

  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
  "cannot move the {} view by {step}",
  view.as_key()
)]
pub struct NavigationError {
  pub step: i64,
  pub view: CalendarView
}

/// What the calendar is showing and which
/// day is picked. Past days can never
/// become the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCursor {
  focus:    CalendarDay,
  selected: CalendarDay,
  view:     CalendarView
}

impl CalendarCursor {
  #[must_use]
  pub fn new(today: CalendarDay) -> Self {
    Self {
      focus:    today,
      selected: today,
      view:     CalendarView::Month
    }
  }

  #[must_use]
  pub fn focus(&self) -> CalendarDay {
    self.focus
  }

  #[must_use]
  pub fn selected(&self) -> CalendarDay {
    self.selected
  }

  #[must_use]
  pub fn view(&self) -> CalendarView {
    self.view
  }

  pub fn set_view(
    &mut self,
    view: CalendarView
  ) {
    self.view = view;
  }

  /// Points the view at `day` without
  /// touching the selection.
  pub fn set_focus(
    &mut self,
    day: CalendarDay
  ) {
    self.focus = day;
  }

  #[must_use]
  pub fn displayed_month(
    &self
  ) -> (i32, u32) {
    (self.focus.year(), self.focus.month())
  }

  /// Moves by `step` months, weeks or days
  /// depending on the view. The focus is
  /// left alone when the target date does
  /// not exist.
  pub fn navigate(
    &mut self,
    step: i64
  ) -> Result<(), NavigationError> {
    let target = match self.view {
      | CalendarView::Month => {
        shift_months(self.focus, step)
      }
      | CalendarView::Week => {
        step.checked_mul(7).and_then(
          |days| {
            self.focus.checked_add_days(days)
          }
        )
      }
      | CalendarView::Day => {
        self.focus.checked_add_days(step)
      }
    };
    self.focus = target.ok_or(
      NavigationError {
        step,
        view: self.view
      }
    )?;
    Ok(())
  }

  pub fn go_to_today(
    &mut self,
    today: CalendarDay
  ) {
    self.focus = today;
  }

  pub fn select(
    &mut self,
    day: CalendarDay,
    today: CalendarDay
  ) -> Result<(), SelectionError> {
    if day < today {
      return Err(SelectionError::PastDay(
        day
      ));
    }
    self.selected = day;
    Ok(())
  }

  #[must_use]
  pub fn month_grid(
    &self,
    week_start: WeekStart,
    today: CalendarDay,
    records: &[BookingRecord]
  ) -> Vec<CalendarCell> {
    let (year, month) =
      self.displayed_month();
    build_month_grid_with(
      week_start,
      year,
      month,
      today,
      Some(self.selected),
      records
    )
  }

  #[must_use]
  pub fn title(
    &self,
    week_start: WeekStart
  ) -> String {
    let focus = self.focus.naive();
    match self.view {
      | CalendarView::Month => {
        focus.format("%B %Y").to_string()
      }
      | CalendarView::Week => {
        let first = start_of_week(
          self.focus,
          week_start.weekday()
        );
        let last = first.add_days(6);
        format!(
          "{} - {}",
          first.naive().format("%b %-d"),
          last.naive().format("%b %-d, %Y")
        )
      }
      | CalendarView::Day => {
        focus
          .format("%A, %B %-d, %Y")
          .to_string()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{
    CalendarCursor,
    CalendarView,
    GRID_CELLS,
    WeekStart,
    build_day_view,
    build_month_grid,
    build_month_grid_with,
    build_week_grid
  };
  use crate::availability::SelectionError;
  use crate::booking::{
    BookingRecord,
    BookingStatus
  };
  use crate::datetime::{
    CalendarDay,
    days_in_month
  };
  use crate::slot::OperatingHours;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> CalendarDay {
    CalendarDay::from_ymd(y, m, d)
      .expect("valid day")
  }

  fn record(
    date: &str,
    slot: &str
  ) -> BookingRecord {
    BookingRecord {
      id:            format!("{date}-{slot}"),
      customer_name: "Rizky Pratama"
        .to_string(),
      email:         String::new(),
      phone_number:  String::new(),
      booking_date:  Some(date.to_string()),
      time_slot:     Some(slot.to_string()),
      status:        BookingStatus::Pending,
      notes:         None,
      created_at:    None,
      is_walk_in:    false,
      players:       None
    }
  }

  #[test]
  fn grids_are_always_forty_two_cells() {
    let today = day(2024, 6, 15);
    for week_start in
      [WeekStart::Sunday, WeekStart::Monday]
    {
      for year in 2023..=2026 {
        for month in 1..=12 {
          let grid = build_month_grid_with(
            week_start,
            year,
            month,
            today,
            None,
            &[]
          );
          assert_eq!(grid.len(), GRID_CELLS);
          let numbered = grid
            .iter()
            .filter(|cell| {
              cell.day_number.is_some()
            })
            .count();
          assert_eq!(
            numbered as u32,
            days_in_month(year, month)
          );
          let today_cells = grid
            .iter()
            .filter(|cell| cell.is_today)
            .count();
          let expected =
            usize::from(year == 2024 && month == 6);
          assert_eq!(today_cells, expected);
        }
      }
    }
  }

  #[test]
  fn leading_blanks_follow_the_first_weekday(
  ) {
    let today = day(2024, 6, 15);
    let sunday_first = build_month_grid(
      2024,
      6,
      today,
      None,
      &[]
    );
    assert_eq!(sunday_first[5].day_number, None);
    assert_eq!(
      sunday_first[6].day_number,
      Some(1)
    );

    let monday_first = build_month_grid_with(
      WeekStart::Monday,
      2024,
      6,
      today,
      None,
      &[]
    );
    assert_eq!(
      monday_first[5].day_number,
      Some(1)
    );
  }

  #[test]
  fn cells_carry_today_selected_past_and_markers(
  ) {
    let today = day(2024, 6, 15);
    let records =
      vec![record("2024-06-20", "14:00")];
    let grid = build_month_grid(
      2024,
      6,
      today,
      Some(day(2024, 6, 18)),
      &records
    );
    let cell = |d: u32| {
      grid
        .iter()
        .find(|cell| cell.day_number == Some(d))
        .expect("day cell")
    };
    assert!(cell(15).is_today);
    assert!(!cell(15).is_past);
    assert!(cell(14).is_past);
    assert!(!cell(14).is_selectable());
    assert!(cell(18).is_selected);
    assert!(cell(20).has_booking);
    assert!(!cell(21).has_booking);
    assert!(!grid[0].is_selectable());
  }

  #[test]
  fn invalid_month_renders_blank_grid() {
    let grid = build_month_grid(
      2024,
      13,
      day(2024, 6, 15),
      None,
      &[]
    );
    assert_eq!(grid.len(), GRID_CELLS);
    assert!(
      grid.iter().all(|cell| cell.date.is_none())
    );
  }

  #[test]
  fn past_days_cannot_be_selected() {
    let today = day(2024, 6, 15);
    let mut cursor = CalendarCursor::new(today);
    cursor
      .select(day(2024, 6, 20), today)
      .expect("future day");
    assert_eq!(
      cursor.select(day(2024, 6, 14), today),
      Err(SelectionError::PastDay(day(
        2024, 6, 14
      )))
    );
    assert_eq!(
      cursor.selected(),
      day(2024, 6, 20)
    );
  }

  #[test]
  fn navigation_shifts_by_view() {
    let today = day(2024, 1, 31);
    let mut cursor = CalendarCursor::new(today);
    cursor.navigate(1).expect("navigate");
    assert_eq!(cursor.focus(), day(2024, 2, 29));
    cursor.navigate(-2).expect("navigate");
    assert_eq!(cursor.focus(), day(2023, 12, 29));
    assert_eq!(cursor.title(WeekStart::Sunday), "December 2023");

    cursor.set_view(CalendarView::Week);
    cursor.navigate(1).expect("navigate");
    assert_eq!(cursor.focus(), day(2024, 1, 5));
    assert_eq!(
      cursor.title(WeekStart::Sunday),
      "Dec 31 - Jan 6, 2024"
    );

    cursor.set_view(CalendarView::Day);
    cursor.navigate(-5).expect("navigate");
    assert_eq!(cursor.focus(), day(2023, 12, 31));
    assert_eq!(
      cursor.title(WeekStart::Sunday),
      "Sunday, December 31, 2023"
    );

    cursor.go_to_today(today);
    assert_eq!(cursor.displayed_month(), (2024, 1));
  }

  #[test]
  fn oversized_steps_leave_the_focus_alone() {
    let today = day(2024, 6, 15);
    let mut cursor = CalendarCursor::new(today);
    for view in [
      CalendarView::Month,
      CalendarView::Week,
      CalendarView::Day
    ] {
      cursor.set_view(view);
      let err = cursor
        .navigate(999_999_999_999_999)
        .expect_err("out of range");
      assert_eq!(err.view, view);
      assert!(cursor.navigate(i64::MIN).is_err());
      assert_eq!(cursor.focus(), today);
    }
  }

  #[test]
  fn week_grid_places_records_by_day_and_hour() {
    let records = vec![
      record("2024-06-12", "2:00 PM - 3:00 PM"),
      record("2024-06-20", "14:00"),
    ];
    let grid = build_week_grid(
      day(2024, 6, 12),
      WeekStart::Sunday,
      &OperatingHours::default(),
      &records
    );
    assert_eq!(grid.days[0], day(2024, 6, 9));
    assert_eq!(grid.rows.len(), 17);
    let row = &grid.rows[8];
    assert_eq!(row.slot.hour(), 14);
    assert_eq!(row.cells[3].len(), 1);
    let total: usize = grid
      .rows
      .iter()
      .flat_map(|row| row.cells.iter())
      .map(Vec::len)
      .sum();
    assert_eq!(total, 1);
  }

  #[test]
  fn day_view_lists_rows_and_stray_records() {
    let records = vec![
      record("2024-06-15", "05:00"),
      record("2024-06-15", "07:00"),
      record("2024-06-15", "whenever"),
      record("2024-06-16", "07:00"),
    ];
    let view = build_day_view(
      day(2024, 6, 15),
      &OperatingHours::default(),
      &records
    );
    assert_eq!(view.rows.len(), 17);
    assert_eq!(view.rows[1].bookings.len(), 1);
    assert_eq!(view.outside_hours.len(), 2);
  }
}
