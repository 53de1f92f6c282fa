use std::collections::{
  BTreeSet,
  HashMap
};

use tracing::{
  debug,
  warn
};

use crate::booking::{
  BookingRecord,
  BookingStatus
};
use crate::datetime::CalendarDay;

/// Lookup from (day, slot start hour) to
/// the strongest status booked there.
///
/// Built from scratch for every record
/// snapshot; never updated in place.
#[derive(Debug, Clone, Default)]
pub struct BookingIndex {
  entries:  HashMap<(CalendarDay, u32), BookingStatus>,
  days:     BTreeSet<CalendarDay>,
  excluded: usize
}

impl BookingIndex {
  /// Records whose date or slot cannot be
  /// read are left out. When two records
  /// share a cell the higher-ranked status
  /// wins; equal ranks keep the later
  /// record.
  #[tracing::instrument(
    skip(records),
    fields(count = records.len())
  )]
  pub fn build(
    records: &[BookingRecord]
  ) -> Self {
    let mut index = Self::default();

    for record in records {
      if let Some(day) = record.day() {
        index.days.insert(day);
      }

      let (day, hour) =
        match record.placement() {
          | Ok(cell) => cell,
          | Err(err) => {
            warn!(
              id = %record.id,
              error = %err,
              "excluding booking from index"
            );
            index.excluded += 1;
            continue;
          }
        };

      match index
        .entries
        .get(&(day, hour))
        .copied()
      {
        | Some(existing)
          if existing.rank()
            > record.status.rank() =>
        {
          debug!(
            id = %record.id,
            day = %day,
            hour,
            kept = %existing,
            dropped = %record.status,
            "slot collision; keeping stronger status"
          );
        }
        | previous => {
          if let Some(previous) = previous {
            debug!(
              id = %record.id,
              day = %day,
              hour,
              replaced = %previous,
              status = %record.status,
              "slot collision; later record wins"
            );
          }
          index.entries.insert(
            (day, hour),
            record.status
          );
        }
      }
    }

    debug!(
      entries = index.entries.len(),
      days = index.days.len(),
      excluded = index.excluded,
      "built booking index"
    );
    index
  }

  #[must_use]
  pub fn status_at(
    &self,
    day: CalendarDay,
    hour: u32
  ) -> Option<BookingStatus> {
    self.entries.get(&(day, hour)).copied()
  }

  /// Any record dated on `day`, whatever
  /// its status or slot.
  #[must_use]
  pub fn has_booking_on(
    &self,
    day: CalendarDay
  ) -> bool {
    self.days.contains(&day)
  }

  #[must_use]
  pub fn days_with_bookings(
    &self
  ) -> &BTreeSet<CalendarDay> {
    &self.days
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Records left out because their date
  /// or slot was unreadable.
  #[must_use]
  pub fn excluded(&self) -> usize {
    self.excluded
  }
}

#[cfg(test)]
mod tests {
  use super::BookingIndex;
  use crate::booking::{
    BookingRecord,
    BookingStatus
  };
  use crate::datetime::CalendarDay;

  fn record(
    id: &str,
    date: Option<&str>,
    slot: Option<&str>,
    status: BookingStatus
  ) -> BookingRecord {
    BookingRecord {
      id:            id.to_string(),
      customer_name: "Test".to_string(),
      email:         String::new(),
      phone_number:  String::new(),
      booking_date:  date.map(str::to_string),
      time_slot:     slot.map(str::to_string),
      status,
      notes:         None,
      created_at:    None,
      is_walk_in:    false,
      players:       None
    }
  }

  fn june(day: u32) -> CalendarDay {
    CalendarDay::from_ymd(2024, 6, day)
      .expect("valid day")
  }

  #[test]
  fn stronger_status_wins_collisions() {
    let records = vec![
      record(
        "a",
        Some("2024-06-15"),
        Some("14:00"),
        BookingStatus::Approved
      ),
      record(
        "b",
        Some("2024-06-15"),
        Some("2:00 PM - 3:00 PM"),
        BookingStatus::Rejected
      ),
      record(
        "c",
        Some("2024-06-15"),
        Some("15:00"),
        BookingStatus::Rejected
      ),
      record(
        "d",
        Some("2024-06-15"),
        Some("15:00"),
        BookingStatus::Pending
      ),
    ];
    let index = BookingIndex::build(&records);
    assert_eq!(
      index.status_at(june(15), 14),
      Some(BookingStatus::Approved)
    );
    assert_eq!(
      index.status_at(june(15), 15),
      Some(BookingStatus::Pending)
    );
    assert_eq!(index.len(), 2);
  }

  #[test]
  fn equal_ranks_keep_the_later_record() {
    let records = vec![
      record(
        "a",
        Some("2024-06-15"),
        Some("09:00"),
        BookingStatus::Pending
      ),
      record(
        "b",
        Some("2024-06-15"),
        Some("09:00"),
        BookingStatus::Pending
      ),
    ];
    let index = BookingIndex::build(&records);
    assert_eq!(index.len(), 1);
    assert_eq!(
      index.status_at(june(15), 9),
      Some(BookingStatus::Pending)
    );
  }

  #[test]
  fn corrupt_records_are_excluded_not_fatal()
  {
    let records = vec![
      record(
        "bad-date",
        Some("15/06/2024"),
        Some("10:00"),
        BookingStatus::Approved
      ),
      record(
        "no-slot",
        Some("2024-06-16"),
        None,
        BookingStatus::Approved
      ),
      record(
        "ok",
        Some("2024-06-15"),
        Some("10:00"),
        BookingStatus::Approved
      ),
    ];
    let index = BookingIndex::build(&records);
    assert_eq!(index.excluded(), 2);
    assert_eq!(
      index.status_at(june(15), 10),
      Some(BookingStatus::Approved)
    );
    assert!(index.has_booking_on(june(16)));
    assert_eq!(
      index.status_at(june(16), 10),
      None
    );
  }

  #[test]
  fn rebuilding_is_idempotent() {
    let records = vec![
      record(
        "a",
        Some("2024-06-15"),
        Some("08:00"),
        BookingStatus::Pending
      ),
      record(
        "b",
        Some("2024-06-17"),
        Some("21:00"),
        BookingStatus::Approved
      ),
    ];
    let first = BookingIndex::build(&records);
    let second =
      BookingIndex::build(&records);
    for day in 14..=18 {
      for hour in 0..24 {
        assert_eq!(
          first.status_at(june(day), hour),
          second.status_at(june(day), hour)
        );
      }
    }
    assert_eq!(
      first.days_with_bookings(),
      second.days_with_bookings()
    );
  }

  #[test]
  fn empty_feed_builds_empty_index() {
    let index = BookingIndex::build(&[]);
    assert!(index.is_empty());
    assert!(!index.has_booking_on(june(15)));
  }
}
