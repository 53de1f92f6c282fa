use std::fmt;

use thiserror::Error;

use crate::booking::{
  BookingRecord,
  BookingStatus
};
use crate::datetime::CalendarDay;
use crate::index::BookingIndex;
use crate::slot::{
  OperatingHours,
  SlotLabel
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum SlotStatus {
  Available,
  Pending,
  Booked
}

impl SlotStatus {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | SlotStatus::Available => {
        "available"
      }
      | SlotStatus::Pending => "pending",
      | SlotStatus::Booked => "booked"
    }
  }
}

impl fmt::Display for SlotStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
  #[error("{0} is in the past")]
  PastDay(CalendarDay),

  #[error("{slot} on {day} is {status}")]
  SlotUnavailable {
    day:    CalendarDay,
    slot:   SlotLabel,
    status: SlotStatus
  },

  #[error(
    "{slot} is outside operating hours"
  )]
  OutsideHours { slot: SlotLabel }
}

/// Approved bookings block a slot,
/// pending ones hold it, rejected ones
/// release it.
#[must_use]
pub fn classify(
  index: &BookingIndex,
  day: CalendarDay,
  slot: &SlotLabel
) -> SlotStatus {
  match index.status_at(day, slot.hour()) {
    | Some(BookingStatus::Approved) => {
      SlotStatus::Booked
    }
    | Some(BookingStatus::Pending) => {
      SlotStatus::Pending
    }
    | Some(BookingStatus::Rejected)
    | None => SlotStatus::Available
  }
}

/// True when any record is dated on
/// `day`, whatever its status. Drives the
/// calendar dot markers only.
#[must_use]
pub fn has_booking_on_day(
  day: CalendarDay,
  records: &[BookingRecord]
) -> bool {
  records
    .iter()
    .any(|record| record.day() == Some(day))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAvailability {
  pub slot:   SlotLabel,
  pub status: SlotStatus
}

/// Every generated slot of `day` with
/// its status, in hour order.
#[must_use]
pub fn day_schedule(
  index: &BookingIndex,
  day: CalendarDay,
  hours: &OperatingHours
) -> Vec<SlotAvailability> {
  hours
    .slots()
    .into_iter()
    .map(|slot| {
      let status =
        classify(index, day, &slot);
      SlotAvailability { slot, status }
    })
    .collect()
}

/// Checks that `slot` on `day` may be
/// taken by a new booking.
pub fn choose_slot(
  index: &BookingIndex,
  hours: &OperatingHours,
  day: CalendarDay,
  slot: &SlotLabel,
  today: CalendarDay
) -> Result<(), SelectionError> {
  if day < today {
    return Err(SelectionError::PastDay(
      day
    ));
  }
  if !hours.contains(slot.hour()) {
    return Err(
      SelectionError::OutsideHours {
        slot: slot.clone()
      }
    );
  }
  match classify(index, day, slot) {
    | SlotStatus::Available => Ok(()),
    | status => {
      Err(SelectionError::SlotUnavailable {
        day,
        slot: slot.clone(),
        status
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{
    SelectionError,
    SlotStatus,
    choose_slot,
    classify,
    day_schedule,
    has_booking_on_day
  };
  use crate::booking::{
    BookingRecord,
    BookingStatus
  };
  use crate::datetime::CalendarDay;
  use crate::index::BookingIndex;
  use crate::slot::{
    OperatingHours,
    SlotLabel
  };

  fn record(
    id: &str,
    date: &str,
    slot: &str,
    status: BookingStatus
  ) -> BookingRecord {
    BookingRecord {
      id:            id.to_string(),
      customer_name: "Andi".to_string(),
      email:         String::new(),
      phone_number:  String::new(),
      booking_date:  Some(date.to_string()),
      time_slot:     Some(slot.to_string()),
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

  fn slot(raw: &str) -> SlotLabel {
    SlotLabel::parse(raw).expect("slot")
  }

  #[test]
  fn approved_booking_blocks_only_its_slot(
  ) {
    let records = vec![record(
      "1",
      "2024-06-15",
      "14:00",
      BookingStatus::Approved
    )];
    let index = BookingIndex::build(&records);
    let schedule = day_schedule(
      &index,
      june(15),
      &OperatingHours::default()
    );
    assert_eq!(schedule.len(), 17);
    assert_eq!(
      classify(
        &index,
        june(15),
        &slot("2:00 PM - 3:00 PM")
      ),
      SlotStatus::Booked
    );
    let available = schedule
      .iter()
      .filter(|entry| {
        entry.status == SlotStatus::Available
      })
      .count();
    assert_eq!(available, 16);
    assert!(has_booking_on_day(
      june(15),
      &records
    ));
    assert!(!has_booking_on_day(
      june(16),
      &records
    ));
  }

  #[test]
  fn rejection_frees_the_slot_but_keeps_the_marker(
  ) {
    let records = vec![record(
      "1",
      "2024-06-15",
      "14:00",
      BookingStatus::Rejected
    )];
    let index = BookingIndex::build(&records);
    assert_eq!(
      classify(
        &index,
        june(15),
        &slot("2:00 PM - 3:00 PM")
      ),
      SlotStatus::Available
    );
    assert!(has_booking_on_day(
      june(15),
      &records
    ));
  }

  #[test]
  fn approved_dominates_whatever_else_shares_the_slot(
  ) {
    let statuses = [
      BookingStatus::Pending,
      BookingStatus::Approved,
      BookingStatus::Rejected
    ];
    for first in statuses {
      for second in statuses {
        let records = vec![
          record("a", "2024-06-15", "18:00", first),
          record(
            "b",
            "2024-06-15",
            "6:00 PM - 7:00 PM",
            second
          ),
        ];
        let index =
          BookingIndex::build(&records);
        let status = classify(
          &index,
          june(15),
          &slot("18:00")
        );
        if first == BookingStatus::Approved
          || second
            == BookingStatus::Approved
        {
          assert_eq!(
            status,
            SlotStatus::Booked
          );
        } else if first
          == BookingStatus::Pending
          || second
            == BookingStatus::Pending
        {
          assert_eq!(
            status,
            SlotStatus::Pending
          );
        } else {
          assert_eq!(
            status,
            SlotStatus::Available
          );
        }
      }
    }
  }

  #[test]
  fn empty_feed_leaves_everything_available(
  ) {
    let index = BookingIndex::build(&[]);
    assert!(
      day_schedule(
        &index,
        june(15),
        &OperatingHours::default()
      )
      .iter()
      .all(|entry| {
        entry.status == SlotStatus::Available
      })
    );
    assert!(!has_booking_on_day(june(15), &[]));
  }

  #[test]
  fn choosing_requires_an_open_future_slot() {
    let records = vec![record(
      "1",
      "2024-06-15",
      "09:00",
      BookingStatus::Pending
    )];
    let index = BookingIndex::build(&records);
    let hours = OperatingHours::default();
    let today = june(14);

    assert_eq!(
      choose_slot(
        &index,
        &hours,
        june(15),
        &slot("09:00"),
        today
      ),
      Err(SelectionError::SlotUnavailable {
        day:    june(15),
        slot:   slot("09:00"),
        status: SlotStatus::Pending
      })
    );
    assert_eq!(
      choose_slot(
        &index,
        &hours,
        june(13),
        &slot("10:00"),
        today
      ),
      Err(SelectionError::PastDay(june(13)))
    );
    assert!(matches!(
      choose_slot(
        &index,
        &hours,
        june(15),
        &slot("23:00"),
        today
      ),
      Err(SelectionError::OutsideHours { .. })
    ));
    assert_eq!(
      choose_slot(
        &index,
        &hours,
        june(15),
        &slot("10:00"),
        today
      ),
      Ok(())
    );
  }
}
