use std::str::FromStr;

use tracing::trace;

use crate::booking::{
  BookingRecord,
  BookingStatus
};
use crate::datetime::CalendarDay;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum StatusFilter {
  All,
  Only(BookingStatus)
}

impl Default for StatusFilter {
  fn default() -> Self {
    StatusFilter::Only(
      BookingStatus::Pending
    )
  }
}

impl StatusFilter {
  #[must_use]
  pub fn matches(
    self,
    status: BookingStatus
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Only(wanted) => {
        wanted == status
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(StatusFilter::All);
    }
    s.parse::<BookingStatus>()
      .map(StatusFilter::Only)
  }
}

/// Narrows the request queue by free
/// text, status and booking day.
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
  pub search: Option<String>,
  pub status: StatusFilter,
  pub date:   Option<CalendarDay>
}

impl QueueFilter {
  #[must_use]
  pub fn matches(
    &self,
    record: &BookingRecord
  ) -> bool {
    let matched = self
      .matches_search(record)
      && self.status.matches(record.status)
      && self.date.is_none_or(|day| {
        record.day() == Some(day)
      });
    trace!(id = %record.id, matched, "queue filter");
    matched
  }

  fn matches_search(
    &self,
    record: &BookingRecord
  ) -> bool {
    let Some(term) = self
      .search
      .as_deref()
      .map(str::trim)
      .filter(|term| !term.is_empty())
    else {
      return true;
    };
    let needle = term.to_lowercase();
    record
      .customer_name
      .to_lowercase()
      .contains(&needle)
      || record
        .email
        .to_lowercase()
        .contains(&needle)
      || record.phone_number.contains(term)
  }

  /// Matching records ordered by day,
  /// then slot, then request time.
  /// Unreadable dates sort last.
  #[must_use]
  pub fn apply<'a>(
    &self,
    records: &'a [BookingRecord]
  ) -> Vec<&'a BookingRecord> {
    let mut out: Vec<&BookingRecord> =
      records
        .iter()
        .filter(|record| self.matches(record))
        .collect();
    out.sort_by_key(|record| {
      (
        record.day().is_none(),
        record.day(),
        record.slot_hour(),
        record.created_at
      )
    });
    out
  }
}

/// Per-status counts, as shown on the
/// dashboard tiles.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub struct StatusSummary {
  pub pending:  usize,
  pub approved: usize,
  pub rejected: usize
}

impl StatusSummary {
  #[must_use]
  pub fn total(&self) -> usize {
    self.pending + self.approved + self.rejected
  }

  #[must_use]
  pub fn count(
    &self,
    status: BookingStatus
  ) -> usize {
    match status {
      | BookingStatus::Pending => {
        self.pending
      }
      | BookingStatus::Approved => {
        self.approved
      }
      | BookingStatus::Rejected => {
        self.rejected
      }
    }
  }
}

/// Counts records, optionally only those
/// dated on `day`.
#[must_use]
pub fn summarize(
  records: &[BookingRecord],
  day: Option<CalendarDay>
) -> StatusSummary {
  let mut summary = StatusSummary::default();
  for record in records.iter().filter(|record| {
    day.is_none_or(|day| record.day() == Some(day))
  }) {
    match record.status {
      | BookingStatus::Pending => {
        summary.pending += 1
      }
      | BookingStatus::Approved => {
        summary.approved += 1
      }
      | BookingStatus::Rejected => {
        summary.rejected += 1
      }
    }
  }
  summary
}
