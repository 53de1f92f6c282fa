use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::datetime::{
  hour_of_slot,
  parse_clock_time
};

pub const DEFAULT_OPENING_HOUR: u32 = 6;
pub const DEFAULT_CLOSING_HOUR: u32 = 23;

const HOURS_PER_DAY: u32 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HoursError {
  #[error(
    "opening hour {opening} must be \
     before closing hour {closing} \
     (0-24)"
  )]
  InvalidRange {
    opening: u32,
    closing: u32
  },

  #[error("invalid time of day: {0:?}")]
  InvalidTime(String),

  #[error(
    "{0:?} is not on the hour; slots \
     start at HH:00"
  )]
  NotOnTheHour(String)
}

/// Facility opening and closing hour
/// boundaries, `0 <= opening < closing
/// <= 24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
  opening_hour: u32,
  closing_hour: u32
}

impl Default for OperatingHours {
  fn default() -> Self {
    Self {
      opening_hour: DEFAULT_OPENING_HOUR,
      closing_hour: DEFAULT_CLOSING_HOUR
    }
  }
}

impl OperatingHours {
  pub fn new(
    opening_hour: u32,
    closing_hour: u32
  ) -> Result<Self, HoursError> {
    if opening_hour >= closing_hour
      || closing_hour > HOURS_PER_DAY
    {
      return Err(
        HoursError::InvalidRange {
          opening: opening_hour,
          closing: closing_hour
        }
      );
    }
    Ok(Self {
      opening_hour,
      closing_hour
    })
  }

  /// Parses `"HH:00"` settings strings.
  /// Times that are not on the hour are
  /// refused.
  pub fn parse(
    opening: &str,
    closing: &str
  ) -> Result<Self, HoursError> {
    let opening_hour =
      whole_hour(opening)?;
    let closing_hour =
      whole_hour(closing)?;
    Self::new(opening_hour, closing_hour)
  }

  /// Like [`OperatingHours::parse`] but
  /// falls back to the default 06:00 -
  /// 23:00 window when the settings are
  /// unusable.
  #[must_use]
  pub fn from_settings(
    opening: &str,
    closing: &str
  ) -> Self {
    let parsed = match Self::parse(
      opening, closing
    ) {
      | Err(HoursError::NotOnTheHour(raw)) => {
        warn!(
          time = %raw,
          "operating hours not on the hour; dropping minutes"
        );
        read_boundary(opening)
          .and_then(|(open, _)| {
            read_boundary(closing)
              .map(|(close, _)| (open, close))
          })
          .and_then(|(open, close)| {
            Self::new(open, close)
          })
      }
      | other => other
    };
    match parsed {
      | Ok(hours) => hours,
      | Err(err) => {
        warn!(
          opening,
          closing,
          error = %err,
          "unusable operating hours; using defaults"
        );
        Self::default()
      }
    }
  }

  #[must_use]
  pub fn opening_hour(&self) -> u32 {
    self.opening_hour
  }

  #[must_use]
  pub fn closing_hour(&self) -> u32 {
    self.closing_hour
  }

  #[must_use]
  pub fn contains(
    &self,
    hour: u32
  ) -> bool {
    (self.opening_hour
      ..self.closing_hour)
      .contains(&hour)
  }

  #[must_use]
  pub fn slots(&self) -> Vec<SlotLabel> {
    generate_slots(
      self.opening_hour,
      self.closing_hour
    )
  }
}

fn read_boundary(
  raw: &str
) -> Result<(u32, u32), HoursError> {
  let trimmed = raw.trim();
  if trimmed == "24:00" {
    return Ok((HOURS_PER_DAY, 0));
  }
  parse_clock_time(trimmed).ok_or_else(
    || {
      HoursError::InvalidTime(
        trimmed.to_string()
      )
    }
  )
}

fn whole_hour(
  raw: &str
) -> Result<u32, HoursError> {
  match read_boundary(raw)? {
    | (hour, 0) => Ok(hour),
    | _ => {
      Err(HoursError::NotOnTheHour(
        raw.trim().to_string()
      ))
    }
  }
}

/// One bookable hour. The display label
/// is derived from the hour, so the hour
/// can always be recovered.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash,
)]
pub struct SlotLabel {
  hour:  u32,
  label: String
}

impl SlotLabel {
  #[must_use]
  pub fn new(hour: u32) -> Option<Self> {
    if hour >= HOURS_PER_DAY {
      return None;
    }
    Some(Self {
      hour,
      label: format!(
        "{} - {}",
        format_hour(hour),
        format_hour(hour + 1)
      )
    })
  }

  /// Accepts any encoding
  /// [`hour_of_slot`] understands.
  #[must_use]
  pub fn parse(raw: &str) -> Option<Self> {
    hour_of_slot(raw).and_then(Self::new)
  }

  #[must_use]
  pub fn hour(&self) -> u32 {
    self.hour
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.label
  }

  /// The 24-hour `HH:00` form the backend
  /// stores.
  #[must_use]
  pub fn value(&self) -> String {
    format!("{:02}:00", self.hour)
  }
}

impl fmt::Display for SlotLabel {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.label)
  }
}

/// `h:00 AM/PM`; hour 24 reads as
/// midnight.
#[must_use]
pub fn format_hour(hour: u32) -> String {
  let display = match hour % 12 {
    | 0 => 12,
    | other => other
  };
  let period = if hour % HOURS_PER_DAY < 12
  {
    "AM"
  } else {
    "PM"
  };
  format!("{display}:00 {period}")
}

/// One label per hour in the half-open
/// range `[opening, closing)`.
#[must_use]
pub fn generate_slots(
  opening_hour: u32,
  closing_hour: u32
) -> Vec<SlotLabel> {
  let closing_hour =
    closing_hour.min(HOURS_PER_DAY);
  if opening_hour >= closing_hour {
    return Vec::new();
  }
  (opening_hour..closing_hour)
    .filter_map(SlotLabel::new)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::{
    HoursError,
    OperatingHours,
    SlotLabel,
    format_hour,
    generate_slots
  };
  use crate::datetime::hour_of_slot;

  #[test]
  fn slot_counts_follow_half_open_range() {
    assert_eq!(generate_slots(6, 23).len(), 17);
    assert_eq!(generate_slots(9, 9).len(), 0);
    assert_eq!(generate_slots(0, 24).len(), 24);
    assert!(generate_slots(23, 6).is_empty());
  }

  #[test]
  fn labels_use_twelve_hour_ranges() {
    let slots = generate_slots(6, 23);
    assert_eq!(
      slots[0].as_str(),
      "6:00 AM - 7:00 AM"
    );
    assert_eq!(
      slots[6].as_str(),
      "12:00 PM - 1:00 PM"
    );
    assert_eq!(
      slots[16].as_str(),
      "10:00 PM - 11:00 PM"
    );
    assert_eq!(
      SlotLabel::new(23)
        .expect("slot")
        .as_str(),
      "11:00 PM - 12:00 AM"
    );
    assert_eq!(format_hour(0), "12:00 AM");
  }

  #[test]
  fn labels_round_trip_to_hours() {
    for (opening, closing) in
      [(6, 23), (0, 24), (11, 14)]
    {
      for (i, slot) in
        generate_slots(opening, closing)
          .iter()
          .enumerate()
      {
        assert_eq!(
          hour_of_slot(slot.as_str()),
          Some(opening + i as u32)
        );
        assert_eq!(
          hour_of_slot(&slot.value()),
          Some(opening + i as u32)
        );
      }
    }
  }

  #[test]
  fn operating_hours_enforce_bounds() {
    assert_eq!(
      OperatingHours::new(23, 6),
      Err(HoursError::InvalidRange {
        opening: 23,
        closing: 6
      })
    );
    assert!(
      OperatingHours::new(0, 25).is_err()
    );
    let hours =
      OperatingHours::parse("08:00", "24:00")
        .expect("valid hours");
    assert_eq!(hours.slots().len(), 16);
    assert!(hours.contains(23));
    assert!(!hours.contains(7));
  }

  #[test]
  fn unusable_settings_fall_back_to_defaults(
  ) {
    assert_eq!(
      OperatingHours::from_settings(
        "late", "23:00"
      ),
      OperatingHours::default()
    );
    assert_eq!(
      OperatingHours::from_settings(
        "22:00", "10:00"
      ),
      OperatingHours::default()
    );
    assert_eq!(
      OperatingHours::default()
        .slots()
        .len(),
      17
    );
  }

  #[test]
  fn half_hours_are_refused_when_editing(
  ) {
    assert_eq!(
      OperatingHours::parse("07:30", "22:00"),
      Err(HoursError::NotOnTheHour(
        "07:30".to_string()
      ))
    );
    assert_eq!(
      OperatingHours::from_settings(
        "07:30", "22:00"
      ),
      OperatingHours::new(7, 22)
        .expect("hours")
    );
    assert_eq!(
      OperatingHours::from_settings(
        "07:30", "06:00"
      ),
      OperatingHours::default()
    );
  }
}
