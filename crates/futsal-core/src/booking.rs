use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize
};
use serde_json::Value;
use thiserror::Error;
use tracing::{
  debug,
  warn
};
use uuid::Uuid;

use crate::datetime::{
  CalendarDay,
  hour_of_slot,
  parse_booking_date,
  parse_timestamp
};
use crate::slot::SlotLabel;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
  Pending,
  Approved,
  Rejected
}

impl BookingStatus {
  pub const ALL: [BookingStatus; 3] = [
    BookingStatus::Pending,
    BookingStatus::Approved,
    BookingStatus::Rejected
  ];

  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      | BookingStatus::Pending => {
        "pending"
      }
      | BookingStatus::Approved => {
        "approved"
      }
      | BookingStatus::Rejected => {
        "rejected"
      }
    }
  }

  /// How strongly a status claims its
  /// slot. Rejection releases the slot.
  #[must_use]
  pub fn rank(self) -> u8 {
    match self {
      | BookingStatus::Rejected => 0,
      | BookingStatus::Pending => 1,
      | BookingStatus::Approved => 2
    }
  }
}

impl fmt::Display for BookingStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for BookingStatus {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "pending" => Ok(Self::Pending),
      | "approved" => Ok(Self::Approved),
      | "rejected" => Ok(Self::Rejected),
      | other => Err(anyhow!(
        "unknown booking status: {other}"
      ))
    }
  }
}

/// Why a record could not be placed on
/// the calendar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
  #[error("booking {id} has no booking date")]
  MissingDate { id: String },

  #[error(
    "booking {id} has an unreadable \
     booking date {raw:?}"
  )]
  InvalidDate { id: String, raw: String },

  #[error("booking {id} has no time slot")]
  MissingSlot { id: String },

  #[error(
    "booking {id} has an unreadable time \
     slot {raw:?}"
  )]
  InvalidSlot { id: String, raw: String }
}

/// A booking as delivered by the
/// backend. Date and slot stay in their
/// wire form; they are normalized when
/// placed.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
  #[serde(
    alias = "_id",
    deserialize_with = "opaque_id"
  )]
  pub id: String,

  #[serde(
    default,
    alias = "name",
    deserialize_with = "null_as_default"
  )]
  pub customer_name: String,

  #[serde(
    default,
    deserialize_with = "null_as_default"
  )]
  pub email: String,

  #[serde(
    default,
    deserialize_with = "null_as_default"
  )]
  pub phone_number: String,

  #[serde(default)]
  pub booking_date: Option<String>,

  #[serde(default)]
  pub time_slot: Option<String>,

  pub status: BookingStatus,

  #[serde(default)]
  pub notes: Option<String>,

  /// Display and ordering only; an
  /// unreadable value becomes `None`.
  #[serde(
    default,
    deserialize_with = "lenient_timestamp"
  )]
  pub created_at: Option<DateTime<Utc>>,

  #[serde(
    default,
    deserialize_with = "null_as_default"
  )]
  pub is_walk_in: bool,

  #[serde(
    default,
    deserialize_with = "lenient_count"
  )]
  pub players: Option<u32>
}

impl BookingRecord {
  #[must_use]
  pub fn day(&self) -> Option<CalendarDay> {
    self
      .booking_date
      .as_deref()
      .and_then(parse_booking_date)
  }

  #[must_use]
  pub fn slot_hour(&self) -> Option<u32> {
    self
      .time_slot
      .as_deref()
      .and_then(hour_of_slot)
  }

  /// The (day, start hour) cell this
  /// record occupies.
  pub fn placement(
    &self
  ) -> Result<(CalendarDay, u32), RecordError>
  {
    let raw_date = self
      .booking_date
      .as_deref()
      .filter(|raw| !raw.trim().is_empty())
      .ok_or_else(|| {
        RecordError::MissingDate {
          id: self.id.clone()
        }
      })?;
    let day = parse_booking_date(raw_date)
      .ok_or_else(|| {
        RecordError::InvalidDate {
          id:  self.id.clone(),
          raw: raw_date.to_string()
        }
      })?;

    let raw_slot = self
      .time_slot
      .as_deref()
      .filter(|raw| !raw.trim().is_empty())
      .ok_or_else(|| {
        RecordError::MissingSlot {
          id: self.id.clone()
        }
      })?;
    let hour = hour_of_slot(raw_slot)
      .ok_or_else(|| {
        RecordError::InvalidSlot {
          id:  self.id.clone(),
          raw: raw_slot.to_string()
        }
      })?;

    Ok((day, hour))
  }

  /// First name, as shown on crowded
  /// calendar cells.
  #[must_use]
  pub fn short_name(&self) -> &str {
    self
      .customer_name
      .split_whitespace()
      .next()
      .unwrap_or("")
  }
}

fn opaque_id<'de, D>(
  deserializer: D
) -> Result<String, D::Error>
where
  D: Deserializer<'de>
{
  match Value::deserialize(deserializer)?
  {
    | Value::String(raw) => Ok(raw),
    | Value::Number(num) => {
      Ok(num.to_string())
    }
    | other => {
      Err(serde::de::Error::custom(
        format!(
          "booking id must be a string \
           or number, got {other}"
        )
      ))
    }
  }
}

/// `null` reads like a missing key.
fn null_as_default<'de, D, T>(
  deserializer: D
) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>
{
  Option::<T>::deserialize(deserializer)
    .map(Option::unwrap_or_default)
}

fn lenient_timestamp<'de, D>(
  deserializer: D
) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>
{
  let parsed = match Value::deserialize(
    deserializer
  )? {
    | Value::Null => return Ok(None),
    | Value::String(raw) => {
      parse_timestamp(&raw)
    }
    | Value::Number(num) => num
      .as_i64()
      .and_then(
        DateTime::from_timestamp_millis
      ),
    | _ => None
  };
  if parsed.is_none() {
    warn!("unreadable createdAt; ignoring it");
  }
  Ok(parsed)
}

fn lenient_count<'de, D>(
  deserializer: D
) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>
{
  let count = match Value::deserialize(
    deserializer
  )? {
    | Value::Number(num) => num
      .as_u64()
      .and_then(|n| u32::try_from(n).ok()),
    | Value::String(raw) => {
      raw.trim().parse::<u32>().ok()
    }
    | _ => None
  };
  Ok(count)
}

/// A booking about to be created, either
/// by a customer (pending) or by an
/// admin for a walk-in.
#[derive(Debug, Clone)]
pub struct NewBooking {
  pub customer_name: String,
  pub email:         String,
  pub phone_number:  String,
  pub day:           CalendarDay,
  pub slot:          SlotLabel,
  pub notes:         Option<String>,
  pub is_walk_in:    bool,
  pub status:        BookingStatus
}

impl NewBooking {
  pub fn validate(
    &self
  ) -> anyhow::Result<()> {
    if self.customer_name.trim().is_empty()
    {
      return Err(anyhow!(
        "customer name is required"
      ));
    }
    if !self.is_walk_in
      && (self.email.trim().is_empty()
        || self
          .phone_number
          .trim()
          .is_empty())
    {
      return Err(anyhow!(
        "email and phone number are \
         required for online bookings"
      ));
    }
    Ok(())
  }

  #[must_use]
  pub fn into_record(
    self,
    now: DateTime<Utc>
  ) -> BookingRecord {
    BookingRecord {
      id:            Uuid::new_v4()
        .to_string(),
      customer_name: self
        .customer_name
        .trim()
        .to_string(),
      email:         self
        .email
        .trim()
        .to_string(),
      phone_number:  self
        .phone_number
        .trim()
        .to_string(),
      booking_date:  Some(self.day.key()),
      time_slot:     Some(
        self.slot.value()
      ),
      status:        self.status,
      notes:         self.notes.filter(
        |notes| !notes.trim().is_empty()
      ),
      created_at:    Some(now),
      is_walk_in:    self.is_walk_in,
      players:       None
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct DecodedFeed {
  pub records: Vec<BookingRecord>,
  pub skipped: usize
}

/// Decodes an API payload: a bare array,
/// or an envelope carrying the array
/// under `data` or `bookings`. Elements
/// that fail to decode are skipped so one
/// bad record cannot hide the rest.
pub fn decode_feed(
  text: &str
) -> anyhow::Result<DecodedFeed> {
  let payload: Value =
    serde_json::from_str(text).map_err(
      |err| {
        anyhow!(
          "booking feed is not valid \
           JSON: {err}"
        )
      }
    )?;

  let items = match payload {
    | Value::Array(items) => items,
    | Value::Object(mut map) => {
      let inner = map
        .remove("data")
        .or_else(|| map.remove("bookings"))
        .ok_or_else(|| {
          anyhow!(
            "booking feed object has no \
             `data` or `bookings` field"
          )
        })?;
      match inner {
        | Value::Array(items) => items,
        | Value::Object(mut nested) => {
          match nested.remove("bookings")
          {
            | Some(Value::Array(items)) => {
              items
            }
            | _ => {
              return Err(anyhow!(
                "booking feed `data` is not \
                 a list"
              ));
            }
          }
        }
        | _ => {
          return Err(anyhow!(
            "booking feed `data` is not a \
             list"
          ));
        }
      }
    }
    | _ => {
      return Err(anyhow!(
        "booking feed must be a list or \
         an object"
      ));
    }
  };

  let mut feed = DecodedFeed::default();
  for (idx, item) in
    items.into_iter().enumerate()
  {
    match serde_json::from_value::<
      BookingRecord
    >(item)
    {
      | Ok(record) => {
        feed.records.push(record)
      }
      | Err(err) => {
        warn!(
          index = idx,
          error = %err,
          "skipping undecodable booking"
        );
        feed.skipped += 1;
      }
    }
  }

  debug!(
    count = feed.records.len(),
    skipped = feed.skipped,
    "decoded booking feed"
  );
  Ok(feed)
}
