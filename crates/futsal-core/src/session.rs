use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::availability::{SlotAvailability, choose_slot, day_schedule};
use crate::booking::{BookingRecord, BookingStatus, NewBooking};
use crate::config::Config;
use crate::datetime::{CalendarDay, resolve_facility_timezone};
use crate::grid::WeekStart;
use crate::index::BookingIndex;
use crate::settings::FacilitySettings;
use crate::slot::OperatingHours;

/// Read side of the booking backend.
pub trait BookingSource {
    fn fetch_bookings(&self) -> anyhow::Result<Vec<BookingRecord>>;

    fn fetch_settings(&self) -> anyhow::Result<FacilitySettings>;
}

/// Write side of the booking backend. Callers must fetch a fresh snapshot
/// after every successful call.
pub trait BookingSink {
    fn create_booking(
        &self,
        booking: NewBooking,
        now: DateTime<Utc>,
    ) -> anyhow::Result<BookingRecord>;

    fn set_status(&self, id: &str, status: BookingStatus) -> anyhow::Result<BookingRecord>;

    fn delete_booking(&self, id: &str) -> anyhow::Result<()>;

    fn update_settings(&self, settings: &FacilitySettings) -> anyhow::Result<()>;
}

/// Everything derived from one fetch. Never patched; a new one is built
/// after each change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<BookingRecord>,
    pub settings: FacilitySettings,
    pub hours: OperatingHours,
    pub index: BookingIndex,
}

impl Snapshot {
    pub fn from_parts(records: Vec<BookingRecord>, settings: FacilitySettings) -> Self {
        let hours = settings.operating_hours();
        let index = BookingIndex::build(&records);
        Self {
            records,
            settings,
            hours,
            index,
        }
    }

    pub fn schedule(&self, day: CalendarDay) -> Vec<SlotAvailability> {
        day_schedule(&self.index, day, &self.hours)
    }

    pub fn find(&self, id: &str) -> Option<&BookingRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Explicit context for one user of the booking desk: configuration,
/// facility time zone and the backend handle.
#[derive(Debug)]
pub struct Session<S> {
    config: Config,
    timezone: Tz,
    week_start: WeekStart,
    store: S,
}

impl<S> Session<S> {
    pub fn new(config: Config, store: S) -> Self {
        let timezone = resolve_facility_timezone(config.timezone());
        let week_start = config.week_start();
        debug!(%timezone, ?week_start, "session ready");
        Self {
            config,
            timezone,
            week_start,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn today(&self) -> CalendarDay {
        CalendarDay::today_in(self.timezone)
    }
}

impl<S: BookingSource> Session<S> {
    #[tracing::instrument(skip(self))]
    pub fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let records = self.store.fetch_bookings()?;
        let settings = self.store.fetch_settings()?;
        Ok(Snapshot::from_parts(records, settings))
    }
}

impl<S: BookingSource + BookingSink> Session<S> {
    /// Creates a booking after checking the slot against a fresh snapshot,
    /// then returns the created record with the snapshot that follows it.
    #[tracing::instrument(skip(self, booking), fields(day = %booking.day, hour = booking.slot.hour()))]
    pub fn book(&self, booking: NewBooking) -> anyhow::Result<(BookingRecord, Snapshot)> {
        booking.validate()?;
        let before = self.snapshot()?;
        choose_slot(
            &before.index,
            &before.hours,
            booking.day,
            &booking.slot,
            self.today(),
        )?;

        let record = self.store.create_booking(booking, Utc::now())?;
        info!(id = %record.id, "booking submitted");
        Ok((record, self.snapshot()?))
    }

    pub fn approve(&self, id: &str) -> anyhow::Result<Snapshot> {
        self.transition(id, BookingStatus::Approved)
    }

    pub fn reject(&self, id: &str) -> anyhow::Result<Snapshot> {
        self.transition(id, BookingStatus::Rejected)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: &str) -> anyhow::Result<Snapshot> {
        self.store.delete_booking(id)?;
        info!(id, "booking deleted");
        self.snapshot()
    }

    #[tracing::instrument(skip(self, settings))]
    pub fn save_settings(&self, settings: &FacilitySettings) -> anyhow::Result<Snapshot> {
        self.store.update_settings(settings)?;
        info!(
            opening = %settings.opening_time,
            closing = %settings.closing_time,
            "settings saved"
        );
        self.snapshot()
    }

    #[tracing::instrument(skip(self))]
    fn transition(&self, id: &str, status: BookingStatus) -> anyhow::Result<Snapshot> {
        let record = self.store.set_status(id, status)?;
        info!(id = %record.id, status = %record.status, "booking status changed");
        self.snapshot()
    }
}
