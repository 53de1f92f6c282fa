use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::booking::{BookingRecord, BookingStatus, DecodedFeed, NewBooking};
use crate::session::{BookingSink, BookingSource};
use crate::settings::FacilitySettings;

/// Local stand-in for the booking API: a JSON-lines booking feed and a
/// TOML settings file in one data directory.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub bookings_path: PathBuf,
    pub settings_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOutcome {
    pub added: usize,
    pub replaced: usize,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let bookings_path = data_dir.join("bookings.data");
        let settings_path = data_dir.join("settings.toml");

        if !bookings_path.exists() {
            fs::write(&bookings_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            bookings = %bookings_path.display(),
            settings = %settings_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            bookings_path,
            settings_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_bookings(&self) -> anyhow::Result<Vec<BookingRecord>> {
        load_jsonl(&self.bookings_path).context("failed to load bookings.data")
    }

    #[tracing::instrument(skip(self, records))]
    pub fn save_bookings(&self, records: &[BookingRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.bookings_path, records).context("failed to save bookings.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_settings(&self) -> anyhow::Result<FacilitySettings> {
        if !self.settings_path.exists() {
            debug!("no settings file; using defaults");
            return Ok(FacilitySettings::default());
        }
        let raw = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("failed reading {}", self.settings_path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.settings_path.display()))
    }

    #[tracing::instrument(skip(self, settings))]
    pub fn save_settings(&self, settings: &FacilitySettings) -> anyhow::Result<()> {
        let serialized =
            toml::to_string_pretty(settings).context("failed to serialize settings")?;
        write_atomic(&self.settings_path, serialized.as_bytes())
            .context("failed to save settings.toml")
    }

    /// Merges a decoded API feed into the local feed. Records are matched by
    /// id; incoming ones replace local copies.
    #[tracing::instrument(skip(self, feed), fields(count = feed.records.len()))]
    pub fn import_feed(&self, feed: DecodedFeed) -> anyhow::Result<ImportOutcome> {
        let mut records = self.load_bookings()?;
        let mut outcome = ImportOutcome::default();

        for incoming in feed.records {
            if let Some(existing) = records.iter_mut().find(|r| r.id == incoming.id) {
                *existing = incoming;
                outcome.replaced += 1;
            } else {
                records.push(incoming);
                outcome.added += 1;
            }
        }

        self.save_bookings(&records)?;
        info!(
            added = outcome.added,
            replaced = outcome.replaced,
            skipped = feed.skipped,
            "imported booking feed"
        );
        Ok(outcome)
    }
}

impl BookingSource for DataStore {
    fn fetch_bookings(&self) -> anyhow::Result<Vec<BookingRecord>> {
        self.load_bookings()
    }

    fn fetch_settings(&self) -> anyhow::Result<FacilitySettings> {
        self.load_settings()
    }
}

impl BookingSink for DataStore {
    #[tracing::instrument(skip(self, booking, now), fields(day = %booking.day, hour = booking.slot.hour()))]
    fn create_booking(
        &self,
        booking: NewBooking,
        now: DateTime<Utc>,
    ) -> anyhow::Result<BookingRecord> {
        let mut records = self.load_bookings()?;
        let record = booking.into_record(now);
        records.push(record.clone());
        self.save_bookings(&records)?;
        info!(id = %record.id, status = %record.status, "created booking");
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    fn set_status(&self, id: &str, status: BookingStatus) -> anyhow::Result<BookingRecord> {
        let mut records = self.load_bookings()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("booking not found: {id}"))?;

        if record.status == status {
            return Err(anyhow!("booking {id} is already {status}"));
        }
        debug!(from = %record.status, to = %status, "changing booking status");
        record.status = status;
        let updated = record.clone();

        self.save_bookings(&records)?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    fn delete_booking(&self, id: &str) -> anyhow::Result<()> {
        let mut records = self.load_bookings()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(anyhow!("booking not found: {id}"));
        }
        self.save_bookings(&records)
    }

    fn update_settings(&self, settings: &FacilitySettings) -> anyhow::Result<()> {
        self.save_settings(settings)
    }
}

/// Lines that fail to decode are skipped: one corrupt record must not hide
/// the rest of the feed.
#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<BookingRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<BookingRecord>(trimmed) {
            Ok(record) => out.push(record),
            Err(err) => warn!(
                file = %path.display(),
                line = idx + 1,
                error = %err,
                "skipping corrupt booking line"
            ),
        }
    }

    debug!(count = out.len(), "loaded bookings from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic(path: &Path, records: &[BookingRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let mut payload = Vec::new();
    for record in records {
        serde_json::to_writer(&mut payload, record)?;
        payload.push(b'\n');
    }
    write_atomic(path, &payload)
}

fn write_atomic(path: &Path, payload: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
