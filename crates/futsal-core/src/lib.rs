pub mod availability;
pub mod booking;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod filter;
pub mod grid;
pub mod index;
pub mod render;
pub mod session;
pub mod settings;
pub mod slot;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use availability::{
  SlotStatus,
  choose_slot,
  classify,
  day_schedule,
  has_booking_on_day
};
pub use booking::{
  BookingRecord,
  BookingStatus,
  NewBooking,
  decode_feed
};
pub use datetime::{
  CalendarDay,
  hour_of_slot,
  parse_booking_date,
  to_day_key
};
pub use grid::{
  CalendarCell,
  CalendarCursor,
  build_month_grid
};
pub use index::BookingIndex;
pub use session::{
  BookingSink,
  BookingSource,
  Session,
  Snapshot
};
pub use slot::{
  OperatingHours,
  SlotLabel,
  generate_slots
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting futsal CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.futsalrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut renderer =
    render::Renderer::new(&cfg);
  let session =
    session::Session::new(cfg, store);

  commands::dispatch(
    &session,
    &mut renderer,
    cli.command.unwrap_or_default()
  )?;

  info!("done");
  Ok(())
}
