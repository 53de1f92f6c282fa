use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::availability::SelectionError;
use crate::booking::{BookingStatus, NewBooking, decode_feed};
use crate::cli::{Command, SettingsAction};
use crate::datastore::DataStore;
use crate::datetime::{CalendarDay, first_day_of_month, parse_day_expr, parse_month_expr};
use crate::filter::{QueueFilter, StatusFilter, summarize};
use crate::grid::{CalendarCursor, CalendarView, build_day_view, build_week_grid};
use crate::render::Renderer;
use crate::session::Session;
use crate::slot::SlotLabel;

#[instrument(skip(session, renderer, command), fields(command = command.name()))]
pub fn dispatch(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Slots { date } => cmd_slots(session, renderer, &date),
        Command::Month {
            month,
            select,
            shift,
        } => cmd_month(session, renderer, &month, select.as_deref(), shift),
        Command::Week { date, shift } => cmd_week(session, renderer, &date, shift),
        Command::Day { date, shift } => cmd_day(session, renderer, &date, shift),
        Command::Pending {
            search,
            status,
            date,
        } => cmd_pending(session, renderer, search, &status, date.as_deref()),
        Command::Book {
            date,
            slot,
            name,
            email,
            phone,
            notes,
            walk_in,
            status,
        } => {
            let today = session.today();
            let booking = NewBooking {
                customer_name: name,
                email,
                phone_number: phone,
                day: parse_day_expr(&date, today)?,
                slot: SlotLabel::parse(&slot).ok_or_else(|| anyhow!("invalid slot: {slot}"))?,
                notes,
                is_walk_in: walk_in,
                status: status.unwrap_or(if walk_in {
                    BookingStatus::Approved
                } else {
                    BookingStatus::Pending
                }),
            };
            cmd_book(session, renderer, booking)
        }
        Command::Approve { id } => cmd_transition(session, &id, BookingStatus::Approved),
        Command::Reject { id } => cmd_transition(session, &id, BookingStatus::Rejected),
        Command::Delete { id } => cmd_delete(session, &id),
        Command::Summary { date } => cmd_summary(session, renderer, date.as_deref()),
        Command::Import { path } => cmd_import(session, &path),
        Command::Config => cmd_config(session),
        Command::Settings { action } => {
            cmd_settings(session, renderer, action.unwrap_or(SettingsAction::Show))
        }
    }
}

#[instrument(skip(session, renderer))]
fn cmd_slots(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    date: &str,
) -> anyhow::Result<()> {
    info!("command slots");
    let today = session.today();
    let day = parse_day_expr(date, today)?;
    if day < today {
        warn!(%day, "day is in the past; slots cannot be booked");
    }

    let snapshot = session.snapshot()?;
    renderer.print_schedule(day, &snapshot.schedule(day))
}

#[instrument(skip(session, renderer))]
fn cmd_month(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    month: &str,
    select: Option<&str>,
    shift: i64,
) -> anyhow::Result<()> {
    info!("command month");
    let today = session.today();
    let (year, month) = parse_month_expr(month, today)?;
    let first = first_day_of_month(year, month)
        .ok_or_else(|| anyhow!("invalid month {year}-{month:02}"))?;

    let mut cursor = CalendarCursor::new(today);
    cursor.set_focus(first);
    cursor.navigate(shift)?;

    if let Some(raw) = select {
        let day = parse_day_expr(raw, today)?;
        match cursor.select(day, today) {
            Ok(()) => debug!(%day, "selected day"),
            Err(SelectionError::PastDay(day)) => {
                warn!(%day, "past days cannot be selected; keeping today")
            }
            Err(err) => return Err(err.into()),
        }
    }

    let snapshot = session.snapshot()?;
    let week_start = session.week_start();
    let cells = cursor.month_grid(week_start, today, &snapshot.records);
    renderer.print_month(&cursor.title(week_start), week_start, &cells)
}

#[instrument(skip(session, renderer))]
fn cmd_week(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    date: &str,
    shift: i64,
) -> anyhow::Result<()> {
    info!("command week");
    let cursor = focused_cursor(session, CalendarView::Week, date, shift)?;
    let snapshot = session.snapshot()?;
    let week_start = session.week_start();
    let grid = build_week_grid(
        cursor.focus(),
        week_start,
        &snapshot.hours,
        &snapshot.records,
    );
    renderer.print_week(&cursor.title(week_start), &grid)
}

#[instrument(skip(session, renderer))]
fn cmd_day(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    date: &str,
    shift: i64,
) -> anyhow::Result<()> {
    info!("command day");
    let cursor = focused_cursor(session, CalendarView::Day, date, shift)?;
    let snapshot = session.snapshot()?;
    let view = build_day_view(cursor.focus(), &snapshot.hours, &snapshot.records);
    renderer.print_day(&cursor.title(session.week_start()), &view)
}

fn focused_cursor(
    session: &Session<DataStore>,
    view: CalendarView,
    date: &str,
    shift: i64,
) -> anyhow::Result<CalendarCursor> {
    let today = session.today();
    let mut cursor = CalendarCursor::new(today);
    cursor.set_view(view);
    cursor.set_focus(parse_day_expr(date, today)?);
    cursor.navigate(shift)?;
    Ok(cursor)
}

#[instrument(skip(session, renderer))]
fn cmd_pending(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    search: Option<String>,
    status: &str,
    date: Option<&str>,
) -> anyhow::Result<()> {
    info!("command pending");
    let filter = QueueFilter {
        search,
        status: status.parse::<StatusFilter>()?,
        date: date
            .map(|raw| parse_day_expr(raw, session.today()))
            .transpose()?,
    };

    let snapshot = session.snapshot()?;
    let rows = filter.apply(&snapshot.records);
    if rows.is_empty() {
        println!("No matching bookings.");
        return Ok(());
    }
    renderer.print_bookings(&rows)?;
    println!();
    println!("{} booking(s)", rows.len());
    Ok(())
}

#[instrument(skip(session, renderer, booking))]
fn cmd_book(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    booking: NewBooking,
) -> anyhow::Result<()> {
    info!("command book");
    let day = booking.day;
    let (record, snapshot) = session.book(booking)?;

    println!("Booking submitted.");
    renderer.print_booking_info(&record)?;
    println!();
    renderer.print_schedule(day, &snapshot.schedule(day))
}

#[instrument(skip(session))]
fn cmd_transition(
    session: &Session<DataStore>,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<()> {
    info!("command status change");
    let (snapshot, verb) = match status {
        BookingStatus::Approved => (session.approve(id)?, "Approved"),
        BookingStatus::Rejected => (session.reject(id)?, "Rejected"),
        BookingStatus::Pending => {
            return Err(anyhow!("bookings cannot be moved back to pending"));
        }
    };

    println!("{verb} booking {id}.");
    println!(
        "{} request(s) still pending.",
        summarize(&snapshot.records, None).pending
    );
    Ok(())
}

#[instrument(skip(session))]
fn cmd_delete(session: &Session<DataStore>, id: &str) -> anyhow::Result<()> {
    info!("command delete");
    let snapshot = session.delete(id)?;
    println!("Deleted booking {id}.");
    println!("{} booking(s) remain.", snapshot.records.len());
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_summary(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    date: Option<&str>,
) -> anyhow::Result<()> {
    info!("command summary");
    let day: Option<CalendarDay> = date
        .map(|raw| parse_day_expr(raw, session.today()))
        .transpose()?;

    let snapshot = session.snapshot()?;
    let summary = summarize(&snapshot.records, day);
    let label = match day {
        Some(day) => format!("Bookings on {day}"),
        None => "All bookings".to_string(),
    };
    renderer.print_summary(&label, &summary)?;

    if snapshot.index.excluded() > 0 {
        println!(
            "{} record(s) with unreadable date or slot are not on the calendar.",
            snapshot.index.excluded()
        );
    }
    Ok(())
}

#[instrument(skip(session))]
fn cmd_import(session: &Session<DataStore>, path: &Path) -> anyhow::Result<()> {
    info!("command import");
    let text = if path == Path::new("-") {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        input
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };

    let feed = decode_feed(&text)?;
    let skipped = feed.skipped;
    let outcome = session.store().import_feed(feed)?;
    println!(
        "Imported {} new, {} updated, {} skipped.",
        outcome.added, outcome.replaced, skipped
    );
    Ok(())
}

#[instrument(skip(session))]
fn cmd_config(session: &Session<DataStore>) -> anyhow::Result<()> {
    let config = session.config();
    for (key, value) in config.entries() {
        println!("{key} = {value}");
    }
    println!("# effective timezone: {}", session.timezone());
    println!("# data directory: {}", session.store().data_dir.display());
    for file in &config.loaded_files {
        println!("# loaded: {}", file.display());
    }
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_settings(
    session: &Session<DataStore>,
    renderer: &mut Renderer,
    action: SettingsAction,
) -> anyhow::Result<()> {
    info!("command settings");
    let mut settings = session.snapshot()?.settings;

    match action {
        SettingsAction::Show => return renderer.print_settings(&settings),
        SettingsAction::SetHours { opening, closing } => {
            let hours = settings.set_hours(&opening, &closing)?;
            debug!(slots = hours.slots().len(), "operating hours updated");
        }
        SettingsAction::SetName { name } => settings.court_name = name.trim().to_string(),
        SettingsAction::SetAddress { address } => settings.address = address.trim().to_string(),
        SettingsAction::AddFacility { name } => settings.add_facility(&name)?,
        SettingsAction::RemoveFacility { position } => {
            let removed = settings.remove_facility(position)?;
            debug!(%removed, "facility removed");
        }
        SettingsAction::AddRule { rule } => settings.add_rule(&rule)?,
        SettingsAction::RemoveRule { position } => {
            let removed = settings.remove_rule(position)?;
            debug!(%removed, "court rule removed");
        }
    }

    let snapshot = session.save_settings(&settings)?;
    println!("Settings saved.");
    renderer.print_settings(&snapshot.settings)
}
