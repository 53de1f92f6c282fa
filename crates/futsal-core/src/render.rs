use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::availability::{SlotAvailability, SlotStatus};
use crate::booking::{BookingRecord, BookingStatus};
use crate::config::Config;
use crate::datetime::CalendarDay;
use crate::filter::StatusSummary;
use crate::grid::{CalendarCell, DayView, WeekGrid, WeekStart};
use crate::settings::FacilitySettings;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
        }
    }

    #[tracing::instrument(skip(self, schedule))]
    pub fn print_schedule(
        &mut self,
        day: CalendarDay,
        schedule: &[SlotAvailability],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_schedule(&mut out, day, schedule)
    }

    pub fn print_month(
        &mut self,
        title: &str,
        week_start: WeekStart,
        cells: &[CalendarCell],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_month(&mut out, title, week_start, cells)
    }

    pub fn print_week(&mut self, title: &str, grid: &WeekGrid<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_week(&mut out, title, grid)
    }

    pub fn print_day(&mut self, title: &str, view: &DayView<'_>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_day(&mut out, title, view)
    }

    #[tracing::instrument(skip(self, records))]
    pub fn print_bookings(&mut self, records: &[&BookingRecord]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_bookings(&mut out, records)
    }

    pub fn print_booking_info(&mut self, record: &BookingRecord) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", record.id)?;
        writeln!(out, "customer  {}", record.customer_name)?;
        writeln!(out, "email     {}", record.email)?;
        writeln!(out, "phone     {}", record.phone_number)?;
        writeln!(
            out,
            "date      {}",
            record.booking_date.clone().unwrap_or_default()
        )?;
        writeln!(
            out,
            "slot      {}",
            record.time_slot.clone().unwrap_or_default()
        )?;
        writeln!(out, "status    {}", self.paint_status(record.status))?;
        if record.is_walk_in {
            writeln!(out, "walk-in   yes")?;
        }
        if let Some(notes) = &record.notes {
            writeln!(out, "notes     {notes}")?;
        }

        Ok(())
    }

    pub fn print_summary(&mut self, label: &str, summary: &StatusSummary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{label}")?;
        let rows = BookingStatus::ALL
            .iter()
            .map(|status| vec![self.paint_status(*status), summary.count(*status).to_string()])
            .chain(std::iter::once(vec![
                "total".to_string(),
                summary.total().to_string(),
            ]))
            .collect();
        write_table(&mut out, vec!["Status".to_string(), "Count".to_string()], rows)
    }

    pub fn print_settings(&mut self, settings: &FacilitySettings) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let hours = settings.operating_hours();

        writeln!(out, "court     {}", settings.court_name)?;
        writeln!(out, "address   {}", settings.address)?;
        writeln!(
            out,
            "hours     {} - {} ({} slots)",
            settings.opening_time,
            settings.closing_time,
            hours.slots().len()
        )?;
        for (idx, facility) in settings.facilities.iter().enumerate() {
            writeln!(out, "facility  {}. {facility}", idx + 1)?;
        }
        for (idx, rule) in settings.court_rules.iter().enumerate() {
            writeln!(out, "rule      {}. {rule}", idx + 1)?;
        }

        Ok(())
    }

    fn write_schedule<W: Write>(
        &self,
        mut out: W,
        day: CalendarDay,
        schedule: &[SlotAvailability],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", day.naive().format("%A, %B %-d, %Y").to_string().to_uppercase())?;
        if schedule.is_empty() {
            writeln!(out, "no slots configured")?;
            return Ok(());
        }

        let rows = schedule
            .iter()
            .map(|entry| {
                vec![
                    entry.slot.as_str().to_string(),
                    self.paint_slot(entry.status),
                ]
            })
            .collect();
        write_table(out, vec!["Slot".to_string(), "Status".to_string()], rows)
    }

    fn write_month<W: Write>(
        &self,
        mut out: W,
        title: &str,
        week_start: WeekStart,
        cells: &[CalendarCell],
    ) -> anyhow::Result<()> {
        writeln!(out, "{title}")?;
        let header = week_start
            .labels()
            .iter()
            .map(|label| format!("{label:>4}"))
            .collect::<String>();
        writeln!(out, "{}", header.trim_end())?;

        for week in cells.chunks(7) {
            let mut line = String::new();
            for cell in week {
                line.push_str(&self.month_cell(cell));
            }
            writeln!(out, "{}", line.trim_end())?;
        }

        let today = cells.iter().find(|cell| cell.is_today);
        let selected = cells.iter().find(|cell| cell.is_selected);
        let mut legend = vec!["* = has bookings".to_string()];
        if let Some(date) = today.and_then(|cell| cell.date) {
            legend.push(format!("today {date}"));
        }
        if let Some(date) = selected.and_then(|cell| cell.date) {
            legend.push(format!("selected {date}"));
        }
        writeln!(out, "{}", legend.join("  "))?;
        Ok(())
    }

    fn month_cell(&self, cell: &CalendarCell) -> String {
        let Some(number) = cell.day_number else {
            return "    ".to_string();
        };
        let marker = if cell.has_booking { '*' } else { ' ' };
        let text = format!("{number:>3}");
        let text = if cell.is_selected {
            self.paint(&text, "7")
        } else if cell.is_today {
            self.paint(&text, "1;32")
        } else if cell.is_past {
            self.paint(&text, "2")
        } else {
            text
        };
        format!("{text}{marker}")
    }

    fn write_week<W: Write>(
        &self,
        mut out: W,
        title: &str,
        grid: &WeekGrid<'_>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{title}")?;

        let mut headers = vec!["Slot".to_string()];
        headers.extend(
            grid.days
                .iter()
                .map(|day| day.naive().format("%a %d").to_string()),
        );

        let rows = grid
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.slot.as_str().to_string()];
                cells.extend(row.cells.iter().map(|bookings| {
                    bookings
                        .iter()
                        .map(|record| {
                            self.paint(record.short_name(), status_color(record.status))
                        })
                        .collect::<Vec<_>>()
                        .join(",")
                }));
                cells
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn write_day<W: Write>(
        &self,
        mut out: W,
        title: &str,
        view: &DayView<'_>,
    ) -> anyhow::Result<()> {
        writeln!(out, "{title}")?;

        let mut rows = Vec::new();
        for row in &view.rows {
            if row.bookings.is_empty() {
                rows.push(vec![
                    row.slot.as_str().to_string(),
                    "-".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                ]);
                continue;
            }
            for record in &row.bookings {
                rows.push(vec![
                    row.slot.as_str().to_string(),
                    record.customer_name.clone(),
                    record.phone_number.clone(),
                    self.paint_status(record.status),
                    record.notes.clone().unwrap_or_default(),
                ]);
            }
        }

        write_table(
            &mut out,
            vec![
                "Slot".to_string(),
                "Customer".to_string(),
                "Phone".to_string(),
                "Status".to_string(),
                "Notes".to_string(),
            ],
            rows,
        )?;

        if !view.outside_hours.is_empty() {
            writeln!(out, "outside operating hours:")?;
            for record in &view.outside_hours {
                writeln!(
                    out,
                    "  {} {} ({})",
                    record.time_slot.as_deref().unwrap_or("?"),
                    record.customer_name,
                    record.status
                )?;
            }
        }
        Ok(())
    }

    fn write_bookings<W: Write>(
        &self,
        out: W,
        records: &[&BookingRecord],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Slot".to_string(),
            "Customer".to_string(),
            "Phone".to_string(),
            "Status".to_string(),
            "Requested".to_string(),
        ];

        let rows = records
            .iter()
            .map(|record| {
                let date = record
                    .day()
                    .map(|day| day.to_string())
                    .or_else(|| record.booking_date.clone())
                    .unwrap_or_default();
                let slot = record
                    .slot_hour()
                    .and_then(crate::slot::SlotLabel::new)
                    .map(|slot| slot.to_string())
                    .or_else(|| record.time_slot.clone())
                    .unwrap_or_default();
                let requested = record
                    .created_at
                    .map(|at| at.format("%b %d %H:%M").to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                let mut customer = record.customer_name.clone();
                if record.is_walk_in {
                    customer.push_str(" (walk-in)");
                }
                vec![
                    self.paint(&record.id, "33"),
                    date,
                    slot,
                    customer,
                    record.phone_number.clone(),
                    self.paint_status(record.status),
                    requested,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint_status(&self, status: BookingStatus) -> String {
        self.paint(status.as_str(), status_color(status))
    }

    fn paint_slot(&self, status: SlotStatus) -> String {
        let code = match status {
            SlotStatus::Available => "32",
            SlotStatus::Pending => "33",
            SlotStatus::Booked => "31",
        };
        self.paint(status.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_color(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Approved => "32",
        BookingStatus::Pending => "33",
        BookingStatus::Rejected => "31",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for idx in 0..column_count {
        line.push_str(&format!("{:width$} ", headers[idx], width = widths[idx]));
    }
    writeln!(writer, "{}", line.trim_end())?;

    line.clear();
    for width in &widths {
        line.push_str(&format!("{:-<width$} ", "", width = *width));
    }
    writeln!(writer, "{}", line.trim_end())?;

    for row in rows {
        line.clear();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
