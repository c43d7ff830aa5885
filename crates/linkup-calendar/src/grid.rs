//! Month and day grid projection.
//!
//! Events are placed by their start time, slots by their timestamp, both
//! read in the grid's time zone.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use crate::error::CalendarError;
use crate::types::CalendarEvent;
use crate::votes::{is_hour_available, is_slot_voted_in_hour, AvailabilitySlot};

/// Shape of the rendered grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOptions {
    pub week_start: Weekday,
    /// Hours shown as day-grid rows, inclusive.
    pub day_hours: RangeInclusive<u32>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            day_hours: 7..=22,
        }
    }
}

impl GridOptions {
    fn validate(&self) -> Result<(), CalendarError> {
        let (start, end) = (*self.day_hours.start(), *self.day_hours.end());
        if end > 23 || start > end {
            return Err(CalendarError::InvalidGridRange(format!(
                "day hours {}..={}",
                start, end
            )));
        }
        Ok(())
    }
}

/// One day in a month grid.
#[derive(Debug, Clone, Serialize)]
pub struct MonthCell<'a> {
    pub date: NaiveDate,
    /// False for the leading/trailing days borrowed from adjacent months.
    pub in_month: bool,
    pub events: Vec<&'a CalendarEvent>,
    pub has_availability: bool,
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthGrid<'a> {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<MonthCell<'a>>,
}

impl<'a> MonthGrid<'a> {
    /// Cells split into rows of seven.
    pub fn weeks(&self) -> impl Iterator<Item = &[MonthCell<'a>]> {
        self.cells.chunks(7)
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&MonthCell<'a>> {
        self.cells.iter().find(|c| c.date == date)
    }
}

/// One hourly row in a day grid.
#[derive(Debug, Clone, Serialize)]
pub struct DayRow<'a> {
    /// Local hour of day.
    pub hour: u32,
    pub starts_at: DateTime<Utc>,
    pub events: Vec<&'a CalendarEvent>,
    pub is_available: bool,
    pub is_voted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayGrid<'a> {
    pub date: NaiveDate,
    pub rows: Vec<DayRow<'a>>,
    /// Overlay slots falling anywhere on this date.
    pub slots_on_day: usize,
}

impl<'a> DayGrid<'a> {
    pub fn row(&self, hour: u32) -> Option<&DayRow<'a>> {
        self.rows.iter().find(|r| r.hour == hour)
    }
}

fn days_since_week_start(date: NaiveDate, week_start: Weekday) -> u64 {
    let day = date.weekday().num_days_from_sunday();
    let start = week_start.num_days_from_sunday();
    u64::from((day + 7 - start) % 7)
}

fn local_date<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Project events and slots onto the weeks covering `year`-`month`.
pub fn month_grid<'a, Tz: TimeZone>(
    year: i32,
    month: u32,
    events: &'a [CalendarEvent],
    slots: &[AvailabilitySlot],
    tz: &Tz,
    options: &GridOptions,
) -> Result<MonthGrid<'a>, CalendarError> {
    let invalid = || CalendarError::InvalidGridRange(format!("{}-{:02}", year, month));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(invalid)?;

    let grid_start = first
        .checked_sub_days(Days::new(days_since_week_start(first, options.week_start)))
        .ok_or_else(invalid)?;
    let grid_end = last
        .checked_add_days(Days::new(6 - days_since_week_start(last, options.week_start)))
        .ok_or_else(invalid)?;

    let mut by_date: HashMap<NaiveDate, Vec<&'a CalendarEvent>> = HashMap::new();
    for event in events {
        by_date
            .entry(local_date(&event.start_time, tz))
            .or_default()
            .push(event);
    }

    let mut available: HashSet<NaiveDate> = HashSet::new();
    let mut voted: HashSet<NaiveDate> = HashSet::new();
    for slot in slots {
        let date = local_date(&slot.timestamp, tz);
        available.insert(date);
        if slot.is_voted_by_viewer {
            voted.insert(date);
        }
    }

    let cells: Vec<MonthCell<'a>> = grid_start
        .iter_days()
        .take_while(|d| *d <= grid_end)
        .map(|date| {
            let mut day_events = by_date.remove(&date).unwrap_or_default();
            day_events.sort_by_key(|e| e.start_time);
            MonthCell {
                date,
                in_month: date.month() == month && date.year() == year,
                events: day_events,
                has_availability: available.contains(&date),
                has_voted: voted.contains(&date),
            }
        })
        .collect();

    tracing::trace!(
        "Built month grid {}-{:02} with {} cells",
        year,
        month,
        cells.len()
    );

    Ok(MonthGrid { year, month, cells })
}

/// Project events and slots onto the hourly rows of `date`.
pub fn day_grid<'a, Tz: TimeZone>(
    date: NaiveDate,
    events: &'a [CalendarEvent],
    slots: &[AvailabilitySlot],
    tz: &Tz,
    options: &GridOptions,
) -> Result<DayGrid<'a>, CalendarError> {
    options.validate()?;

    let mut day_events: Vec<&'a CalendarEvent> = events
        .iter()
        .filter(|e| local_date(&e.start_time, tz) == date)
        .collect();
    day_events.sort_by_key(|e| e.start_time);

    let mut rows = Vec::new();
    for hour in options.day_hours.clone() {
        let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        // Hours skipped by a DST jump have no row.
        let Some(row_start) = tz.from_local_datetime(&naive).earliest() else {
            tracing::debug!("Skipping non-existent local hour {} on {}", hour, date);
            continue;
        };

        let hour_events = day_events
            .iter()
            .copied()
            .filter(|e| {
                let local = e.start_time.with_timezone(tz);
                local.hour() == hour
            })
            .collect();

        rows.push(DayRow {
            hour,
            starts_at: row_start.with_timezone(&Utc),
            events: hour_events,
            is_available: is_hour_available(slots, &row_start),
            is_voted: is_slot_voted_in_hour(slots, &row_start),
        });
    }

    let slots_on_day = slots
        .iter()
        .filter(|s| local_date(&s.timestamp, tz) == date)
        .count();

    Ok(DayGrid {
        date,
        rows,
        slots_on_day,
    })
}
