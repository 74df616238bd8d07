use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::prices::{DayAheadTable, HourlyPrice};
use crate::DayAheadError;

/// Rows of the rendered price grid. The fetch stage waits on the same
/// selector before taking the page source.
pub const DATA_ROW_SELECTOR: &str = "tr.dx-row.dx-data-row";

const DATE_INPUT_SELECTOR: &str = "dx-date-box input[type=\"hidden\"]";

fn selector(css: &str) -> Result<Selector, DayAheadError> {
    Selector::parse(css).map_err(|e| DayAheadError::Selector(format!("{css}: {e}")))
}

/// Parses the rendered page into a delivery-ordered price table.
///
/// The delivery date comes from the hidden input inside the `dx-date-box`
/// widget; the prices come from the data rows of the grid. A row with an
/// unreadable price is kept without one, a row with an unreadable hour is
/// dropped. Missing date or an empty grid is a hard error.
pub fn parse_document(html: &str) -> Result<DayAheadTable, DayAheadError> {
    let document = Html::parse_document(html);

    let date = find_delivery_date(&document)?;
    let rows = collect_rows(&document, date)?;

    Ok(DayAheadTable::new(date, rows))
}

fn find_delivery_date(document: &Html) -> Result<NaiveDate, DayAheadError> {
    let date_input = selector(DATE_INPUT_SELECTOR)?;
    let raw = document
        .select(&date_input)
        .find_map(|input| input.value().attr("value"))
        .ok_or(DayAheadError::MissingDeliveryDate)?;

    parse_delivery_date(raw)
        .ok_or_else(|| DayAheadError::MalformedDocument(format!("unreadable delivery date {raw:?}")))
}

/// The hidden input carries an ISO datetime on current portal builds; older
/// builds used a bare date, in ISO or day-first form.
fn parse_delivery_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .ok()
}

fn collect_rows(document: &Html, date: NaiveDate) -> Result<Vec<HourlyPrice>, DayAheadError> {
    let data_row = selector(DATA_ROW_SELECTOR)?;
    let cell = selector("td")?;

    let mut rows = Vec::new();
    for tr in document.select(&data_row) {
        let cells: Vec<ElementRef> = tr.select(&cell).collect();
        if cells.len() < 2 {
            continue;
        }

        let time_range = cell_text(&cells[0]);
        let Some(hour) = parse_hour(&time_range) else {
            warn!(%time_range, "skipping row with unreadable delivery hour");
            continue;
        };

        let raw_price = cell_text(&cells[1]);
        let price_cents_per_mwh = parse_price_cents(&raw_price);
        if price_cents_per_mwh.is_none() {
            warn!(hour, %raw_price, "invalid price format, keeping row without a price");
        }

        rows.push(HourlyPrice {
            delivery_date: date,
            hour,
            price_cents_per_mwh,
        });
    }

    if rows.is_empty() {
        return Err(DayAheadError::NoDataRows);
    }

    Ok(rows)
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_owned()
}

/// Delivery hour from a `HH:MM - HH:MM` range: the leading `HH`, which must
/// be followed by a colon and lie below 24.
fn parse_hour(time_range: &str) -> Option<u32> {
    let bytes = time_range.as_bytes();
    if bytes.len() < 3 || bytes[2] != b':' {
        return None;
    }

    let hour: u32 = time_range.get(..2)?.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Price cell to integer cents. The portal prints a decimal comma and may
/// group thousands with regular or no-break spaces.
fn parse_price_cents(raw: &str) -> Option<i64> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let eur: f64 = normalized.parse().ok()?;
    Some((eur * 100.0).round() as i64)
}
