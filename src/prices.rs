use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

/// Timezone of the EE delivery area. The portal displays the delivery day
/// in market-local time, running from 01:00 to 00:00 of the next day.
pub const MARKET_TZ: Tz = chrono_tz::Europe::Tallinn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyPrice {
    /// Delivery day the price was published for.
    pub delivery_date: NaiveDate,
    /// Delivery hour as displayed, 0..=23. Hour 0 is the last interval of
    /// the delivery day (midnight of the following calendar day).
    pub hour: u32,
    /// Price in Euro-Cents/MWh. The price is stored as an integer to
    /// avoid floating-point errors. `None` when the cell did not parse.
    pub price_cents_per_mwh: Option<i64>,
}

impl HourlyPrice {
    /// Converts the price to Euros per MWh.
    pub fn price_eur_per_mwh(&self) -> Option<f64> {
        self.price_cents_per_mwh.map(|cents| cents as f64 / 100.0)
    }

    /// Position of this row on the delivery axis, 1..=24. Hour 0 plots at 24.
    pub fn plot_hour(&self) -> u32 {
        plot_hour(self.hour)
    }

    /// Start of the delivery interval in market-local time. DST-ambiguous
    /// local times resolve to the earliest instant.
    pub fn delivery_start(&self) -> Option<DateTime<Tz>> {
        let midnight = self.delivery_date.and_hms_opt(0, 0, 0)?;
        let naive = midnight + Duration::hours(i64::from(self.plot_hour()));
        MARKET_TZ.from_local_datetime(&naive).earliest()
    }
}

/// Maps a delivery hour to its sort position: hour 0 belongs at the end of
/// the day, after hour 23.
pub fn plot_hour(hour: u32) -> u32 {
    if hour == 0 {
        24
    } else {
        hour
    }
}

/// The extracted price table for one delivery day, rows in delivery order.
#[derive(Debug, Clone, Serialize)]
pub struct DayAheadTable {
    pub delivery_date: NaiveDate,
    pub rows: Vec<HourlyPrice>,
}

impl DayAheadTable {
    pub fn new(delivery_date: NaiveDate, mut rows: Vec<HourlyPrice>) -> Self {
        rows.sort_by_key(|row| row.plot_hour());
        Self {
            delivery_date,
            rows,
        }
    }

    /// Mean over the rows that carry a price, in EUR/MWh. `None` when no
    /// row has one.
    pub fn average_price_eur_mwh(&self) -> Option<f64> {
        let prices: Vec<f64> = self
            .rows
            .iter()
            .filter_map(HourlyPrice::price_eur_per_mwh)
            .collect();

        if prices.is_empty() {
            None
        } else {
            Some(prices.iter().sum::<f64>() / prices.len() as f64)
        }
    }
}
