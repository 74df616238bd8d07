use std::path::Path;

use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use tracing::info;

use crate::prices::DayAheadTable;
use crate::DayAheadError;

const CHART_SIZE: (u32, u32) = (1200, 600);

/// Renders the hourly price line to a PNG, with the daily average drawn as a
/// dashed reference line. Hours without a price break the line and leave a
/// gap in the markers.
pub fn render_price_chart(
    table: &DayAheadTable,
    avg_eur_mwh: f64,
    out: &Path,
) -> Result<(), DayAheadError> {
    let runs = price_runs(table);
    let points: Vec<(u32, f64)> = runs.iter().flatten().copied().collect();

    if points.is_empty() {
        return Err(DayAheadError::NoDataRows);
    }

    let mut y_min = avg_eur_mwh;
    let mut y_max = avg_eur_mwh;
    for &(_, price) in &points {
        y_min = y_min.min(price);
        y_max = y_max.max(price);
    }
    let pad = ((y_max - y_min) * 0.05).max(1.0);

    let root = BitMapBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Hourly electricity prices: {}", table.delivery_date),
            ("sans-serif", 28),
        )
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(65)
        .build_cartesian_2d(0u32..25u32, (y_min - pad)..(y_max + pad))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_labels(25)
        // ticks on the plotted hours only; the delivery day ends at
        // midnight, plotted at position 24
        .x_label_formatter(&|hour| match *hour {
            24 => "0".to_owned(),
            h @ 1..=23 => h.to_string(),
            _ => String::new(),
        })
        .x_desc("Hour (01:00 - 00:00)")
        .y_desc("Price (EUR/MWh)")
        .draw()
        .map_err(chart_err)?;

    for run in &runs {
        chart
            .draw_series(LineSeries::new(run.iter().copied(), &BLUE))
            .map_err(chart_err)?;
    }
    chart
        .draw_series(
            points
                .iter()
                .map(|&(hour, price)| Circle::new((hour, price), 3, BLUE.filled())),
        )
        .map_err(chart_err)?;

    chart
        .draw_series(DashedLineSeries::new(
            [(0u32, avg_eur_mwh), (25u32, avg_eur_mwh)],
            6,
            4,
            RED.stroke_width(1),
        ))
        .map_err(chart_err)?
        .label(format!("Average price: {avg_eur_mwh:.2} EUR/MWh"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!("chart written to {}", out.display());

    Ok(())
}

fn chart_err(e: impl std::fmt::Display) -> DayAheadError {
    DayAheadError::Chart(e.to_string())
}

/// Contiguous stretches of priced hours. A row without a price, or an hour
/// missing from the table entirely, ends the current run so the plotted
/// line breaks there instead of bridging the gap.
fn price_runs(table: &DayAheadTable) -> Vec<Vec<(u32, f64)>> {
    let mut runs: Vec<Vec<(u32, f64)>> = Vec::new();
    let mut current: Vec<(u32, f64)> = Vec::new();

    for row in &table.rows {
        let hour = row.plot_hour();
        match row.price_eur_per_mwh() {
            Some(price) => {
                if let Some(&(prev, _)) = current.last() {
                    if hour != prev + 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                }
                current.push((hour, price));
            }
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }

    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::HourlyPrice;
    use chrono::NaiveDate;

    fn sample_table() -> DayAheadTable {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let rows = (0..24)
            .map(|hour| HourlyPrice {
                delivery_date: date,
                hour,
                price_cents_per_mwh: if hour == 12 {
                    None
                } else {
                    Some(5000 + i64::from(hour) * 150)
                },
            })
            .collect();
        DayAheadTable::new(date, rows)
    }

    #[test]
    fn test_price_runs_break_on_missing_price() {
        let table = sample_table();
        let runs = price_runs(&table);

        // hour 12 has no price, so the day splits around it
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].first().map(|p| p.0), Some(1));
        assert_eq!(runs[0].last().map(|p| p.0), Some(11));
        assert_eq!(runs[1].first().map(|p| p.0), Some(13));
        assert_eq!(runs[1].last().map(|p| p.0), Some(24));
    }

    #[test]
    fn test_price_runs_break_on_absent_hour() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let rows = [1, 2, 5, 6]
            .into_iter()
            .map(|hour| HourlyPrice {
                delivery_date: date,
                hour,
                price_cents_per_mwh: Some(1000),
            })
            .collect();
        let table = DayAheadTable::new(date, rows);

        let runs = price_runs(&table);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].iter().map(|p| p.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(runs[1].iter().map(|p| p.0).collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("prices.png");

        let table = sample_table();
        let avg = table.average_price_eur_mwh().unwrap();
        render_price_chart(&table, avg, &out).unwrap();

        let meta = std::fs::metadata(&out).unwrap();
        assert!(meta.len() > 0);
    }

    #[test]
    fn test_render_with_no_prices() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.png");

        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let table = DayAheadTable::new(
            date,
            vec![HourlyPrice {
                delivery_date: date,
                hour: 1,
                price_cents_per_mwh: None,
            }],
        );

        assert!(matches!(
            render_price_chart(&table, 0.0, &out),
            Err(DayAheadError::NoDataRows)
        ));
    }
}
