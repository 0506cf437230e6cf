//! Static daily-trend chart drawn with plotters.
//!
//! The backend follows the file extension: `.svg` gives an SVG document,
//! anything else a PNG bitmap.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

const SIZE: (u32, u32) = (1000, 600);
const TITLE: &str = "Daily Average Turnaround Time";

/// Draws `(date, hours)` points as a line with one marker per day.
fn draw_trend<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    points: &[(NaiveDate, f64)],
    title: &str,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let first = points.first().map(|(d, _)| *d).unwrap_or_default();
    let days: Vec<(i64, f64)> = points
        .iter()
        .map(|(date, hours)| ((*date - first).num_days(), *hours))
        .collect();

    let x_max = days.last().map(|(x, _)| *x).unwrap_or(0);
    let y_min = days.iter().map(|(_, h)| *h).fold(0.0_f64, f64::min);
    let y_max = days.iter().map(|(_, h)| *h).fold(1.0_f64, f64::max) * 1.1;

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-1i64..x_max + 1, y_min..y_max)?;

    let format_day = |offset: &i64| {
        (first + chrono::Duration::days(*offset))
            .format("%Y-%m-%d")
            .to_string()
    };
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Average Turnaround Time (Hours)")
        .x_labels(10)
        .x_label_formatter(&format_day)
        .draw()?;

    if days.is_empty() {
        return Ok(());
    }

    chart.draw_series(LineSeries::new(days.iter().copied(), &BLUE))?;
    chart.draw_series(
        days.iter()
            .map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())),
    )?;
    Ok(())
}

/// Renders the trend chart as an SVG document.
pub fn render_trend_svg(points: &[(NaiveDate, f64)], title: &str) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        draw_trend(&root, points, title)?;
        root.present()?;
    }
    Ok(svg)
}

/// Writes the daily trend chart to `path`.
pub fn write_trend_plot(path: &Path, points: &[(NaiveDate, f64)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if path.extension().and_then(|e| e.to_str()) == Some("svg") {
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        draw_trend(&root, points, TITLE)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(path, SIZE).into_drawing_area();
        draw_trend(&root, points, TITLE)?;
        root.present()?;
    }

    info!(path = %path.display(), days = points.len(), "Trend plot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_render_has_one_marker_per_day() {
        let svg = render_trend_svg(&[(date(1), 2.0), (date(2), 3.5), (date(5), 1.0)], "Trend").unwrap();

        assert!(svg.contains("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("Trend"));
    }

    #[test]
    fn test_render_empty_series() {
        let svg = render_trend_svg(&[], "Trend").unwrap();

        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<circle").count(), 0);
    }

    #[test]
    fn test_write_png_and_svg() {
        let points = [(date(1), 2.0), (date(3), 4.0)];

        let png = env::temp_dir().join("turnaround_test_trend.png");
        write_trend_plot(&png, &points).unwrap();
        let bytes = fs::read(&png).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        fs::remove_file(&png).unwrap();

        let svg = env::temp_dir().join("turnaround_test_trend.svg");
        write_trend_plot(&svg, &points).unwrap();
        let content = fs::read_to_string(&svg).unwrap();
        assert!(content.contains(TITLE));
        fs::remove_file(&svg).unwrap();
    }
}
