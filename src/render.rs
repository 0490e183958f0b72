use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use plotly::common::{Mode, Title};
use plotly::layout::{Axis, HoverMode, Legend};
use plotly::{Layout, Plot, Scatter};
use plotters::prelude::*;
use polars::prelude::DataType;
use tracing::{debug, info};

use crate::{DataSet, DATE, TOTAL_CASES, TOTAL_DEATHS};

// days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const CASES_COLOR: RGBColor = RGBColor(31, 119, 180);
const DEATHS_COLOR: RGBColor = RED;

/// Where rendered charts are shown.
pub trait Viewer {
    /// Show a static chart and return once the user has dismissed it.
    fn show_blocking(&self, chart: &Path) -> Result<()>;

    /// Hand an interactive chart to the viewer and return right away.
    fn launch(&self, chart: &Path) -> Result<()>;
}

/// Opens charts with the desktop's default application.
pub struct SystemViewer;

impl Viewer for SystemViewer {
    fn show_blocking(&self, chart: &Path) -> Result<()> {
        opener::open(chart).with_context(|| format!("failed to open {}", chart.display()))?;
        eprint!("Close the chart and press Enter to continue...");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }

    fn launch(&self, chart: &Path) -> Result<()> {
        opener::open(chart).with_context(|| format!("failed to open {}", chart.display()))?;
        Ok(())
    }
}

/// One metric over time; `None` marks a day without a reported value.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub label: String,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl TimeSeries {
    /// Pair a numeric column with the (already normalized) `date` column.
    /// Rows without a date are dropped.
    pub fn from_dataset(ds: &DataSet, column: &str) -> Result<Self> {
        let days = ds.column(DATE)?.cast(&DataType::Int32)?;
        let values = ds.column(column)?.cast(&DataType::Float64)?;
        let points = days
            .i32()?
            .into_iter()
            .zip(values.f64()?.into_iter())
            .filter_map(|(day, value)| day.and_then(date_from_epoch_days).map(|d| (d, value)))
            .collect();
        Ok(Self {
            label: column.to_string(),
            points,
        })
    }

    fn observed(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|(date, value)| value.map(|v| (*date, v)))
    }

    fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.points.iter().map(|(d, _)| *d).min()?;
        let end = self.points.iter().map(|(d, _)| *d).max()?;
        if start == end {
            return Some((start, start.succ_opt().unwrap_or(start)));
        }
        Some((start, end))
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// A single-series line chart drawn as SVG.
pub struct LineChart<'a> {
    pub title: String,
    pub y_desc: &'a str,
    pub color: RGBColor,
    pub series: &'a TimeSeries,
}

impl<'a> LineChart<'a> {
    pub fn draw(&self, path: &Path) -> Result<()> {
        let Some((start, end)) = self.series.date_range() else {
            bail!("no dated rows to plot for {}", self.series.label);
        };
        let observed: Vec<(NaiveDate, f64)> = self.series.observed().collect();
        let peak = observed.iter().map(|(_, v)| *v).fold(0f64, f64::max);
        let top = if peak > 0.0 { peak * 1.05 } else { 1.0 };

        let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&self.title, ("sans-serif", 28))
            .margin(20)
            .x_label_area_size(100)
            .y_label_area_size(90)
            .build_cartesian_2d(start..end, 0f64..top)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc(self.y_desc)
            .x_labels(12)
            .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
            .x_label_style(("sans-serif", 14).into_font().transform(FontTransform::Rotate90))
            .draw()?;

        chart.draw_series(LineSeries::new(observed, self.color.stroke_width(2)))?;
        root.present()?;
        Ok(())
    }
}

/// A static chart file that lives only as long as this guard.
///
/// The file is removed on drop, whether the viewer returned normally or
/// failed, and also when drawing itself failed half way.
pub struct StaticChart {
    path: PathBuf,
}

impl StaticChart {
    pub fn draw(chart: &LineChart<'_>, path: PathBuf) -> Result<Self> {
        let guard = Self { path };
        chart.draw(&guard.path)?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StaticChart {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("closed chart {}", self.path.display()),
            Err(err) => debug!("chart {} not removed: {}", self.path.display(), err),
        }
    }
}

/// Cases and deaths on one browser chart with a shared hover.
pub fn interactive_chart(cases: &TimeSeries, deaths: &TimeSeries, country: &str) -> Plot {
    let mut plot = Plot::new();
    plot.add_trace(trace(cases));
    plot.add_trace(trace(deaths));

    let layout = Layout::new()
        .title(Title::new(&format!("COVID-19 Cases and Deaths in {}", country)))
        .x_axis(Axis::new().title(Title::new("Date")))
        .y_axis(Axis::new().title(Title::new("Count")))
        .legend(Legend::new().title(Title::new("Metric")))
        .hover_mode(HoverMode::XUnified);
    plot.set_layout(layout);
    plot
}

fn trace(series: &TimeSeries) -> Box<Scatter<String, Option<f64>>> {
    let (x, y): (Vec<String>, Vec<Option<f64>>) = series
        .points
        .iter()
        .map(|(date, value)| (date.format("%Y-%m-%d").to_string(), *value))
        .unzip();
    Scatter::new(x, y).name(series.label.as_str()).mode(Mode::Lines)
}

/// Draw the two static charts (one at a time, each blocking until dismissed)
/// and then launch the interactive one. Returns the interactive chart's path.
pub fn render_charts<V: Viewer + ?Sized>(
    view: &DataSet,
    country: &str,
    chart_dir: &Path,
    viewer: &V,
) -> Result<PathBuf> {
    fs::create_dir_all(chart_dir)
        .with_context(|| format!("failed to create {}", chart_dir.display()))?;

    let cases = TimeSeries::from_dataset(view, TOTAL_CASES)?;
    let deaths = TimeSeries::from_dataset(view, TOTAL_DEATHS)?;

    let static_charts = [
        LineChart {
            title: format!("COVID-19 Total Cases in {}", country),
            y_desc: "Total Cases",
            color: CASES_COLOR,
            series: &cases,
        },
        LineChart {
            title: format!("COVID-19 Total Deaths in {}", country),
            y_desc: "Total Deaths",
            color: DEATHS_COLOR,
            series: &deaths,
        },
    ];
    for chart in &static_charts {
        let path = chart_dir.join(format!("{}_{}.svg", country, chart.series.label));
        let shown = StaticChart::draw(chart, path)?;
        info!("showing {}", shown.path().display());
        viewer.show_blocking(shown.path())?;
    }

    let html = chart_dir.join(format!("{}_cases_deaths.html", country));
    fs::write(&html, interactive_chart(&cases, &deaths, country).to_html())
        .with_context(|| format!("failed to write {}", html.display()))?;
    info!("opening interactive chart {}", html.display());
    viewer.launch(&html)?;

    Ok(html)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use polars::prelude::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Shown {
        Static { path: PathBuf, svg: String },
        Interactive { path: PathBuf, html: String },
    }

    /// Records what would have been displayed, reading the file while it exists.
    #[derive(Default)]
    pub(crate) struct RecordingViewer {
        shown: RefCell<Vec<Shown>>,
    }

    impl RecordingViewer {
        pub(crate) fn calls(&self) -> Vec<Shown> {
            self.shown.borrow().clone()
        }
    }

    impl Viewer for RecordingViewer {
        fn show_blocking(&self, chart: &Path) -> anyhow::Result<()> {
            let svg = fs::read_to_string(chart)?;
            self.shown.borrow_mut().push(Shown::Static {
                path: chart.to_path_buf(),
                svg,
            });
            Ok(())
        }

        fn launch(&self, chart: &Path) -> anyhow::Result<()> {
            let html = fs::read_to_string(chart)?;
            self.shown.borrow_mut().push(Shown::Interactive {
                path: chart.to_path_buf(),
                html,
            });
            Ok(())
        }
    }

    struct RejectingViewer;

    impl Viewer for RejectingViewer {
        fn show_blocking(&self, _chart: &Path) -> anyhow::Result<()> {
            bail!("viewer closed unexpectedly")
        }

        fn launch(&self, _chart: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn canada() -> DataSet {
        let df = df!(
            "location" => &["Canada", "Canada", "Canada"],
            "date" => &["2020-01-22", "2020-01-23", "2020-01-24"],
            "total_cases" => &[Some(0i64), Some(1), Some(2)],
            "total_deaths" => &[None, None, Some(0i64)],
        )
        .unwrap();
        let mut ds = DataSet(df);
        ds.normalize_dates().unwrap();
        ds
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    #[test]
    fn series_pairs_dates_with_values() {
        let ds = canada();

        let cases = TimeSeries::from_dataset(&ds, TOTAL_CASES).unwrap();
        let deaths = TimeSeries::from_dataset(&ds, TOTAL_DEATHS).unwrap();

        assert_eq!(
            cases.points,
            vec![(day(22), Some(0.0)), (day(23), Some(1.0)), (day(24), Some(2.0))]
        );
        assert_eq!(deaths.points, vec![(day(22), None), (day(23), None), (day(24), Some(0.0))]);
        assert_eq!(deaths.observed().collect::<Vec<_>>(), vec![(day(24), 0.0)]);
    }

    #[test]
    fn epoch_days_map_to_calendar_dates() {
        assert_eq!(date_from_epoch_days(0), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(date_from_epoch_days(18_283), Some(day(22)));
    }

    #[test]
    fn single_day_gets_a_non_empty_range() {
        let series = TimeSeries {
            label: "total_cases".to_string(),
            points: vec![(day(22), Some(4.0))],
        };
        assert_eq!(series.date_range(), Some((day(22), day(23))));
    }

    #[test]
    fn static_chart_file_is_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let ds = canada();
        let cases = TimeSeries::from_dataset(&ds, TOTAL_CASES).unwrap();
        let chart = LineChart {
            title: "COVID-19 Total Cases in Canada".to_string(),
            y_desc: "Total Cases",
            color: CASES_COLOR,
            series: &cases,
        };
        let path = tmp.path().join("cases.svg");

        let guard = StaticChart::draw(&chart, path.clone()).unwrap();
        let svg = fs::read_to_string(guard.path()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("COVID-19 Total Cases in Canada"));

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn interactive_layout_has_unified_hover_and_metric_legend() {
        let ds = canada();
        let cases = TimeSeries::from_dataset(&ds, TOTAL_CASES).unwrap();
        let deaths = TimeSeries::from_dataset(&ds, TOTAL_DEATHS).unwrap();

        let html = interactive_chart(&cases, &deaths, "Canada").to_html();

        assert!(html.contains("COVID-19 Cases and Deaths in Canada"));
        assert!(html.contains("x unified"));
        assert!(html.contains("Metric"));
        assert!(html.contains("total_cases"));
        assert!(html.contains("total_deaths"));
        assert!(html.contains("2020-01-24"));
    }

    #[test]
    fn charts_are_shown_in_order() {
        let tmp = TempDir::new().unwrap();
        let viewer = RecordingViewer::default();

        let html = render_charts(&canada(), "Canada", tmp.path(), &viewer).unwrap();

        let calls = viewer.calls();
        assert_eq!(calls.len(), 3);
        match (&calls[0], &calls[1], &calls[2]) {
            (
                Shown::Static { path: cases, svg: cases_svg },
                Shown::Static { path: deaths, svg: deaths_svg },
                Shown::Interactive { path, .. },
            ) => {
                assert!(cases_svg.contains("COVID-19 Total Cases in Canada"));
                assert!(deaths_svg.contains("COVID-19 Total Deaths in Canada"));
                assert!(!cases.exists());
                assert!(!deaths.exists());
                assert_eq!(path, &html);
            }
            other => panic!("unexpected viewer calls: {:?}", other),
        }
        assert!(html.exists());
    }

    #[test]
    fn viewer_failure_still_releases_the_chart() {
        let tmp = TempDir::new().unwrap();

        let err = render_charts(&canada(), "Canada", tmp.path(), &RejectingViewer).unwrap_err();

        assert!(err.to_string().contains("viewer closed unexpectedly"));
        assert!(!tmp.path().join("Canada_total_cases.svg").exists());
    }
}
