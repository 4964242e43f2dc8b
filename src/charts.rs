//! Bar charts for the aggregate views, written as standalone HTML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use plotly::common::Orientation;
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Plot};
use tracing::info;

use crate::analyzers::types::{CategoryAggregate, CountryAggregate};

pub const COUNTRY_CHART_FILE: &str = "average_rating_by_country.html";
pub const CATEGORY_CHART_FILE: &str = "top_categories.html";

fn horizontal_bars(labels: Vec<String>, values: Vec<f64>, color: &str, title: &str, y_title: &str) -> Plot {
    let mut plot = Plot::new();

    plot.add_trace(
        Bar::new(values, labels)
            .orientation(Orientation::Horizontal)
            .marker(plotly::common::Marker::new().color(color.to_string())),
    );

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Average Rating"))
            .y_axis(Axis::new().title(y_title)),
    );

    plot
}

/// Average rating per country. Countries without a defined average are left out.
pub fn country_chart(countries: &[CountryAggregate]) -> Plot {
    let (labels, values): (Vec<_>, Vec<_>) = countries
        .iter()
        .filter_map(|c| c.average_rating.map(|avg| (c.country.clone(), avg)))
        .unzip();

    horizontal_bars(
        labels,
        values,
        "rgba(68, 1, 84, 0.8)",
        "Average Rating by Country",
        "Country",
    )
}

/// Highest-rated categories, best first.
pub fn category_chart(categories: &[CategoryAggregate], top_n: usize) -> Plot {
    let (labels, values): (Vec<_>, Vec<_>) = categories
        .iter()
        .filter_map(|c| c.average_rating.map(|avg| (c.category.clone(), avg)))
        .unzip();

    horizontal_bars(
        labels,
        values,
        "rgba(183, 55, 121, 0.8)",
        &format!("Top {} Categories with Highest Average Rating", top_n),
        "Category",
    )
}

/// Writes both charts into `dir` and returns their paths.
#[tracing::instrument(skip(dir, countries, categories), fields(dir = %dir.display()))]
pub fn write_charts(
    dir: &Path,
    countries: &[CountryAggregate],
    categories: &[CategoryAggregate],
    top_n: usize,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let charts = [
        (COUNTRY_CHART_FILE, country_chart(countries)),
        (CATEGORY_CHART_FILE, category_chart(categories, top_n)),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file_name, plot) in charts {
        let path = dir.join(file_name);
        fs::write(&path, plot.to_html())?;
        info!(path = %path.display(), "Saved chart");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn countries() -> Vec<CountryAggregate> {
        vec![
            CountryAggregate {
                country: "France".into(),
                average_rating: Some(4.5),
            },
            CountryAggregate {
                country: "Chile".into(),
                average_rating: None,
            },
        ]
    }

    fn categories() -> Vec<CategoryAggregate> {
        vec![CategoryAggregate {
            category: "Museum".into(),
            average_rating: Some(4.5),
        }]
    }

    #[test]
    fn test_country_chart_skips_undefined() {
        let json = country_chart(&countries()).to_json();
        assert!(json.contains("Average Rating by Country"));
        assert!(json.contains("France"));
        assert!(!json.contains("Chile"));
    }

    #[test]
    fn test_category_chart_title_follows_n() {
        let json = category_chart(&categories(), 3).to_json();
        assert!(json.contains("Top 3 Categories with Highest Average Rating"));
        assert!(json.contains("Museum"));
    }

    #[test]
    fn test_write_charts() {
        let dir = env::temp_dir().join("rating_report_test_charts");
        let _ = fs::remove_dir_all(&dir);

        let paths = write_charts(&dir, &countries(), &categories(), 3).unwrap();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert!(path.exists());
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
