use crate::analyzers::types::{CategoryAggregate, CountryAggregate};
use crate::analyzers::utility::mean;
use crate::dataset::{CATEGORY, COUNTRY, Dataset};
use crate::error::Result;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Number of categories kept in the report unless told otherwise.
pub const DEFAULT_TOP_N: usize = 3;

/// Groups ratings by the value of `key_column`, ascending by key.
///
/// Every distinct key gets an entry, even when none of its ratings are usable.
/// Rows with an empty key cell belong to no group.
fn group_ratings<'a>(dataset: &'a Dataset, key_column: &str) -> Result<BTreeMap<&'a str, Vec<f64>>> {
    let mut series: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for (key, rating) in dataset.keyed_ratings(key_column)? {
        if key.is_empty() {
            continue;
        }
        let values = series.entry(key).or_default();
        if let Some(rating) = rating {
            values.push(rating);
        }
    }

    Ok(series)
}

/// Average `Rating` per distinct `Country`, ordered by country label.
pub fn compute_country_averages(dataset: &Dataset) -> Result<Vec<CountryAggregate>> {
    let series = group_ratings(dataset, COUNTRY)?;

    let aggregates: Vec<_> = series
        .into_iter()
        .map(|(country, values)| CountryAggregate {
            country: country.to_string(),
            average_rating: mean(&values),
        })
        .collect();

    debug!(countries = aggregates.len(), "Country averages computed");
    Ok(aggregates)
}

/// The `top_n` categories with the highest average `Rating`.
///
/// Ties keep ascending category order; categories without a usable rating
/// rank after every defined average.
pub fn compute_top_categories(dataset: &Dataset, top_n: usize) -> Result<Vec<CategoryAggregate>> {
    let series = group_ratings(dataset, CATEGORY)?;

    let mut aggregates: Vec<_> = series
        .into_iter()
        .map(|(category, values)| CategoryAggregate {
            category: category.to_string(),
            average_rating: mean(&values),
        })
        .collect();

    let distinct = aggregates.len();
    aggregates.sort_by(|a, b| descending(a.average_rating, b.average_rating));
    aggregates.truncate(top_n);

    debug!(distinct, kept = aggregates.len(), top_n, "Top categories computed");
    Ok(aggregates)
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    fn sample() -> Dataset {
        dataset(
            "Country,Category,Rating\n\
             France,Museum,4\n\
             France,Museum,5\n\
             Italy,Park,3\n",
        )
    }

    #[test]
    fn test_country_averages_example() {
        let result = compute_country_averages(&sample()).unwrap();
        assert_eq!(
            result,
            vec![
                CountryAggregate {
                    country: "France".into(),
                    average_rating: Some(4.5)
                },
                CountryAggregate {
                    country: "Italy".into(),
                    average_rating: Some(3.0)
                },
            ]
        );
    }

    #[test]
    fn test_top_categories_fewer_than_n() {
        let result = compute_top_categories(&sample(), DEFAULT_TOP_N).unwrap();
        let names: Vec<_> = result.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Museum", "Park"]);
        assert_eq!(result[0].average_rating, Some(4.5));
        assert_eq!(result[1].average_rating, Some(3.0));
    }

    #[test]
    fn test_countries_sorted_by_label() {
        let ds = dataset("Country,Category,Rating\nSpain,A,1\nBrazil,A,2\nIndia,A,3\n");
        let names: Vec<_> = compute_country_averages(&ds)
            .unwrap()
            .into_iter()
            .map(|c| c.country)
            .collect();
        assert_eq!(names, vec!["Brazil", "India", "Spain"]);
    }

    #[test]
    fn test_top_categories_truncates_and_breaks_ties_by_label() {
        let ds = dataset(
            "Country,Category,Rating\n\
             X,Zoo,4\n\
             X,Beach,4\n\
             X,Park,2\n\
             X,Museum,5\n\
             X,Cafe,1\n",
        );
        let result = compute_top_categories(&ds, 3).unwrap();
        let names: Vec<_> = result.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Museum", "Beach", "Zoo"]);
    }

    #[test]
    fn test_top_categories_non_increasing() {
        let ds = dataset(
            "Country,Category,Rating\n\
             X,a,1\nX,b,2\nX,c,3\nX,d,4\nX,b,5\nX,a,2\n",
        );
        let result = compute_top_categories(&ds, 3).unwrap();
        assert_eq!(result.len(), 3);
        for pair in result.windows(2) {
            assert!(pair[0].average_rating >= pair[1].average_rating);
        }
    }

    #[test]
    fn test_missing_ratings_excluded_from_mean() {
        let ds = dataset("Country,Category,Rating\nPeru,Park,4\nPeru,Park,\nPeru,Park,oops\n");
        let result = compute_country_averages(&ds).unwrap();
        assert_eq!(result[0].average_rating, Some(4.0));
    }

    #[test]
    fn test_all_missing_partition_is_undefined() {
        let ds = dataset("Country,Category,Rating\nChile,Park,\nPeru,Zoo,2\n");
        let countries = compute_country_averages(&ds).unwrap();
        assert_eq!(countries[0].country, "Chile");
        assert_eq!(countries[0].average_rating, None);

        let categories = compute_top_categories(&ds, 3).unwrap();
        assert_eq!(categories[0].category, "Zoo");
        assert_eq!(categories[1].category, "Park");
        assert_eq!(categories[1].average_rating, None);
    }

    #[test]
    fn test_empty_dataset_gives_empty_views() {
        let ds = dataset("Country,Category,Rating\n");
        assert!(compute_country_averages(&ds).unwrap().is_empty());
        assert!(compute_top_categories(&ds, 3).unwrap().is_empty());
    }

    #[test]
    fn test_schema_errors() {
        let ds = dataset("Country,Rating\nFrance,4\n");
        assert!(compute_country_averages(&ds).is_ok());
        assert!(matches!(
            compute_top_categories(&ds, 3),
            Err(ReportError::Schema { ref column }) if column == "Category"
        ));

        let ds = dataset("Country,Category\nFrance,Museum\n");
        assert!(matches!(
            compute_country_averages(&ds),
            Err(ReportError::Schema { ref column }) if column == "Rating"
        ));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let ds = dataset("Id,Country,Visitors,Category,Rating\n1,Japan,100,Temple,4.5\n");
        let result = compute_country_averages(&ds).unwrap();
        assert_eq!(result[0].average_rating, Some(4.5));
    }

    #[test]
    fn test_infinite_ratings_are_excluded() {
        let ds = dataset(
            "Country,Category,Rating\n\
             X,A,inf\n\
             X,A,-inf\n\
             Y,B,4\n\
             Y,A,2\n",
        );
        let categories = compute_top_categories(&ds, 3).unwrap();
        assert_eq!(categories[0].category, "B");
        assert_eq!(categories[0].average_rating, Some(4.0));
        assert_eq!(categories[1].category, "A");
        assert_eq!(categories[1].average_rating, Some(2.0));

        let countries = compute_country_averages(&ds).unwrap();
        assert_eq!(countries[0].average_rating, None);
        assert_eq!(countries[1].average_rating, Some(3.0));
    }

    #[test]
    fn test_many_categories_sort_without_panicking() {
        let mut csv = String::from("Country,Category,Rating\n");
        for i in 0..64 {
            if i % 7 == 0 {
                csv.push_str(&format!("X,cat{:02},inf\nX,cat{:02},-inf\n", i, i));
            } else {
                csv.push_str(&format!("X,cat{:02},{}\n", i, (i % 5) as f64 + 0.5));
            }
        }
        let ds = dataset(&csv);

        let result = compute_top_categories(&ds, 64).unwrap();
        assert_eq!(result.len(), 64);
        for pair in result.windows(2) {
            match (pair[0].average_rating, pair[1].average_rating) {
                (Some(a), Some(b)) => {
                    assert!(a >= b);
                    if a == b {
                        assert!(pair[0].category < pair[1].category);
                    }
                }
                (None, Some(_)) => panic!("undefined average ranked above a defined one"),
                _ => {}
            }
        }
        assert!(result.iter().all(|c| c.average_rating.is_none_or(f64::is_finite)));
        assert_eq!(result.iter().filter(|c| c.average_rating.is_none()).count(), 10);
    }

    #[test]
    fn test_empty_keys_form_no_group() {
        let ds = dataset("Country,Category,Rating\n,Museum,4\nItaly,,3\nItaly,Park,5\n");

        let countries = compute_country_averages(&ds).unwrap();
        assert_eq!(
            countries,
            vec![CountryAggregate {
                country: "Italy".into(),
                average_rating: Some(4.0)
            }]
        );

        let categories = compute_top_categories(&ds, 3).unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Park", "Museum"]);
    }
}
