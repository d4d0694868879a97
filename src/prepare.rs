//! Preparation of an enrichment results table for plotting.
//!
//! The input frame carries one row per cell type (optionally per result
//! list and effect direction) with a raw `p_value` and a standardized
//! deviation score `sd_from_mean`. Preparation adjusts the p-values
//! jointly across the whole table and appends the presentation columns
//! the chart needs.

use polars::prelude::*;
use tracing::info;

use crate::models::CorrectionMethod;
use crate::stats::p_adjust;

/// Significance threshold on the adjusted p-value.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Adjust p-values and derive the plotting columns.
///
/// `method` must be one of the names in [`crate::models::VALID_METHODS`];
/// anything else fails before the table is touched. The returned frame is
/// a copy of the input with four extra columns:
///
/// * `q_value` - adjusted p-value, computed over all rows at once (never
///   per `list_name` group)
/// * `is_significant` - `q_value < 0.05`
/// * `abs_deviation` - `sd_from_mean` clamped at 0 from below, then the
///   absolute value. Negative deviations are zeroed out rather than
///   reflected; downstream bar heights rely on this.
/// * `label_y_offset` - `sd_from_mean * 1.05`, where the significance
///   marker is drawn
///
/// Null p-values come back as null `q_value` and null `is_significant`,
/// mirroring how R's `p.adjust` treats NA.
pub fn prepare_results(df: &DataFrame, method: &str) -> PolarsResult<DataFrame> {
    let method: CorrectionMethod = method.parse()?;
    prepare_results_with(df, method)
}

/// Same as [`prepare_results`] but with an already-validated method.
pub fn prepare_results_with(
    df: &DataFrame,
    method: CorrectionMethod,
) -> PolarsResult<DataFrame> {
    let pvalues: Vec<f64> = df
        .column("p_value")?
        .f64()?
        .into_iter()
        .map(|p| p.unwrap_or(f64::NAN))
        .collect();

    let qvalues = p_adjust(&pvalues, method);

    let significant: Vec<Option<bool>> = qvalues
        .iter()
        .map(|&q| {
            if q.is_nan() {
                None
            } else {
                Some(q < SIGNIFICANCE_THRESHOLD)
            }
        })
        .collect();

    let qvalues: Vec<Option<f64>> = qvalues
        .iter()
        .map(|&q| if q.is_nan() { None } else { Some(q) })
        .collect();

    let sd = df.column("sd_from_mean")?.f64()?;
    let mut abs_deviation = Vec::with_capacity(df.height());
    let mut label_y_offset = Vec::with_capacity(df.height());
    for val in sd.into_iter() {
        match val {
            Some(v) => {
                abs_deviation.push(Some(v.max(0.0).abs()));
                label_y_offset.push(Some(v * 1.05));
            }
            None => {
                abs_deviation.push(None);
                label_y_offset.push(None);
            }
        }
    }

    let mut prepared = df.clone();
    prepared.with_column(Series::new(PlSmallStr::from("q_value"), qvalues))?;
    prepared.with_column(Series::new(PlSmallStr::from("is_significant"), significant))?;
    prepared.with_column(Series::new(PlSmallStr::from("abs_deviation"), abs_deviation))?;
    prepared.with_column(Series::new(
        PlSmallStr::from("label_y_offset"),
        label_y_offset,
    ))?;

    info!(
        "Adjusted {} p-values with method `{}`",
        prepared.height(),
        method
    );

    Ok(prepared)
}

/// Count significant rows per result list, for the run summary log.
///
/// With no `list_name` column the whole table counts as one unnamed list.
pub fn significance_summary(df: &DataFrame) -> PolarsResult<Vec<(String, u32, u32)>> {
    if df.get_column_names().iter().any(|c| c.as_str() == "list_name") {
        let counts = df
            .clone()
            .lazy()
            .group_by_stable([col("list_name")])
            .agg([
                col("is_significant")
                    .cast(DataType::UInt32)
                    .sum()
                    .alias("n_significant"),
                col("cell_type").count().alias("n_rows"),
            ])
            .collect()?;

        let lists = counts.column("list_name")?.str()?;
        let n_sig = counts.column("n_significant")?.u32()?;
        let n_rows = counts.column("n_rows")?.u32()?;

        let mut summary = Vec::with_capacity(counts.height());
        for i in 0..counts.height() {
            summary.push((
                lists.get(i).unwrap_or("").to_string(),
                n_sig.get(i).unwrap_or(0),
                n_rows.get(i).unwrap_or(0),
            ));
        }
        Ok(summary)
    } else {
        let sig = df.column("is_significant")?.bool()?;
        let n_sig = sig.into_iter().filter(|v| *v == Some(true)).count() as u32;
        Ok(vec![(String::new(), n_sig, df.height() as u32)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_table() -> DataFrame {
        let cell_type = Series::new(
            PlSmallStr::from("cell_type"),
            vec!["astrocyte", "microglia", "neuron"],
        );
        let p_value = Series::new(PlSmallStr::from("p_value"), vec![0.01, 0.04, 0.20]);
        let sd_from_mean = Series::new(PlSmallStr::from("sd_from_mean"), vec![3.2, -1.5, 0.8]);
        DataFrame::new(vec![
            Column::from(cell_type),
            Column::from(p_value),
            Column::from(sd_from_mean),
        ])
        .unwrap()
    }

    #[test]
    fn test_adds_derived_columns_and_preserves_rows() {
        let df = example_table();
        for method in ["holm", "hochberg", "hommel", "bonferroni", "BH", "BY", "fdr", "none"] {
            let prepared = prepare_results(&df, method).unwrap();
            assert_eq!(prepared.height(), df.height());
            for name in [
                "cell_type",
                "p_value",
                "sd_from_mean",
                "q_value",
                "is_significant",
                "abs_deviation",
                "label_y_offset",
            ] {
                assert!(
                    prepared.get_column_names().iter().any(|c| c.as_str() == name),
                    "{}: missing column {}",
                    method,
                    name
                );
            }
        }
    }

    #[test]
    fn test_input_frame_untouched() {
        let df = example_table();
        let width = df.width();
        prepare_results(&df, "BH").unwrap();
        assert_eq!(df.width(), width);
    }

    #[test]
    fn test_none_keeps_raw_pvalues() {
        let prepared = prepare_results(&example_table(), "none").unwrap();
        let p = prepared.column("p_value").unwrap().f64().unwrap();
        let q = prepared.column("q_value").unwrap().f64().unwrap();
        for i in 0..prepared.height() {
            assert_eq!(p.get(i), q.get(i));
        }
    }

    #[test]
    fn test_bonferroni_scenario() {
        let prepared = prepare_results(&example_table(), "bonferroni").unwrap();
        let q = prepared.column("q_value").unwrap().f64().unwrap();
        let expected = [0.03, 0.12, 0.60];
        for (i, e) in expected.iter().enumerate() {
            assert!((q.get(i).unwrap() - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_is_significant_matches_threshold() {
        for method in ["none", "bonferroni", "BH", "holm"] {
            let prepared = prepare_results(&example_table(), method).unwrap();
            let q = prepared.column("q_value").unwrap().f64().unwrap();
            let sig = prepared.column("is_significant").unwrap().bool().unwrap();
            for i in 0..prepared.height() {
                assert_eq!(
                    sig.get(i).unwrap(),
                    q.get(i).unwrap() < SIGNIFICANCE_THRESHOLD,
                    "method {}",
                    method
                );
            }
        }
    }

    #[test]
    fn test_negative_deviation_clamps_to_zero() {
        let prepared = prepare_results(&example_table(), "none").unwrap();
        let abs_dev = prepared.column("abs_deviation").unwrap().f64().unwrap();
        let sd = prepared.column("sd_from_mean").unwrap().f64().unwrap();
        for i in 0..prepared.height() {
            let a = abs_dev.get(i).unwrap();
            assert!(a >= 0.0);
            if sd.get(i).unwrap() < 0.0 {
                assert_eq!(a, 0.0);
            }
        }
        // Row 1 has sd_from_mean = -1.5; zeroed, not reflected.
        assert_eq!(abs_dev.get(1).unwrap(), 0.0);
    }

    #[test]
    fn test_label_offset_scales_deviation() {
        let prepared = prepare_results(&example_table(), "none").unwrap();
        let sd = prepared.column("sd_from_mean").unwrap().f64().unwrap();
        let off = prepared.column("label_y_offset").unwrap().f64().unwrap();
        for i in 0..prepared.height() {
            assert!((off.get(i).unwrap() - sd.get(i).unwrap() * 1.05).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let err = prepare_results(&example_table(), "not_a_method").unwrap_err();
        assert!(err.to_string().contains("valid methods"));
    }

    #[test]
    fn test_null_pvalue_propagates() {
        let cell_type = Series::new(PlSmallStr::from("cell_type"), vec!["a", "b"]);
        let p_value = Series::new(PlSmallStr::from("p_value"), vec![Some(0.01), None]);
        let sd = Series::new(PlSmallStr::from("sd_from_mean"), vec![1.0, 2.0]);
        let df = DataFrame::new(vec![
            Column::from(cell_type),
            Column::from(p_value),
            Column::from(sd),
        ])
        .unwrap();

        let prepared = prepare_results(&df, "BH").unwrap();
        let q = prepared.column("q_value").unwrap().f64().unwrap();
        let sig = prepared.column("is_significant").unwrap().bool().unwrap();
        assert!(q.get(0).is_some());
        assert!(q.get(1).is_none());
        assert!(sig.get(1).is_none());
    }

    #[test]
    fn test_adjustment_is_joint_across_lists() {
        // Two lists concatenated; bonferroni must multiply by the full
        // row count, not the per-list count.
        let cell_type = Series::new(PlSmallStr::from("cell_type"), vec!["a", "b", "a", "b"]);
        let p_value = Series::new(PlSmallStr::from("p_value"), vec![0.01, 0.02, 0.03, 0.04]);
        let sd = Series::new(PlSmallStr::from("sd_from_mean"), vec![1.0, 1.0, 1.0, 1.0]);
        let list = Series::new(PlSmallStr::from("list_name"), vec!["l1", "l1", "l2", "l2"]);
        let df = DataFrame::new(vec![
            Column::from(cell_type),
            Column::from(p_value),
            Column::from(sd),
            Column::from(list),
        ])
        .unwrap();

        let prepared = prepare_results(&df, "bonferroni").unwrap();
        let q = prepared.column("q_value").unwrap().f64().unwrap();
        assert!((q.get(0).unwrap() - 0.04).abs() < 1e-12);
        assert!((q.get(3).unwrap() - 0.16).abs() < 1e-12);
    }

    #[test]
    fn test_significance_summary_per_list() {
        let cell_type = Series::new(PlSmallStr::from("cell_type"), vec!["a", "b", "a", "b"]);
        let p_value = Series::new(PlSmallStr::from("p_value"), vec![0.001, 0.9, 0.9, 0.9]);
        let sd = Series::new(PlSmallStr::from("sd_from_mean"), vec![1.0, 1.0, 1.0, 1.0]);
        let list = Series::new(PlSmallStr::from("list_name"), vec!["l1", "l1", "l2", "l2"]);
        let df = DataFrame::new(vec![
            Column::from(cell_type),
            Column::from(p_value),
            Column::from(sd),
            Column::from(list),
        ])
        .unwrap();

        let prepared = prepare_results(&df, "none").unwrap();
        let summary = significance_summary(&prepared).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0], ("l1".to_string(), 1, 2));
        assert_eq!(summary[1], ("l2".to_string(), 0, 2));
    }

    #[test]
    fn test_significance_summary_without_lists() {
        let prepared = prepare_results(&example_table(), "none").unwrap();
        let summary = significance_summary(&prepared).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].1, 2);
        assert_eq!(summary[0].2, 3);
    }
}
