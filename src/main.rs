use std::env;

use polars::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use enrichment_plot::helper_functions::{dataframe_to_csv, read_csv};
use enrichment_plot::models::polars_err;
use enrichment_plot::plot::{plot_enrichment, PlotOptions};
use enrichment_plot::prepare::{prepare_results, significance_summary};

fn main() -> PolarsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        return Err(PolarsError::ComputeError(
            format!(
                "usage: {} <results.csv> <correction_method> <chart.(png|svg)> [options.json]",
                args.first().map(String::as_str).unwrap_or("enrichment-plot")
            )
            .into(),
        ));
    }
    let input_path = &args[1];
    let method = &args[2];
    let output_path = &args[3];

    let options = match args.get(4) {
        Some(path) => {
            info!("Loading plot options from {}", path);
            PlotOptions::from_file(path).map_err(|e| polars_err(e.into()))?
        }
        None => PlotOptions::default(),
    };

    let df = read_csv(input_path)?;
    info!("Loaded {} rows from {}", df.height(), input_path);

    let mut prepared = prepare_results(&df, method)?;

    for (list, n_significant, n_rows) in significance_summary(&prepared)? {
        if list.is_empty() {
            info!("{}/{} cell types significant at q < 0.05", n_significant, n_rows);
        } else {
            info!(
                "{}: {}/{} cell types significant at q < 0.05",
                list, n_significant, n_rows
            );
        }
    }

    let chart_stem = output_path
        .trim_end_matches(".png")
        .trim_end_matches(".svg");
    let prepared_path = format!("{}.prepared.csv", chart_stem);
    if let Err(e) = dataframe_to_csv(&mut prepared, &prepared_path, true) {
        warn!("Could not write prepared table to {}: {}", prepared_path, e);
    } else {
        info!("Prepared table written to {}", prepared_path);
    }

    plot_enrichment(&prepared, &options, output_path)?;

    Ok(())
}
