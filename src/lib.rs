//! Bar-chart reporting for cell-type enrichment results.
//!
//! Takes a table of enrichment test results (one row per cell type, with a
//! raw p-value and a standardized deviation score), applies a
//! multiple-testing correction across the whole table and renders a bar
//! chart with significance markers. Faceting by result list and colouring
//! by effect direction are driven by optional columns in the input table.

pub mod helper_functions;
pub mod models;
pub mod plot;
pub mod prepare;
pub mod stats;

pub use models::CorrectionMethod;
pub use plot::{plot_enrichment, PlotOptions};
pub use prepare::prepare_results;
