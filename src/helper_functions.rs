use std::fs::File;
use std::path::PathBuf;

use polars::prelude::*;

use crate::models::polars_err;

pub fn read_csv(file_path: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &str, include_header: bool) -> PolarsResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let path = path.to_str().unwrap();

        let mut df = DataFrame::new(vec![
            Column::from(Series::new(PlSmallStr::from("cell_type"), vec!["a", "b"])),
            Column::from(Series::new(PlSmallStr::from("p_value"), vec![0.01, 0.5])),
        ])
        .unwrap();

        dataframe_to_csv(&mut df, path, true).unwrap();
        let loaded = read_csv(path).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 2);
    }
}
