//! Persistence Port Module
//! Destination interface for finished tables plus a CSV-backed implementation
//! for local runs.

use std::fs;
use std::path::PathBuf;

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Destination for finished tables, addressed by logical table name.
/// Implementations own load timestamps and primary keys; the pipeline hands
/// over tables exactly as produced.
pub trait TableSink {
    fn persist(&self, df: &DataFrame, table: &str) -> Result<(), SinkError>;
}

/// Sink writing one `<table>.csv` per logical table under a directory.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TableSink for CsvSink {
    fn persist(&self, df: &DataFrame, table: &str) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;

        // The combined sites table is published without its provenance column.
        let mut df = if table == "sitios" && df.column("fuente").is_ok() {
            df.drop("fuente")?
        } else {
            df.clone()
        };

        let path = self.dir.join(format!("{table}.csv"));
        let mut file = fs::File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

        info!(table, path = %path.display(), "table persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined_table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("provincia".into(), vec!["Chaco", "Salta"]),
            Column::new("nombre".into(), vec!["Museo A", "Cine 1"]),
            Column::new("fuente".into(), vec!["DNPyM", "INCAA"]),
        ])
        .unwrap()
    }

    #[test]
    fn sitios_is_persisted_without_its_fuente_column() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.persist(&combined_table(), "sitios").unwrap();

        let contents = fs::read_to_string(dir.path().join("sitios.csv")).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, "provincia,nombre");
    }

    #[test]
    fn other_tables_keep_all_their_columns() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        sink.persist(&combined_table(), "totales").unwrap();

        let contents = fs::read_to_string(dir.path().join("totales.csv")).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, "provincia,nombre,fuente");
        assert_eq!(contents.lines().count(), 3);
    }
}
