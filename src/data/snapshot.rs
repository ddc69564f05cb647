//! Snapshot Store Module
//! Date-partitioned CSV copies of downloaded tables, written on ingest and
//! read back by most recent creation time.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::Local;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::config::DatasetDescriptor;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("no snapshot found for category '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Filesystem store for point-in-time copies of downloaded tables, laid out
/// as `<root>/<category>/<year-month>/<category>-<day-month-year>.csv`.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write a snapshot of `df` for the descriptor's category and return its path.
    pub fn write(
        &self,
        df: &DataFrame,
        descriptor: &DatasetDescriptor,
    ) -> Result<PathBuf, SnapshotError> {
        let slug = descriptor.slug();
        let now = Local::now();
        let dir = self.root.join(&slug).join(now.format("%Y-%m").to_string());
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{slug}-{}.csv", now.format("%d-%m-%Y")));
        let mut file = fs::File::create(&path)?;
        let mut df = df.clone();
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;

        info!(category = %slug, path = %path.display(), "snapshot written");
        Ok(path)
    }

    /// Parse the most recently created snapshot for a category.
    pub fn latest(&self, category: &str) -> Result<DataFrame, SnapshotError> {
        let dir = self.root.join(category);
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "csv") {
                continue;
            }
            let metadata = fs::metadata(path)?;
            // Creation time is not available on every filesystem.
            let created = metadata.created().or_else(|_| metadata.modified())?;
            if newest.as_ref().map_or(true, |(time, _)| created > *time) {
                newest = Some((created, path.to_path_buf()));
            }
        }
        let (_, path) = newest.ok_or_else(|| SnapshotError::NotFound(category.to_string()))?;

        let df = LazyCsvReader::new(&path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        info!(category, path = %path.display(), "latest snapshot loaded");
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn latest_picks_the_most_recent_file_recursively() {
        let root = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(root.path());

        let old_dir = root.path().join("salas_de_cine/2022-01");
        let new_dir = root.path().join("salas_de_cine/2022-02");
        fs::create_dir_all(&old_dir).unwrap();
        fs::create_dir_all(&new_dir).unwrap();

        fs::write(
            old_dir.join("salas_de_cine-01-01-2022.csv"),
            "provincia,pantallas\nChaco,1\n",
        )
        .unwrap();
        // Filesystem timestamp resolution can be coarse.
        thread::sleep(Duration::from_millis(20));
        fs::write(
            new_dir.join("salas_de_cine-01-02-2022.csv"),
            "provincia,pantallas\nChaco,2\nSalta,3\n",
        )
        .unwrap();

        let df = store.latest("salas_de_cine").unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn latest_without_snapshots_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(root.path());
        let err = store.latest("museos").unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(category) if category == "museos"));
    }

    #[test]
    fn non_csv_files_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(root.path());
        let dir = root.path().join("museos/2022-03");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes.txt"), "not a table").unwrap();
        assert!(matches!(
            store.latest("museos"),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn write_then_latest_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(root.path());
        let descriptor = crate::config::DatasetDescriptor::salas_de_cine(String::new());
        let df = DataFrame::new(vec![
            Column::new("provincia".into(), vec!["Chaco", "Salta"]),
            Column::new("pantallas".into(), vec![2i64, 3]),
        ])
        .unwrap();

        let path = store.write(&df, &descriptor).unwrap();
        assert!(path.starts_with(root.path().join("salas_de_cine")));

        let loaded = store.latest("salas_de_cine").unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(
            loaded.column("pantallas").unwrap().i64().unwrap().get(1),
            Some(3)
        );
    }
}
