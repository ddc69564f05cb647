//! Schema Normalizer Module
//! Maps source-specific tables onto the canonical schema and stacks the
//! normalized tables into one combined table.

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::config::{DatasetDescriptor, Derivation, DeriveRule};
use crate::data::table::{lowercase_columns, string_values, SENTINELS};

/// Canonical column set every normalized table is shaped into, in order.
pub const CANONICAL_COLUMNS: [&str; 13] = [
    "cod_localidad",
    "id_provincia",
    "id_departamento",
    "categoria",
    "provincia",
    "localidad",
    "nombre",
    "domicilio",
    "codigo_postal",
    "numero_de_telefono",
    "mail",
    "web",
    "fuente",
];

/// Canonical columns holding integer codes.
const INTEGER_COLUMNS: [&str; 3] = ["cod_localidad", "id_provincia", "id_departamento"];

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("column '{column}' required by category '{category}' is missing")]
    MissingColumn { column: String, category: String },
    #[error("cannot derive a parent code from '{value}' in column '{column}'")]
    InvalidParentCode { column: String, value: String },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("no tables to concatenate")]
    EmptyInput,
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Normalize one source table onto the canonical schema.
///
/// Column names are lowercased, `categoria` is filled with the descriptor's
/// category name, the descriptor's derivation and rename rules are applied,
/// and sentinel values become nulls. With `drop_unmapped` the result has
/// exactly the [`CANONICAL_COLUMNS`], absent ones filled with nulls.
///
/// The input table is never mutated; a fresh table is returned.
pub fn normalize(
    df: &DataFrame,
    descriptor: &DatasetDescriptor,
    drop_unmapped: bool,
) -> Result<DataFrame, NormalizeError> {
    let mut df = df.clone();
    lowercase_columns(&mut df)?;

    let height = df.height();
    df.with_column(Column::new(
        "categoria".into(),
        vec![descriptor.name.clone(); height],
    ))?;

    for derivation in &descriptor.derivations {
        apply_derivation(&mut df, descriptor, derivation)?;
    }

    // Missing source columns are skipped, as in a pandas-style rename.
    for (source, target) in &descriptor.renames {
        if source != target && df.column(source).is_ok() {
            df.rename(source, target.as_str().into())?;
        }
    }

    if drop_unmapped {
        df = project_canonical(&df)?;
    }

    replace_sentinels(&mut df)?;

    for column in INTEGER_COLUMNS {
        if df.column(column).is_ok() {
            coerce_integer(&mut df, column)?;
        }
    }
    if df.column("numero_de_telefono").is_ok() {
        coerce_float(&mut df, "numero_de_telefono")?;
    }

    info!(category = %descriptor.slug(), rows = df.height(), "dataset normalized");
    Ok(df)
}

/// Stack normalized tables into one combined table, preserving input order.
pub fn concat(tables: &[DataFrame]) -> Result<DataFrame, ConcatError> {
    let (first, rest) = tables.split_first().ok_or(ConcatError::EmptyInput)?;
    let mut combined = first.clone();
    for table in rest {
        combined.vstack_mut(table)?;
    }
    combined.as_single_chunk_par();

    info!(
        tables = tables.len(),
        rows = combined.height(),
        "datasets combined into one table"
    );
    Ok(combined)
}

fn apply_derivation(
    df: &mut DataFrame,
    descriptor: &DatasetDescriptor,
    derivation: &Derivation,
) -> Result<(), NormalizeError> {
    if df.column(&derivation.source).is_err() {
        // Already-normalized input: the source column was renamed away but the
        // derived column survives, so there is nothing left to derive.
        if df.column(&derivation.target).is_ok() {
            return Ok(());
        }
        return Err(NormalizeError::MissingColumn {
            column: derivation.source.clone(),
            category: descriptor.name.clone(),
        });
    }

    let DeriveRule::ParentCode { trailing } = derivation.rule;
    let derived = string_values(df, &derivation.source)?
        .into_iter()
        .map(|value| match value {
            None => Ok(None),
            Some(text) => strip_trailing(&text, trailing)
                .parse::<i64>()
                .map(Some)
                .map_err(|_| NormalizeError::InvalidParentCode {
                    column: derivation.source.clone(),
                    value: text.clone(),
                }),
        })
        .collect::<Result<Vec<Option<i64>>, NormalizeError>>()?;

    df.with_column(Column::new(derivation.target.as_str().into(), derived))?;
    Ok(())
}

fn strip_trailing(text: &str, trailing: usize) -> &str {
    let keep = text.chars().count().saturating_sub(trailing);
    match text.char_indices().nth(keep) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Project onto exactly the canonical columns, inserting null columns for any
/// canonical column the source does not provide.
fn project_canonical(df: &DataFrame) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(CANONICAL_COLUMNS.len());
    for name in CANONICAL_COLUMNS {
        match df.column(name) {
            Ok(column) => columns.push(column.clone()),
            Err(_) => {
                columns.push(Series::full_null(name.into(), df.height(), &DataType::String).into())
            }
        }
    }
    DataFrame::new(columns)
}

fn replace_sentinels(df: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if df.column(&name)?.dtype() != &DataType::String {
            continue;
        }
        let cleaned: Vec<Option<String>> = string_values(df, &name)?
            .into_iter()
            .map(|value| value.filter(|s| !SENTINELS.contains(&s.as_str())))
            .collect();
        df.with_column(Column::new(name.as_str().into(), cleaned))?;
    }
    Ok(())
}

/// Coerce a column to Int64; values that cannot be parsed become null.
fn coerce_integer(df: &mut DataFrame, name: &str) -> PolarsResult<()> {
    if is_numeric(df.column(name)?.dtype()) {
        let cast = df.column(name)?.cast(&DataType::Int64)?;
        df.with_column(cast)?;
        return Ok(());
    }
    let parsed: Vec<Option<i64>> = string_values(df, name)?
        .into_iter()
        .map(|value| value.as_deref().and_then(parse_integer))
        .collect();
    df.with_column(Column::new(name.into(), parsed))?;
    Ok(())
}

/// Coerce a column to Float64; unparsable values degrade to null rather than
/// failing the whole table.
fn coerce_float(df: &mut DataFrame, name: &str) -> PolarsResult<()> {
    if is_numeric(df.column(name)?.dtype()) {
        let cast = df.column(name)?.cast(&DataType::Float64)?;
        df.with_column(cast)?;
        return Ok(());
    }
    let parsed: Vec<Option<f64>> = string_values(df, name)?
        .into_iter()
        .map(|value| value.and_then(|s| s.trim().parse::<f64>().ok()))
        .collect();
    df.with_column(Column::new(name.into(), parsed))?;
    Ok(())
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    // Codes exported through floating point ("60084010.0") keep their value.
    match text.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}
