//! Summary Aggregations Module
//! Builds the "totales" and "cines" summary tables from canonical data.

use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::data::table::{lowercase_columns, string_values};

/// Sentinels for the cines aggregation only. Unlike the normalizer's set this
/// one includes "0": a reported zero screen or seat count is data-quality
/// noise in this source, not a true zero.
const CINES_SENTINELS: [&str; 5] = ["s/d", "", " ", "\"", "0"];

/// Separator for the derived provincia/categoria composite key.
const COMPOSITE_SEPARATOR: &str = " - ";

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("column '{0}' required for aggregation is missing")]
    MissingColumn(String),
    #[error("non-numeric value '{value}' in column '{column}'")]
    NonNumeric { column: String, value: String },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Value-frequency summary over `categoria`, `fuente`, and the derived
/// provincia/categoria composite key.
///
/// The first two counts are ordered by descending frequency (ties keep
/// first-seen order); composite counts keep the first-appearance order after
/// sorting rows by (provincia, categoria). The input table is never mutated.
pub fn totales(df: &DataFrame) -> Result<DataFrame, AggregateError> {
    let categoria = required(df, "categoria")?;
    let fuente = required(df, "fuente")?;
    let provincia = required(df, "provincia")?;

    let categoria_counts = value_counts_desc(&categoria);
    let fuente_counts = value_counts_desc(&fuente);

    // Working copy of the key pair; the caller's row order stays untouched.
    let mut pairs: Vec<(Option<String>, Option<String>)> =
        provincia.into_iter().zip(categoria).collect();
    pairs.sort_by(|a, b| cmp_nulls_last(&a.0, &b.0).then_with(|| cmp_nulls_last(&a.1, &b.1)));
    let composite: Vec<Option<String>> = pairs
        .iter()
        .map(|(provincia, categoria)| {
            Some(format!(
                "{}{COMPOSITE_SEPARATOR}{}",
                provincia.as_deref().unwrap_or(""),
                categoria.as_deref().unwrap_or(""),
            ))
        })
        .collect();
    let composite_counts = value_counts_ordered(&composite);

    let mut columna: Vec<String> = Vec::new();
    let mut valor: Vec<String> = Vec::new();
    let mut registros: Vec<u32> = Vec::new();
    for (tag, counts) in [
        ("categoria", categoria_counts),
        ("fuente", fuente_counts),
        ("provincia_categoria", composite_counts),
    ] {
        for (value, count) in counts {
            columna.push(tag.to_string());
            valor.push(value);
            registros.push(count);
        }
    }

    let summary = DataFrame::new(vec![
        Column::new("columna".into(), columna),
        Column::new("valor".into(), valor),
        Column::new("registros_totales".into(), registros),
    ])?;

    info!(rows = summary.height(), "totales summary created");
    Ok(summary)
}

/// Per-provincia sums of `pantallas` and `butacas` plus the count of rows
/// with a non-null `espacio_incaa`, over a salas-de-cine snapshot.
///
/// Column lookup is case-insensitive; groups come out sorted by provincia,
/// restored as a regular column.
pub fn cines(df: &DataFrame) -> Result<DataFrame, AggregateError> {
    let mut df = df.clone();
    lowercase_columns(&mut df)?;

    // The grouping key gets the same cleanup: a sentinel provincia is a null
    // key and its rows are dropped from the grouping.
    let provincia = clean(required(&df, "provincia")?);
    let pantallas = clean(required(&df, "pantallas")?);
    let butacas = clean(required(&df, "butacas")?);
    let espacio_incaa: Vec<Option<String>> = clean(required(&df, "espacio_incaa")?)
        .into_iter()
        .map(|value| value.map(|s| s.to_lowercase()))
        .collect();

    // (pantallas, butacas, espacio_incaa count) per provincia; null keys dropped.
    let mut totals: HashMap<String, (i64, i64, u32)> = HashMap::new();
    for (i, key) in provincia.iter().enumerate() {
        let Some(key) = key else { continue };
        let entry = totals.entry(key.clone()).or_insert((0, 0, 0));
        if let Some(value) = &pantallas[i] {
            entry.0 += parse_count(value, "pantallas")?;
        }
        if let Some(value) = &butacas[i] {
            entry.1 += parse_count(value, "butacas")?;
        }
        if espacio_incaa[i].is_some() {
            entry.2 += 1;
        }
    }

    let mut keys: Vec<String> = totals.keys().cloned().collect();
    keys.sort();
    let pantallas_sum: Vec<i64> = keys.iter().map(|k| totals[k.as_str()].0).collect();
    let butacas_sum: Vec<i64> = keys.iter().map(|k| totals[k.as_str()].1).collect();
    let incaa_count: Vec<u32> = keys.iter().map(|k| totals[k.as_str()].2).collect();

    let summary = DataFrame::new(vec![
        Column::new("provincia".into(), keys),
        Column::new("pantallas".into(), pantallas_sum),
        Column::new("butacas".into(), butacas_sum),
        Column::new("espacio_incaa".into(), incaa_count),
    ])?;

    info!(groups = summary.height(), "cines summary created");
    Ok(summary)
}

fn required(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, AggregateError> {
    if df.column(name).is_err() {
        return Err(AggregateError::MissingColumn(name.to_string()));
    }
    Ok(string_values(df, name)?)
}

fn clean(values: Vec<Option<String>>) -> Vec<Option<String>> {
    values
        .into_iter()
        .map(|value| value.filter(|s| !CINES_SENTINELS.contains(&s.as_str())))
        .collect()
}

fn parse_count(value: &str, column: &str) -> Result<i64, AggregateError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => Ok(f as i64),
        _ => Err(AggregateError::NonNumeric {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Frequency per distinct value in first-seen order; nulls are skipped.
fn value_counts_ordered(values: &[Option<String>]) -> Vec<(String, u32)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(String, u32)> = Vec::new();
    for value in values.iter().flatten() {
        match index.get(value.as_str()) {
            Some(&i) => entries[i].1 += 1,
            None => {
                index.insert(value.clone(), entries.len());
                entries.push((value.clone(), 1));
            }
        }
    }
    entries
}

/// Frequency per distinct value, descending; the stable sort keeps ties in
/// first-seen order.
fn value_counts_desc(values: &[Option<String>]) -> Vec<(String, u32)> {
    let mut entries = value_counts_ordered(values);
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

fn cmp_nulls_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
