//! Cell-level helpers shared by the normalizer and the aggregators.

use polars::prelude::*;

/// Source values meaning "no data"; replaced with null in every column.
pub const SENTINELS: [&str; 4] = ["s/d", "", " ", "\""];

/// Convert one cell to its owned string form, mapping null to `None`.
pub fn cell_to_string(value: AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string().trim_matches('"').to_string()),
    }
}

/// Extract a whole column as owned strings, null-preserving.
pub fn string_values(df: &DataFrame, column: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(column)?;
    (0..df.height())
        .map(|i| series.get(i).map(cell_to_string))
        .collect()
}

/// Lowercase every column name in place, so mapping rules match
/// case-insensitively.
pub fn lowercase_columns(df: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let lower = name.to_lowercase();
        if lower != name {
            df.rename(&name, lower.into())?;
        }
    }
    Ok(())
}
