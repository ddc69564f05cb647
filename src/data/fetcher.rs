//! CKAN Fetcher Module
//! Client for the datos.gob.ar datastore API; shapes JSON record sets into
//! DataFrames with columns in the reported field order.

use polars::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::DatasetDescriptor;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed datastore response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

#[derive(Deserialize, Debug)]
struct Envelope {
    result: DatastoreResult,
}

#[derive(Deserialize, Debug)]
struct DatastoreResult {
    fields: Vec<Field>,
    records: Vec<serde_json::Map<String, Value>>,
}

#[derive(Deserialize, Debug)]
struct Field {
    id: String,
}

/// Blocking client for the CKAN datastore search endpoint.
pub struct CkanClient {
    client: reqwest::blocking::Client,
    api_url: String,
    query_string: String,
}

impl CkanClient {
    pub fn new(api_url: String, query_string: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_url,
            query_string,
        }
    }

    /// Download one dataset and shape it into a DataFrame.
    pub fn fetch(&self, descriptor: &DatasetDescriptor) -> Result<DataFrame, FetchError> {
        let url = format!(
            "{}{}{}",
            self.api_url, self.query_string, descriptor.resource_id
        );
        let body = self.client.get(&url).send()?.error_for_status()?.text()?;
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;

        let df = records_to_df(&envelope.result)?;
        info!(category = %descriptor.slug(), rows = df.height(), "dataset downloaded");
        Ok(df)
    }
}

fn records_to_df(result: &DatastoreResult) -> Result<DataFrame, FetchError> {
    let mut columns = Vec::with_capacity(result.fields.len());
    for field in &result.fields {
        columns.push(json_column(&field.id, &result.records));
    }
    DataFrame::new(columns).map_err(FetchError::from)
}

/// Build one column from a JSON field. Integer fields stay numeric so
/// hierarchical codes survive the derivation rules; everything else becomes
/// text.
fn json_column(name: &str, records: &[serde_json::Map<String, Value>]) -> Column {
    let all_integers = records.iter().all(|record| match record.get(name) {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.is_i64(),
        _ => false,
    });
    if all_integers {
        let values: Vec<Option<i64>> = records
            .iter()
            .map(|record| record.get(name).and_then(Value::as_i64))
            .collect();
        return Column::new(name.into(), values);
    }

    let values: Vec<Option<String>> = records
        .iter()
        .map(|record| match record.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect();
    Column::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> DatastoreResult {
        serde_json::from_value(json!({
            "fields": [
                {"id": "localidad_id"},
                {"id": "nombre"},
                {"id": "cp"}
            ],
            "records": [
                {"localidad_id": 60084010i64, "nombre": "Museo A", "cp": "1900"},
                {"localidad_id": null, "nombre": "Museo B", "cp": 1425}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn columns_follow_the_reported_field_order() {
        let df = records_to_df(&sample_result()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["localidad_id", "nombre", "cp"]);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn integer_fields_stay_numeric() {
        let df = records_to_df(&sample_result()).unwrap();
        let codes = df.column("localidad_id").unwrap().i64().unwrap();
        assert_eq!(codes.get(0), Some(60084010));
        assert_eq!(codes.get(1), None);
    }

    #[test]
    fn mixed_fields_become_text() {
        let df = records_to_df(&sample_result()).unwrap();
        let postal = df.column("cp").unwrap().str().unwrap();
        assert_eq!(postal.get(0), Some("1900"));
        assert_eq!(postal.get(1), Some("1425"));
    }

    #[test]
    fn malformed_payloads_are_reported_as_such() {
        let err = serde_json::from_str::<Envelope>("{\"result\": {}}")
            .map_err(|err| FetchError::MalformedResponse(err.to_string()))
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }
}
