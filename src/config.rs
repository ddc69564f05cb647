//! Pipeline Configuration Module
//! Environment-driven settings plus the static dataset descriptors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
}

/// How a derived column is computed from a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveRule {
    /// Hierarchical code: drop the trailing `trailing` characters of the
    /// source value and parse the remainder as an integer.
    ParentCode { trailing: usize },
}

/// One derived column, applied before the rename mapping.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub source: String,
    pub target: String,
    pub rule: DeriveRule,
}

/// Static description of one source dataset: category name, CKAN resource id,
/// and the declarative rules mapping its columns onto the canonical schema.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    /// Category name, written into the `categoria` column of every row.
    pub name: String,
    /// CKAN resource id of the dataset.
    pub resource_id: String,
    /// Source column name (lowercase) -> canonical column name.
    pub renames: Vec<(String, String)>,
    /// Category-specific derived columns.
    pub derivations: Vec<Derivation>,
}

impl DatasetDescriptor {
    pub fn museos(resource_id: String) -> Self {
        Self {
            name: "Museos".to_string(),
            resource_id,
            renames: renames(&[
                ("localidad_id", "cod_localidad"),
                ("provincia_id", "id_provincia"),
                ("direccion", "domicilio"),
                ("telefono", "numero_de_telefono"),
            ]),
            // The locality code is hierarchical: its last three digits number
            // the locality inside a department, the prefix is the department.
            derivations: vec![Derivation {
                source: "localidad_id".to_string(),
                target: "id_departamento".to_string(),
                rule: DeriveRule::ParentCode { trailing: 3 },
            }],
        }
    }

    pub fn salas_de_cine(resource_id: String) -> Self {
        Self {
            name: "Salas de cine".to_string(),
            resource_id,
            renames: shared_renames(),
            derivations: Vec::new(),
        }
    }

    pub fn bibliotecas_populares(resource_id: String) -> Self {
        Self {
            name: "Bibliotecas populares".to_string(),
            resource_id,
            renames: shared_renames(),
            derivations: Vec::new(),
        }
    }

    /// Filesystem-friendly category name: lowercase, spaces as underscores.
    pub fn slug(&self) -> String {
        self.name.replace(' ', "_").to_lowercase()
    }
}

fn renames(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect()
}

fn shared_renames() -> Vec<(String, String)> {
    renames(&[
        ("cod_loc", "cod_localidad"),
        ("idprovincia", "id_provincia"),
        ("iddepartamento", "id_departamento"),
        ("direccion", "domicilio"),
        ("cp", "codigo_postal"),
        ("teléfono", "numero_de_telefono"),
    ])
}

/// Everything a pipeline run needs, built once at process start and passed
/// down explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_url: String,
    pub query_string: String,
    pub snapshot_root: PathBuf,
    pub output_dir: PathBuf,
    pub datasets: Vec<DatasetDescriptor>,
}

impl PipelineConfig {
    /// Read configuration from the environment (`.env` files are loaded by the
    /// caller before this runs).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = require("API_URL")?;
        let query_string = require("QUERY_STRING")?;
        let snapshot_root = std::env::var("SNAPSHOT_ROOT").unwrap_or_else(|_| "csv".to_string());
        let output_dir = std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "out".to_string());

        let datasets = vec![
            DatasetDescriptor::museos(require("DATASET_MUSEOS_ID")?),
            DatasetDescriptor::salas_de_cine(require("DATASET_CINES_ID")?),
            DatasetDescriptor::bibliotecas_populares(require("DATASET_BIBLIOTECAS_ID")?),
        ];

        Ok(Self {
            api_url,
            query_string,
            snapshot_root: snapshot_root.into(),
            output_dir: output_dir.into(),
            datasets,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        // Values copied from the original settings file sometimes keep their quotes.
        Ok(value) => Ok(value.trim_matches('"').to_string()),
        Err(_) => Err(ConfigError::MissingVar(name)),
    }
}
