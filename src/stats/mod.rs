//! Stats module - summary aggregations over the combined table

mod aggregator;

pub use aggregator::{cines, totales};
