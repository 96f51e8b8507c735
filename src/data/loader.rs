//! Raw table loading and token normalization
//!
//! Every cell arrives as a string token. The loader applies the schema's
//! repair table, maps `?` to the absent marker, encodes categorical
//! vocabularies to {0, 1} and casts numeric tokens to `f64`.

use crate::data::{AttributeKind, AttributeSchema, Dataset};
use crate::error::{CkdError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Token denoting an unknown value
pub const UNKNOWN_TOKEN: &str = "?";

/// Loads raw string rows into a normalized [`Dataset`]
#[derive(Debug, Clone)]
pub struct TableLoader {
    schema: AttributeSchema,
    /// (attribute index, raw token) -> repair index
    repair_index: HashMap<(usize, String), usize>,
}

impl TableLoader {
    pub fn new(schema: AttributeSchema) -> Self {
        let repair_index = schema
            .repairs()
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                schema
                    .position(&r.attribute)
                    .map(|col| ((col, r.from.clone()), i))
            })
            .collect();
        Self {
            schema,
            repair_index,
        }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Read a header-less CSV file with every column kept as raw text
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        info!(path = %path.display(), "Reading raw table");

        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        if df.width() != self.schema.len() {
            return Err(CkdError::SchemaError(format!(
                "expected {} columns, file has {}",
                self.schema.len(),
                df.width()
            )));
        }

        let mut columns: Vec<Vec<Option<String>>> = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let ca = series.str()?;
            columns.push(ca.into_iter().map(|v| v.map(str::to_string)).collect());
        }

        self.normalize(df.height(), |row, col| columns[col][row].as_deref())
    }

    /// Normalize in-memory rows of raw tokens
    pub fn load_rows<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<Dataset> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != self.schema.len() {
                return Err(CkdError::SchemaError(format!(
                    "row {} has {} tokens, expected {}",
                    i,
                    row.len(),
                    self.schema.len()
                )));
            }
        }
        self.normalize(rows.len(), |row, col| Some(rows[row][col].as_ref()))
    }

    fn normalize<'a, F>(&self, n_rows: usize, token_at: F) -> Result<Dataset>
    where
        F: Fn(usize, usize) -> Option<&'a str>,
    {
        let n_cols = self.schema.len();
        let target_col = self
            .schema
            .position(self.schema.target())
            .ok_or_else(|| CkdError::SchemaError("target attribute missing".to_string()))?;

        let mut values = Array2::<f64>::zeros((n_rows, n_cols));
        let mut repair_hits = vec![0usize; self.schema.repairs().len()];

        for row in 0..n_rows {
            for (col, attr) in self.schema.attributes().iter().enumerate() {
                let raw = token_at(row, col);
                let token = match raw {
                    Some(t) => match self.repair_index.get(&(col, t.to_string())) {
                        Some(&rule) => {
                            repair_hits[rule] += 1;
                            Some(self.schema.repairs()[rule].to.as_str())
                        }
                        None => Some(t),
                    },
                    None => None,
                };

                let value = match token {
                    None | Some(UNKNOWN_TOKEN) | Some("") => f64::NAN,
                    Some(t) => match attr.kind {
                        AttributeKind::Categorical(vocab) => {
                            vocab.encode(t).ok_or_else(|| CkdError::VocabularyError {
                                attribute: attr.name.clone(),
                                token: t.to_string(),
                            })?
                        }
                        AttributeKind::Numeric => {
                            t.parse::<f64>().map_err(|_| CkdError::CastError {
                                attribute: attr.name.clone(),
                                row,
                                token: t.to_string(),
                            })?
                        }
                    },
                };

                if col == target_col && value.is_nan() {
                    return Err(CkdError::MissingTarget { row });
                }
                values[[row, col]] = value;
            }
        }

        for (rule, hits) in self.schema.repairs().iter().zip(&repair_hits) {
            if *hits == 0 {
                continue;
            }
            debug!(attribute = %rule.attribute, from = ?rule.from, to = %rule.to, hits, "Repaired tokens");
            if let Some(note) = &rule.anomaly {
                warn!(attribute = %rule.attribute, hits, "Known anomaly kept: {}", note);
            }
        }

        let names = self
            .schema
            .attributes()
            .iter()
            .map(|a| a.name.clone())
            .collect();
        let dataset = Dataset::new(names, values)?;
        info!(
            rows = dataset.n_rows(),
            attributes = dataset.n_attributes(),
            missing = dataset.total_missing(),
            "Normalized table"
        );
        Ok(dataset)
    }
}
