//! # Persistência do Modelo Treinado
//!
//! O modelo é salvo como JSON com as duas matrizes rotuladas:
//!
//! ```text
//! {
//!   "transitions": { "rows": ["TS", ..., "START"], "columns": ["TS", ...], "values": [[...]], "row_totals": [...] },
//!   "emissions":   { "rows": ["TS", ...], "columns": ["comma", ...], "values": [[...]], "row_totals": [...] }
//! }
//! ```
//!
//! `row_totals` são as contagens brutas de cada linha no treino, mantidas só
//! para diagnóstico. O `serde_json` é compilado com `float_roundtrip`, então o
//! modelo recarregado é numericamente idêntico e decodifica exatamente igual.
//!
//! A escrita é atômica: grava em um arquivo temporário no mesmo diretório e
//! depois o move para o destino.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{ExtractorError, Result};
use crate::hmm::{HmmModel, MatrixKind};
use crate::matrix::ProbabilityMatrix;

/// Uma matriz no formato de persistência (com rótulos de linhas e colunas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PersistedMatrix {
    rows: Vec<String>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
    row_totals: Vec<f64>,
}

impl PersistedMatrix {
    fn from_matrix(kind: MatrixKind, matrix: &ProbabilityMatrix) -> Self {
        Self {
            rows: kind.row_labels(),
            columns: kind.column_labels(),
            values: matrix.to_rows(),
            row_totals: matrix.row_totals().to_vec(),
        }
    }

    /// Confere os rótulos contra o vocabulário fixo e reconstrói a matriz.
    fn into_matrix(self, kind: MatrixKind) -> Result<ProbabilityMatrix> {
        if self.rows != kind.row_labels() {
            return Err(ExtractorError::invalid_model(format!(
                "{} rows do not match the state vocabulary",
                kind.name()
            )));
        }
        if self.columns != kind.column_labels() {
            return Err(ExtractorError::invalid_model(format!(
                "{} columns do not match the expected vocabulary",
                kind.name()
            )));
        }
        ProbabilityMatrix::from_rows(self.values, self.row_totals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PersistedModel {
    transitions: PersistedMatrix,
    emissions: PersistedMatrix,
}

impl HmmModel {
    /// Serializa o modelo em JSON (formato de persistência).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.persisted())?)
    }

    /// Recarrega um modelo a partir do JSON produzido por [`HmmModel::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let persisted: PersistedModel = serde_json::from_str(json)?;
        Self::from_persisted(persisted)
    }

    /// Salva o modelo de forma atômica no caminho indicado.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.persisted())?;
            writer.flush()?;
        }
        temp_file.persist(path)?;

        info!(path = %path.display(), "modelo salvo");
        Ok(())
    }

    /// Carrega um modelo salvo com [`HmmModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let persisted: PersistedModel = serde_json::from_reader(reader)?;
        let model = Self::from_persisted(persisted)?;

        info!(path = %path.display(), "modelo carregado");
        Ok(model)
    }

    fn persisted(&self) -> PersistedModel {
        PersistedModel {
            transitions: PersistedMatrix::from_matrix(MatrixKind::Transitions, self.transitions()),
            emissions: PersistedMatrix::from_matrix(MatrixKind::Emissions, self.emissions()),
        }
    }

    fn from_persisted(persisted: PersistedModel) -> Result<Self> {
        let transitions = persisted.transitions.into_matrix(MatrixKind::Transitions)?;
        let emissions = persisted.emissions.into_matrix(MatrixKind::Emissions)?;
        HmmModel::from_matrices(transitions, emissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::sample_corpus;

    #[test]
    fn test_json_reload_is_numerically_identical() {
        let model = HmmModel::train(&sample_corpus());
        let json = model.to_json().unwrap();
        let reloaded = HmmModel::from_json(&json).unwrap();

        for kind in [MatrixKind::Transitions, MatrixKind::Emissions] {
            let (a, b) = (model.matrix(kind), reloaded.matrix(kind));
            for row in 0..a.rows() {
                for col in 0..a.cols() {
                    assert_eq!(a.get(row, col).to_bits(), b.get(row, col).to_bits());
                }
                assert_eq!(a.row_total(row), b.row_total(row));
            }
        }
        assert_eq!(reloaded, model);
    }

    #[test]
    fn test_json_layout_is_labelled() {
        let model = HmmModel::train(&sample_corpus());
        let value: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();

        let rows = value["transitions"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 21);
        assert_eq!(rows[20], "START");
        assert_eq!(value["emissions"]["columns"][27], "fourDigit");
        assert_eq!(value["emissions"]["values"].as_array().unwrap().len(), 20);
    }

    #[test]
    fn test_reload_rejects_foreign_vocabulary() {
        let model = HmmModel::train(&sample_corpus());
        let mut value: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        value["emissions"]["columns"][0] = serde_json::Value::from("semicolon");

        let result = HmmModel::from_json(&value.to_string());
        assert!(matches!(result, Err(ExtractorError::InvalidModel(_))));
        assert!(matches!(HmmModel::from_json("{"), Err(ExtractorError::Json(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");

        let model = HmmModel::train(&sample_corpus());
        model.save(&path).unwrap();
        let loaded = HmmModel::load(&path).unwrap();
        assert_eq!(loaded, model);

        let missing = HmmModel::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ExtractorError::Io(_))));
    }
}
