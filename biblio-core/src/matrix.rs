//! # Matrizes de Contagem e de Probabilidade
//!
//! O treinamento usa dois tipos distintos:
//!
//! - [`CountTable`]: acumulador **mutável** de contagens, usado só durante a passada de treino.
//! - [`ProbabilityMatrix`]: matriz **imutável** de probabilidades suavizadas, produzida
//!   a partir do acumulador e compartilhada (somente leitura) depois disso.
//!
//! Ambas são densas e endereçadas por índice `(linha, coluna)`: toda célula existe
//! desde a criação, então não há "chave ausente".
//!
//! ## Suavização
//!
//! Para cada linha, com `Z` células zeradas e `NZ` não-zeradas:
//!
//! ```text
//! p = contagem / total_da_linha
//! se NZ > 0:  zeros ← EPSILON,  não-zeros ← p − Z·EPSILON/NZ    (soma continua 1)
//! se NZ = 0:  todas ← EPSILON                                     (linha degenerada, soma Z·EPSILON)
//! ```

use crate::error::{ExtractorError, Result};

/// Probabilidade mínima atribuída às células nunca observadas.
pub const EPSILON: f64 = 1e-7;

/// Tolerância usada na validação da soma das linhas.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Acumulador de contagens `linhas × colunas`, todas iniciadas em zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountTable {
    rows: usize,
    cols: usize,
    counts: Vec<u64>,
    row_totals: Vec<u64>,
}

impl CountTable {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            counts: vec![0; rows * cols],
            row_totals: vec![0; rows],
        }
    }

    /// Registra uma ocorrência do evento `(row, col)`.
    pub fn increment(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.rows && col < self.cols);
        self.counts[row * self.cols + col] += 1;
        self.row_totals[row] += 1;
    }

    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.counts[row * self.cols + col]
    }

    pub fn row_total(&self, row: usize) -> u64 {
        self.row_totals[row]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Soma de todas as contagens registradas.
    pub fn total(&self) -> u64 {
        self.row_totals.iter().sum()
    }
}

/// Matriz densa de probabilidades, imutável após a construção.
///
/// `row_totals` guarda o total de contagens de cada linha no treino; é apenas
/// informativo (diagnóstico) e não participa da decodificação.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    row_totals: Vec<f64>,
}

impl ProbabilityMatrix {
    /// Deriva as probabilidades de um acumulador aplicando a suavização aditiva.
    pub fn from_counts(counts: &CountTable) -> Self {
        let mut values = Vec::with_capacity(counts.rows * counts.cols);

        for row in 0..counts.rows {
            let total = counts.row_total(row) as f64;
            let cells = &counts.counts[row * counts.cols..(row + 1) * counts.cols];
            let zero = cells.iter().filter(|&&c| c == 0).count();
            let non_zero = cells.len() - zero;

            if non_zero == 0 {
                // Linha nunca observada: piso em todas as células, sem renormalizar
                values.extend(std::iter::repeat(EPSILON).take(cells.len()));
                continue;
            }

            let delta = zero as f64 * EPSILON / non_zero as f64;
            values.extend(cells.iter().map(|&count| {
                if count == 0 {
                    EPSILON
                } else {
                    count as f64 / total - delta
                }
            }));
        }

        Self {
            rows: counts.rows,
            cols: counts.cols,
            values,
            row_totals: counts.row_totals.iter().map(|&t| t as f64).collect(),
        }
    }

    /// Constrói uma matriz a partir de linhas explícitas (sem suavização).
    ///
    /// Útil para modelos sintéticos e para recarregar modelos persistidos.
    pub fn from_rows(rows: Vec<Vec<f64>>, row_totals: Vec<f64>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);

        if row_totals.len() != n_rows {
            return Err(ExtractorError::invalid_dimensions(format!(
                "{} row totals for {} rows",
                row_totals.len(),
                n_rows
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(ExtractorError::invalid_dimensions(format!(
                "row {i} has {} columns, expected {n_cols}",
                row.len()
            )));
        }
        if let Some(v) = rows.iter().flatten().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ExtractorError::invalid_dimensions(format!(
                "probability {v} is not a finite non-negative number"
            )));
        }

        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            values: rows.into_iter().flatten().collect(),
            row_totals,
        })
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// Cópia das linhas como `Vec<Vec<f64>>` (formato de persistência).
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Soma das probabilidades de uma linha.
    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).iter().sum()
    }

    /// Total de contagens observado no treino para a linha (informativo).
    pub fn row_total(&self, row: usize) -> f64 {
        self.row_totals[row]
    }

    pub fn row_totals(&self) -> &[f64] {
        &self.row_totals
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Linhas cuja soma se afasta de 1 além da tolerância.
    pub fn unbalanced_rows(&self) -> Vec<(usize, f64)> {
        (0..self.rows)
            .map(|r| (r, self.row_sum(r)))
            .filter(|(_, sum)| (sum - 1.0).abs() > ROW_SUM_TOLERANCE)
            .collect()
    }

    /// Posições `(linha, coluna)` de células exatamente zero.
    pub fn zero_cells(&self) -> Vec<(usize, usize)> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 0.0)
            .map(|(i, _)| (i / self.cols, i % self.cols))
            .collect()
    }
}
