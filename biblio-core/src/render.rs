//! # Tabelas de Diagnóstico
//!
//! Renderiza qualquer uma das matrizes para inspeção offline: probabilidades
//! com 7 casas decimais e uma coluna final `TOTAL prob` com a soma da linha
//! (8 casas), que deixa as linhas degeneradas visíveis de imediato.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::hmm::{HmmModel, MatrixKind};

/// Formato de saída da tabela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    #[default]
    Html,
    Text,
}

impl HmmModel {
    /// Renderiza a matriz indicada no formato pedido.
    pub fn render(&self, kind: MatrixKind, format: RenderFormat) -> String {
        match format {
            RenderFormat::Html => render_html(self, kind),
            RenderFormat::Text => render_text(self, kind),
        }
    }
}

fn render_html(model: &HmmModel, kind: MatrixKind) -> String {
    let matrix = model.matrix(kind);
    let mut out = String::from("<table border=\"1\">\n<tr><th>&nbsp;</th>");
    for column in kind.column_labels() {
        let _ = write!(out, "<th>{column}</th>");
    }
    out.push_str("<th>TOTAL prob</th></tr>\n");

    for (row, label) in kind.row_labels().iter().enumerate() {
        let _ = write!(out, "<tr><td><strong>{label}</strong></td>");
        for p in matrix.row(row) {
            let _ = write!(out, "<td>{p:.7}</td>");
        }
        let _ = writeln!(out, "<td>{:.8}</td></tr>", matrix.row_sum(row));
    }
    out.push_str("</table><br>\n");
    out
}

fn render_text(model: &HmmModel, kind: MatrixKind) -> String {
    let matrix = model.matrix(kind);
    let columns = kind.column_labels();
    let width = columns.iter().map(String::len).max().unwrap_or(0).max(9);

    let mut out = format!("{:<6}", "");
    for column in &columns {
        let _ = write!(out, " {column:>width$}");
    }
    let _ = writeln!(out, " {:>10}", "TOTAL");

    for (row, label) in kind.row_labels().iter().enumerate() {
        let _ = write!(out, "{label:<6}");
        for p in matrix.row(row) {
            let _ = write!(out, " {p:>width$.7}");
        }
        let _ = writeln!(out, " {:>10.8}", matrix.row_sum(row));
    }
    out
}
