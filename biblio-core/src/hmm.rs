//! # Hidden Markov Model para Extração de Metadados
//!
//! Implementação clássica de HMM supervisionado onde:
//! - **Estados Ocultos**: sub-estados Start/Rest de cada campo (`TS`, `TR`, `AS`...)
//! - **Observações**: símbolos léxicos dos tokens (`titleWord`, `dot`, `fourDigit`...)
//!
//! O modelo aprende, por contagem em uma única passada sobre o corpus:
//! 1. Probabilidade de Transição: P(estado_atual | estado_anterior), incluindo a linha `START`
//! 2. Probabilidade de Emissão: P(símbolo | estado)
//!
//! Depois de treinado o modelo é imutável: pode ser persistido, recarregado e
//! compartilhado entre threads para decodificação.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::corpus::{parse_tagged_reference, TrainingCorpus};
use crate::error::{ExtractorError, Result};
use crate::matrix::{CountTable, ProbabilityMatrix};
use crate::symbols::{Symbol, SymbolClassifier, ALL_SYMBOLS, SYMBOL_COUNT};
use crate::tagger::{
    state_labels, transition_row_labels, CanonicalState, HmmState, START_ROW, STATE_COUNT,
};
use crate::tokenizer::tokenize;
use crate::viterbi::ViterbiDecoder;

/// Um registro já simbolizado: para cada trecho, o estado e os símbolos dos tokens.
pub type SymbolizedRecord = Vec<(CanonicalState, Vec<Symbol>)>;

/// Qual das duas matrizes do modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixKind {
    Transitions,
    Emissions,
}

impl MatrixKind {
    pub fn row_labels(self) -> Vec<String> {
        match self {
            MatrixKind::Transitions => transition_row_labels(),
            MatrixKind::Emissions => state_labels(),
        }
    }

    pub fn column_labels(self) -> Vec<String> {
        match self {
            MatrixKind::Transitions => state_labels(),
            MatrixKind::Emissions => ALL_SYMBOLS.iter().map(|s| s.name().to_string()).collect(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MatrixKind::Transitions => "transitions",
            MatrixKind::Emissions => "emissions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "transitions" | "transition" => Some(MatrixKind::Transitions),
            "emissions" | "emission" => Some(MatrixKind::Emissions),
            _ => None,
        }
    }
}

/// Estatísticas de uma passada de treinamento.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Registros processados (linhas do corpus).
    pub records: usize,
    /// Registros sem nenhuma tag válida (nada foi contado).
    pub untagged_records: usize,
    /// Trechos anotados encontrados.
    pub spans: usize,
    /// Tokens contados (uma transição e uma emissão por token).
    pub tokens: usize,
}

/// Acumulador de contagens do treino.
///
/// Mutável e de uso exclusivo durante a passada de treino; não deve ser
/// compartilhado entre escritores concorrentes. [`HmmTrainer::finish`] consome
/// o acumulador e produz o [`HmmModel`] imutável.
#[derive(Debug, Clone)]
pub struct HmmTrainer {
    transitions: CountTable,
    emissions: CountTable,
    stats: TrainingStats,
}

impl HmmTrainer {
    pub fn new() -> Self {
        Self {
            transitions: CountTable::new(STATE_COUNT + 1, STATE_COUNT),
            emissions: CountTable::new(STATE_COUNT, SYMBOL_COUNT),
            stats: TrainingStats::default(),
        }
    }

    /// Tokeniza e classifica cada trecho de um registro anotado.
    pub fn symbolize_record(record: &str, classifier: &SymbolClassifier) -> SymbolizedRecord {
        parse_tagged_reference(record)
            .into_iter()
            .map(|span| {
                let symbols = tokenize(&span.text)
                    .iter()
                    .map(|t| classifier.classify(&t.text))
                    .collect();
                (span.state, symbols)
            })
            .collect()
    }

    /// Conta um registro anotado (ex: `"<T>Hello World<A>Doe"`).
    pub fn observe_record(&mut self, record: &str) {
        let symbolized = Self::symbolize_record(record, SymbolClassifier::shared());
        self.observe_symbolized(&symbolized);
    }

    /// Conta as transições e emissões de um registro já simbolizado.
    ///
    /// O estado corrente começa em `START` e atravessa todos os trechos do
    /// registro: o primeiro token de cada trecho entra em `XS`, os demais em `XR`.
    pub fn observe_symbolized(&mut self, record: &[(CanonicalState, Vec<Symbol>)]) {
        self.stats.records += 1;
        if record.is_empty() {
            self.stats.untagged_records += 1;
            return;
        }

        let mut current = START_ROW;
        for (canonical, symbols) in record {
            self.stats.spans += 1;
            for (i, symbol) in symbols.iter().enumerate() {
                let state = if i == 0 {
                    HmmState::Start(*canonical)
                } else {
                    HmmState::Rest(*canonical)
                };
                let next = state.index();

                self.transitions.increment(current, next);
                self.emissions.increment(next, symbol.index());
                self.stats.tokens += 1;
                current = next;
            }
        }
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Deriva as probabilidades suavizadas e congela o modelo.
    pub fn finish(self) -> HmmModel {
        let transitions = ProbabilityMatrix::from_counts(&self.transitions);
        let emissions = ProbabilityMatrix::from_counts(&self.emissions);
        info!(
            records = self.stats.records,
            untagged = self.stats.untagged_records,
            spans = self.stats.spans,
            tokens = self.stats.tokens,
            "treinamento concluído"
        );
        HmmModel::assemble(transitions, emissions)
    }
}

impl Default for HmmTrainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Modelo HMM treinado: as duas matrizes de probabilidade e o decodificador.
///
/// # Componentes
/// - **Transição**: `21 × 20` (20 estados + `START` nas linhas).
/// - **Emissão**: `20 × 31` (estados × símbolos).
///
/// O modelo é somente leitura após a construção; decodificar nunca o altera.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmModel {
    transitions: ProbabilityMatrix,
    emissions: ProbabilityMatrix,
    decoder: ViterbiDecoder,
}

impl HmmModel {
    /// Treina o HMM com o corpus fornecido (Supervised Learning).
    ///
    /// # Processo de Treinamento
    /// 1. **Simbolização** (em paralelo via rayon): cada registro é dividido em
    ///    trechos, tokenizado e classificado. É uma etapa pura, sem estado compartilhado.
    /// 2. **Contagem** (sequencial): transições e emissões são acumuladas na ordem do corpus.
    /// 3. **Suavização**: cada linha recebe o piso `EPSILON` nas células zeradas.
    pub fn train(corpus: &TrainingCorpus) -> Self {
        let classifier = SymbolClassifier::shared();
        let symbolized: Vec<SymbolizedRecord> = corpus
            .records()
            .par_iter()
            .map(|record| HmmTrainer::symbolize_record(record, classifier))
            .collect();

        let mut trainer = HmmTrainer::new();
        for record in &symbolized {
            trainer.observe_symbolized(record);
        }

        let model = trainer.finish();
        for issue in model.validate().unbalanced_rows {
            warn!(matrix = issue.matrix.name(), row = %issue.row, sum = issue.sum, "linha degenerada (estado nunca observado)");
        }
        model
    }

    /// Reconstrói um modelo a partir de matrizes explícitas, conferindo o formato.
    pub fn from_matrices(transitions: ProbabilityMatrix, emissions: ProbabilityMatrix) -> Result<Self> {
        let expected = [
            (MatrixKind::Transitions, &transitions, STATE_COUNT + 1, STATE_COUNT),
            (MatrixKind::Emissions, &emissions, STATE_COUNT, SYMBOL_COUNT),
        ];
        for (kind, matrix, rows, cols) in expected {
            if matrix.rows() != rows || matrix.cols() != cols {
                return Err(ExtractorError::invalid_model(format!(
                    "{} matrix is {}x{}, expected {}x{}",
                    kind.name(),
                    matrix.rows(),
                    matrix.cols(),
                    rows,
                    cols
                )));
            }
        }
        Ok(Self::assemble(transitions, emissions))
    }

    /// Monta o modelo a partir de matrizes com formato já garantido.
    fn assemble(transitions: ProbabilityMatrix, emissions: ProbabilityMatrix) -> Self {
        let decoder = ViterbiDecoder::build(&transitions, &emissions);
        Self {
            transitions,
            emissions,
            decoder,
        }
    }

    pub fn transitions(&self) -> &ProbabilityMatrix {
        &self.transitions
    }

    pub fn emissions(&self) -> &ProbabilityMatrix {
        &self.emissions
    }

    pub fn matrix(&self, kind: MatrixKind) -> &ProbabilityMatrix {
        match kind {
            MatrixKind::Transitions => &self.transitions,
            MatrixKind::Emissions => &self.emissions,
        }
    }

    /// Probabilidade de transição entre dois estados (`None` como origem = `START`).
    pub fn transition_probability(&self, from: Option<HmmState>, to: HmmState) -> f64 {
        let row = from.map(HmmState::index).unwrap_or(START_ROW);
        self.transitions.get(row, to.index())
    }

    pub fn emission_probability(&self, state: HmmState, symbol: Symbol) -> f64 {
        self.emissions.get(state.index(), symbol.index())
    }

    /// Decodifica uma sequência de símbolos na sequência de estados mais provável.
    ///
    /// Sequência vazia → resultado vazio.
    pub fn decode(&self, symbols: &[Symbol]) -> Vec<HmmState> {
        self.decode_with_score(symbols).0
    }

    /// Como [`HmmModel::decode`], devolvendo também a log-probabilidade do caminho.
    pub fn decode_with_score(&self, symbols: &[Symbol]) -> (Vec<HmmState>, f64) {
        let observations: Vec<usize> = symbols.iter().map(|s| s.index()).collect();
        let path = self.decoder.decode_unchecked(&observations);
        debug!(tokens = symbols.len(), log_probability = path.log_probability, "viterbi");

        let states = path
            .states
            .into_iter()
            .filter_map(HmmState::from_index)
            .collect();
        (states, path.log_probability)
    }

    /// Verifica as invariantes das matrizes sem falhar: só reporta.
    pub fn validate(&self) -> ModelReport {
        let mut report = ModelReport::default();

        for kind in [MatrixKind::Transitions, MatrixKind::Emissions] {
            let matrix = self.matrix(kind);
            let labels = kind.row_labels();
            for (row, sum) in matrix.unbalanced_rows() {
                report.unbalanced_rows.push(RowIssue {
                    matrix: kind,
                    row: labels[row].clone(),
                    sum,
                });
            }
            report.zero_cells += matrix.zero_cells().len();
        }
        report
    }
}

/// Linha cuja soma não é 1 (dentro da tolerância).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub matrix: MatrixKind,
    pub row: String,
    pub sum: f64,
}

/// Resultado da validação de um modelo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    /// Linhas degeneradas (ex: estado nunca visto como origem de transição).
    pub unbalanced_rows: Vec<RowIssue>,
    /// Células exatamente zero (deveria ser sempre 0 após a suavização).
    pub zero_cells: usize,
}

impl ModelReport {
    pub fn is_ok(&self) -> bool {
        self.unbalanced_rows.is_empty() && self.zero_cells == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{EPSILON, ROW_SUM_TOLERANCE};

    fn state(label: &str) -> HmmState {
        HmmState::from_label(label).unwrap()
    }

    fn symbols_of(text: &str) -> Vec<Symbol> {
        let tokens: Vec<String> = tokenize(text).into_iter().map(|t| t.text).collect();
        SymbolClassifier::shared().classify_all(&tokens)
    }

    #[test]
    fn test_counts_follow_start_rest_walk() {
        let mut trainer = HmmTrainer::new();
        trainer.observe_record("<T>Hello World<A>Doe");

        let ts = state("TS").index();
        let tr = state("TR").index();
        let as_ = state("AS").index();
        assert_eq!(trainer.transitions.get(START_ROW, ts), 1);
        assert_eq!(trainer.transitions.get(ts, tr), 1);
        assert_eq!(trainer.transitions.get(tr, as_), 1);
        assert_eq!(trainer.transitions.total(), 3);
        assert_eq!(trainer.emissions.get(ts, Symbol::TitleWord.index()), 1);
        assert_eq!(trainer.emissions.get(as_, Symbol::TitleWord.index()), 1);
        assert_eq!(trainer.stats().tokens, 3);
        assert_eq!(trainer.stats().spans, 2);
    }

    #[test]
    fn test_untagged_record_counts_nothing() {
        let mut trainer = HmmTrainer::new();
        trainer.observe_record("just some text without tags");
        trainer.observe_record("");
        assert_eq!(trainer.transitions.total(), 0);
        assert_eq!(trainer.stats().untagged_records, 2);
    }

    #[test]
    fn test_hmm_zero_ambiguity_roundtrip() {
        let corpus = TrainingCorpus::from_lines(["<T>Hello World<A>Doe"]);
        let model = HmmModel::train(&corpus);

        let states = model.decode(&symbols_of("Hello World Doe"));
        assert_eq!(states, vec![state("TS"), state("TR"), state("AS")]);
    }

    #[test]
    fn test_trained_rows_sum_to_one_except_degenerate() {
        let corpus = crate::corpus::sample_corpus();
        let model = HmmModel::train(&corpus);

        for kind in [MatrixKind::Transitions, MatrixKind::Emissions] {
            let matrix = model.matrix(kind);
            for row in 0..matrix.rows() {
                let sum = matrix.row_sum(row);
                if matrix.row_total(row) == 0.0 {
                    // Linha degenerada: todas as células no piso
                    assert!(matrix.row(row).iter().all(|&p| p == EPSILON));
                } else {
                    assert!((sum - 1.0).abs() < ROW_SUM_TOLERANCE, "{} row {row}: {sum}", kind.name());
                }
            }
            assert!(matrix.zero_cells().is_empty());
        }
    }

    #[test]
    fn test_degenerate_rows_are_reported() {
        // Só T é observado: todos os outros estados ficam sem transições de saída
        let corpus = TrainingCorpus::from_lines(["<T>Hello World"]);
        let model = HmmModel::train(&corpus);
        let report = model.validate();

        assert!(!report.is_ok());
        assert_eq!(report.zero_cells, 0);
        assert!(report
            .unbalanced_rows
            .iter()
            .any(|issue| issue.matrix == MatrixKind::Transitions && issue.row == "AS"));
        // TS tem saída observada (TS → TR), então não é degenerada
        assert!(!report.unbalanced_rows.iter().any(|issue| issue.row == "TS"));
    }

    #[test]
    fn test_empty_sequence_decodes_to_empty() {
        let model = HmmModel::train(&crate::corpus::sample_corpus());
        assert!(model.decode(&[]).is_empty());
    }

    #[test]
    fn test_from_matrices_checks_shape() {
        let model = HmmModel::train(&crate::corpus::sample_corpus());
        let result = HmmModel::from_matrices(model.emissions().clone(), model.transitions().clone());
        assert!(matches!(result, Err(ExtractorError::InvalidModel(_))));

        let rebuilt =
            HmmModel::from_matrices(model.transitions().clone(), model.emissions().clone()).unwrap();
        assert_eq!(rebuilt, model);
    }

    #[test]
    fn test_probability_accessors() {
        let corpus = TrainingCorpus::from_lines(["<T>Hello World<A>Doe"]);
        let model = HmmModel::train(&corpus);
        // START → TS foi a única transição observada a partir de START
        let p = model.transition_probability(None, state("TS"));
        assert!((p - (1.0 - 19.0 * EPSILON)).abs() < 1e-12);
        assert_eq!(model.transition_probability(None, state("AS")), EPSILON);
        assert_eq!(model.emission_probability(state("AS"), Symbol::Dot), EPSILON);
    }
}
