//! # Algoritmo de Viterbi: Decodificação da Sequência de Estados
//!
//! Dado um HMM e uma sequência de símbolos observados, encontra a sequência de
//! estados que maximiza a probabilidade conjunta da cadeia
//! `START → s₁ → … → sₙ` combinada com as emissões de cada posição.
//!
//! ## Algoritmo
//!
//! ```text
//! Inicialização: δ[0][j] = P(START→j) · P(j emite x₀)
//!
//! Recursão:      δ[i][j] = max_k δ[i−1][k] · P(k→j) · P(j emite xᵢ)    (guarda k em ψ[i][j])
//!
//! Terminação:    sₙ = argmax_j δ[n−1][j]
//!
//! Backtracking:  sᵢ₋₁ = ψ[i][sᵢ]
//! ```
//!
//! Os produtos são calculados diretamente (não em log-space), na mesma ordem
//! `δ · P(k→j) · P(j emite x)`, para que caminhos com probabilidades exatamente
//! iguais continuem empatados. Para não zerar por underflow em referências
//! longas, cada coluna de `δ` é reescalada por uma potência de dois (o
//! expoente do máximo da coluna). Multiplicar por `2ⁿ` é exato em ponto
//! flutuante, então nem o argmax nem os empates mudam; os expoentes acumulados
//! recompõem a log-probabilidade no final.
//!
//! ## Desempate
//!
//! Os estados são percorridos na ordem canônica e a comparação é estrita
//! (`>`): em caso de empate, fica o **primeiro** estado que atingiu o máximo.
//!
//! ## Complexidade
//!
//! `O(N · S²)`, com `S` fixo e pequeno (20 estados) → linear no tamanho da referência.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractorError, Result};
use crate::matrix::ProbabilityMatrix;

/// Melhor caminho encontrado pelo Viterbi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViterbiPath {
    /// Índices dos estados, um por observação.
    pub states: Vec<usize>,
    /// Log da probabilidade conjunta do caminho (`0.0` para sequência vazia).
    pub log_probability: f64,
}

/// Decodificador de Viterbi sobre matrizes já validadas.
///
/// A matriz de transição tem `S + 1` linhas (a última é `START`) e `S`
/// colunas; a de emissão tem `S` linhas e uma coluna por símbolo.
/// Decodificar não altera nada, então o mesmo decodificador pode ser usado
/// por várias threads.
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiDecoder {
    n_states: usize,
    n_symbols: usize,
    /// P(START→j)
    start: Vec<f64>,
    /// P(k→j), `S × S`
    transition: Vec<f64>,
    /// P(j emite x), `S × símbolos`
    emission: Vec<f64>,
}

impl ViterbiDecoder {
    pub fn new(transitions: &ProbabilityMatrix, emissions: &ProbabilityMatrix) -> Result<Self> {
        let n_states = emissions.rows();
        if transitions.rows() != n_states + 1 || transitions.cols() != n_states {
            return Err(ExtractorError::invalid_dimensions(format!(
                "transition matrix is {}x{}, expected {}x{} for {} emitting states",
                transitions.rows(),
                transitions.cols(),
                n_states + 1,
                n_states,
                n_states
            )));
        }
        Ok(Self::build(transitions, emissions))
    }

    /// Copia as matrizes em tabelas densas; o formato já foi conferido.
    pub(crate) fn build(transitions: &ProbabilityMatrix, emissions: &ProbabilityMatrix) -> Self {
        let n_states = emissions.rows();
        let start = transitions.row(n_states).to_vec();
        let transition = (0..n_states)
            .flat_map(|k| transitions.row(k).iter().copied())
            .collect();
        let emission = (0..n_states)
            .flat_map(|j| emissions.row(j).iter().copied())
            .collect();

        Self {
            n_states,
            n_symbols: emissions.cols(),
            start,
            transition,
            emission,
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_symbols(&self) -> usize {
        self.n_symbols
    }

    /// Decodifica índices de símbolos, rejeitando índices fora do alfabeto.
    pub fn decode(&self, observations: &[usize]) -> Result<ViterbiPath> {
        if let Some(&bad) = observations.iter().find(|&&o| o >= self.n_symbols) {
            return Err(ExtractorError::invalid_dimensions(format!(
                "observation {bad} out of range for {} symbols",
                self.n_symbols
            )));
        }
        Ok(self.decode_unchecked(observations))
    }

    /// Decodifica sem validar as observações (o chamador garante o intervalo).
    pub(crate) fn decode_unchecked(&self, observations: &[usize]) -> ViterbiPath {
        if observations.is_empty() || self.n_states == 0 {
            return ViterbiPath {
                states: Vec::new(),
                log_probability: 0.0,
            };
        }

        let n_obs = observations.len();
        let n_states = self.n_states;

        // delta[j] = melhor probabilidade (reescalada) de um caminho terminando em j
        let mut delta: Vec<f64> = (0..n_states)
            .map(|j| self.start[j] * self.emission(j, observations[0]))
            .collect();
        // Soma dos expoentes removidos: probabilidade real = delta · 2^scale
        let mut scale = rescale(&mut delta);
        // backptr[i][j] = estado anterior que maximiza delta[i][j]
        let mut backptr: Vec<Vec<usize>> = vec![vec![0; n_states]; n_obs];

        for (i, &symbol) in observations.iter().enumerate().skip(1) {
            let mut next = vec![0.0; n_states];

            for j in 0..n_states {
                let emit = self.emission(j, symbol);
                let mut best_score = -1.0;
                let mut best_prev = 0;

                for k in 0..n_states {
                    let score = delta[k] * self.transition(k, j) * emit;
                    if score > best_score {
                        best_score = score;
                        best_prev = k;
                    }
                }

                next[j] = best_score;
                backptr[i][j] = best_prev;
            }

            delta = next;
            scale += rescale(&mut delta);
        }

        // Terminação + backtracking
        let (mut current, best) = first_max(&delta);
        let mut states = vec![0; n_obs];
        states[n_obs - 1] = current;
        for i in (1..n_obs).rev() {
            current = backptr[i][current];
            states[i - 1] = current;
        }

        ViterbiPath {
            states,
            log_probability: best.ln() + scale as f64 * std::f64::consts::LN_2,
        }
    }

    /// Log-probabilidade conjunta de um caminho arbitrário.
    ///
    /// Serve para comparar caminhos (ex: verificar que nenhum supera o do Viterbi).
    pub fn path_log_probability(&self, states: &[usize], observations: &[usize]) -> f64 {
        let mut previous: Option<usize> = None;
        states
            .iter()
            .zip(observations)
            .map(|(&j, &symbol)| {
                let transition = match previous {
                    None => self.start[j],
                    Some(k) => self.transition(k, j),
                };
                previous = Some(j);
                transition.ln() + self.emission(j, symbol).ln()
            })
            .sum()
    }

    fn transition(&self, from: usize, to: usize) -> f64 {
        self.transition[from * self.n_states + to]
    }

    fn emission(&self, state: usize, symbol: usize) -> f64 {
        self.emission[state * self.n_symbols + symbol]
    }
}

/// Retorna (índice, valor) do primeiro máximo em um slice.
fn first_max(scores: &[f64]) -> (usize, f64) {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    (best, scores.get(best).copied().unwrap_or(0.0))
}

/// Expoente binário `e` tal que `x = f · 2^e` com `f ∈ [0.5, 1)`.
fn binary_exponent(x: f64) -> i32 {
    if x == 0.0 {
        return 0;
    }
    let biased = ((x.to_bits() >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // Subnormal: normaliza antes de ler o expoente
        binary_exponent(x * pow2(54)) - 54
    } else {
        biased - 1022
    }
}

/// `2^n` exato, para `n` no intervalo dos expoentes normais.
fn pow2(n: i32) -> f64 {
    f64::from_bits(((1023 + n) as u64) << 52)
}

/// Divide a coluna por `2^e` (expoente do máximo) e devolve `e`.
///
/// Coluna toda zero fica como está.
fn rescale(column: &mut [f64]) -> i64 {
    let max = column.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 || !max.is_finite() {
        return 0;
    }
    let exponent = binary_exponent(max);
    // Em dois passos: 2^-e pode sair do intervalo normal quando o máximo é subnormal
    let (first, second) = (-exponent / 2, -exponent - (-exponent / 2));
    for value in column.iter_mut() {
        *value = *value * pow2(first) * pow2(second);
    }
    exponent as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// HMM sintético: 3 estados emissores, 2 símbolos.
    fn synthetic() -> ViterbiDecoder {
        let transitions = ProbabilityMatrix::from_rows(
            vec![
                vec![0.6, 0.3, 0.1],
                vec![0.2, 0.5, 0.3],
                vec![0.25, 0.25, 0.5],
                vec![0.5, 0.4, 0.1], // START
            ],
            vec![0.0; 4],
        )
        .unwrap();
        let emissions = ProbabilityMatrix::from_rows(
            vec![vec![0.9, 0.1], vec![0.3, 0.7], vec![0.55, 0.45]],
            vec![0.0; 3],
        )
        .unwrap();
        ViterbiDecoder::new(&transitions, &emissions).unwrap()
    }

    /// Todas as sequências de estados de tamanho `len`.
    fn all_paths(n_states: usize, len: usize) -> Vec<Vec<usize>> {
        (0..len).fold(vec![Vec::new()], |paths, _| {
            paths
                .into_iter()
                .flat_map(|p| {
                    (0..n_states).map(move |s| {
                        let mut next = p.clone();
                        next.push(s);
                        next
                    })
                })
                .collect()
        })
    }

    #[test]
    fn test_viterbi_beats_brute_force() {
        let decoder = synthetic();
        let sequences: [&[usize]; 4] = [&[0], &[1, 1], &[0, 1, 0, 1], &[1, 0, 0, 1, 1]];

        for observations in sequences {
            let best = decoder.decode(observations).unwrap();
            assert_eq!(best.states.len(), observations.len());

            let recomputed = decoder.path_log_probability(&best.states, observations);
            assert!((recomputed - best.log_probability).abs() < 1e-12);

            for path in all_paths(3, observations.len()) {
                let score = decoder.path_log_probability(&path, observations);
                assert!(
                    best.log_probability >= score - 1e-12,
                    "path {path:?} ({score}) beats viterbi {:?} ({})",
                    best.states,
                    best.log_probability
                );
            }
        }
    }

    #[test]
    fn test_viterbi_empty() {
        let path = synthetic().decode(&[]).unwrap();
        assert!(path.states.is_empty());
        assert_eq!(path.log_probability, 0.0);
    }

    #[test]
    fn test_viterbi_rejects_unknown_symbol() {
        assert!(synthetic().decode(&[0, 2]).is_err());
    }

    #[test]
    fn test_viterbi_tie_break_prefers_first_state() {
        // Dois estados idênticos: o primeiro deve sempre vencer
        let transitions = ProbabilityMatrix::from_rows(
            vec![vec![0.5, 0.5], vec![0.5, 0.5], vec![0.5, 0.5]],
            vec![0.0; 3],
        )
        .unwrap();
        let emissions =
            ProbabilityMatrix::from_rows(vec![vec![1.0], vec![1.0]], vec![0.0; 2]).unwrap();
        let decoder = ViterbiDecoder::new(&transitions, &emissions).unwrap();

        let path = decoder.decode(&[0, 0, 0]).unwrap();
        assert_eq!(path.states, vec![0, 0, 0]);
    }

    #[test]
    fn test_exact_product_tie_keeps_first_state() {
        // 0.2 · 0.375 e 0.1 · 0.75 são exatamente 0.075, mas seus logaritmos não somam igual
        assert_eq!(0.2 * 0.375, 0.1 * 0.75);
        let transitions = ProbabilityMatrix::from_rows(
            vec![vec![0.5, 0.5], vec![0.5, 0.5], vec![0.2, 0.1]],
            vec![0.0; 3],
        )
        .unwrap();
        let emissions =
            ProbabilityMatrix::from_rows(vec![vec![0.375], vec![0.75]], vec![0.0; 2]).unwrap();
        let decoder = ViterbiDecoder::new(&transitions, &emissions).unwrap();

        let path = decoder.decode(&[0]).unwrap();
        assert_eq!(path.states, vec![0]);
        assert!((path.log_probability - 0.075f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_long_sequence_does_not_underflow() {
        let decoder = synthetic();
        let observations: Vec<usize> = (0..5000).map(|i| (i * 7 % 3 == 0) as usize).collect();

        let path = decoder.decode(&observations).unwrap();
        assert_eq!(path.states.len(), observations.len());
        assert!(path.log_probability.is_finite());

        let recomputed = decoder.path_log_probability(&path.states, &observations);
        assert!((recomputed - path.log_probability).abs() < 1e-8 * recomputed.abs());
    }

    #[test]
    fn test_rescale_is_exact() {
        let mut column = vec![3.0e-200, 1.5e-200, 0.0];
        let original = column.clone();
        let exponent = rescale(&mut column);

        assert!(column[0] >= 0.5 && column[0] < 1.0);
        for (scaled, value) in column.iter().zip(&original) {
            assert_eq!(scaled * pow2(exponent as i32 / 2) * pow2(exponent as i32 - exponent as i32 / 2), *value);
        }
        assert_eq!(column[0], 2.0 * column[1]);
        assert_eq!(binary_exponent(0.75), 0);
        assert_eq!(binary_exponent(1.0), 1);
        assert_eq!(binary_exponent(f64::MIN_POSITIVE / 4.0), -1023);
    }

    #[test]
    fn test_viterbi_is_deterministic() {
        let decoder = synthetic();
        let observations = [1, 0, 1, 1, 0, 0, 1];
        let first = decoder.decode(&observations).unwrap();
        for _ in 0..10 {
            assert_eq!(decoder.decode(&observations).unwrap(), first);
        }
    }

    #[test]
    fn test_decoder_rejects_bad_shape() {
        let transitions =
            ProbabilityMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![0.0; 2]).unwrap();
        let emissions =
            ProbabilityMatrix::from_rows(vec![vec![1.0], vec![1.0]], vec![0.0; 2]).unwrap();
        assert!(ViterbiDecoder::new(&transitions, &emissions).is_err());
    }

    #[test]
    fn test_first_max_keeps_first() {
        assert_eq!(first_max(&[1.0, 3.0, 3.0, 2.0]), (1, 3.0));
        assert_eq!(first_max(&[0.0, 0.0]), (0, 0.0));
    }
}
