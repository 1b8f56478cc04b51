//! # Estados do HMM e Campos Bibliográficos
//!
//! ## Estados Canônicos
//!
//! Cada campo de uma referência (título, autor, data...) é representado por um
//! código de um caractere: `T A D P V J N U B L`. O significado exato de cada
//! código vem da convenção de anotação do corpus; o algoritmo trata os códigos
//! como rótulos opacos.
//!
//! ## Sub-estados Start/Rest
//!
//! Assim como o esquema BIO distingue `B-X` de `I-X`, cada estado canônico se
//! expande em dois estados do HMM:
//!
//! | Estado   | Significado                                   |
//! |----------|-----------------------------------------------|
//! | `XS`     | Start: primeiro token de um trecho anotado    |
//! | `XR`     | Rest: tokens seguintes do mesmo trecho        |
//! | `START`  | Pseudo-estado inicial (nunca emite símbolos)  |
//!
//! Total de estados de trabalho: `2 × 10 = 20`. O `START` ocupa apenas a
//! última linha da matriz de transição.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbols::Symbol;
use crate::tokenizer::Token;

/// Códigos dos estados canônicos, na ordem fixa usada pelos índices.
pub const CANONICAL_CODES: [char; 10] = ['T', 'A', 'D', 'P', 'V', 'J', 'N', 'U', 'B', 'L'];

/// Número de estados de trabalho do HMM (Start + Rest para cada código).
pub const STATE_COUNT: usize = CANONICAL_CODES.len() * 2;

/// Linha da matriz de transição reservada ao pseudo-estado `START`.
pub const START_ROW: usize = STATE_COUNT;

/// Rótulo do pseudo-estado inicial.
pub const START_LABEL: &str = "START";

/// Um campo bibliográfico, identificado apenas pelo seu código.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct CanonicalState(u8);

impl CanonicalState {
    /// Converte um código (ex: `'T'`) no estado canônico correspondente.
    pub fn from_code(code: char) -> Option<Self> {
        CANONICAL_CODES
            .iter()
            .position(|&c| c == code)
            .map(|i| CanonicalState(i as u8))
    }

    pub fn code(self) -> char {
        CANONICAL_CODES[self.0 as usize]
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Todos os estados canônicos, em ordem.
    pub fn all() -> impl Iterator<Item = CanonicalState> {
        (0..CANONICAL_CODES.len()).map(|i| CanonicalState(i as u8))
    }
}

impl TryFrom<char> for CanonicalState {
    type Error = String;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        CanonicalState::from_code(code).ok_or_else(|| format!("unknown state code '{code}'"))
    }
}

impl From<CanonicalState> for char {
    fn from(state: CanonicalState) -> char {
        state.code()
    }
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Estado de trabalho do HMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HmmState {
    /// Primeiro token de um trecho. Ex: **Smith** (AS), J. (AR)
    Start(CanonicalState),
    /// Continuação do mesmo trecho.
    Rest(CanonicalState),
}

impl HmmState {
    /// Índice na matriz: `2 × canônico` para Start, `+1` para Rest.
    pub fn index(self) -> usize {
        match self {
            HmmState::Start(c) => c.index() * 2,
            HmmState::Rest(c) => c.index() * 2 + 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= STATE_COUNT {
            return None;
        }
        let canonical = CanonicalState((index / 2) as u8);
        Some(if index % 2 == 0 {
            HmmState::Start(canonical)
        } else {
            HmmState::Rest(canonical)
        })
    }

    /// Todos os estados em ordem canônica (`TS, TR, AS, AR, ...`).
    pub fn all() -> Vec<HmmState> {
        (0..STATE_COUNT).filter_map(HmmState::from_index).collect()
    }

    pub fn canonical(self) -> CanonicalState {
        match self {
            HmmState::Start(c) | HmmState::Rest(c) => c,
        }
    }

    pub fn is_start(self) -> bool {
        matches!(self, HmmState::Start(_))
    }

    /// Rótulo textual (ex: "TS", "AR")
    pub fn label(self) -> String {
        match self {
            HmmState::Start(c) => format!("{}S", c.code()),
            HmmState::Rest(c) => format!("{}R", c.code()),
        }
    }

    /// Parseia um rótulo (ex: "TS" → Start(T))
    pub fn from_label(label: &str) -> Option<Self> {
        let mut chars = label.chars();
        let canonical = CanonicalState::from_code(chars.next()?)?;
        let state = match chars.next()? {
            'S' => HmmState::Start(canonical),
            'R' => HmmState::Rest(canonical),
            _ => return None,
        };
        chars.next().is_none().then_some(state)
    }
}

impl TryFrom<String> for HmmState {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        HmmState::from_label(&label).ok_or_else(|| format!("unknown HMM state '{label}'"))
    }
}

impl From<HmmState> for String {
    fn from(state: HmmState) -> String {
        state.label()
    }
}

impl fmt::Display for HmmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.label())
    }
}

/// Rótulos das linhas da matriz de transição: os 20 estados e `START` por último.
pub fn transition_row_labels() -> Vec<String> {
    HmmState::all()
        .into_iter()
        .map(HmmState::label)
        .chain(std::iter::once(START_LABEL.to_string()))
        .collect()
}

/// Rótulos dos estados de trabalho (colunas da transição, linhas da emissão).
pub fn state_labels() -> Vec<String> {
    HmmState::all().into_iter().map(HmmState::label).collect()
}

/// Um token decodificado: estado atribuído, texto e símbolo observado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedToken {
    pub state: HmmState,
    pub token: Token,
    pub symbol: Symbol,
}

/// Um trecho contíguo atribuído a um campo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpan {
    pub state: CanonicalState,
    /// Texto do trecho recortado da referência original
    pub text: String,
    /// Índice do primeiro token
    pub start_token: usize,
    /// Índice do último token (inclusivo)
    pub end_token: usize,
    /// Posição de byte inicial no texto original
    pub start: usize,
    /// Posição de byte final no texto original
    pub end: usize,
}

/// Agrupa os tokens decodificados em trechos de campos.
///
/// Um trecho começa em um estado `XS` (ou em um `XR` órfão, que o Viterbi pode
/// produzir) e continua enquanto vierem estados `XR` do mesmo campo.
///
/// # Exemplo
/// `[TS, TR, AS, AR, DS]` → `[Span(T), Span(A), Span(D)]`
pub fn tokens_to_spans(extracted: &[ExtractedToken], original_text: &str) -> Vec<FieldSpan> {
    let mut spans: Vec<FieldSpan> = Vec::new();

    for item in extracted {
        let canonical = item.state.canonical();
        let continues = !item.state.is_start()
            && spans.last().map(|s| s.state == canonical).unwrap_or(false);

        match spans.last_mut() {
            Some(span) if continues => {
                span.end_token = item.token.index;
                span.end = item.token.end;
            }
            _ => spans.push(FieldSpan {
                state: canonical,
                text: String::new(),
                start_token: item.token.index,
                end_token: item.token.index,
                start: item.token.start,
                end: item.token.end,
            }),
        }
    }

    for span in &mut spans {
        span.text = original_text[span.start..span.end].trim().to_string();
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(label: &str) -> HmmState {
        HmmState::from_label(label).unwrap()
    }

    #[test]
    fn test_state_labels() {
        let title = CanonicalState::from_code('T').unwrap();
        assert_eq!(HmmState::Start(title).label(), "TS");
        assert_eq!(HmmState::Rest(title).label(), "TR");
        assert_eq!(state("LR").canonical().code(), 'L');
        assert_eq!(HmmState::from_label("XS"), None);
        assert_eq!(HmmState::from_label("TSS"), None);
    }

    #[test]
    fn test_all_states_have_unique_indices() {
        let all = HmmState::all();
        assert_eq!(all.len(), STATE_COUNT);
        for (i, s) in all.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
        assert_eq!(all[0].label(), "TS");
        assert_eq!(all[3].label(), "AR");
        assert_eq!(transition_row_labels().last().map(String::as_str), Some(START_LABEL));
    }

    #[test]
    fn test_state_serde_uses_labels() {
        let json = serde_json::to_string(&state("DS")).unwrap();
        assert_eq!(json, "\"DS\"");
        let back: HmmState = serde_json::from_str("\"VR\"").unwrap();
        assert_eq!(back, state("VR"));
        assert!(serde_json::from_str::<HmmState>("\"ZZ\"").is_err());
    }

    #[test]
    fn test_tokens_to_spans() {
        let text = "Hello World Doe";
        let tokens = crate::tokenizer::tokenize(text);
        let states = [state("TS"), state("TR"), state("AS")];
        let extracted: Vec<ExtractedToken> = tokens
            .into_iter()
            .zip(states)
            .map(|(token, state)| ExtractedToken { state, token, symbol: Symbol::TitleWord })
            .collect();

        let spans = tokens_to_spans(&extracted, text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Hello World");
        assert_eq!(spans[0].state.code(), 'T');
        assert_eq!((spans[0].start_token, spans[0].end_token), (0, 1));
        assert_eq!(spans[1].text, "Doe");
    }
}
