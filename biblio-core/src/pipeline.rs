//! # Pipeline de Extração: Orquestrador
//!
//! Conecta os estágios para uma referência bruta (sem tags):
//!
//! ```text
//! texto → tokenizer → tokens → SymbolClassifier → símbolos → Viterbi → estados
//! ```
//!
//! e devolve um registro `{state, token, symbol}` por token, na ordem de entrada.
//! O extrator só lê o modelo, então uma única instância pode atender várias
//! threads (o lote usa rayon).

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::TrainingCorpus;
use crate::error::Result;
use crate::hmm::HmmModel;
use crate::symbols::SymbolClassifier;
use crate::tagger::{tokens_to_spans, CanonicalState, ExtractedToken, FieldSpan};
use crate::tokenizer::tokenize;

/// Texto de cada campo: tokens do mesmo estado canônico unidos por espaço.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    /// Pares (estado, texto) na ordem em que o campo aparece pela primeira vez.
    pub fields: Vec<(CanonicalState, String)>,
}

impl ExtractedFields {
    pub fn from_tokens(tokens: &[ExtractedToken]) -> Self {
        let mut fields: Vec<(CanonicalState, String)> = Vec::new();
        for item in tokens {
            let canonical = item.state.canonical();
            match fields.iter_mut().find(|(state, _)| *state == canonical) {
                Some((_, text)) => {
                    text.push(' ');
                    text.push_str(&item.token.text);
                }
                None => fields.push((canonical, item.token.text.clone())),
            }
        }
        Self { fields }
    }

    /// Texto do campo com o código indicado (ex: `'T'`).
    pub fn get(&self, code: char) -> Option<&str> {
        self.fields
            .iter()
            .find(|(state, _)| state.code() == code)
            .map(|(_, text)| text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resultado completo da análise de uma referência.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub tokens: Vec<ExtractedToken>,
    pub spans: Vec<FieldSpan>,
    pub fields: ExtractedFields,
    /// Log-probabilidade do caminho escolhido pelo Viterbi
    pub log_probability: f64,
    pub processing_ms: u64,
}

/// Extrator de metadados sobre um modelo já treinado (somente leitura).
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    model: HmmModel,
}

impl MetadataExtractor {
    pub fn new(model: HmmModel) -> Self {
        Self { model }
    }

    /// Treina um modelo a partir do corpus e cria o extrator.
    pub fn train(corpus: &TrainingCorpus) -> Self {
        Self::new(HmmModel::train(corpus))
    }

    /// Carrega um modelo persistido.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::new(HmmModel::load(path)?))
    }

    pub fn model(&self) -> &HmmModel {
        &self.model
    }

    /// Decodifica uma referência bruta: um registro por token, na ordem de entrada.
    ///
    /// String vazia (ou só espaços) → resultado vazio.
    pub fn extract(&self, raw_reference: &str) -> Vec<ExtractedToken> {
        self.decode(raw_reference).0
    }

    /// Análise completa: tokens, trechos contíguos e campos agrupados.
    pub fn analyze(&self, raw_reference: &str) -> Extraction {
        let start = Instant::now();
        let (tokens, log_probability) = self.decode(raw_reference);
        let spans = tokens_to_spans(&tokens, raw_reference);
        let fields = ExtractedFields::from_tokens(&tokens);

        Extraction {
            tokens,
            spans,
            fields,
            log_probability,
            processing_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Decodifica várias referências em paralelo contra o mesmo modelo.
    pub fn extract_batch<S: AsRef<str> + Sync>(&self, references: &[S]) -> Vec<Vec<ExtractedToken>> {
        references
            .par_iter()
            .map(|reference| self.extract(reference.as_ref()))
            .collect()
    }

    fn decode(&self, raw_reference: &str) -> (Vec<ExtractedToken>, f64) {
        let tokens = tokenize(raw_reference);
        if tokens.is_empty() {
            return (Vec::new(), 0.0);
        }

        let classifier = SymbolClassifier::shared();
        let symbols: Vec<_> = tokens.iter().map(|t| classifier.classify(&t.text)).collect();
        let (states, log_probability) = self.model.decode_with_score(&symbols);
        debug!(tokens = tokens.len(), "referência decodificada");

        let extracted = tokens
            .into_iter()
            .zip(symbols)
            .zip(states)
            .map(|((token, symbol), state)| ExtractedToken { state, token, symbol })
            .collect();
        (extracted, log_probability)
    }
}
