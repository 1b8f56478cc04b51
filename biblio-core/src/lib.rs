//! # biblio-core: Extração de Metadados de Referências Bibliográficas
//!
//! Este crate implementa um extrator supervisionado baseado em Hidden Markov
//! Model: a partir de um corpus de referências anotadas à mão, aprende as
//! probabilidades de transição entre campos (título, autores, data...) e de
//! emissão de classes léxicas, e depois rotula cada token de uma referência
//! nova com o campo mais provável.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Corpus** ([`corpus`]): registros anotados com tags `<T>`, `<A>`, `<D>`...
//! 2.  **Tokenização** ([`tokenizer`]): palavras, números e pontuação, com offsets originais.
//! 3.  **Símbolos** ([`symbols`]): cada token vira uma classe léxica (`titleWord`, `fourDigit`...).
//! 4.  **Treino** ([`hmm`], [`matrix`]): contagem + suavização por `EPSILON`.
//! 5.  **Decodificação** ([`viterbi`]): sequência de estados mais provável.
//! 6.  **Saída** ([`pipeline`]): um registro `{state, token, symbol}` por token.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use biblio_core::{corpus, MetadataExtractor};
//!
//! // 1. Treina com o corpus de exemplo embutido
//! let extractor = MetadataExtractor::train(&corpus::sample_corpus());
//!
//! // 2. Decodifica uma referência sem tags
//! let records = extractor.extract("Smith J. Hidden Markov models // Journal of Documentation. 2008.");
//!
//! for record in &records {
//!     println!("{:<4} {:<12} {}", record.state, record.symbol, record.token.text);
//! }
//! assert_eq!(records.len(), 14);
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador (tokenização → símbolos → Viterbi).
//! - [`model`]: persistência do modelo treinado em JSON.
//! - [`render`]: tabelas de diagnóstico das matrizes (HTML ou texto).

pub mod corpus;
pub mod error;
pub mod hmm;
pub mod matrix;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod symbols;
pub mod tagger;
pub mod tokenizer;
pub mod viterbi;

pub use corpus::TrainingCorpus;
pub use error::{ExtractorError, Result};
pub use hmm::{HmmModel, HmmTrainer, MatrixKind, ModelReport};
pub use pipeline::{ExtractedFields, Extraction, MetadataExtractor};
pub use render::RenderFormat;
pub use symbols::{Symbol, SymbolClassifier};
pub use tagger::{CanonicalState, ExtractedToken, FieldSpan, HmmState};
pub use tokenizer::Token;
