//! # Erros do Extrator
//!
//! O classificador é estatístico e "best-effort": tokens desconhecidos, texto
//! sem tag, linhas degeneradas e entradas vazias **não** são erros.
//! Os erros abaixo cobrem apenas a fronteira com o mundo externo (arquivos,
//! JSON) e modelos persistidos com formato incompatível.

use std::io;

/// Alias de `Result` usado em todo o crate.
pub type Result<T, E = ExtractorError> = std::result::Result<T, E>;

/// Erros possíveis ao carregar corpus, persistir ou recarregar modelos.
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    /// Falha de leitura/escrita (corpus ou arquivo de modelo).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON malformado no modelo persistido.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Falha ao mover o arquivo temporário para o destino final.
    #[error("failed to persist model file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// O modelo carregado não corresponde ao vocabulário fixo deste build.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Matriz construída a partir de linhas com dimensões inconsistentes.
    #[error("invalid matrix dimensions: {0}")]
    InvalidDimensions(String),
}

impl ExtractorError {
    pub(crate) fn invalid_model<S: Into<String>>(msg: S) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub(crate) fn invalid_dimensions<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimensions(msg.into())
    }
}
