//! Configuração do servidor via variáveis de ambiente.

use std::net::SocketAddr;
use std::path::PathBuf;

use biblio_core::{corpus, HmmModel, Result, TrainingCorpus};
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `BIBLIO_ADDR` (padrão `0.0.0.0:3000`)
    pub addr: SocketAddr,
    /// `BIBLIO_MODEL`: modelo salvo com `biblio train`
    pub model_path: Option<PathBuf>,
    /// `BIBLIO_CORPUS`: corpus anotado para treinar na inicialização
    pub corpus_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let addr = std::env::var("BIBLIO_ADDR")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    warn!(value = %raw, "BIBLIO_ADDR inválido, usando o padrão");
                    None
                }
            })
            .unwrap_or_else(default_addr);

        Self {
            addr,
            model_path: std::env::var_os("BIBLIO_MODEL").map(PathBuf::from),
            corpus_path: std::env::var_os("BIBLIO_CORPUS").map(PathBuf::from),
        }
    }

    /// Carrega o modelo salvo; senão treina com o corpus indicado ou o de exemplo.
    pub fn load_model(&self) -> Result<HmmModel> {
        if let Some(path) = &self.model_path {
            return HmmModel::load(path);
        }
        let corpus = match &self.corpus_path {
            Some(path) => TrainingCorpus::load(path)?,
            None => {
                info!("nenhum modelo ou corpus configurado, treinando com o corpus de exemplo");
                corpus::sample_corpus()
            }
        };
        Ok(HmmModel::train(&corpus))
    }
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            model_path: None,
            corpus_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_trains_sample_model() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 3000);
        let model = config.load_model().unwrap();
        assert_eq!(model.transitions().rows(), 21);
    }

    #[test]
    fn test_missing_model_file_is_an_error() {
        let config = ServerConfig {
            model_path: Some(PathBuf::from("/nonexistent/model.json")),
            ..ServerConfig::default()
        };
        assert!(config.load_model().is_err());
    }
}
