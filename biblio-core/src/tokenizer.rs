//! # Tokenizador de Referências Bibliográficas
//!
//! Divide a string bruta de uma citação em unidades léxicas atômicas.
//!
//! ## Regras de Segmentação
//!
//! - Cada sequência máxima de **dígitos** vira um único token (`"2003"`).
//! - Cada caractere de **pontuação ou símbolo** (`\p{P}`, `\p{S}`) vira um token isolado.
//! - Sequências de **espaço em branco** apenas separam tokens e nunca são emitidas.
//! - Qualquer outra sequência máxima (letras) vira um token (`"Smith"`, `"Вып"`).
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use biblio_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("Smith, J. (2003).");
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, ["Smith", ",", "J", ".", "(", "2003", ")", "."]);
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Um token extraído do texto original.
///
/// Mantém a posição exata no texto (`start` e `end`) para que a interface web
/// consiga destacar os campos sem alterar a formatação original da citação.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// O texto do token (ex: "Smith", ",", "2003").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

/// Delimitadores: espaço (descartado) ou átomo (pontuação, símbolo, dígitos).
fn delimiter_regex() -> &'static Regex {
    static DELIMITERS: OnceLock<Regex> = OnceLock::new();
    DELIMITERS.get_or_init(|| {
        Regex::new(r"(?P<space>\s+)|(?P<atom>\p{P}|\p{S}|\d+)").expect("static regex is valid")
    })
}

/// Tokeniza uma string preservando a ordem e descartando tokens vazios.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in delimiter_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };

        // Texto entre delimitadores: sequência de letras
        push_token(&mut tokens, text, cursor, whole.start());

        if let Some(atom) = caps.name("atom") {
            push_token(&mut tokens, text, atom.start(), atom.end());
        }
        cursor = whole.end();
    }
    push_token(&mut tokens, text, cursor, text.len());

    tokens
}

/// Atalho que devolve apenas os textos dos tokens.
pub fn tokenize_texts(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| t.text).collect()
}

/// Adiciona o trecho `[start, end)` como token (se não vazio)
fn push_token(tokens: &mut Vec<Token>, text: &str, start: usize, end: usize) {
    if start < end {
        let index = tokens.len();
        tokens.push(Token {
            text: text[start..end].to_string(),
            start,
            end,
            index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_citation() {
        let texts = tokenize_texts("Smith, J. (2003).");
        assert_eq!(texts, vec!["Smith", ",", "J", ".", "(", "2003", ")", "."]);
    }

    #[test]
    fn test_tokenize_offsets_and_indices() {
        let tokens = tokenize("Vol.  12");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "Vol");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 3));
        assert_eq!(tokens[2].text, "12");
        assert_eq!((tokens[2].start, tokens[2].end), (6, 8));
        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(token.index, i);
        }
    }

    #[test]
    fn test_tokenize_splits_digits_from_letters() {
        assert_eq!(tokenize_texts("pp123abc"), vec!["pp", "123", "abc"]);
    }

    #[test]
    fn test_tokenize_cyrillic_and_symbols() {
        let texts = tokenize_texts("Иванов И.И. // Журнал. — №5");
        assert_eq!(
            texts,
            vec!["Иванов", "И", ".", "И", ".", "/", "/", "Журнал", ".", "—", "№", "5"]
        );
    }

    #[test]
    fn test_tokenize_empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n ").is_empty());
    }
}
