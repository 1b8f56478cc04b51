//! # Classificador de Símbolos Léxicos
//!
//! O HMM não observa as palavras em si, e sim a **classe léxica** de cada token:
//! pontuação, números de quatro dígitos, palavras capitalizadas, abreviações
//! como "Vol" ou "pp", etc. Isso mantém o alfabeto de observações pequeno e
//! fixo, independente do vocabulário do corpus.
//!
//! ## Ordem dos Padrões
//!
//! A lista de padrões é **ordenada** e o primeiro que casar com o token inteiro
//! vence. A ordem faz parte do contrato:
//!
//! - `fourDigit` (`\d{4}`) vem antes de `digit` (`\d+`), senão anos seriam só "dígitos".
//! - Abreviações (`volume`, `pages`...) vêm antes de `titleWord`/`word`, senão nunca seriam alcançadas.
//!
//! Por isso a lista é um `Vec` percorrido em sequência, nunca um `HashMap`.
//!
//! ```rust
//! use biblio_core::symbols::{Symbol, SymbolClassifier};
//!
//! let classifier = SymbolClassifier::shared();
//! assert_eq!(classifier.classify("2003"), Symbol::FourDigit);
//! assert_eq!(classifier.classify("VOL"), Symbol::Volume);
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classe léxica de um token. A ordem das variantes define o índice da coluna
/// na matriz de emissão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Symbol {
    Comma,
    Dot,
    Hyphen,
    Colon,
    Semicolon,
    Question,
    Quote,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    OpenQuote,
    CloseQuote,
    Slash,
    Misc,
    Apostrophe,
    /// "no", "num", "number", "№", "номер"
    Number,
    /// "vol", "т", "том"
    Volume,
    /// "p", "pp", "pages", "с", "стр"
    Pages,
    /// "press", "изд", "издательство"
    Press,
    /// "вып", "выпуск"
    Release,
    /// "http", "https", "ftp"
    Protocol,
    /// "др", "другие"
    Other,
    UpperLetter,
    LowerLetter,
    UpperWord,
    TitleWord,
    FourDigit,
    Digit,
    Word,
    /// Nenhum padrão casou. Continua sendo uma observação válida.
    Unknown,
}

/// Todos os símbolos, na ordem canônica das colunas.
pub const ALL_SYMBOLS: [Symbol; 31] = [
    Symbol::Comma,
    Symbol::Dot,
    Symbol::Hyphen,
    Symbol::Colon,
    Symbol::Semicolon,
    Symbol::Question,
    Symbol::Quote,
    Symbol::LeftParen,
    Symbol::RightParen,
    Symbol::LeftBracket,
    Symbol::RightBracket,
    Symbol::OpenQuote,
    Symbol::CloseQuote,
    Symbol::Slash,
    Symbol::Misc,
    Symbol::Apostrophe,
    Symbol::Number,
    Symbol::Volume,
    Symbol::Pages,
    Symbol::Press,
    Symbol::Release,
    Symbol::Protocol,
    Symbol::Other,
    Symbol::UpperLetter,
    Symbol::LowerLetter,
    Symbol::UpperWord,
    Symbol::TitleWord,
    Symbol::FourDigit,
    Symbol::Digit,
    Symbol::Word,
    Symbol::Unknown,
];

/// Número de colunas da matriz de emissão.
pub const SYMBOL_COUNT: usize = ALL_SYMBOLS.len();

impl Symbol {
    /// Índice da coluna na matriz de emissão.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL_SYMBOLS.get(index).copied()
    }

    /// Nome do símbolo (usado na serialização e nas tabelas de diagnóstico)
    pub fn name(self) -> &'static str {
        match self {
            Symbol::Comma => "comma",
            Symbol::Dot => "dot",
            Symbol::Hyphen => "hyphen",
            Symbol::Colon => "colon",
            Symbol::Semicolon => "semicolon",
            Symbol::Question => "question",
            Symbol::Quote => "quote",
            Symbol::LeftParen => "leftParen",
            Symbol::RightParen => "rightParen",
            Symbol::LeftBracket => "leftBracket",
            Symbol::RightBracket => "rightBracket",
            Symbol::OpenQuote => "openQuote",
            Symbol::CloseQuote => "closeQuote",
            Symbol::Slash => "slash",
            Symbol::Misc => "misc",
            Symbol::Apostrophe => "apostrophe",
            Symbol::Number => "number",
            Symbol::Volume => "volume",
            Symbol::Pages => "pages",
            Symbol::Press => "press",
            Symbol::Release => "release",
            Symbol::Protocol => "protocol",
            Symbol::Other => "other",
            Symbol::UpperLetter => "upperLetter",
            Symbol::LowerLetter => "lowerLetter",
            Symbol::UpperWord => "upperWord",
            Symbol::TitleWord => "titleWord",
            Symbol::FourDigit => "fourDigit",
            Symbol::Digit => "digit",
            Symbol::Word => "word",
            Symbol::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_SYMBOLS.iter().copied().find(|s| s.name() == name)
    }

    /// Abreviações-chave casam sem diferenciar maiúsculas ("Vol", "vol", "VOL").
    pub fn is_caseless(self) -> bool {
        matches!(
            self,
            Symbol::Number
                | Symbol::Volume
                | Symbol::Pages
                | Symbol::Press
                | Symbol::Release
                | Symbol::Protocol
                | Symbol::Other
        )
    }

    /// Expressão regular (sem âncoras) que define o símbolo.
    /// `Unknown` não tem padrão: é o resultado quando nada casa.
    pub fn pattern(self) -> Option<&'static str> {
        let pattern = match self {
            Symbol::Comma => ",",
            Symbol::Dot => r"\.",
            Symbol::Hyphen => r"[\-—–]",
            Symbol::Colon => ":",
            Symbol::Semicolon => ";",
            Symbol::Question => r"\?",
            Symbol::Quote => "\"",
            Symbol::LeftParen => r"\(",
            Symbol::RightParen => r"\)",
            Symbol::LeftBracket => r"\[",
            Symbol::RightBracket => r"\]",
            Symbol::OpenQuote => "«",
            Symbol::CloseQuote => "»",
            Symbol::Slash => "/",
            Symbol::Misc => r"[_*&\^%]",
            Symbol::Apostrophe => "'",
            Symbol::Number => "no|num(ber)?|№|номер",
            Symbol::Volume => "vol|т(ом)?",
            Symbol::Pages => "p(ages?)?|pp|с(тр)?",
            Symbol::Press => "изд(ательство)?|press",
            Symbol::Release => "вып(уск)?",
            Symbol::Protocol => "https?|ftp",
            Symbol::Other => "др(угие)?",
            Symbol::UpperLetter => r"\p{Lu}",
            Symbol::LowerLetter => r"\p{Ll}",
            Symbol::UpperWord => r"\p{Lu}+",
            Symbol::TitleWord => r"\p{Lu}\p{Ll}+",
            Symbol::FourDigit => r"\d{4}",
            Symbol::Digit => r"\d+",
            Symbol::Word => r"\p{L}+",
            Symbol::Unknown => return None,
        };
        Some(pattern)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Classificador por lista ordenada de padrões (primeiro que casa vence).
#[derive(Debug, Clone)]
pub struct SymbolClassifier {
    patterns: Vec<(Symbol, Regex)>,
}

impl SymbolClassifier {
    /// Compila os padrões na ordem de [`ALL_SYMBOLS`], ancorados no token inteiro.
    pub fn new() -> Self {
        let patterns = ALL_SYMBOLS
            .iter()
            .filter_map(|&symbol| symbol.pattern().map(|p| (symbol, p)))
            .map(|(symbol, pattern)| {
                let flags = if symbol.is_caseless() { "(?i)" } else { "" };
                let regex = Regex::new(&format!("^{flags}(?:{pattern})$"))
                    .expect("symbol patterns are static and valid");
                (symbol, regex)
            })
            .collect();
        Self { patterns }
    }

    /// Instância compartilhada (os padrões são compilados uma única vez).
    pub fn shared() -> &'static SymbolClassifier {
        static SHARED: OnceLock<SymbolClassifier> = OnceLock::new();
        SHARED.get_or_init(SymbolClassifier::new)
    }

    /// Retorna o primeiro símbolo cujo padrão casa com o token inteiro.
    pub fn classify(&self, token: &str) -> Symbol {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(token))
            .map(|(symbol, _)| *symbol)
            .unwrap_or(Symbol::Unknown)
    }

    pub fn classify_all<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Symbol> {
        tokens.iter().map(|t| self.classify(t.as_ref())).collect()
    }
}

impl Default for SymbolClassifier {
    fn default() -> Self {
        Self::new()
    }
}
