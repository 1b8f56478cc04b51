//! # Corpus de Referências Anotadas
//!
//! Formato de treinamento: um registro por linha. Cada trecho é precedido por
//! uma tag de um caractere entre `<` e `>` e se estende até a próxima tag ou
//! até o fim da linha. Texto antes da primeira tag é descartado.
//!
//! ```text
//! <A>Pivovarova T. <T>Phylogenetic heterogeneity of the species // <J>Int. J. Syst. Microbiol., <D>2003. <V>Vol. 3
//! ```
//!
//! ## Convenção do corpus embutido
//!
//! Os códigos são rótulos opacos para o algoritmo. O corpus de exemplo deste
//! crate usa a convenção abaixo (outros corpora podem usar outra):
//!
//! | Código | Campo                  |
//! |--------|------------------------|
//! | T      | Título                 |
//! | A      | Autores                |
//! | D      | Data / ano             |
//! | P      | Editora                |
//! | V      | Volume                 |
//! | J      | Periódico / fonte      |
//! | N      | Número / fascículo     |
//! | U      | URL                    |
//! | B      | Páginas                |
//! | L      | Local de publicação    |

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::tagger::{CanonicalState, CANONICAL_CODES};

/// Um trecho de um registro atribuído a um único estado canônico.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSpan {
    pub state: CanonicalState,
    pub text: String,
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        let codes: String = CANONICAL_CODES.iter().collect();
        Regex::new(&format!("<([{codes}])>")).expect("tag regex is valid")
    })
}

/// Divide um registro anotado em pares (estado, texto), em ordem.
///
/// Tags desconhecidas (ex: `<X>`) não abrem trecho e ficam como texto comum.
pub fn parse_tagged_reference(record: &str) -> Vec<TaggedSpan> {
    let tags: Vec<(CanonicalState, usize, usize)> = tag_regex()
        .captures_iter(record)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let code = caps.get(1)?.as_str().chars().next()?;
            Some((CanonicalState::from_code(code)?, whole.start(), whole.end()))
        })
        .collect();

    tags.iter()
        .enumerate()
        .map(|(i, &(state, _, text_start))| {
            let text_end = tags.get(i + 1).map(|&(_, next_start, _)| next_start).unwrap_or(record.len());
            TaggedSpan {
                state,
                text: record[text_start..text_end].to_string(),
            }
        })
        .collect()
}

/// Corpus de treinamento: registros já sem espaços nas pontas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingCorpus {
    records: Vec<String>,
}

impl TrainingCorpus {
    /// Constrói o corpus a partir de linhas quaisquer (cada uma é aparada).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let records = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .collect();
        Self { records }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
        Ok(Self::from_lines(lines))
    }

    /// Lê um arquivo de corpus (um registro por linha).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let corpus = Self::from_reader(BufReader::new(File::open(path)?))?;
        debug!(path = %path.display(), records = corpus.len(), "corpus carregado");
        Ok(corpus)
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Retorna o corpus de exemplo embutido (referências em russo e inglês).
pub fn sample_corpus() -> TrainingCorpus {
    TrainingCorpus::from_lines(SAMPLE_RECORDS)
}

const SAMPLE_RECORDS: &[&str] = &[
    "<A>Pivovarova T. A. <T>Phylogenetic heterogeneity of the species Acidithiobacillus ferrooxidans // <J>International Journal of Systematic and Evolutionary Microbiology, <D>2003. <V>Vol. 53, <N>No. 1. <B>P. 12-18.",
    "<A>Smith J., Brown K. <T>Hidden Markov models for citation parsing // <J>Journal of Documentation. <D>2008. <V>Vol. 64, <N>№ 3. <B>pp. 341-359.",
    "<A>Иванов И. И. <T>Основы теории вероятностей. <L>М.: <P>Наука, <D>1998. <B>С. 45-67.",
    "<A>Петров П. С., Сидоров А. В. и др. <T>Анализ библиографических ссылок // <J>Вестник МГУ. <D>2011. <V>Т. 12, <N>вып. 4. <B>с. 101-110.",
    "<A>Knuth D. E. <T>The Art of Computer Programming. <L>Reading, MA: <P>Addison-Wesley, <D>1997. <B>672 p.",
    "<A>Rabiner L. R. <T>A tutorial on hidden Markov models and selected applications in speech recognition // <J>Proceedings of the IEEE. <D>1989. <V>Vol. 77, <N>No. 2. <B>P. 257-286.",
    "<A>Кузнецов А. Н. <T>Методы извлечения метаданных [Электронный ресурс]. <U>URL: http://example.org/metadata.pdf <D>(2015).",
    "<A>Manning C. D., Schütze H. <T>Foundations of Statistical Natural Language Processing. <L>Cambridge: <P>MIT Press, <D>1999. <B>680 p.",
    "<A>Соколова Е. В. <T>Модели марковских процессов // <J>Информационные технологии. <D>2007. <N>№ 9. <B>С. 2-8.",
    "<A>Viterbi A. J. <T>Error bounds for convolutional codes and an asymptotically optimum decoding algorithm // <J>IEEE Transactions on Information Theory. <D>1967. <V>Vol. 13, <N>no. 2. <B>pp. 260-269.",
    "<A>Lafferty J., McCallum A., Pereira F. <T>Conditional random fields: probabilistic models for segmenting and labeling sequence data // <J>Proc. ICML. <D>2001. <B>P. 282-289.",
    "<A>Морозов Д. А. <T>Статистический анализ текстов. <L>СПб.: <P>Изд-во Питер, <D>2012. <V>Т. 2. <B>320 с.",
    "<A>Peng F., McCallum A. <T>Information extraction from research papers using conditional random fields. <U>https://example.org/peng04.pdf <D>2004.",
    "<A>Волков С. Г. <T>Разметка библиографических описаний // <J>Научно-техническая информация. <D>2019. <V>Сер. 2, <N>№ 11. <B>С. 15-24.",
];

/// Referências de demonstração para a interface web e a CLI.
pub fn demo_texts() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Artigo (inglês)",
            "Pivovarova T. Phylogenetic heterogeneity of the species Acidithiobacillus ferrooxidans // International Journal of Systematic and Evolutionary Microbiology, 2003.  Vol. 3",
        ),
        (
            "Livro (russo)",
            "Смирнов В. А. Теория случайных процессов. М.: Наука, 2005. 412 с.",
        ),
        (
            "Anais",
            "Baum L. E., Petrie T. Statistical inference for probabilistic functions of finite state Markov chains // Annals of Mathematical Statistics. 1966. Vol. 37, No. 6. P. 1554-1563.",
        ),
        (
            "Recurso eletrônico",
            "Орлов К. Н. Поиск научных публикаций. URL: https://example.org/search (2020).",
        ),
    ]
}
