use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use biblio_core::{
    corpus, ExtractedToken, ExtractorError, HmmModel, MatrixKind, MetadataExtractor, RenderFormat,
    TrainingCorpus,
};

#[derive(Parser, Debug)]
#[clap(name = "biblio", version, about = "Extrator de campos de referências bibliográficas")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Treina um modelo a partir de um corpus anotado e salva em JSON.
    Train(TrainArgs),

    /// Imprime uma das matrizes do modelo como tabela de diagnóstico.
    Render(RenderArgs),

    /// Decodifica referências sem tags: uma por argumento ou uma por linha da stdin.
    Extract(ExtractArgs),

    /// Lista as linhas cujas probabilidades não somam 1.
    Validate(ModelSource),
}

/// Origem do modelo. Sem nenhuma das flags, treina com o corpus de exemplo embutido.
#[derive(Parser, Debug)]
struct ModelSource {
    /// Arquivo de modelo gerado por `biblio train`.
    #[clap(short = 'm', long, conflicts_with = "corpus")]
    model: Option<PathBuf>,

    /// Corpus anotado para treinar (uma referência por linha).
    #[clap(short = 'c', long)]
    corpus: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TrainArgs {
    /// Arquivo do corpus anotado. Padrão: corpus de exemplo embutido.
    #[clap(short = 'c', long)]
    corpus: Option<PathBuf>,

    /// Arquivo onde o modelo é gravado.
    #[clap(short = 'o', long)]
    model_out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[clap(flatten)]
    source: ModelSource,

    #[clap(short = 'k', long, value_enum, default_value = "transitions")]
    kind: KindArg,

    #[clap(short = 'f', long, value_enum, default_value = "text")]
    format: FormatArg,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    #[clap(flatten)]
    source: ModelSource,

    /// Referências sem tags. Lidas da stdin quando omitidas.
    references: Vec<String>,

    /// Imprime uma linha JSON por referência em vez da tabela.
    #[clap(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Transitions,
    Emissions,
}

impl From<KindArg> for MatrixKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Transitions => MatrixKind::Transitions,
            KindArg::Emissions => MatrixKind::Emissions,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Html,
    Text,
}

impl From<FormatArg> for RenderFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Html => RenderFormat::Html,
            FormatArg::Text => RenderFormat::Text,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("erro de E/S: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error("erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("o modelo tem {0} linhas degeneradas")]
    Degenerate(usize),
}

impl ModelSource {
    fn load(&self) -> Result<HmmModel, CliError> {
        if let Some(path) = &self.model {
            return Ok(HmmModel::load(path)?);
        }
        Ok(HmmModel::train(&load_corpus(self.corpus.as_ref())?))
    }
}

fn load_corpus(path: Option<&PathBuf>) -> Result<TrainingCorpus, CliError> {
    match path {
        Some(path) => Ok(TrainingCorpus::load(path)?),
        None => {
            info!("usando o corpus de exemplo embutido");
            Ok(corpus::sample_corpus())
        }
    }
}

fn train(args: TrainArgs) -> Result<(), CliError> {
    let corpus = load_corpus(args.corpus.as_ref())?;
    info!(records = corpus.len(), "treinando");
    let model = HmmModel::train(&corpus);
    model.save(&args.model_out)?;
    Ok(())
}

fn render(args: RenderArgs) -> Result<(), CliError> {
    let model = args.source.load()?;
    let table = model.render(args.kind.into(), args.format.into());
    io::stdout().lock().write_all(table.as_bytes())?;
    Ok(())
}

fn extract(args: ExtractArgs) -> Result<(), CliError> {
    let extractor = MetadataExtractor::new(args.source.load()?);

    let references = if args.references.is_empty() {
        read_references(io::stdin().lock())?
    } else {
        args.references
    };

    let results = extractor.extract_batch(&references);
    write_results(&mut io::stdout().lock(), &results, args.json)
}

/// Uma referência por linha. Linhas em branco são mantidas (resultado vazio),
/// para que a saída continue alinhada com a entrada.
fn read_references<R: BufRead>(reader: R) -> Result<Vec<String>, CliError> {
    Ok(reader.lines().collect::<Result<Vec<_>, _>>()?)
}

fn write_results<W: Write>(out: &mut W, results: &[Vec<ExtractedToken>], json: bool) -> Result<(), CliError> {
    for records in results {
        if json {
            serde_json::to_writer(&mut *out, records)?;
            writeln!(out)?;
        } else {
            for record in records {
                writeln!(out, "{:<4}{:<14}{}", record.state, record.symbol, record.token.text)?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn validate(source: ModelSource) -> Result<(), CliError> {
    let report = source.load()?.validate();
    let mut out = io::stdout().lock();
    for issue in &report.unbalanced_rows {
        writeln!(out, "{}\t{}\t{:.8}", issue.matrix.name(), issue.row, issue.sum)?;
    }
    writeln!(out, "células zeradas: {}", report.zero_cells)?;

    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::Degenerate(report.unbalanced_rows.len()))
    }
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => train(args),
        Command::Render(args) => render(args),
        Command::Extract(args) => extract(args),
        Command::Validate(source) => validate(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract_args() {
        let cli = Cli::parse_from(["biblio", "extract", "--json", "Smith J. 2008."]);
        match cli.command {
            Command::Extract(args) => {
                assert!(args.json);
                assert_eq!(args.references, vec!["Smith J. 2008."]);
                assert!(args.source.model.is_none());
            }
            other => panic!("comando inesperado {other:?}"),
        }
    }

    #[test]
    fn test_model_and_corpus_conflict() {
        let result = Cli::try_parse_from(["biblio", "validate", "-m", "a.json", "-c", "corpus.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_stdin_lines_keep_json_output_aligned() {
        let input = "Smith J. 2008.\n\n   \nDoe K. Some title.\n";
        let references = read_references(input.as_bytes()).unwrap();
        assert_eq!(references.len(), 4);

        let extractor = MetadataExtractor::train(&corpus::sample_corpus());
        let results = extractor.extract_batch(&references);
        let mut out = Vec::new();
        write_results(&mut out, &results, true).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "[]");
        assert_eq!(lines[2], "[]");
        assert!(lines[0].contains("\"Smith\""));
    }

    #[test]
    fn test_train_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_out = dir.path().join("model.json");
        train(TrainArgs { corpus: None, model_out: model_out.clone() }).unwrap();

        let source = ModelSource { model: Some(model_out), corpus: None };
        assert_eq!(source.load().unwrap().transitions().rows(), 21);
    }
}
