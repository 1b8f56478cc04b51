use biblio_core::corpus::{demo_texts, sample_corpus};
use biblio_core::{
    CanonicalState, HmmModel, HmmState, MatrixKind, MetadataExtractor, RenderFormat, Symbol,
    TrainingCorpus,
};

fn labels(extractor: &MetadataExtractor, text: &str) -> Vec<String> {
    extractor.extract(text).iter().map(|r| r.state.label()).collect()
}

#[test]
fn trained_model_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    let trained = MetadataExtractor::train(&sample_corpus());
    trained.model().save(&path).unwrap();
    let loaded = MetadataExtractor::load(&path).unwrap();

    assert_eq!(loaded.model(), trained.model());
    for (_, text) in demo_texts() {
        assert_eq!(loaded.extract(text), trained.extract(text));
    }
}

#[test]
fn single_record_corpus_reproduces_its_tags() {
    let extractor = MetadataExtractor::train(&TrainingCorpus::from_lines(["<T>Hello World<A>Doe"]));
    assert_eq!(labels(&extractor, "Hello World Doe"), ["TS", "TR", "AS"]);
}

#[test]
fn corpus_from_reader_learns_start_transitions() {
    let text = "<A>Smith J. <T>Some title. <D>2008.\n\nno tags here\n<A>Doe K. <D>1999.\n";
    let corpus = TrainingCorpus::from_reader(text.as_bytes()).unwrap();
    let model = HmmModel::train(&corpus);

    // START só transita para AS no corpus
    let start_to_author = model.transition_probability(None, HmmState::from_label("AS").unwrap());
    assert!(start_to_author > 0.99);
    assert_eq!(model.validate().zero_cells, 0);
}

#[test]
fn every_token_gets_one_record() {
    let extractor = MetadataExtractor::train(&sample_corpus());
    let reference = "Baum L. E. Statistical inference @ 1966. Vol. 37, No. 6. P. 1554-1563.";
    let records = extractor.extract(reference);
    let tokens = biblio_core::tokenizer::tokenize(reference);

    assert_eq!(records.len(), tokens.len());
    for (record, token) in records.iter().zip(&tokens) {
        assert_eq!(&record.token, token);
    }
    assert!(records.iter().any(|r| r.symbol == Symbol::Unknown));
    assert!(records.iter().any(|r| r.symbol == Symbol::FourDigit));
}

#[test]
fn year_in_sample_style_reference_is_a_date() {
    let extractor = MetadataExtractor::train(&sample_corpus());
    let analysis = extractor.analyze("Smith J. Hidden Markov models // Journal of Documentation. 2008.");
    let date = CanonicalState::from_code('D').unwrap();

    let year = analysis
        .tokens
        .iter()
        .find(|r| r.token.text == "2008")
        .map(|r| r.state.canonical());
    assert_eq!(year, Some(date));
    assert_eq!(analysis.fields.get('A').map(|a| a.starts_with("Smith")), Some(true));
}

#[test]
fn rendered_tables_cover_all_rows() {
    let model = HmmModel::train(&sample_corpus());
    let html = model.render(MatrixKind::Emissions, RenderFormat::Html);
    assert_eq!(html.matches("<td><strong>").count(), 20);
    assert!(html.contains("<th>fourDigit</th>"));

    let text = model.render(MatrixKind::Transitions, RenderFormat::Text);
    assert_eq!(text.lines().count(), 22);
    assert!(text.lines().last().unwrap().starts_with("START"));
}
