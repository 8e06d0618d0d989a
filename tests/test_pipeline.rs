//! Integration test: raw yearly tables to a training-ready frame

use lagwatch::prelude::*;
use lagwatch::schema::canonical_contract;
use polars::prelude::*;

fn raw_2022() -> DataFrame {
    df!(
        "RA" => &["RA-1", "RA-2", "RA-3", "RA-4"],
        "Nome" => &["Aluno 1", "Aluno 2", "Aluno 3", "Aluno 4"],
        "Fase" => &["FASE 3", "ALFA", "2", "Fase especial"],
        "Idade 22" => &[11i64, 8, 12, 10],
        "Gênero" => &["Menina", "Menino", "Feminino", "Masculino"],
        "Instituição de ensino" => &["Escola Pública", "Pública", "Rede Decisão", "Pública"],
        "Pedra 22" => &["Ametista", "Agata", "Quartzo", "Topázio"],
        "INDE 22" => &[7.2, 6.1, 5.0, 8.4],
        "IAA" => &[8.0, 7.5, 6.0, 9.0],
        "IEG" => &[Some(7.0), None, Some(5.5), Some(9.1)],
        "IPS" => &[6.9, 7.0, 5.6, 7.5],
        "IDA" => &[6.5, 5.0, 4.2, 8.8],
        "IPV" => &[7.3, 6.8, 6.0, 8.9],
        "IAN" => &[5.0, 10.0, 5.0, 10.0],
        "Defas" => &[-1i64, 0, -2, 0],
        "Avaliador1" => &["A", "B", "C", "D"],
    )
    .unwrap()
}

fn raw_2023() -> DataFrame {
    df!(
        "RA" => &["RA-1", "RA-2", "RA-5"],
        "Nome Anonimizado" => &["Aluno 1", "Aluno 2", "Aluno 5"],
        "Fase" => &[4i64, 1, 2],
        "Idade" => &[12i64, 9, 10],
        "Gênero" => &["Feminino", "Masculino", "Feminino"],
        "Instituição de ensino" => &["Pública", "Pública", "Privada"],
        "Pedra 2023" => &["Topázio", "Ágata", "Quartzo"],
        "INDE 2023" => &["7,5", "6,25", "n/a"],
        "IAA" => &[8.5, 7.0, 6.5],
        "IEG" => &[8.0, 6.0, 5.0],
        "IPS" => &[7.0, 6.5, 6.0],
        "IDA" => &[7.5, 5.5, 5.0],
        "IPV" => &[7.8, 6.5, 6.1],
        "IAN" => &[10.0, 5.0, 5.0],
        "Defasagem" => &[-2i64, 0, 1],
        "Pedra 22" => &["Ametista", "Ágata", "Quartzo"],
    )
    .unwrap()
}

fn store() -> InMemoryStore {
    InMemoryStore::new()
        .with_table("raw_data_2022", raw_2022())
        .with_table("raw_data_2023", raw_2023())
}

fn prepare() -> PreparedDataset {
    let config = PipelineConfig::new().with_years(vec![2022, 2023]);
    HarmonizationPipeline::new(config).unwrap().run(&store()).unwrap()
}

#[test]
fn test_pipeline_merges_years() {
    let dataset = prepare();
    let df = &dataset.frame;

    assert_eq!(df.height(), 7);
    assert!(canonical_contract().validate(df).is_ok());
    for dropped in ["name", "Nome", "Avaliador1", "Pedra 22", "Idade 22"] {
        assert!(df.column(dropped).is_err(), "{} should be gone", dropped);
    }
}

#[test]
fn test_pipeline_encodes_categories() {
    let dataset = prepare();
    let df = &dataset.frame;

    let gender: Vec<Option<i32>> = df.column("gender").unwrap().i32().unwrap().into_iter().collect();
    assert_eq!(gender, vec![Some(0), Some(1), Some(0), Some(1), Some(0), Some(1), Some(0)]);

    let stone: Vec<Option<i32>> = df.column("stone").unwrap().i32().unwrap().into_iter().collect();
    assert_eq!(stone, vec![Some(3), Some(2), Some(1), Some(4), Some(4), Some(2), Some(1)]);

    let institution = df.column("education_institution").unwrap().i32().unwrap();
    assert_eq!(institution.get(0), Some(0));
    assert_eq!(institution.get(2), Some(6));
}

#[test]
fn test_pipeline_phase_labels() {
    let dataset = prepare();
    let fase: Vec<Option<i32>> = dataset.frame.column("fase").unwrap().i32().unwrap().into_iter().collect();
    assert_eq!(fase, vec![Some(3), Some(0), Some(2), None, Some(4), Some(1), Some(2)]);

    assert_eq!(dataset.findings.len(), 1);
    let finding = &dataset.findings[0];
    assert_eq!(finding.year, 2022);
    assert_eq!(finding.row, 3);
    assert_eq!(finding.raw_value, "Fase especial");
}

#[test]
fn test_pipeline_links_next_period_lag() {
    let dataset = prepare();
    let lag_next = dataset.frame.column("lag_next").unwrap().f64().unwrap();

    // RA-1 and RA-2 reappear in 2023
    assert_eq!(lag_next.get(0), Some(-2.0));
    assert_eq!(lag_next.get(1), Some(0.0));
    assert_eq!(dataset.frame.column("lag_next").unwrap().null_count(), 0);
}

#[test]
fn test_pipeline_imputes_after_outlier_report() {
    let dataset = prepare();
    let df = &dataset.frame;

    // "n/a" became null, then the median filled it
    assert_eq!(df.column("inde").unwrap().null_count(), 0);
    assert_eq!(df.column("ieg").unwrap().null_count(), 0);

    let ieg = dataset.outlier_report.get("ieg").unwrap();
    assert_eq!(ieg.null_count, 1);
    assert_eq!(ieg.total_count, 6);
    assert_eq!(dataset.outlier_report.total_records(), 7);

    let inde = df.column("inde").unwrap().f64().unwrap();
    assert_eq!(inde.get(4), Some(7.5));
    assert_eq!(inde.get(5), Some(6.25));
}

#[test]
fn test_pipeline_missing_table() {
    let config = PipelineConfig::new().with_years(vec![2022, 2023, 2024]);
    let result = HarmonizationPipeline::new(config).unwrap().run(&store());
    assert!(matches!(result, Err(LagwatchError::DataError(_))));
}

#[test]
fn test_pipeline_next_year_without_lag_column() {
    let sparse_2023 = df!(
        "RA" => &["RA-1", "RA-2"],
        "INDE 2023" => &["7,0", "6,5"],
    )
    .unwrap();
    let store = InMemoryStore::new()
        .with_table("raw_data_2022", raw_2022())
        .with_table("raw_data_2023", sparse_2023);

    let config = PipelineConfig::new().with_years(vec![2022, 2023]);
    let dataset = HarmonizationPipeline::new(config).unwrap().run(&store).unwrap();

    assert_eq!(dataset.frame.height(), 6);
    let lag_next = dataset.frame.column("lag_next").unwrap();
    assert_eq!(lag_next.dtype(), &DataType::Float64);
    assert_eq!(lag_next.null_count(), 6);
}

#[test]
fn test_outlier_scenario() {
    let df = df!("inde" => &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
    let engine = OutlierEngine::new().with_multiplier(1.5);

    let report = engine.detect(&df).unwrap();
    let stats = report.get("inde").unwrap();
    assert_eq!(stats.q1, 2.25);
    assert_eq!(stats.q3, 4.75);
    assert_eq!(stats.iqr, 2.5);
    assert_eq!(stats.lower_bound, -1.5);
    assert_eq!(stats.upper_bound, 8.5);
    assert_eq!(stats.outlier_count, 1);
    assert!((stats.outlier_percentage - 100.0 / 6.0).abs() < 1e-9);

    let treated = engine.treat(&df).unwrap();
    let values: Vec<Option<f64>> = treated.column("inde").unwrap().f64().unwrap().into_iter().collect();
    assert_eq!(values[5], Some(8.5));
    assert_eq!(values[..5], [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);
}
