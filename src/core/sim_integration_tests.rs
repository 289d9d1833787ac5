use crate::core::extractor::TranscriptExtractor;
use crate::core::models::{
    AnalysisOutcome, AnalysisRequest, AppConfig, StudentRecord, Strategy, Verdict,
};
use crate::core::normalizer::normalize;
use crate::core::rule_engine::RuleEngine;
use crate::report::{render_markdown, Summary};
use crate::storage::database::Database;
use crate::storage::load_rules;
use crate::storage::spreadsheet::{COL_PRIORITY, REQUIRED_COLUMNS};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_sheet(sheet: &mut Worksheet, rows: &[Vec<&str>]) {
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *value).unwrap();
        }
    }
}

/// 两个机构的规则表：UFRGS 带优先级列，UFF 只有必需列
fn write_workbook(path: &Path) {
    let mut header = REQUIRED_COLUMNS.to_vec();
    header.push(COL_PRIORITY);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("UFRGS").unwrap();
        write_sheet(
            sheet,
            &[
                header.clone(),
                vec!["INF01202", "Algoritmos e Programação", "Sim", "ICP131", "Programação I", "Ementa equivalente.", ""],
                vec!["INF01202+INF01203", "Algoritmos + Estruturas", "Sim", "ICP131+ICP141", "Programação I + Programação II", "", "90"],
                vec!["MAT01353", "Cálculo I", "Não", "MAE111", "Cálculo I", "Carga horária insuficiente.", ""],
                vec!["", "", "", "", "", "", ""],
                vec!["FIS01181", "Física I", "", "FIT112", "Física I", "", ""],
            ],
        );
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("UFF").unwrap();
        write_sheet(
            sheet,
            &[
                REQUIRED_COLUMNS.to_vec(),
                vec!["GMA001", "Cálculo I", "Sim", "MAE111", "Cálculo I", ""],
            ],
        );
    }
    workbook.save(path).unwrap();
}

fn analyze(engine: &RuleEngine, institution: &str, strategy: Strategy, record: StudentRecord) -> Summary {
    let report = engine.analyze(&AnalysisRequest {
        institution: institution.to_string(),
        strategy,
        record,
    });
    Summary::from_report(&report)
}

#[test]
fn sim_workbook_to_markdown_with_priority_and_consumption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("equivalencias.xlsx");
    write_workbook(&path);

    // 未指定机构时取第一个有效工作表
    let (institution, rules) = load_rules(&path, None).unwrap();
    assert_eq!(institution, "UFRGS");
    assert_eq!(rules.len(), 4);

    let engine = RuleEngine::new(rules).unwrap();
    // 组合规则优先级 90，排在单门规则前面
    assert!(engine.rules()[0].is_combo());

    let record = StudentRecord::from_codes(normalize("INF01202, INF01203 MAT01353 FIS01181 ADM0001"));
    let summary = analyze(&engine, &institution, Strategy::Consume, record);

    assert_eq!(summary.equivalent.len(), 1);
    assert_eq!(summary.equivalent[0].origin_codes, "INF01202+INF01203");
    assert_eq!(summary.equivalent[0].dest_codes, "ICP131, ICP141");
    // MAT01353 结论为"Não"，FIS01181 结论为空，都消耗代码但不免修
    assert_eq!(summary.not_equivalent.len(), 2);
    assert_eq!(summary.not_equivalent[1].origin_codes, "FIS01181");
    assert_eq!(summary.not_equivalent[1].verdict, Verdict::Unfavorable);
    assert_eq!(summary.not_found, normalize("ADM0001").into_iter().collect::<Vec<_>>());
    assert_eq!(summary.waived, normalize("ICP131 ICP141"));

    let md = render_markdown(&summary);
    assert!(md.contains("## Disciplinas Equivalentes (1)"));
    assert!(md.contains("## Disciplinas Não Equivalentes (2)"));
    assert!(md.contains("Carga horária insuficiente."));
    assert!(md.contains("`ADM0001`"));
    assert!(md.contains("## Disciplinas a Serem Dispensadas\n\nICP131, ICP141\n"));
}

#[test]
fn sim_named_institution_and_strategies_disagree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("equivalencias.xlsx");
    write_workbook(&path);

    let (_, rules) = load_rules(&path, Some("ufrgs")).unwrap();
    let engine = RuleEngine::new(rules).unwrap();
    let approved = normalize("INF01202 INF01203");

    // 消耗式：组合规则吃掉 INF01202，单门规则不再命中
    let consumed = engine.resolve(&approved);
    assert_eq!(consumed.matched_rules().count(), 1);

    // 独立授予：两条规则都满足，结果取并集
    assert_eq!(engine.grant_all(&approved), normalize("ICP131 ICP141"));

    // 独立授予的报告同样只免修结论允许的规则
    let summary = analyze(
        &engine,
        "UFRGS",
        Strategy::GrantAll,
        StudentRecord::from_codes(normalize("MAT01353 FIS01181")),
    );
    assert_eq!(summary.not_equivalent.len(), 2);
    assert!(summary.waived.is_empty());
    assert!(render_markdown(&summary).contains("Nenhuma disciplina pode ser dispensada."));

    let (uff, uff_rules) = load_rules(&path, Some("UFF")).unwrap();
    assert_eq!(uff, "UFF");
    assert_eq!(uff_rules.len(), 1);
}

#[test]
fn sim_json_rules_grant_all() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("usp.json");
    fs::write(
        &path,
        r#"[
            {"requires": ["MAC0110"], "grants": ["MAB120"]},
            {"requires": ["MAC0110", "MAC0121"], "grants": ["MAB240", "MAB120"]},
            {"requires": ["MAT2453"], "grants": ["MAC118"]}
        ]"#,
    )
    .unwrap();

    let (institution, rules) = load_rules(&path, None).unwrap();
    assert_eq!(institution, "usp");
    let engine = RuleEngine::new(rules).unwrap();

    let summary = analyze(
        &engine,
        &institution,
        Strategy::GrantAll,
        StudentRecord::from_codes(normalize("mac0110 MAC0121")),
    );
    assert_eq!(summary.waived, normalize("MAB120 MAB240"));

    let md = render_markdown(&summary);
    assert!(md.contains("MAB120, MAB240"));
}

#[test]
fn sim_transcript_text_to_report() {
    let dir = tempdir().unwrap();
    let transcript = dir.path().join("boa.txt");
    fs::write(
        &transcript,
        "BOLETIM DE ORIENTAÇÃO ACADÊMICA\nData de Emissão\nJOAO PEREIRA\n\
         ICP131 Programação de Computadores I 4.0 60 8.5\n\
         MAE111 Cálculo I 6.0 90 7.0\n\
         ICPZ55 Atividades Acadêmicas 0.0 0 10.0\n",
    )
    .unwrap();

    let config = AppConfig::default();
    let extractor = TranscriptExtractor::new(&config.course_prefixes, &config.excluded_codes).unwrap();
    let record = extractor.extract_from_file(&transcript).unwrap();
    assert_eq!(record.student_name.as_deref(), Some("Joao Pereira"));
    assert_eq!(record.approved_codes, normalize("ICP131 MAE111"));

    let rules_path = dir.path().join("reversa.json");
    fs::write(&rules_path, r#"[{"requires": ["ICP131"], "grants": ["INF01202"]}]"#).unwrap();
    let (institution, rules) = load_rules(&rules_path, Some("UFRGS")).unwrap();
    let engine = RuleEngine::new(rules).unwrap();

    let summary = analyze(&engine, &institution, Strategy::Lookup, record);
    assert_eq!(summary.student_name.as_deref(), Some("Joao Pereira"));
    assert_eq!(summary.equivalent.len(), 1);
    assert_eq!(summary.not_found, normalize("MAE111").into_iter().collect::<Vec<_>>());
    assert!(render_markdown(&summary).contains("Aluno: Joao Pereira"));
}

#[test]
fn sim_non_transcript_document_is_rejected_before_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("outro.txt");
    fs::write(&path, "Histórico escolar\nICP131 Programação 4.0 60 8.5\n").unwrap();

    let config = AppConfig::default();
    let extractor = TranscriptExtractor::new(&config.course_prefixes, &config.excluded_codes).unwrap();
    let err = extractor.extract_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("BOLETIM DE ORIENTAÇÃO ACADÊMICA"));
}

#[test]
fn sim_saved_analysis_round_trips_through_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("equivalencias.xlsx");
    write_workbook(&path);
    let db = Database::open(&dir.path().join("equivalencias.db")).unwrap();

    let (institution, rules) = load_rules(&path, Some("UFRGS")).unwrap();
    let engine = RuleEngine::new(rules).unwrap();
    db.save_rule_table(&institution, engine.rules()).unwrap();

    // 从缓存重建的引擎给出相同结果
    let cached = db.load_rule_table("UFRGS").unwrap().unwrap();
    let cached_engine = RuleEngine::new(cached.rules).unwrap();
    let approved = normalize("INF01202 MAT01353");
    assert_eq!(engine.resolve(&approved), cached_engine.resolve(&approved));

    let report = cached_engine.analyze(&AnalysisRequest {
        institution: institution.clone(),
        strategy: Strategy::Consume,
        record: StudentRecord::from_codes(approved),
    });
    db.save_analysis(&report).unwrap();

    let history = db.load_recent_analyses(5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], report);
    assert!(matches!(history[0].outcome, AnalysisOutcome::Consume(_)));
}
