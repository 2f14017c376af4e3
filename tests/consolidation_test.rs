use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use lead_consolidator::app::ports::{CompanyLookup, DomainLookup, LeadOutputPort};
use lead_consolidator::app::ConsolidationReport;
use lead_consolidator::app::{ConsolidationRequest, ConsolidationUseCase};
use lead_consolidator::config::AppConfig;
use lead_consolidator::infra::JsonOutputAdapter;
use lead_consolidator::pipeline::classify::{classify, CountryRegistry};
use lead_consolidator::pipeline::dedup::{deduplicate, KeyKind};
use lead_consolidator::pipeline::enrich::{EnrichmentEscalator, EscalationLimits};
use lead_consolidator::pipeline::ingestion::RawBatch;
use lead_consolidator::pipeline::normalize::{RecordOutcome, SchemaNormalizer};
use lead_consolidator::pipeline::quality_gate::{self, StageSpec};
use lead_consolidator::pipeline::storage::CampaignHistory;
use lead_consolidator::{ClassificationState, Lead, LookupError, SourceKind};

struct CountingLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl CompanyLookup for CountingLookup {
    async fn lookup(&self, domain: &str) -> Result<DomainLookup, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match domain {
            "nordic.fi" => Ok(DomainLookup {
                found: true,
                country: Some("Finland".to_string()),
                credits_consumed: 1,
            }),
            _ => Ok(DomainLookup::not_found()),
        }
    }
}

fn normalize_one(record: serde_json::Value, source: SourceKind) -> Lead {
    match SchemaNormalizer::default().normalize_record(&record, source).unwrap() {
        RecordOutcome::Lead(normalized) => normalized.lead,
        RecordOutcome::Junk(marker) => panic!("unexpected junk marker {marker}"),
    }
}

#[test]
fn test_scenario_a_first_batch_wins() {
    let apollo = normalize_one(json!({"email": "a@x.com", "name": "Jane Doe"}), SourceKind::Apollo);
    let apify = normalize_one(
        json!({"email": "A@X.COM ", "full_name": "Jane D."}),
        SourceKind::ApifyLeads,
    );

    let (kept, stats) = deduplicate(vec![vec![apollo.clone()], vec![apify.clone()]]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source, SourceKind::Apollo);
    assert_eq!(stats.duplicates_by_kind.get(&KeyKind::Email), Some(&1));

    // Swapping the batch order lets the other copy survive
    let (kept, _) = deduplicate(vec![vec![apify], vec![apollo]]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source, SourceKind::ApifyLeads);
}

#[test]
fn test_scenario_b_conflicting_signals_are_uncertain() {
    let registry = CountryRegistry::builtin();
    let lv = registry.get("LV").unwrap();
    let mut lead = Lead::new(SourceKind::Apollo);
    lead.company_domain = Some("acme.fi".to_string());
    lead.company_phone = Some("+371 2000 0000".to_string());

    let verdict = classify(&lead, lv);
    assert_eq!(verdict.state, ClassificationState::Uncertain);
    assert!(verdict.reason.contains("domain=.fi"));
    assert!(verdict.reason.contains("phone=+371"));
    assert!(verdict.reason.contains("domestic="));
    assert!(verdict.reason.contains("foreign="));

    verdict.apply_to(&mut lead);
    let again = classify(&lead, lv);
    assert_eq!(again, verdict);
}

#[test]
fn test_scenario_c_require_email() {
    let mut with_email = Lead::new(SourceKind::ManualImport);
    with_email.email = Some("a@b.com".to_string());
    let mut blank_email = Lead::new(SourceKind::ManualImport);
    blank_email.email = Some(String::new());
    let no_email = Lead::new(SourceKind::ManualImport);

    let outcome = quality_gate::apply(
        vec![with_email.clone(), blank_email, no_email],
        &[StageSpec::RequireEmail],
        &CountryRegistry::builtin(),
    )
    .unwrap();

    assert_eq!(outcome.kept, vec![with_email]);
    let report = &outcome.reports[0];
    assert_eq!(report.name, "require_email");
    assert_eq!((report.before_count, report.after_count, report.removed_count), (3, 1, 2));
}

#[test]
fn test_scenario_d_diacritics_restored_from_slug() {
    let lead = normalize_one(
        json!({
            "first_name": "Artis",
            "last_name": "Miezitis",
            "linkedin": "https://www.linkedin.com/in/artis-miez%c4%abtis-33052036"
        }),
        SourceKind::ApifyLeads,
    );
    assert_eq!(lead.first_name.as_deref(), Some("Artis"));
    assert_eq!(lead.last_name.as_deref(), Some("Miezītis"));
}

#[test]
fn test_canonical_records_pass_through_for_every_source() {
    let mut canonical = Lead::new(SourceKind::LinkedinSalesNav);
    canonical.first_name = Some("Anna".to_string());
    canonical.last_name = Some("Šmite".to_string());
    canonical.email = Some("anna@acme.lv".to_string());
    canonical.linkedin_url = Some("https://www.linkedin.com/in/anna-smite".to_string());
    let record = serde_json::to_value(&canonical).unwrap();

    for source in SourceKind::ALL {
        let lead = normalize_one(record.clone(), source);
        assert_eq!(lead.first_name, canonical.first_name, "{source}");
        assert_eq!(lead.last_name, canonical.last_name, "{source}");
        assert_eq!(lead.email, canonical.email, "{source}");
        assert_eq!(lead.linkedin_url, canonical.linkedin_url, "{source}");
    }
}

fn config() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
        [run]
        target_country = "LV"

        [[stages]]
        kind = "require_email"

        [[stages]]
        kind = "exclude_titles"

        [[stages]]
        kind = "require_classification"
        allowed = ["domestic"]
        "#,
    )
    .unwrap()
}

fn batches() -> Vec<RawBatch> {
    vec![
        RawBatch::new(
            "apollo.json",
            SourceKind::Apollo,
            vec![
                json!({
                    "name": "Jane Doe",
                    "title": "CEO",
                    "email": "jane@acme.lv",
                    "organization": {
                        "name": "Acme",
                        "website_url": "https://www.acme.lv",
                        "primary_phone": {"number": "+371 2000 0000"}
                    }
                }),
                json!({
                    "name": "Olli Virtanen",
                    "title": "Managing Director",
                    "email": "olli@nordic.fi",
                    "organization": {
                        "name": "Nordic Oy",
                        "website_url": "nordic.fi",
                        "primary_phone": {"number": "+371 2111 1111"}
                    }
                }),
                json!({
                    "first_name": "Artis",
                    "last_name": "Miezitis",
                    "name": "Artis Miezitis",
                    "title": "Owner",
                    "linkedin_url": "https://www.linkedin.com/in/artis-miez%c4%abtis-33052036",
                    "email": "artis@baltic.com",
                    "organization": {
                        "name": "Baltic SIA",
                        "website_url": "https://baltic.com",
                        "primary_phone": {"number": "+371 2222 2222"}
                    }
                }),
                json!("not an object"),
            ],
        ),
        RawBatch::new(
            "maps.json",
            SourceKind::GoogleMaps,
            vec![
                json!({"title": "Acme", "website": "https://acme.lv", "countryCode": "LV"}),
                json!({"title": "🔍 Scanning pages 3/10"}),
            ],
        ),
        RawBatch::new(
            "apify.json",
            SourceKind::ApifyLeads,
            vec![json!({"full_name": "Jane Doe", "email": "JANE@acme.lv", "job_title": "Intern"})],
        ),
    ]
}

#[tokio::test]
async fn test_full_run_with_escalation() {
    let dir = tempdir().unwrap();
    let lookup = Arc::new(CountingLookup {
        calls: AtomicUsize::new(0),
    });
    let escalator = EnrichmentEscalator::new(lookup.clone(), EscalationLimits::default());
    let output = Arc::new(JsonOutputAdapter::new(
        dir.path().join("leads.json"),
        dir.path().join("report.json"),
    ));
    let mut use_case = ConsolidationUseCase::from_config(&config(), Some(escalator), output).unwrap();

    let run = use_case
        .run_and_write(ConsolidationRequest::new(batches()))
        .await
        .unwrap();

    let names: Vec<Option<&str>> = run.leads.iter().map(|l| l.last_name.as_deref()).collect();
    assert_eq!(run.leads.len(), 2);
    assert_eq!(run.leads[0].email.as_deref(), Some("jane@acme.lv"));
    assert_eq!(names[1], Some("Miezītis"));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

    let report = &run.report;
    assert_eq!(report.target_country, "LV");
    let apollo = &report.normalization[&SourceKind::Apollo];
    assert_eq!((apollo.input, apollo.normalized, apollo.malformed), (4, 3, 1));
    assert_eq!(apollo.names_restored, 1);
    assert_eq!(report.normalization[&SourceKind::GoogleMaps].junk, 1);
    assert_eq!(
        report.dedup_stats.intra_run.duplicates_by_kind.get(&KeyKind::Email),
        Some(&1)
    );
    assert_eq!(report.escalation_stats.escalated_domains, 1);
    assert_eq!(report.escalation_stats.resolved_by_escalation, 1);
    assert_eq!(report.escalation_stats.credits_consumed, 1);
    assert_eq!(report.classification_stats.foreign, 1);

    let stages: Vec<(&str, usize, usize)> = report
        .filter_stage_reports
        .iter()
        .map(|r| (r.name.as_str(), r.before_count, r.after_count))
        .collect();
    assert_eq!(
        stages,
        vec![
            ("require_email", 4, 3),
            ("exclude_titles", 3, 3),
            ("require_classification", 3, 2),
        ]
    );
    let olli = run.removed.iter().find(|l| l.email.as_deref() == Some("olli@nordic.fi")).unwrap();
    assert_eq!(olli.removal_reason.as_deref(), Some("require_classification: foreign"));

    let written: Vec<Lead> =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("leads.json")).unwrap()).unwrap();
    assert_eq!(written, run.leads);
    let report_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report_json["output_leads"], 2);
}

#[tokio::test]
async fn test_without_escalator_conflicts_stay_uncertain() {
    let dir = tempdir().unwrap();
    let output = Arc::new(JsonOutputAdapter::new(
        dir.path().join("leads.json"),
        dir.path().join("report.json"),
    ));
    let mut use_case = ConsolidationUseCase::from_config(&config(), None, output).unwrap();
    let run = use_case.run(ConsolidationRequest::new(batches())).await.unwrap();

    assert_eq!(run.report.classification_stats.uncertain, 1);
    assert_eq!(run.report.escalation_stats.escalated_domains, 0);
    let olli = run.removed.iter().find(|l| l.email.as_deref() == Some("olli@nordic.fi")).unwrap();
    assert_eq!(olli.classification_state, Some(ClassificationState::Uncertain));
}

#[tokio::test]
async fn test_second_campaign_drops_previously_delivered_leads() {
    let dir = tempdir().unwrap();
    let history_dir = dir.path().join("history");
    let output = Arc::new(JsonOutputAdapter::new(
        dir.path().join("leads.json"),
        dir.path().join("report.json"),
    ));
    let mut use_case = ConsolidationUseCase::from_config(&config(), None, output).unwrap();

    let first = use_case
        .run_and_write(ConsolidationRequest::new(batches()).with_history(CampaignHistory::new(&history_dir, "acme")))
        .await
        .unwrap();
    assert_eq!(first.leads.len(), 2);
    assert!(first.report.persisted_campaign.is_some());

    let second = use_case
        .run_and_write(ConsolidationRequest::new(batches()).with_history(CampaignHistory::new(&history_dir, "acme")))
        .await
        .unwrap();
    let cross = second.report.dedup_stats.cross_campaign.as_ref().unwrap();
    assert_eq!(cross.seeded_leads, 2);
    assert_eq!(cross.duplicates_removed(), 2);
    assert!(second.leads.is_empty());
}

struct UnwritableOutput;

#[async_trait]
impl LeadOutputPort for UnwritableOutput {
    async fn write_leads(&self, _leads: &[Lead]) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    async fn write_report(&self, _report: &ConsolidationReport) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_delivery_leaves_history_untouched() {
    let dir = tempdir().unwrap();
    let history_dir = dir.path().join("history");
    let history = || CampaignHistory::new(&history_dir, "acme");

    let mut failing =
        ConsolidationUseCase::from_config(&config(), None, Arc::new(UnwritableOutput)).unwrap();
    let failed = failing
        .run_and_write(ConsolidationRequest::new(batches()).with_history(history()))
        .await;
    assert!(failed.is_err());
    assert!(history().load().campaigns.is_empty());

    // The retry still delivers every lead
    let output = Arc::new(JsonOutputAdapter::new(
        dir.path().join("leads.json"),
        dir.path().join("report.json"),
    ));
    let mut working = ConsolidationUseCase::from_config(&config(), None, output).unwrap();
    let retry = working
        .run_and_write(ConsolidationRequest::new(batches()).with_history(history()))
        .await
        .unwrap();
    assert_eq!(retry.leads.len(), 2);
    assert_eq!(history().load().campaigns.len(), 1);
}

#[tokio::test]
async fn test_history_write_failure_is_reported() {
    let dir = tempdir().unwrap();
    // A regular file where the history directory should be
    let history_dir = dir.path().join("history");
    std::fs::write(&history_dir, "not a directory").unwrap();

    let output = Arc::new(JsonOutputAdapter::new(
        dir.path().join("leads.json"),
        dir.path().join("report.json"),
    ));
    let mut use_case = ConsolidationUseCase::from_config(&config(), None, output).unwrap();
    let run = use_case
        .run_and_write(ConsolidationRequest::new(batches()).with_history(CampaignHistory::new(&history_dir, "acme")))
        .await
        .unwrap();

    assert_eq!(run.leads.len(), 2);
    assert!(run.report.persisted_campaign.is_none());
    assert!(run.report.history_error.is_some());
    let report_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap()).unwrap();
    assert!(report_json["history_error"].is_string());
}

#[test]
fn test_unknown_target_country_fails_before_processing() {
    let config = AppConfig::from_toml_str("[run]\ntarget_country = \"XX\"\n").unwrap();
    let output = Arc::new(JsonOutputAdapter::new("unused.json", "unused-report.json"));
    assert!(ConsolidationUseCase::from_config(&config, None, output).is_err());
}

#[test]
fn test_example_config_compiles() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/consolidator.example.toml");
    let config = AppConfig::load(path).unwrap();
    let registry = config.country_registry().unwrap();
    assert!(registry.get("PL").is_ok());
    assert_eq!(config.stages.len(), 4);
    let output = Arc::new(JsonOutputAdapter::new("unused.json", "unused-report.json"));
    assert!(ConsolidationUseCase::from_config(&config, None, output).is_ok());
}
