use std::fs;

use qrda_cat1::{Cat1Importer, Document};
use qrda_core::{
    Category, Code, CodeModifier, Identifier, ImportConfig, ImportOutcome, RankPolicy, Reference,
    ResultValue, SchemaVersion, WarningKind, NEGATED_CODE_SYSTEM,
};

const DEMOGRAPHICS_COUNT: usize = 4;
const CPT: &str = "2.16.840.1.113883.6.12";
const ROOT: &str = "1.3.6.1.4.1.115";

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được tài liệu mẫu")
}

fn import_with(name: &str, config: ImportConfig) -> ImportOutcome {
    Cat1Importer::with_config(config)
        .expect("Không tạo được importer")
        .import_str(&read_fixture(name))
        .expect("Không nhập được tài liệu")
}

fn import(name: &str) -> ImportOutcome {
    import_with(name, ImportConfig::default())
}

#[test]
fn single_encounter_counts_day_boundaries() {
    let outcome = import("single_encounter.xml");
    let patient = &outcome.patient;
    assert_eq!(patient.data_elements.len(), DEMOGRAPHICS_COUNT + 1);

    let encounter = patient.encounters().next().expect("Thiếu encounter");
    assert_eq!(encounter.length_of_stay, Some(1));
    assert_eq!(encounter.description.as_deref(), Some("Office visit for follow-up"));
    assert_eq!(encounter.identifier, Some(Identifier::new(ROOT, "enc-1")));
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
}

#[test]
fn single_encounter_collects_its_code() {
    let outcome = import("single_encounter.xml");
    let rendered: Vec<String> = outcome.codes.iter().map(Code::to_string).collect();
    assert!(rendered.contains(&format!("99203:{CPT}")));
}

#[test]
fn demographics_codes_are_collected() {
    let outcome = import("single_encounter.xml");
    for expected in [
        "21112-8:2.16.840.1.113883.6.1",
        "F:2.16.840.1.113883.5.1",
        "2106-3:2.16.840.1.113883.6.238",
        "2186-5:2.16.840.1.113883.6.238",
    ] {
        assert!(
            outcome.codes.iter().any(|code| code.to_string() == expected),
            "thiếu mã {expected}"
        );
    }

    let demographics = &outcome.patient.demographics;
    assert_eq!(demographics.given_names, vec!["Jane"]);
    assert_eq!(demographics.family_name.as_deref(), Some("Doe"));
    assert!(demographics.birth_datetime.is_some());
    assert_eq!(
        outcome
            .patient
            .records_of(Category::PatientCharacteristicRace)
            .count(),
        1
    );
}

#[test]
fn two_encounters_are_both_kept() {
    let outcome = import("two_encounters.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn shared_encounter_id_with_different_codes_keeps_both() {
    let outcome = import("two_encounters_same_id_different_codes_same_time.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert_eq!(outcome.warnings_of(WarningKind::DuplicateIdentifier), 1);
    assert_eq!(
        outcome.warnings[0].message,
        "Two or more entries share the Id: 1.3.6.1.4.1.115(root), enc-1(extension)."
    );

    // The last fragment in the document is listed first.
    let codes: Vec<&str> = outcome
        .patient
        .encounters()
        .filter_map(|e| e.primary_code())
        .map(|c| c.code.as_str())
        .collect();
    assert_eq!(codes, vec!["99213", "99203"]);
}

#[test]
fn shared_encounter_id_with_different_times_keeps_both() {
    let outcome = import("two_encounters_same_id_same_codes_different_time.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert_eq!(outcome.warnings_of(WarningKind::DuplicateIdentifier), 1);
}

#[test]
fn identical_encounters_collapse_to_one() {
    let outcome = import("two_encounters_same_id_same_codes_same_time.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 1);
    assert_eq!(outcome.warnings_of(WarningKind::DuplicateIdentifier), 1);

    let outcome = import("two_encounters_same_id_same_two_codes_same_time.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 1);
    let encounter = outcome.patient.encounters().next().expect("Thiếu encounter");
    assert_eq!(encounter.codes.len(), 2);
}

#[test]
fn refinement_can_be_switched_off() {
    let config = ImportConfig {
        refine_encounters: false,
        ..ImportConfig::default()
    };
    let outcome = import_with("two_encounters_same_id_different_codes_same_time.xml", config);
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 1);
}

#[test]
fn shared_intervention_id_keeps_the_last() {
    let outcome = import("two_interventions_with_same_id.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, WarningKind::DuplicateIdentifier);

    let intervention = outcome
        .patient
        .records_of(Category::InterventionPerformed)
        .next()
        .expect("Thiếu intervention");
    assert_eq!(
        intervention.primary_code().map(|c| c.code.as_str()),
        Some("225323000")
    );
}

#[test]
fn distinct_intervention_ids_are_both_kept() {
    let outcome = import("two_interventions_with_different_id.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn ids_are_only_compared_within_a_category() {
    let outcome = import("two_data_types_with_same_id.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn related_to_resolves_or_warns() {
    let outcome = import("related_to.xml");
    let patient = &outcome.patient;

    let order = patient
        .records_of(Category::InterventionOrder)
        .next()
        .expect("Thiếu order");
    let performed: Vec<_> = patient.records_of(Category::InterventionPerformed).collect();
    assert_eq!(performed.len(), 2);
    assert_eq!(
        performed[0].related_to,
        vec![Reference::Resolved(order.id.clone())]
    );
    assert!(performed[1].related_to.is_empty());

    assert_eq!(outcome.warnings.len(), 1);
    let warning = &outcome.warnings[0];
    assert_eq!(warning.kind, WarningKind::UnresolvedReference);
    assert_eq!(warning.identifier, Some(Identifier::new(ROOT, "missing-1")));
    assert_eq!(
        warning.message,
        "Related To Id: 1.3.6.1.4.1.115(root), missing-1(extension) cannot be found in QRDA file."
    );
}

#[test]
fn forward_reference_resolves_to_the_surviving_duplicate() {
    let outcome = import("forward_related_to.xml");
    let patient = &outcome.patient;

    let orders: Vec<_> = patient.records_of(Category::InterventionOrder).collect();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].codes, vec![Code::new("225323000", "2.16.840.1.113883.6.96")]);

    let assessment = patient
        .records_of(Category::AssessmentPerformed)
        .next()
        .expect("Thiếu assessment");
    assert_eq!(
        assessment.related_to,
        vec![Reference::Resolved(orders[0].id.clone())]
    );
    let Reference::Resolved(target) = &assessment.related_to[0] else {
        panic!("Liên kết chưa được giải quyết");
    };
    assert_eq!(
        patient.find(target).map(|record| record.category),
        Some(Category::InterventionOrder)
    );

    assert_eq!(outcome.warnings.len(), 1, "{:?}", outcome.warnings);
    assert_eq!(outcome.warnings_of(WarningKind::DuplicateIdentifier), 1);
    assert_eq!(
        outcome.warnings[0].identifier,
        Some(Identifier::new(ROOT, "order-shared"))
    );
}

#[test]
fn negation_results_and_anomalies_are_reported() {
    let outcome = import("negation_results_and_anomalies.xml");
    let patient = &outcome.patient;
    assert_eq!(patient.data_elements.len(), DEMOGRAPHICS_COUNT + 4);

    let declined = patient
        .records_of(Category::InterventionOrder)
        .next()
        .expect("Thiếu order");
    let value_set = Code::new("2.16.840.1.113883.3.526.3.1509", NEGATED_CODE_SYSTEM);
    assert_eq!(declined.primary_code(), Some(&value_set));
    assert_eq!(
        declined.negation_rationale,
        Some(Code::new("183944003", "2.16.840.1.113883.6.96"))
    );
    assert!(declined.reason.is_none());
    assert!(declined.author_datetime.is_some());
    assert!(outcome.codes.contains(&value_set));
    assert_eq!(
        outcome.code_modifiers.get(&value_set.code),
        Some(&CodeModifier::Negated)
    );

    let labs: Vec<_> = patient
        .records_of(Category::LaboratoryTestPerformed)
        .collect();
    assert_eq!(labs.len(), 2);
    assert_eq!(
        labs[0].result,
        Some(ResultValue::Code(Code::new("260385009", "2.16.840.1.113883.6.96")))
    );
    assert!(labs[0].result_datetime.is_some());
    assert_eq!(
        outcome.code_modifiers.get("260385009"),
        Some(&CodeModifier::Result)
    );
    assert_eq!(
        labs[1].result,
        Some(ResultValue::Quantity {
            value: 7.2,
            unit: Some("%".to_string())
        })
    );

    let procedure = patient
        .records_of(Category::ProcedurePerformed)
        .next()
        .expect("Thiếu procedure");
    assert_eq!(procedure.rank, Some(2));
    let period = procedure.relevant_period.as_ref().expect("Thiếu khoảng thời gian");
    assert!(period.low.is_none());
    assert!(period.high.is_some());

    assert_eq!(outcome.warnings.len(), 3);
    assert_eq!(outcome.warnings_of(WarningKind::UnparsableTemplate), 1);
    assert_eq!(outcome.warnings_of(WarningKind::InvalidTimestamp), 1);
    assert_eq!(outcome.warnings_of(WarningKind::InvalidRank), 1);
    let unparsable = outcome
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::UnparsableTemplate)
        .expect("Thiếu cảnh báo");
    assert_eq!(
        unparsable.message,
        "Error parsing template with Id: 1.3.6.1.4.1.115(root), broken-1(extension)."
    );
}

#[test]
fn strict_rank_leaves_rank_empty() {
    let config = ImportConfig {
        rank_policy: RankPolicy::Reject,
        ..ImportConfig::default()
    };
    let outcome = import_with("negation_results_and_anomalies.xml", config);
    let procedure = outcome
        .patient
        .records_of(Category::ProcedurePerformed)
        .next()
        .expect("Thiếu procedure");
    assert_eq!(procedure.rank, None);
    assert_eq!(outcome.warnings_of(WarningKind::InvalidRank), 1);
}

#[test]
fn r52_documents_use_the_r52_roster() {
    let importer = Cat1Importer::new().expect("Không tạo được importer");
    let document =
        Document::parse(&read_fixture("r52_encounter_and_device.xml")).expect("XML không hợp lệ");
    assert_eq!(importer.detect_version(&document), SchemaVersion::R52);

    let outcome = importer.parse_cat1(&document);
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT + 2);
    assert_eq!(
        outcome
            .patient
            .records_of(Category::DeviceApplied)
            .next()
            .and_then(|d| d.primary_code())
            .map(|c| c.code.as_str()),
        Some("706173000")
    );

    let encounter = outcome.patient.encounters().next().expect("Thiếu encounter");
    assert_eq!(encounter.length_of_stay, Some(3));
    assert_eq!(
        encounter.discharge_disposition,
        Some(Code::new("01", "2.16.840.1.113883.12.112"))
    );
    assert_eq!(
        encounter.facility_locations,
        vec![Code::new("1108-0", "2.16.840.1.113883.6.259")]
    );
    let diagnoses: Vec<(&str, Option<i64>)> = encounter
        .diagnoses
        .iter()
        .map(|d| (d.code.code.as_str(), d.rank))
        .collect();
    assert_eq!(diagnoses, vec![("I21.4", Some(1)), ("E11.9", None)]);
    assert!(outcome.codes.contains(&Code::new("I21.4", "2.16.840.1.113883.6.90")));
}

#[test]
fn r53_documents_ignore_r52_templates() {
    let outcome = import("r53_with_r52_entries.xml");
    assert_eq!(outcome.patient.data_elements.len(), DEMOGRAPHICS_COUNT);
    assert_eq!(outcome.patient.encounters().count(), 0);
}

#[test]
fn importing_twice_gives_the_same_outcome() {
    let importer = Cat1Importer::new().expect("Không tạo được importer");
    for name in [
        "two_encounters_same_id_different_codes_same_time.xml",
        "related_to.xml",
        "negation_results_and_anomalies.xml",
    ] {
        let xml = read_fixture(name);
        let first = importer.import_str(&xml).expect("Không nhập được tài liệu");
        let second = importer.import_str(&xml).expect("Không nhập được tài liệu");
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn outcome_serializes_to_json() {
    let outcome = import("single_encounter.xml");
    let value = serde_json::to_value(&outcome).expect("Không serialize được");
    assert_eq!(
        value["patient"]["data_elements"][0]["category"],
        "EncounterPerformed"
    );
    assert!(value["codes"].as_array().is_some_and(|codes| !codes.is_empty()));
}
