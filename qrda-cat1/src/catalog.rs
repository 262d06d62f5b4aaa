//! Descriptors for every importable category.
//!
//! [`BASE`] is used for every document. [`R52`] and [`R53`] hold the
//! categories whose template changed between schema versions; a roster takes
//! exactly one of them.

use qrda_core::Category;

use crate::extractor::{CategoryDescriptor, Field, FieldRule};

const ID: &str = "./cda:id";
const CODE: &str = "./cda:code";
const VALUE: &str = "./cda:value";
const EFFECTIVE_TIME: &str = "./cda:effectiveTime";
const TARGET_SITE: &str = "./cda:targetSiteCode";
const AUTHOR_TIME: &str =
    "./cda:author[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.155']/cda:time";
const AUTHOR: &str = "./cda:author[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.155']";
const REASON: &str = "./cda:entryRelationship[@typeCode='RSON']/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.88']/cda:value";
const RANK: &str = "./cda:entryRelationship/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.166']/cda:value/@value";
const RESULT: &str = "./cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.87']/cda:value";
const RESULT_TIME: &str = "./cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.87']/cda:effectiveTime";
const PERFORMER: &str = "./cda:participant[@typeCode='PRF']";
const PERFORMER_ROLE: &str = "./cda:performer";
const RELATED_TO: &str = "./sdtc:inFulfillmentOf1/sdtc:actReference/sdtc:id";
const MATERIAL: &str = "./cda:consumable/cda:manufacturedProduct/cda:manufacturedMaterial/cda:code";
const PRODUCT: &str = "./cda:product/cda:manufacturedProduct/cda:manufacturedMaterial/cda:code";
const DEVICE: &str = "./cda:participant/cda:participantRole/cda:playingDevice/cda:code";
const FACILITY: &str = "./cda:participant[@typeCode='LOC']/cda:participantRole/cda:code";
const ADMISSION_SOURCE: &str = "./cda:participant[@typeCode='ORG']/cda:participantRole/cda:code";
const DISCHARGE: &str = "./sdtc:dischargeDispositionCode";
const ENCOUNTER_DIAGNOSES: &str = "./cda:entryRelationship/cda:act[cda:templateId/@root='2.16.840.1.113883.10.20.22.4.80']/cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.22.4.4']";
const PRINCIPAL_DIAGNOSIS: &str = "./cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.152']/cda:value";

/// Order/recommendation style: reason and requester.
const REQUEST_RULES: &[FieldRule] = &[
    FieldRule::new(Field::Reason, REASON),
    FieldRule::new(Field::Requester, PERFORMER),
];

/// Performed style: period, result, reason, performer and fulfilment links.
const PERFORMED_RULES: &[FieldRule] = &[
    FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
    FieldRule::new(Field::Result, RESULT),
    FieldRule::new(Field::ResultDatetime, RESULT_TIME),
    FieldRule::new(Field::Reason, REASON),
    FieldRule::new(Field::Performer, PERFORMER),
    FieldRule::new(Field::RelatedTo, RELATED_TO),
];

const ENCOUNTER_DETAIL_RULES: &[FieldRule] = &[
    FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
    FieldRule::new(Field::AdmissionSource, ADMISSION_SOURCE),
    FieldRule::new(Field::DischargeDisposition, DISCHARGE),
    FieldRule::new(Field::FacilityLocations, FACILITY),
    FieldRule::new(Field::Diagnoses, ENCOUNTER_DIAGNOSES),
    FieldRule::new(Field::Performer, PERFORMER_ROLE),
    FieldRule::new(Field::RelatedTo, RELATED_TO),
];

/// Categories imported regardless of schema version, in import order.
pub static BASE: &[CategoryDescriptor] = &[
    CategoryDescriptor {
        category: Category::AdverseEvent,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.146']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantDatetime, EFFECTIVE_TIME),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
    CategoryDescriptor {
        category: Category::AllergyIntolerance,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.147']",
        id: ID,
        code: "./cda:participant/cda:participantRole/cda:playingEntity/cda:code",
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::PrevalencePeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
    CategoryDescriptor {
        category: Category::AssessmentOrder,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.158']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::AssessmentPerformed,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.144']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Result, VALUE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER),
            FieldRule::new(Field::RelatedTo, RELATED_TO),
        ],
    },
    CategoryDescriptor {
        category: Category::AssessmentRecommended,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.145']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::CommunicationPerformed,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.156']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER),
            FieldRule::new(Field::RelatedTo, RELATED_TO),
        ],
    },
    CategoryDescriptor {
        category: Category::DeviceOrder,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.130']",
        id: "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.9']/cda:id",
        code: "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.9']/cda:participant/cda:participantRole/cda:playingDevice/cda:code",
        author_time: Some("./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.9']/cda:author[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.155']/cda:time"),
        negation: Some("./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.9']/@negationInd"),
        rules: &[
            FieldRule::new(Field::Reason, "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.9']/cda:entryRelationship[@typeCode='RSON']/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.88']/cda:value"),
            FieldRule::new(Field::Requester, "./cda:entryRelationship/cda:supply//cda:participant[@typeCode='PRF']"),
        ],
    },
    CategoryDescriptor {
        category: Category::DeviceRecommended,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.131']",
        id: "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.10']/cda:id",
        code: "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.10']/cda:participant/cda:participantRole/cda:playingDevice/cda:code",
        author_time: Some("./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.10']/cda:author[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.155']/cda:time"),
        negation: Some("./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.10']/@negationInd"),
        rules: &[
            FieldRule::new(Field::Reason, "./cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.10']/cda:entryRelationship[@typeCode='RSON']/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.88']/cda:value"),
            FieldRule::new(Field::Requester, "./cda:entryRelationship/cda:supply//cda:participant[@typeCode='PRF']"),
        ],
    },
    CategoryDescriptor {
        category: Category::Diagnosis,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.137']/cda:entryRelationship/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.135']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::PrevalencePeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
    CategoryDescriptor {
        category: Category::DiagnosticStudyOrder,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.17']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::DiagnosticStudyPerformed,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.18']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: PERFORMED_RULES,
    },
    CategoryDescriptor {
        category: Category::DiagnosticStudyRecommended,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.19']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::Requester, PERFORMER)],
    },
    CategoryDescriptor {
        category: Category::EncounterOrder,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.132']/cda:entryRelationship/cda:encounter[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.22']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::FacilityLocations, FACILITY),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::EncounterRecommended,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.134']/cda:entryRelationship/cda:encounter[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.24']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::FacilityLocations, FACILITY),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::FamilyHistory,
        entry: "./cda:entry/cda:organizer[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.12']",
        id: ID,
        code: "./cda:component/cda:observation/cda:value",
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::Recorder, AUTHOR)],
    },
    CategoryDescriptor {
        category: Category::ImmunizationAdministered,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.140']/cda:entryRelationship/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.22.4.52']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantDatetime, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
        ],
    },
    CategoryDescriptor {
        category: Category::ImmunizationOrder,
        entry: "./cda:entry/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.143']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::InterventionOrder,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.31']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::InterventionPerformed,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.32']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: PERFORMED_RULES,
    },
    CategoryDescriptor {
        category: Category::InterventionRecommended,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.33']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::LaboratoryTestOrder,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.37']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::LaboratoryTestPerformed,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.38']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: PERFORMED_RULES,
    },
    CategoryDescriptor {
        category: Category::LaboratoryTestRecommended,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.39']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::MedicationActive,
        entry: "./cda:entry/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.41']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
    CategoryDescriptor {
        category: Category::MedicationAdministered,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.42']/cda:entryRelationship/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.22.4.16']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
        ],
    },
    CategoryDescriptor {
        category: Category::MedicationDispensed,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.139']/cda:entryRelationship/cda:supply[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.45']",
        id: ID,
        code: PRODUCT,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantDatetime, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
        ],
    },
    CategoryDescriptor {
        category: Category::MedicationOrder,
        entry: "./cda:entry/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.47']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::PatientCareExperience,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.48']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::Recorder, PERFORMER)],
    },
    CategoryDescriptor {
        category: Category::PatientCharacteristicClinicalTrialParticipant,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.51']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
        ],
    },
    CategoryDescriptor {
        category: Category::PatientCharacteristicExpired,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.54']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::RelevantDatetime, EFFECTIVE_TIME)],
    },
    CategoryDescriptor {
        category: Category::PatientCharacteristicPayer,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.55']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME)],
    },
    CategoryDescriptor {
        category: Category::PhysicalExamOrder,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.58']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::PhysicalExamPerformed,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.59']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Result, VALUE),
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER),
            FieldRule::new(Field::RelatedTo, RELATED_TO),
        ],
    },
    CategoryDescriptor {
        category: Category::PhysicalExamRecommended,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.60']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::ProcedureOrder,
        entry: "./cda:entry/cda:procedure[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.63']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Rank, RANK),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::ProcedurePerformed,
        entry: "./cda:entry/cda:procedure[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.64']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Result, RESULT),
            FieldRule::new(Field::ResultDatetime, RESULT_TIME),
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Rank, RANK),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER),
            FieldRule::new(Field::RelatedTo, RELATED_TO),
        ],
    },
    CategoryDescriptor {
        category: Category::ProcedureRecommended,
        entry: "./cda:entry/cda:procedure[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.65']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
            FieldRule::new(Field::Rank, RANK),
        ],
    },
    CategoryDescriptor {
        category: Category::ProgramParticipation,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.154']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME)],
    },
    CategoryDescriptor {
        category: Category::ProviderCareExperience,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.67']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::Recorder, PERFORMER)],
    },
    CategoryDescriptor {
        category: Category::RelatedPerson,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.170']",
        id: ID,
        code: "./cda:participant/cda:participantRole/cda:code",
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[],
    },
    CategoryDescriptor {
        category: Category::SubstanceAdministered,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.42']/cda:entryRelationship/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.162']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
        ],
    },
    CategoryDescriptor {
        category: Category::SubstanceOrder,
        entry: "./cda:entry/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.163']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
        ],
    },
    CategoryDescriptor {
        category: Category::SubstanceRecommended,
        entry: "./cda:entry/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.75']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: REQUEST_RULES,
    },
    CategoryDescriptor {
        category: Category::Symptom,
        entry: "./cda:entry/cda:observation[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.136']",
        id: ID,
        code: VALUE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::PrevalencePeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
];

/// Version-conditional categories for documents before the 2021-08-01 revision.
pub static R52: &[CategoryDescriptor] = &[
    CategoryDescriptor {
        category: Category::DeviceApplied,
        entry: "./cda:entry/cda:procedure[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.7']",
        id: ID,
        code: DEVICE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::AnatomicalSite, TARGET_SITE),
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
        ],
    },
    CategoryDescriptor {
        category: Category::EncounterPerformed,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.133']/cda:entryRelationship/cda:encounter[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.23']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::RelevantPeriod, EFFECTIVE_TIME),
            FieldRule::new(Field::AdmissionSource, ADMISSION_SOURCE),
            FieldRule::new(Field::DischargeDisposition, DISCHARGE),
            FieldRule::new(Field::FacilityLocations, FACILITY),
            FieldRule::new(Field::Diagnoses, ENCOUNTER_DIAGNOSES),
            FieldRule::new(Field::PrincipalDiagnosis, PRINCIPAL_DIAGNOSIS),
            FieldRule::new(Field::Performer, PERFORMER_ROLE),
            FieldRule::new(Field::RelatedTo, RELATED_TO),
        ],
    },
    CategoryDescriptor {
        category: Category::MedicationDischarge,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.105']/cda:entryRelationship/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.22.4.16']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[FieldRule::new(Field::Reason, REASON)],
    },
];

/// Version-conditional categories for documents from the 2021-08-01 revision on.
pub static R53: &[CategoryDescriptor] = &[
    CategoryDescriptor {
        category: Category::EncounterPerformed,
        entry: "./cda:entry/cda:encounter[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.23']",
        id: ID,
        code: CODE,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: ENCOUNTER_DETAIL_RULES,
    },
    CategoryDescriptor {
        category: Category::MedicationDischarge,
        entry: "./cda:entry/cda:act[cda:templateId/@root = '2.16.840.1.113883.10.20.24.3.105']/cda:entryRelationship/cda:substanceAdministration[cda:templateId/@root = '2.16.840.1.113883.10.20.22.4.16']",
        id: ID,
        code: MATERIAL,
        author_time: Some(AUTHOR_TIME),
        negation: None,
        rules: &[
            FieldRule::new(Field::Reason, REASON),
            FieldRule::new(Field::Requester, PERFORMER),
            FieldRule::new(Field::Recorder, AUTHOR),
        ],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::extractor::Extractor;

    #[test]
    fn every_descriptor_compiles() {
        for descriptor in BASE.iter().chain(R52).chain(R53) {
            if let Err(err) = Extractor::new(descriptor) {
                panic!("{}: {err}", descriptor.category);
            }
        }
    }

    #[test]
    fn base_categories_are_unique_and_not_version_conditional() {
        let base: HashSet<Category> = BASE.iter().map(|d| d.category).collect();
        assert_eq!(base.len(), BASE.len());
        for descriptor in R52.iter().chain(R53) {
            assert!(!base.contains(&descriptor.category), "{}", descriptor.category);
        }
        assert!(BASE.iter().all(|d| !d.category.is_demographic()));
    }
}
