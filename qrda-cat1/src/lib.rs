//! QRDA Category I XML to [`PatientRecord`](qrda_core::PatientRecord) importer.
//!
//! [`Cat1Importer`] holds every compiled extractor. An import runs the
//! version roster's extractors in order, reconciles records that share an
//! identifier, resolves `related_to` links, then reads demographics.

pub mod catalog;
pub mod demographics;
pub mod document;
pub mod extractor;
pub mod id_map;
pub mod locator;
pub mod narrative;
pub mod query;
pub mod reconcile;
pub mod time;

use std::collections::HashMap;

use chrono::NaiveDate;
use qrda_core::{
    Category, FactRecord, Identifier, ImportConfig, ImportError, ImportOutcome, ImportWarning,
    PatientRecord, Reference, SchemaVersion,
};

pub use document::Document;
pub use extractor::{CategoryDescriptor, Extractor, Field, FieldRule, SideChannels};
pub use id_map::IdentifierMap;
pub use query::{Selector, SelectorError};

use demographics::DemographicsReader;
use extractor::{EntryContext, Extraction, SharedSelectors};
use narrative::NarrativeReferences;

const CLINICAL_SECTION: &str = "/cda:ClinicalDocument/cda:component/cda:structuredBody/cda:component/cda:section[cda:templateId/@root = '2.16.840.1.113883.10.20.24.2.1']";
const VERSION_MARKER: &str =
    "/cda:ClinicalDocument/cda:templateId[@root='2.16.840.1.113883.10.20.24.1.2']/@extension";

/// First revision read with the R53 roster.
fn r53_cutoff() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2021, 8, 1)
}

/// Import QRDA XML with a throwaway importer.
pub fn import_cat1_str(xml: &str, config: &ImportConfig) -> Result<ImportOutcome, ImportError> {
    Cat1Importer::with_config(config.clone())?.import_str(xml)
}

/// Descriptors run for a schema version: every base category in catalog
/// order, then that version's conditional categories.
pub fn roster(version: SchemaVersion) -> Vec<&'static CategoryDescriptor> {
    catalog::BASE
        .iter()
        .chain(conditional(version))
        .collect()
}

fn conditional(version: SchemaVersion) -> &'static [CategoryDescriptor] {
    match version {
        SchemaVersion::R52 => catalog::R52,
        SchemaVersion::R53 => catalog::R53,
    }
}

/// Compiled importer. Holds no per-import state, so one value can serve
/// any number of imports.
#[derive(Debug, Clone)]
pub struct Cat1Importer {
    config: ImportConfig,
    base: Vec<Extractor>,
    r52: Vec<Extractor>,
    r53: Vec<Extractor>,
    shared: SharedSelectors,
    section: Selector,
    version_marker: Selector,
    demographics: DemographicsReader,
}

impl Cat1Importer {
    pub fn new() -> Result<Self, ImportError> {
        Self::with_config(ImportConfig::default())
    }

    pub fn with_config(config: ImportConfig) -> Result<Self, ImportError> {
        let compile = |descriptors: &'static [CategoryDescriptor]| {
            descriptors
                .iter()
                .map(Extractor::new)
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            config,
            base: compile(catalog::BASE)?,
            r52: compile(catalog::R52)?,
            r53: compile(catalog::R53)?,
            shared: SharedSelectors::new()?,
            section: Selector::parse(CLINICAL_SECTION)?,
            version_marker: Selector::parse(VERSION_MARKER)?,
            demographics: DemographicsReader::new()?,
        })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// `R53` when the QRDA marker's extension is a date on or after
    /// 2021-08-01, `R52` otherwise.
    pub fn detect_version(&self, document: &Document) -> SchemaVersion {
        let cutoff = r53_cutoff();
        let is_r53 = self
            .version_marker
            .values_of(document.root())
            .iter()
            .filter_map(|extension| NaiveDate::parse_from_str(extension, "%Y-%m-%d").ok())
            .any(|date| Some(date) >= cutoff);

        if is_r53 {
            SchemaVersion::R53
        } else {
            SchemaVersion::R52
        }
    }

    /// Compiled extractors in roster order.
    pub fn extractors(&self, version: SchemaVersion) -> impl Iterator<Item = &Extractor> {
        let conditional = match version {
            SchemaVersion::R52 => &self.r52,
            SchemaVersion::R53 => &self.r53,
        };
        self.base.iter().chain(conditional.iter())
    }

    /// Parse XML text and import it. Only unparsable XML is an error.
    pub fn import_str(&self, xml: &str) -> Result<ImportOutcome, ImportError> {
        let document = Document::parse(xml)?;
        Ok(self.parse_cat1(&document))
    }

    pub fn parse_cat1(&self, document: &Document) -> ImportOutcome {
        let version = self.detect_version(document);
        let scopes = self.section.find_all(document.root());
        let references = NarrativeReferences::build(document);
        let context = EntryContext {
            references: &references,
            shared: &self.shared,
            config: &self.config,
        };

        let mut outcome = ImportOutcome::default();
        let mut survivors_by_key = IdentifierMap::default();
        let mut channels = SideChannels::default();

        for extractor in self.extractors(version) {
            let extraction = extractor.create_entries(&scopes, &context, &mut channels);
            let (records, survivors) =
                self.reconcile(extractor.category(), extraction, &mut outcome.warnings);
            survivors_by_key.merge(survivors);
            outcome.patient.data_elements.extend(records);

            let SideChannels {
                warnings,
                codes,
                code_modifiers,
            } = std::mem::take(&mut channels);
            outcome.warnings.extend(warnings);
            outcome.codes.extend(codes);
            outcome.code_modifiers.extend(code_modifiers);
        }

        normalize_references(&mut outcome.patient, &survivors_by_key, &mut outcome.warnings);
        self.demographics
            .populate(&mut outcome.patient, document, &mut outcome.codes);

        tracing::info!(
            version = ?version,
            sections = scopes.len(),
            records = outcome.patient.data_elements.len(),
            warnings = outcome.warnings.len(),
            codes = outcome.codes.len(),
            "QRDA import finished"
        );
        outcome
    }

    /// Pick the records kept for each composite key of one extractor run.
    ///
    /// Returns the kept records and a map from each key to the ids kept
    /// under it. A key whose last fragment failed to build keeps nothing.
    fn reconcile(
        &self,
        category: Category,
        extraction: Extraction,
        warnings: &mut Vec<ImportWarning>,
    ) -> (Vec<FactRecord>, IdentifierMap) {
        let Extraction {
            records, id_map, ..
        } = extraction;
        let mut by_id: HashMap<String, FactRecord> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let refine = category.is_encounter() && self.config.refine_encounters;
        let mut kept = Vec::new();
        let mut survivors = IdentifierMap::default();

        for (key, ids) in id_map.iter() {
            let identifier = Identifier::from_composite_key(key);
            if ids.len() > 1 {
                warnings.push(ImportWarning::duplicate_identifier(&identifier));
            }

            let Some(last) = ids.last().filter(|id| by_id.contains_key(id.as_str())) else {
                warnings.push(ImportWarning::unparsable_template(&identifier));
                continue;
            };

            let chosen = if refine {
                let candidates: Vec<FactRecord> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
                reconcile::retain_distinct(candidates, reconcile::encounter_uniqueness_key)
            } else {
                by_id.remove(last).into_iter().collect()
            };

            for record in chosen {
                survivors.push(key, record.id.as_str());
                kept.push(record);
            }
        }

        (kept, survivors)
    }
}

/// Replace pending `related_to` keys with the record ids kept under them.
/// Keys with no kept record are dropped with one warning each.
pub fn normalize_references(
    patient: &mut PatientRecord,
    survivors: &IdentifierMap,
    warnings: &mut Vec<ImportWarning>,
) {
    for record in &mut patient.data_elements {
        if record.related_to.is_empty() {
            continue;
        }

        let mut resolved = Vec::with_capacity(record.related_to.len());
        for reference in std::mem::take(&mut record.related_to) {
            match reference {
                Reference::Pending(identifier) => {
                    match survivors.get(&identifier.composite_key()) {
                        Some(ids) => resolved.extend(ids.iter().cloned().map(Reference::Resolved)),
                        None => warnings.push(ImportWarning::unresolved_reference(&identifier)),
                    }
                }
                done @ Reference::Resolved(_) => resolved.push(done),
            }
        }
        record.related_to = resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrda_core::WarningKind;

    fn header(extension: Option<&str>) -> String {
        let marker = match extension {
            Some(ext) => format!(
                r#"<templateId root="2.16.840.1.113883.10.20.24.1.2" extension="{ext}"/>"#
            ),
            None => r#"<templateId root="2.16.840.1.113883.10.20.24.1.2"/>"#.to_string(),
        };
        format!(r#"<ClinicalDocument xmlns="urn:hl7-org:v3">{marker}</ClinicalDocument>"#)
    }

    #[test]
    fn version_follows_the_marker_extension() {
        let importer = Cat1Importer::new().expect("importer");
        let cases = [
            (Some("2021-08-01"), SchemaVersion::R53),
            (Some("2022-02-01"), SchemaVersion::R53),
            (Some("2019-12-01"), SchemaVersion::R52),
            (Some("draft"), SchemaVersion::R52),
            (None, SchemaVersion::R52),
        ];
        for (extension, expected) in cases {
            let document = Document::parse(&header(extension)).expect("doc");
            assert_eq!(importer.detect_version(&document), expected, "{extension:?}");
        }
    }

    #[test]
    fn rosters_hold_one_variant_of_each_conditional_category() {
        let r52: Vec<Category> = roster(SchemaVersion::R52).iter().map(|d| d.category).collect();
        let r53: Vec<Category> = roster(SchemaVersion::R53).iter().map(|d| d.category).collect();

        for categories in [&r52, &r53] {
            for conditional in [Category::EncounterPerformed, Category::MedicationDischarge] {
                assert_eq!(categories.iter().filter(|c| **c == conditional).count(), 1);
            }
            assert_eq!(&categories[..catalog::BASE.len()], &r52[..catalog::BASE.len()]);
        }
        assert!(r52.contains(&Category::DeviceApplied));
        assert!(!r53.contains(&Category::DeviceApplied));

        let importer = Cat1Importer::new().expect("importer");
        assert_eq!(importer.extractors(SchemaVersion::R52).count(), r52.len());
        assert_eq!(importer.extractors(SchemaVersion::R53).count(), r53.len());
    }

    #[test]
    fn references_resolve_to_every_kept_id() {
        let target = Identifier::new("1.2", "t");
        let missing = Identifier::new("1.2", "gone");
        let mut survivors = IdentifierMap::default();
        survivors.push(target.composite_key(), "rec-a");
        survivors.push(target.composite_key(), "rec-b");

        let mut record = FactRecord::new("src", Category::InterventionPerformed);
        record.related_to = vec![
            Reference::Pending(target),
            Reference::Pending(missing.clone()),
        ];
        let mut patient = PatientRecord {
            data_elements: vec![record],
            ..PatientRecord::default()
        };
        let mut warnings = Vec::new();
        normalize_references(&mut patient, &survivors, &mut warnings);

        assert_eq!(
            patient.data_elements[0].related_to,
            vec![
                Reference::Resolved("rec-a".to_string()),
                Reference::Resolved("rec-b".to_string())
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnresolvedReference);
        assert_eq!(warnings[0].identifier, Some(missing));
    }

    #[test]
    fn malformed_xml_fails_the_import() {
        let importer = Cat1Importer::new().expect("importer");
        assert!(matches!(
            importer.import_str("<ClinicalDocument><a></b></ClinicalDocument>"),
            Err(ImportError::Xml(_))
        ));
    }
}
