//! Patient demographics from the `recordTarget` header.

use std::collections::BTreeSet;

use qrda_core::{Category, Code, Demographics, FactRecord, PatientRecord};
use uuid::Uuid;

use crate::document::{Document, NodeRef};
use crate::query::{Selector, SelectorError};
use crate::time::parse_hl7_timestamp;

const PATIENT: &str = "/cda:ClinicalDocument/cda:recordTarget/cda:patientRole/cda:patient";
const BIRTHDATE_CODE: &str = "21112-8";
const LOINC: &str = "2.16.840.1.113883.6.1";

#[derive(Debug, Clone)]
pub struct DemographicsReader {
    patient: Selector,
    given: Selector,
    family: Selector,
    birth_time: Selector,
    sex: Selector,
    race: Selector,
    ethnicity: Selector,
}

impl DemographicsReader {
    pub fn new() -> Result<Self, SelectorError> {
        Ok(Self {
            patient: Selector::parse(PATIENT)?,
            given: Selector::parse("./cda:name/cda:given")?,
            family: Selector::parse("./cda:name/cda:family")?,
            birth_time: Selector::parse("./cda:birthTime/@value")?,
            sex: Selector::parse("./cda:administrativeGenderCode")?,
            race: Selector::parse("./cda:raceCode")?,
            ethnicity: Selector::parse("./cda:ethnicGroupCode")?,
        })
    }

    /// Fill `patient.demographics` and append one patient-characteristic
    /// record per piece found. Missing pieces are skipped.
    pub fn populate(&self, patient: &mut PatientRecord, document: &Document, codes: &mut BTreeSet<Code>) {
        let Some(node) = self.patient.find_first(document.root()) else {
            tracing::debug!("document has no recordTarget patient");
            return;
        };

        let demographics = Demographics {
            given_names: self.given.values_of(node),
            family_name: self.family.value_of(node),
            birth_datetime: self
                .birth_time
                .value_of(node)
                .and_then(|raw| parse_hl7_timestamp(&raw)),
            sex: self.sex.find_first(node).and_then(coded),
            race: self.race.find_first(node).and_then(coded),
            ethnicity: self.ethnicity.find_first(node).and_then(coded),
        };

        if let Some(birth) = demographics.birth_datetime {
            let mut record = characteristic(
                Category::PatientCharacteristicBirthdate,
                Code::new(BIRTHDATE_CODE, LOINC),
            );
            record.relevant_datetime = Some(birth);
            codes.insert(Code::new(BIRTHDATE_CODE, LOINC));
            patient.data_elements.push(record);
        }

        let coded_pieces = [
            (Category::PatientCharacteristicSex, &demographics.sex),
            (Category::PatientCharacteristicRace, &demographics.race),
            (Category::PatientCharacteristicEthnicity, &demographics.ethnicity),
        ];
        for (category, code) in coded_pieces {
            if let Some(code) = code {
                codes.insert(code.clone());
                patient.data_elements.push(characteristic(category, code.clone()));
            }
        }

        patient.demographics = demographics;
    }
}

fn characteristic(category: Category, code: Code) -> FactRecord {
    let name = format!("demographics/{category}");
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string();
    let mut record = FactRecord::new(id, category);
    record.codes.push(code);
    record
}

fn coded(element: NodeRef<'_>) -> Option<Code> {
    let code = element.attribute("code")?.trim();
    if code.is_empty() {
        return None;
    }
    Some(Code::new(code, element.attribute("codeSystem").unwrap_or_default().trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <recordTarget><patientRole><patient>
    <name><given>Ana</given><given>Maria</given><family>Nguyen</family></name>
    <administrativeGenderCode code="F" codeSystem="2.16.840.1.113883.5.1"/>
    <birthTime value="19800704"/>
    <raceCode code="2106-3" codeSystem="2.16.840.1.113883.6.238"/>
    <ethnicGroupCode nullFlavor="UNK"/>
  </patient></patientRole></recordTarget>
</ClinicalDocument>"#;

    #[test]
    fn reads_header_and_appends_characteristics() {
        let document = Document::parse(HEADER).expect("doc");
        let reader = DemographicsReader::new().expect("reader");
        let mut patient = PatientRecord::default();
        let mut codes = BTreeSet::new();
        reader.populate(&mut patient, &document, &mut codes);

        assert_eq!(patient.demographics.given_names, vec!["Ana", "Maria"]);
        assert_eq!(patient.demographics.family_name.as_deref(), Some("Nguyen"));
        assert!(patient.demographics.ethnicity.is_none());
        assert_eq!(patient.data_elements.len(), 3);
        assert!(codes.contains(&Code::new("F", "2.16.840.1.113883.5.1")));
        assert!(codes.contains(&Code::new(BIRTHDATE_CODE, LOINC)));
    }

    #[test]
    fn missing_record_target_leaves_patient_untouched() {
        let document = Document::parse(r#"<ClinicalDocument xmlns="urn:hl7-org:v3"/>"#).expect("doc");
        let reader = DemographicsReader::new().expect("reader");
        let mut patient = PatientRecord::default();
        let mut codes = BTreeSet::new();
        reader.populate(&mut patient, &document, &mut codes);
        assert_eq!(patient, PatientRecord::default());
        assert!(codes.is_empty());
    }
}
