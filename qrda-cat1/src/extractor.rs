//! Template-driven construction of [`FactRecord`]s.
//!
//! Every category shares one extraction shape: locate fragments, read the
//! identifier, codes and author time, then apply the category's
//! [`FieldRule`]s. Categories differ only in their [`CategoryDescriptor`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use qrda_core::{
    Category, Code, CodeModifier, DiagnosisComponent, Entity, FactRecord, Identifier,
    ImportConfig, ImportWarning, Interval, RankPolicy, Reference, ResultValue,
    NEGATED_CODE_SYSTEM,
};
use uuid::Uuid;

use crate::document::{NodeRef, SDTC_NS, XSI_NS};
use crate::id_map::IdentifierMap;
use crate::locator::EntryLocator;
use crate::narrative::NarrativeReferences;
use crate::query::{Selector, SelectorError};
use crate::time::parse_hl7_timestamp;

/// Static selector set for one category.
#[derive(Debug)]
pub struct CategoryDescriptor {
    pub category: Category,
    /// Locates the template's fragments inside the clinical section.
    pub entry: &'static str,
    pub id: &'static str,
    pub code: &'static str,
    pub author_time: Option<&'static str>,
    /// `negationInd` attribute of a nested statement. `None` reads the
    /// fragment's own attribute.
    pub negation: Option<&'static str>,
    pub rules: &'static [FieldRule],
}

/// Category-only field and where to find it, relative to the fragment.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    pub selector: &'static str,
}

impl FieldRule {
    pub const fn new(field: Field, selector: &'static str) -> Self {
        Self { field, selector }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Reason,
    Rank,
    AnatomicalSite,
    RelevantPeriod,
    RelevantDatetime,
    PrevalencePeriod,
    ResultDatetime,
    Result,
    Requester,
    Recorder,
    Performer,
    RelatedTo,
    AdmissionSource,
    DischargeDisposition,
    FacilityLocations,
    Diagnoses,
    PrincipalDiagnosis,
}

/// Sub-selectors shared by every category.
#[derive(Debug, Clone)]
pub struct SharedSelectors {
    translation: Selector,
    description: Selector,
    entity_id: Selector,
    entity_role: Selector,
    value: Selector,
    low: Selector,
    high: Selector,
    diagnosis_code: Selector,
    diagnosis_rank: Selector,
    diagnosis_present_on_admission: Selector,
}

impl SharedSelectors {
    pub fn new() -> Result<Self, SelectorError> {
        Ok(Self {
            translation: Selector::parse("./cda:translation")?,
            description: Selector::parse("./cda:text/cda:reference/@value")?,
            entity_id: Selector::parse("./*/cda:id")?,
            entity_role: Selector::parse("./*/cda:code")?,
            value: Selector::parse("./@value")?,
            low: Selector::parse("./cda:low/@value")?,
            high: Selector::parse("./cda:high/@value")?,
            diagnosis_code: Selector::parse("./cda:value")?,
            diagnosis_rank: Selector::parse(
                "./cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.166']/cda:value/@value",
            )?,
            diagnosis_present_on_admission: Selector::parse(
                "./cda:entryRelationship/cda:observation[cda:templateId/@root='2.16.840.1.113883.10.20.24.3.169']/cda:value",
            )?,
        })
    }
}

/// Output accumulated next to the records of one extractor run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideChannels {
    pub warnings: Vec<ImportWarning>,
    pub codes: BTreeSet<Code>,
    pub code_modifiers: BTreeMap<String, CodeModifier>,
}

/// Read-only services available while building records.
#[derive(Clone, Copy)]
pub struct EntryContext<'a> {
    pub references: &'a NarrativeReferences,
    pub shared: &'a SharedSelectors,
    pub config: &'a ImportConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("{category} entry has no code")]
    MissingCode { category: Category },
}

/// Records built from one category plus the ids each composite key maps to.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<FactRecord>,
    pub id_map: IdentifierMap,
    pub fragments: usize,
}

/// Compiled form of a [`CategoryDescriptor`].
#[derive(Debug, Clone)]
pub struct Extractor {
    descriptor: &'static CategoryDescriptor,
    locator: EntryLocator,
    id: Selector,
    code: Selector,
    author_time: Option<Selector>,
    negation: Option<Selector>,
    rules: Vec<(Field, Selector)>,
}

impl Extractor {
    pub fn new(descriptor: &'static CategoryDescriptor) -> Result<Self, SelectorError> {
        Ok(Self {
            descriptor,
            locator: EntryLocator::new(descriptor.entry)?,
            id: Selector::parse(descriptor.id)?,
            code: Selector::parse(descriptor.code)?,
            author_time: descriptor.author_time.map(Selector::parse).transpose()?,
            negation: descriptor.negation.map(Selector::parse).transpose()?,
            rules: descriptor
                .rules
                .iter()
                .map(|rule| Selector::parse(rule.selector).map(|selector| (rule.field, selector)))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn category(&self) -> Category {
        self.descriptor.category
    }

    /// Build a record for every fragment in `scopes`.
    ///
    /// A fragment's id is registered before the record is built, so a
    /// fragment that fails to build still shows up in the id map.
    pub fn create_entries(
        &self,
        scopes: &[NodeRef<'_>],
        context: &EntryContext<'_>,
        channels: &mut SideChannels,
    ) -> Extraction {
        let fragments = self.locator.locate(scopes);
        let mut extraction = Extraction {
            fragments: fragments.len(),
            ..Extraction::default()
        };

        for fragment in fragments {
            let identifier = self.read_identifier(fragment);
            let record_id = self.record_id(fragment, identifier.as_ref());
            let key = match &identifier {
                Some(identifier) => identifier.composite_key(),
                None => {
                    channels
                        .warnings
                        .push(ImportWarning::missing_identifier(self.category()));
                    Identifier::new("", record_id.as_str()).composite_key()
                }
            };
            extraction.id_map.push(key, record_id.as_str());

            match self.build(fragment, record_id, identifier, context, channels) {
                Ok(record) => extraction.records.push(record),
                Err(err) => {
                    tracing::warn!(category = %self.category(), error = %err, "skipping entry");
                }
            }
        }

        tracing::debug!(
            category = %self.category(),
            fragments = extraction.fragments,
            records = extraction.records.len(),
            "entries created"
        );
        extraction
    }

    pub fn create_entry(
        &self,
        fragment: NodeRef<'_>,
        context: &EntryContext<'_>,
        channels: &mut SideChannels,
    ) -> Result<FactRecord, EntryError> {
        let identifier = self.read_identifier(fragment);
        let record_id = self.record_id(fragment, identifier.as_ref());
        self.build(fragment, record_id, identifier, context, channels)
    }

    fn is_negated(&self, fragment: NodeRef<'_>) -> bool {
        let flag = match &self.negation {
            Some(selector) => selector.value_of(fragment),
            None => fragment.attribute("negationInd").map(str::to_string),
        };
        flag.as_deref().map(str::trim) == Some("true")
    }

    fn read_identifier(&self, fragment: NodeRef<'_>) -> Option<Identifier> {
        self.id.find_first(fragment).and_then(identifier_of)
    }

    /// Stable across imports of the same document.
    fn record_id(&self, fragment: NodeRef<'_>, identifier: Option<&Identifier>) -> String {
        let key = identifier.map(Identifier::composite_key).unwrap_or_default();
        let name = format!("{}/{}/{key}", self.category(), fragment.id().index());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    fn build(
        &self,
        fragment: NodeRef<'_>,
        record_id: String,
        identifier: Option<Identifier>,
        context: &EntryContext<'_>,
        channels: &mut SideChannels,
    ) -> Result<FactRecord, EntryError> {
        let shared = context.shared;
        let negated = self.is_negated(fragment);

        let codes = self.read_codes(fragment, negated, shared);
        if codes.is_empty() {
            return Err(EntryError::MissingCode {
                category: self.category(),
            });
        }
        for code in &codes {
            if negated {
                channels
                    .code_modifiers
                    .insert(code.code.clone(), CodeModifier::Negated);
            }
            channels.codes.insert(code.clone());
        }

        let mut record = FactRecord::new(record_id, self.category());
        record.codes = codes;
        record.identifier = identifier.clone();

        let mut reader = FieldReader {
            context,
            channels,
            identifier: identifier.as_ref(),
        };

        if let Some(selector) = &self.author_time {
            record.author_datetime = selector
                .find_first(fragment)
                .and_then(|node| reader.datetime(node));
        }

        record.description = shared
            .description
            .value_of(fragment)
            .and_then(|reference| context.references.resolve(&reference))
            .map(str::to_string);

        for (field, selector) in &self.rules {
            reader.apply(*field, selector, fragment, negated, &mut record);
        }

        if self.category().is_encounter() {
            record.length_of_stay = record.relevant_period.as_ref().and_then(length_of_stay);
        }

        Ok(record)
    }

    fn read_codes(&self, fragment: NodeRef<'_>, negated: bool, shared: &SharedSelectors) -> Vec<Code> {
        let mut codes = Vec::new();
        for element in self.code.find_all(fragment) {
            if let Some(code) = code_of(element) {
                push_unique(&mut codes, code);
            } else if negated {
                if let Some(value_set) = element.attribute_ns(Some(SDTC_NS), "valueSet") {
                    push_unique(&mut codes, Code::new(value_set.trim(), NEGATED_CODE_SYSTEM));
                }
            }
            for translation in shared.translation.find_all(element) {
                if let Some(code) = code_of(translation) {
                    push_unique(&mut codes, code);
                }
            }
        }
        codes
    }
}

/// Reads category fields, reporting bad values to the side channels.
struct FieldReader<'a, 'c> {
    context: &'a EntryContext<'a>,
    channels: &'c mut SideChannels,
    identifier: Option<&'a Identifier>,
}

impl FieldReader<'_, '_> {
    fn apply(
        &mut self,
        field: Field,
        selector: &Selector,
        fragment: NodeRef<'_>,
        negated: bool,
        record: &mut FactRecord,
    ) {
        let shared = self.context.shared;
        match field {
            Field::Reason => {
                let code = selector.find_first(fragment).and_then(code_of);
                if negated {
                    record.negation_rationale = code;
                } else {
                    record.reason = code;
                }
            }
            Field::Rank => {
                if let Some(raw) = selector.value_of(fragment) {
                    record.rank = self.rank(&raw);
                }
            }
            Field::AnatomicalSite => {
                record.anatomical_location_site = selector.find_first(fragment).and_then(code_of);
            }
            Field::RelevantPeriod => {
                record.relevant_period = selector
                    .find_first(fragment)
                    .and_then(|node| self.interval(node));
            }
            Field::RelevantDatetime => {
                record.relevant_datetime = selector
                    .find_first(fragment)
                    .and_then(|node| self.datetime(node));
            }
            Field::PrevalencePeriod => {
                record.prevalence_period = selector
                    .find_first(fragment)
                    .and_then(|node| self.interval(node));
            }
            Field::ResultDatetime => {
                record.result_datetime = selector
                    .find_first(fragment)
                    .and_then(|node| self.datetime(node));
            }
            Field::Result => {
                record.result = selector
                    .find_first(fragment)
                    .and_then(|node| self.result(node));
            }
            Field::Requester => record
                .requester
                .extend(selector.find_all(fragment).into_iter().map(|node| entity_of(node, shared))),
            Field::Recorder => record
                .recorder
                .extend(selector.find_all(fragment).into_iter().map(|node| entity_of(node, shared))),
            Field::Performer => record
                .performer
                .extend(selector.find_all(fragment).into_iter().map(|node| entity_of(node, shared))),
            Field::RelatedTo => record.related_to.extend(
                selector
                    .find_all(fragment)
                    .into_iter()
                    .filter_map(identifier_of)
                    .map(Reference::Pending),
            ),
            Field::AdmissionSource => {
                record.admission_source = selector.find_first(fragment).and_then(code_of);
            }
            Field::DischargeDisposition => {
                record.discharge_disposition = selector.find_first(fragment).and_then(code_of);
            }
            Field::FacilityLocations => {
                for code in selector.find_all(fragment).into_iter().filter_map(code_of) {
                    push_unique(&mut record.facility_locations, code);
                }
            }
            Field::Diagnoses => {
                for node in selector.find_all(fragment) {
                    let Some(code) = shared.diagnosis_code.find_first(node).and_then(code_of) else {
                        continue;
                    };
                    self.channels.codes.insert(code.clone());
                    let rank = shared
                        .diagnosis_rank
                        .value_of(node)
                        .and_then(|raw| self.rank(&raw));
                    let present_on_admission = shared
                        .diagnosis_present_on_admission
                        .find_first(node)
                        .and_then(code_of);
                    record.diagnoses.push(DiagnosisComponent {
                        code,
                        rank,
                        present_on_admission,
                    });
                }
            }
            Field::PrincipalDiagnosis => {
                if let Some(code) = selector.find_first(fragment).and_then(code_of) {
                    self.channels.codes.insert(code.clone());
                    record.diagnoses.retain(|diagnosis| diagnosis.code != code);
                    record.diagnoses.insert(
                        0,
                        DiagnosisComponent {
                            code,
                            rank: Some(1),
                            present_on_admission: None,
                        },
                    );
                }
            }
        }
    }

    fn timestamp(&mut self, raw: Option<String>) -> Option<DateTime<Utc>> {
        let raw = raw?;
        let parsed = parse_hl7_timestamp(&raw);
        if parsed.is_none() {
            self.channels
                .warnings
                .push(ImportWarning::invalid_timestamp(&raw, self.identifier));
        }
        parsed
    }

    /// `@value`, falling back to `low/@value`.
    fn datetime(&mut self, node: NodeRef<'_>) -> Option<DateTime<Utc>> {
        let shared = self.context.shared;
        let raw = shared.value.value_of(node).or_else(|| shared.low.value_of(node));
        self.timestamp(raw)
    }

    /// `low`/`high`; a bare `@value` becomes both ends.
    fn interval(&mut self, node: NodeRef<'_>) -> Option<Interval> {
        let shared = self.context.shared;
        let low = shared.low.value_of(node);
        let high = shared.high.value_of(node);

        let interval = if low.is_none() && high.is_none() {
            let point = self.timestamp(shared.value.value_of(node));
            Interval {
                low: point,
                high: point,
            }
        } else {
            Interval {
                low: self.timestamp(low),
                high: self.timestamp(high),
            }
        };

        (!interval.is_empty()).then_some(interval)
    }

    fn rank(&mut self, raw: &str) -> Option<i64> {
        if let Ok(rank) = raw.trim().parse::<i64>() {
            return Some(rank);
        }
        self.channels
            .warnings
            .push(ImportWarning::invalid_rank(raw, self.identifier));
        match self.context.config.rank_policy {
            RankPolicy::Coerce => Some(leading_integer(raw)),
            RankPolicy::Reject => None,
        }
    }

    fn result(&mut self, node: NodeRef<'_>) -> Option<ResultValue> {
        let xsi_type = node.attribute_ns(Some(XSI_NS), "type").unwrap_or_default();
        let quantity = || {
            let value = node.attribute("value")?.trim().parse::<f64>().ok()?;
            Some(ResultValue::Quantity {
                value,
                unit: node.attribute("unit").map(str::to_string),
            })
        };
        let text = || {
            let text = node.text().trim().to_string();
            (!text.is_empty()).then_some(ResultValue::Text(text))
        };

        let result = match xsi_type {
            "PQ" | "REAL" | "INT" => quantity(),
            "CD" | "CE" | "CO" | "CV" => code_of(node).map(ResultValue::Code),
            "ST" | "ED" => text(),
            _ => code_of(node)
                .map(ResultValue::Code)
                .or_else(quantity)
                .or_else(text),
        };

        if let Some(ResultValue::Code(code)) = &result {
            self.channels.codes.insert(code.clone());
            self.channels
                .code_modifiers
                .entry(code.code.clone())
                .or_insert(CodeModifier::Result);
        }
        result
    }
}

/// Integer prefix of `text` after optional whitespace and sign; 0 if none.
pub fn leading_integer(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<i64>().map(|value| sign * value).unwrap_or(i64::MAX * sign)
}

fn code_of(element: NodeRef<'_>) -> Option<Code> {
    let code = element.attribute("code")?.trim();
    if code.is_empty() {
        return None;
    }
    let system = element.attribute("codeSystem").unwrap_or_default().trim();
    Some(Code::new(code, system))
}

fn identifier_of(element: NodeRef<'_>) -> Option<Identifier> {
    let root = element.attribute("root").unwrap_or_default().trim();
    let extension = element.attribute("extension").unwrap_or_default().trim();
    if root.is_empty() && extension.is_empty() {
        return None;
    }
    Some(Identifier::new(root, extension))
}

fn entity_of(participant: NodeRef<'_>, shared: &SharedSelectors) -> Entity {
    Entity {
        identifier: shared.entity_id.find_first(participant).and_then(identifier_of),
        role: shared.entity_role.find_first(participant).and_then(code_of),
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Day boundaries crossed between admission and discharge.
fn length_of_stay(period: &Interval) -> Option<i64> {
    let (low, high) = (period.low?, period.high?);
    Some(
        high.date_naive()
            .signed_duration_since(low.date_naive())
            .num_days(),
    )
}
