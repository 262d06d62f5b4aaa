//! Mô hình dữ liệu lõi cho hồ sơ bệnh nhân nhập từ tài liệu QRDA Cat I.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hệ mã giả dùng cho mã value set của dữ liệu phủ định.
pub const NEGATED_CODE_SYSTEM: &str = "1.2.3.4.5.6.7.8.9.10";

/// Cấu hình điều chỉnh cách nhập dữ liệu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportConfig {
    /// Cách xử lý giá trị `rank` không phải số nguyên.
    pub rank_policy: RankPolicy,
    /// Bật so khớp mã và thời gian khi nhiều encounter trùng id.
    pub refine_encounters: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            rank_policy: RankPolicy::Coerce,
            refine_encounters: true,
        }
    }
}

/// Chính sách cho `rank` không hợp lệ. Cả hai đều ghi cảnh báo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Lấy phần số nguyên ở đầu chuỗi, không có thì bằng 0.
    Coerce,
    /// Bỏ trống `rank`.
    Reject,
}

/// Thế hệ schema QRDA của tài liệu, quyết định bộ trích xuất có điều kiện.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// Trước bản sửa đổi 2021-08-01.
    R52,
    /// Từ bản sửa đổi 2021-08-01 trở đi.
    R53,
}

/// Loại dữ liệu lâm sàng (mỗi loại ứng với một template).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    AdverseEvent,
    AllergyIntolerance,
    AssessmentOrder,
    AssessmentPerformed,
    AssessmentRecommended,
    CommunicationPerformed,
    DeviceApplied,
    DeviceOrder,
    DeviceRecommended,
    Diagnosis,
    DiagnosticStudyOrder,
    DiagnosticStudyPerformed,
    DiagnosticStudyRecommended,
    EncounterOrder,
    EncounterPerformed,
    EncounterRecommended,
    FamilyHistory,
    ImmunizationAdministered,
    ImmunizationOrder,
    InterventionOrder,
    InterventionPerformed,
    InterventionRecommended,
    LaboratoryTestOrder,
    LaboratoryTestPerformed,
    LaboratoryTestRecommended,
    MedicationActive,
    MedicationAdministered,
    MedicationDischarge,
    MedicationDispensed,
    MedicationOrder,
    PatientCareExperience,
    PatientCharacteristicBirthdate,
    PatientCharacteristicClinicalTrialParticipant,
    PatientCharacteristicEthnicity,
    PatientCharacteristicExpired,
    PatientCharacteristicPayer,
    PatientCharacteristicRace,
    PatientCharacteristicSex,
    PhysicalExamOrder,
    PhysicalExamPerformed,
    PhysicalExamRecommended,
    ProcedureOrder,
    ProcedurePerformed,
    ProcedureRecommended,
    ProgramParticipation,
    ProviderCareExperience,
    RelatedPerson,
    SubstanceAdministered,
    SubstanceOrder,
    SubstanceRecommended,
    Symptom,
}

impl Category {
    /// Encounter cần thêm mã và thời gian để xác định tính duy nhất.
    pub fn is_encounter(self) -> bool {
        matches!(self, Category::EncounterPerformed)
    }

    /// Dữ liệu nhân khẩu học được sinh từ phần `recordTarget`.
    pub fn is_demographic(self) -> bool {
        matches!(
            self,
            Category::PatientCharacteristicBirthdate
                | Category::PatientCharacteristicSex
                | Category::PatientCharacteristicRace
                | Category::PatientCharacteristicEthnicity
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Cặp mã và hệ mã.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code {
    pub code: String,
    pub system: String,
}

impl Code {
    pub fn new(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.system)
    }
}

/// Định danh nguồn (`root` + `extension`) của một mục trong tài liệu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identifier {
    pub root: String,
    pub extension: String,
}

impl Identifier {
    pub fn new(root: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Khoá ghép `extension***root`.
    pub fn composite_key(&self) -> String {
        format!("{}***{}", self.extension, self.root)
    }

    /// Tách khoá ghép ngược lại thành định danh.
    pub fn from_composite_key(key: &str) -> Self {
        match key.split_once("***") {
            Some((extension, root)) => Self::new(root, extension),
            None => Self::new("", key),
        }
    }

    /// Dạng hiển thị trong cảnh báo.
    pub fn describe(&self) -> String {
        format!("{}(root), {}(extension)", self.root, self.extension)
    }
}

/// Khoảng thời gian có thể thiếu một đầu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Interval {
    pub low: Option<DateTime<Utc>>,
    pub high: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

/// Người hoặc tổ chức được liên kết với một mục (người yêu cầu, ghi nhận...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub identifier: Option<Identifier>,
    pub role: Option<Code>,
}

/// Giá trị kết quả của một quan sát.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResultValue {
    Code(Code),
    Quantity { value: f64, unit: Option<String> },
    Text(String),
}

/// Tham chiếu tới mục khác. `Pending` giữ khoá gốc cho tới khi được chuẩn hoá.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    Pending(Identifier),
    Resolved(String),
}

/// Chẩn đoán gắn với một encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosisComponent {
    pub code: Code,
    pub rank: Option<i64>,
    pub present_on_admission: Option<Code>,
}

/// Một dữ liệu lâm sàng đã trích xuất.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactRecord {
    pub id: String,
    pub category: Category,
    pub identifier: Option<Identifier>,
    pub codes: Vec<Code>,
    pub author_datetime: Option<DateTime<Utc>>,
    pub relevant_datetime: Option<DateTime<Utc>>,
    pub relevant_period: Option<Interval>,
    pub prevalence_period: Option<Interval>,
    pub result_datetime: Option<DateTime<Utc>>,
    pub reason: Option<Code>,
    pub negation_rationale: Option<Code>,
    pub anatomical_location_site: Option<Code>,
    pub rank: Option<i64>,
    #[serde(default)]
    pub requester: Vec<Entity>,
    #[serde(default)]
    pub recorder: Vec<Entity>,
    #[serde(default)]
    pub performer: Vec<Entity>,
    #[serde(default)]
    pub related_to: Vec<Reference>,
    pub result: Option<ResultValue>,
    pub description: Option<String>,
    pub admission_source: Option<Code>,
    pub discharge_disposition: Option<Code>,
    #[serde(default)]
    pub facility_locations: Vec<Code>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisComponent>,
    /// Số lần vượt qua ranh giới ngày giữa lúc nhập và xuất viện.
    pub length_of_stay: Option<i64>,
}

impl FactRecord {
    /// Tạo mục rỗng cho một loại dữ liệu.
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            category,
            identifier: None,
            codes: Vec::new(),
            author_datetime: None,
            relevant_datetime: None,
            relevant_period: None,
            prevalence_period: None,
            result_datetime: None,
            reason: None,
            negation_rationale: None,
            anatomical_location_site: None,
            rank: None,
            requester: Vec::new(),
            recorder: Vec::new(),
            performer: Vec::new(),
            related_to: Vec::new(),
            result: None,
            description: None,
            admission_source: None,
            discharge_disposition: None,
            facility_locations: Vec::new(),
            diagnoses: Vec::new(),
            length_of_stay: None,
        }
    }

    /// Mã chính (mã đầu tiên).
    pub fn primary_code(&self) -> Option<&Code> {
        self.codes.first()
    }
}

/// Thông tin nhân khẩu học của bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Demographics {
    pub given_names: Vec<String>,
    pub family_name: Option<String>,
    pub birth_datetime: Option<DateTime<Utc>>,
    pub sex: Option<Code>,
    pub race: Option<Code>,
    pub ethnicity: Option<Code>,
}

/// Hồ sơ bệnh nhân sau khi nhập.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PatientRecord {
    pub demographics: Demographics,
    pub data_elements: Vec<FactRecord>,
}

impl PatientRecord {
    /// Các mục thuộc một loại dữ liệu, theo thứ tự nhập.
    pub fn records_of(&self, category: Category) -> impl Iterator<Item = &FactRecord> {
        self.data_elements
            .iter()
            .filter(move |record| record.category == category)
    }

    /// Tìm mục theo id nội bộ.
    pub fn find(&self, id: &str) -> Option<&FactRecord> {
        self.data_elements.iter().find(|record| record.id == id)
    }

    pub fn encounters(&self) -> impl Iterator<Item = &FactRecord> {
        self.records_of(Category::EncounterPerformed)
    }
}

/// Phân loại cảnh báo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    DuplicateIdentifier,
    UnparsableTemplate,
    UnresolvedReference,
    MissingIdentifier,
    InvalidRank,
    InvalidTimestamp,
}

/// Cảnh báo không làm dừng quá trình nhập.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub message: String,
    pub identifier: Option<Identifier>,
}

impl ImportWarning {
    pub fn duplicate_identifier(identifier: &Identifier) -> Self {
        Self {
            kind: WarningKind::DuplicateIdentifier,
            message: format!(
                "Two or more entries share the Id: {}.",
                identifier.describe()
            ),
            identifier: Some(identifier.clone()),
        }
    }

    pub fn unparsable_template(identifier: &Identifier) -> Self {
        Self {
            kind: WarningKind::UnparsableTemplate,
            message: format!("Error parsing template with Id: {}.", identifier.describe()),
            identifier: Some(identifier.clone()),
        }
    }

    pub fn unresolved_reference(identifier: &Identifier) -> Self {
        Self {
            kind: WarningKind::UnresolvedReference,
            message: format!(
                "Related To Id: {} cannot be found in QRDA file.",
                identifier.describe()
            ),
            identifier: Some(identifier.clone()),
        }
    }

    pub fn missing_identifier(category: Category) -> Self {
        Self {
            kind: WarningKind::MissingIdentifier,
            message: format!("{category} entry has no Id."),
            identifier: None,
        }
    }

    pub fn invalid_rank(raw: &str, identifier: Option<&Identifier>) -> Self {
        Self {
            kind: WarningKind::InvalidRank,
            message: format!("Rank value {raw:?} is not an integer."),
            identifier: identifier.cloned(),
        }
    }

    pub fn invalid_timestamp(raw: &str, identifier: Option<&Identifier>) -> Self {
        Self {
            kind: WarningKind::InvalidTimestamp,
            message: format!("Timestamp value {raw:?} cannot be parsed."),
            identifier: identifier.cloned(),
        }
    }
}

/// Chú thích gắn với một mã đã gặp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodeModifier {
    /// Mã thuộc mục có `negationInd="true"`.
    Negated,
    /// Mã xuất hiện dưới dạng kết quả.
    Result,
}

/// Kết quả cuối cùng của một lần nhập.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImportOutcome {
    pub patient: PatientRecord,
    pub warnings: Vec<ImportWarning>,
    pub codes: BTreeSet<Code>,
    pub code_modifiers: BTreeMap<String, CodeModifier>,
}

impl ImportOutcome {
    /// Số cảnh báo thuộc một loại.
    pub fn warnings_of(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// Lỗi làm hỏng toàn bộ lần nhập.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Không đọc được XML: {0}")]
    Xml(String),
    #[error("Tài liệu không có phần tử gốc")]
    MissingRoot,
    #[error("Biểu thức truy vấn không hợp lệ: {0}")]
    Selector(String),
}
