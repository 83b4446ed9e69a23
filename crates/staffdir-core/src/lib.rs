use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use ulid::Ulid;

pub const MAX_AGE: u8 = 120;
pub const MAX_ATTENDANCE: u8 = 100;
pub const MAX_PAGE: u32 = 1_000_000;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DirectoryError {
    #[error("invalid email or password")]
    Authentication,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("not authorized")]
    Unauthorized,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("employee not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DirectoryError {
    /// Stable machine-readable discriminant for transport-level mapping.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

/// Opaque employee identifier, rendered as `emp_<ulid>` on the wire.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EmployeeId(pub Ulid);

impl EmployeeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let raw = value.strip_prefix("emp_")?;
        Ulid::from_string(raw).ok().map(Self)
    }
}

impl Default for EmployeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EmployeeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "emp_{}", self.0)
    }
}

impl Serialize for EmployeeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EmployeeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid employee id: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub age: u8,
    pub class: String,
    pub subjects: Vec<String>,
    pub attendance: u8,
    pub flagged: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Employee {
    /// Validate one record against directory invariants.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Validation`] naming the first violated field.
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if self.name.trim().is_empty() {
            return Err(validation("name is required"));
        }
        if self.age > MAX_AGE {
            return Err(validation("age must be an integer between 0 and 120"));
        }
        if self.class.trim().is_empty() {
            return Err(validation("class is required"));
        }
        if self.subjects.is_empty() {
            return Err(validation("subjects must be a non-empty list"));
        }
        if self.subjects.iter().any(|subject| subject.trim().is_empty()) {
            return Err(validation("subjects cannot include empty entries"));
        }
        if self.attendance > MAX_ATTENDANCE {
            return Err(validation("attendance must be an integer between 0 and 100"));
        }
        if self.updated_at < self.created_at {
            return Err(validation("updatedAt must not precede createdAt"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddEmployeeInput {
    pub name: String,
    pub age: i64,
    pub class: String,
    pub subjects: Vec<String>,
    pub attendance: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateEmployeeInput {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub class: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub attendance: Option<i64>,
    pub flagged: Option<bool>,
}

fn validation(message: &str) -> DirectoryError {
    DirectoryError::Validation(message.to_string())
}

fn validated_name(raw: &str) -> Result<String, DirectoryError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(validation("name is required"));
    }
    Ok(name.to_string())
}

fn validated_age(raw: i64) -> Result<u8, DirectoryError> {
    u8::try_from(raw)
        .ok()
        .filter(|age| *age <= MAX_AGE)
        .ok_or_else(|| validation("age must be an integer between 0 and 120"))
}

fn validated_class(raw: &str) -> Result<String, DirectoryError> {
    let class = raw.trim();
    if class.is_empty() {
        return Err(validation("class is required"));
    }
    Ok(class.to_string())
}

fn validated_subjects(raw: &[String]) -> Result<Vec<String>, DirectoryError> {
    if raw.is_empty() {
        return Err(validation("subjects must be a non-empty list"));
    }
    let mut subjects = Vec::with_capacity(raw.len());
    for subject in raw {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(validation("subjects cannot include empty entries"));
        }
        subjects.push(subject.to_string());
    }
    Ok(subjects)
}

fn validated_attendance(raw: i64) -> Result<u8, DirectoryError> {
    u8::try_from(raw)
        .ok()
        .filter(|attendance| *attendance <= MAX_ATTENDANCE)
        .ok_or_else(|| validation("attendance must be an integer between 0 and 100"))
}

/// Build a fresh record from a creation input.
///
/// The server assigns the identifier and both timestamps; new records are
/// never flagged.
///
/// # Errors
/// Returns [`DirectoryError::Validation`] naming the first invalid field.
pub fn build_employee(
    input: &AddEmployeeInput,
    now: OffsetDateTime,
) -> Result<Employee, DirectoryError> {
    Ok(Employee {
        id: EmployeeId::new(),
        name: validated_name(&input.name)?,
        age: validated_age(input.age)?,
        class: validated_class(&input.class)?,
        subjects: validated_subjects(&input.subjects)?,
        attendance: validated_attendance(input.attendance)?,
        flagged: false,
        created_at: now,
        updated_at: now,
    })
}

/// Apply a partial update in place.
///
/// Every present field is validated before anything is assigned, so a failed
/// update leaves the record untouched. `id` and `created_at` are never
/// altered; `updated_at` is always refreshed.
///
/// # Errors
/// Returns [`DirectoryError::Validation`] naming the first invalid field.
pub fn apply_update(
    employee: &mut Employee,
    input: &UpdateEmployeeInput,
    now: OffsetDateTime,
) -> Result<(), DirectoryError> {
    let name = input.name.as_deref().map(validated_name).transpose()?;
    let age = input.age.map(validated_age).transpose()?;
    let class = input.class.as_deref().map(validated_class).transpose()?;
    let subjects = input.subjects.as_deref().map(validated_subjects).transpose()?;
    let attendance = input.attendance.map(validated_attendance).transpose()?;

    if let Some(name) = name {
        employee.name = name;
    }
    if let Some(age) = age {
        employee.age = age;
    }
    if let Some(class) = class {
        employee.class = class;
    }
    if let Some(subjects) = subjects {
        employee.subjects = subjects;
    }
    if let Some(attendance) = attendance {
        employee.attendance = attendance;
    }
    if let Some(flagged) = input.flagged {
        employee.flagged = flagged;
    }
    employee.updated_at = now;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeFilter {
    pub name_contains: Option<String>,
    pub class_equals: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub subject_in: Option<String>,
    pub flagged: Option<bool>,
}

fn active(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|condition| !condition.is_empty())
}

impl EmployeeFilter {
    /// All present conditions are AND-ed; blank string conditions are no-ops.
    #[must_use]
    pub fn matches(&self, employee: &Employee) -> bool {
        if let Some(needle) = active(self.name_contains.as_deref()) {
            if !employee.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(class) = active(self.class_equals.as_deref()) {
            if employee.class != class {
                return false;
            }
        }
        if let Some(min_age) = self.min_age {
            if i64::from(employee.age) < min_age {
                return false;
            }
        }
        if let Some(max_age) = self.max_age {
            if i64::from(employee.age) > max_age {
                return false;
            }
        }
        if let Some(flagged) = self.flagged {
            if employee.flagged != flagged {
                return false;
            }
        }
        if let Some(subject) = active(self.subject_in.as_deref()) {
            let subject = subject.to_lowercase();
            if !employee.subjects.iter().any(|candidate| candidate.to_lowercase() == subject) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    Name,
    Age,
    Class,
    Attendance,
    UpdatedAt,
}

impl SortBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Age => "AGE",
            Self::Class => "CLASS",
            Self::Attendance => "ATTENDANCE",
            Self::UpdatedAt => "UPDATED_AT",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NAME" => Some(Self::Name),
            "AGE" => Some(Self::Age),
            "CLASS" => Some(Self::Class),
            "ATTENDANCE" => Some(Self::Attendance),
            "UPDATED_AT" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeSort {
    pub sort_by: Option<SortBy>,
    pub sort_direction: Option<SortDirection>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePage {
    pub items: Vec<Employee>,
    pub page_info: PageInfo,
}

fn compare(lhs: &Employee, rhs: &Employee, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Name => lhs.name.to_lowercase().cmp(&rhs.name.to_lowercase()),
        SortBy::Age => lhs.age.cmp(&rhs.age),
        SortBy::Class => lhs.class.cmp(&rhs.class),
        SortBy::Attendance => lhs.attendance.cmp(&rhs.attendance),
        SortBy::UpdatedAt => lhs.updated_at.cmp(&rhs.updated_at),
    }
}

fn clamp_page(value: Option<i64>, default: u32, max: u32) -> u32 {
    let Some(raw) = value else { return default };
    if raw < 1 {
        return 1;
    }
    u32::try_from(raw).map_or(max, |page| page.min(max))
}

/// Run the filter, sort and paginate pipeline over a snapshot of the record
/// collection.
///
/// Pure function of its inputs: the snapshot is never mutated, ties keep
/// their incoming order (stable sort), and out-of-range pages yield an empty
/// item list rather than an error.
#[must_use]
pub fn run_query(
    records: &[Employee],
    filter: Option<&EmployeeFilter>,
    sort: Option<&EmployeeSort>,
    page: Option<&PageRequest>,
) -> EmployeePage {
    let mut matched: Vec<Employee> = records
        .iter()
        .filter(|employee| filter.map_or(true, |conditions| conditions.matches(employee)))
        .cloned()
        .collect();

    let sort_by = sort.and_then(|order| order.sort_by).unwrap_or(SortBy::UpdatedAt);
    let direction = sort.and_then(|order| order.sort_direction).unwrap_or(SortDirection::Desc);
    matched.sort_by(|lhs, rhs| {
        let ordering = compare(lhs, rhs, sort_by);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let page_number = clamp_page(page.and_then(|request| request.page), 1, MAX_PAGE);
    let page_size =
        clamp_page(page.and_then(|request| request.page_size), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let total_count = u64::try_from(matched.len()).unwrap_or(u64::MAX);

    let start = u64::from(page_number - 1) * u64::from(page_size);
    let end = start + u64::from(page_size);
    let items: Vec<Employee> = matched
        .into_iter()
        .skip(usize::try_from(start).unwrap_or(usize::MAX))
        .take(usize::try_from(page_size).unwrap_or(usize::MAX))
        .collect();

    EmployeePage {
        items,
        page_info: PageInfo {
            page: page_number,
            page_size,
            total_count,
            has_next_page: end < total_count,
        },
    }
}
