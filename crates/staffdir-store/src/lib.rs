use std::sync::{Mutex, MutexGuard, PoisonError};

use staffdir_core::{Employee, EmployeeId};
use time::macros::datetime;
use time::OffsetDateTime;

/// The shared, process-lifetime record collection.
///
/// Every operation takes the single lock once and runs to completion, so no
/// caller ever observes another operation's partial state. Tests get
/// isolation by constructing their own instance.
#[derive(Debug, Default)]
pub struct DirectoryStore {
    records: Mutex<Vec<Employee>>,
}

impl DirectoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_records(records: Vec<Employee>) -> Self {
        Self { records: Mutex::new(records) }
    }

    /// A store preloaded with the reference deployment's demo roster.
    #[must_use]
    pub fn seeded() -> Self {
        Self::with_records(seed_employees())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Employee>> {
        // Critical sections only swap plain data, so a poisoned lock still
        // guards a coherent collection.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone the collection for the read pipeline.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Employee> {
        self.lock().clone()
    }

    #[must_use]
    pub fn get(&self, id: EmployeeId) -> Option<Employee> {
        self.lock().iter().find(|employee| employee.id == id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Insert a record at the front of the collection (newest-first order).
    pub fn insert_front(&self, employee: Employee) {
        self.lock().insert(0, employee);
    }

    /// Apply `mutate` to the record with the given id under the lock.
    ///
    /// Returns `Ok(None)` when the id is unknown. The closure must be
    /// all-or-nothing: when it fails, it must leave the record as it found
    /// it, and this method propagates the failure without further changes.
    ///
    /// # Errors
    /// Propagates whatever `mutate` returns.
    pub fn update<F, E>(&self, id: EmployeeId, mutate: F) -> Result<Option<Employee>, E>
    where
        F: FnOnce(&mut Employee) -> Result<(), E>,
    {
        let mut records = self.lock();
        let Some(employee) = records.iter_mut().find(|employee| employee.id == id) else {
            return Ok(None);
        };
        mutate(employee)?;
        Ok(Some(employee.clone()))
    }

    /// Remove the record with the given id; `false` when it was not present.
    pub fn remove(&self, id: EmployeeId) -> bool {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|employee| employee.id != id);
        records.len() != before
    }
}

fn seed_id(raw: &str) -> EmployeeId {
    EmployeeId::parse(raw).unwrap_or_default()
}

fn seed_employee(
    id: &str,
    name: &str,
    age: u8,
    class: &str,
    subjects: &[&str],
    attendance: u8,
    flagged: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Employee {
    Employee {
        id: seed_id(id),
        name: name.to_string(),
        age,
        class: class.to_string(),
        subjects: subjects.iter().map(ToString::to_string).collect(),
        attendance,
        flagged,
        created_at,
        updated_at,
    }
}

/// The demo roster shipped with the reference deployment.
#[must_use]
pub fn seed_employees() -> Vec<Employee> {
    vec![
        seed_employee(
            "emp_01HGAV3Q0S9XZJ6M4N7P8RWTKC",
            "Ava Johnson",
            28,
            "A",
            &["Math", "English", "Science"],
            96,
            false,
            datetime!(2025-12-01 10:00 UTC),
            datetime!(2025-12-01 10:00 UTC),
        ),
        seed_employee(
            "emp_01HGAV3Q0SABCDEFGH0J2K3M4N",
            "Noah Santos",
            34,
            "B",
            &["History", "Math"],
            89,
            true,
            datetime!(2025-12-01 11:00 UTC),
            datetime!(2025-12-02 08:30 UTC),
        ),
        seed_employee(
            "emp_01HGAV3Q0SPQRSTVWXYZ123456",
            "Mia Chen",
            23,
            "A",
            &["Design", "English"],
            92,
            false,
            datetime!(2025-12-02 12:15 UTC),
            datetime!(2025-12-02 12:15 UTC),
        ),
    ]
}
