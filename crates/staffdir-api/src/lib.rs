use std::sync::Arc;

use serde::{Deserialize, Serialize};
use staffdir_auth::{AuthSession, Credential, Identity, TokenKey};
use staffdir_core::{
    apply_update, build_employee, run_query, AddEmployeeInput, DirectoryError, Employee,
    EmployeeFilter, EmployeeId, EmployeePage, EmployeeSort, PageRequest, UpdateEmployeeInput,
};
use staffdir_store::DirectoryStore;
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeesRequest {
    pub filter: Option<EmployeeFilter>,
    pub sort: Option<EmployeeSort>,
    pub pagination: Option<PageRequest>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct FlagEmployeeRequest {
    pub flagged: bool,
}

/// The operation layer: every exposed operation as one typed method.
///
/// Reads run the pure query pipeline over a store snapshot; mutations pass
/// the access gate before touching the store. The store is injected so each
/// test gets an isolated collection.
#[derive(Debug, Clone)]
pub struct DirectoryApi {
    store: Arc<DirectoryStore>,
    credentials: Arc<Vec<Credential>>,
    token_key: TokenKey,
}

impl DirectoryApi {
    #[must_use]
    pub fn new(store: Arc<DirectoryStore>, credentials: Vec<Credential>, token_key: TokenKey) -> Self {
        Self { store, credentials: Arc::new(credentials), token_key }
    }

    /// An API over the well-known demo accounts.
    #[must_use]
    pub fn demo(store: Arc<DirectoryStore>, token_key: TokenKey) -> Self {
        Self::new(store, staffdir_auth::demo_credentials(), token_key)
    }

    /// Resolve an `Authorization` header value into an identity, degrading
    /// to anonymous on any parse or verification failure.
    #[must_use]
    pub fn identity(&self, authorization: Option<&str>) -> Option<Identity> {
        staffdir_auth::identity_from_header(&self.token_key, authorization)
    }

    /// Verify credentials and mint a 7-day session token.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Authentication`] on any mismatch.
    pub fn login(&self, request: &LoginRequest) -> Result<AuthSession, DirectoryError> {
        staffdir_auth::login(
            &self.credentials,
            &self.token_key,
            &request.email,
            &request.password,
            OffsetDateTime::now_utc(),
        )
    }

    /// Echo the caller's own verified session, or `None` when anonymous.
    #[must_use]
    pub fn current_session(&self, authorization: Option<&str>) -> Option<AuthSession> {
        let token = staffdir_auth::bearer_token(authorization)?;
        let identity = staffdir_auth::verify_token(&self.token_key, token)?;
        Some(AuthSession { token: token.to_string(), role: identity.role, user_id: identity.user_id })
    }

    /// List employees through the filter, sort and paginate pipeline.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Unauthenticated`] for anonymous callers.
    pub fn employees(
        &self,
        identity: Option<&Identity>,
        request: &EmployeesRequest,
    ) -> Result<EmployeePage, DirectoryError> {
        staffdir_auth::require_authenticated(identity)?;
        let snapshot = self.store.snapshot();
        Ok(run_query(
            &snapshot,
            request.filter.as_ref(),
            request.sort.as_ref(),
            request.pagination.as_ref(),
        ))
    }

    /// Fetch one employee by id; unknown (or unparseable) ids are absent.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Unauthenticated`] for anonymous callers.
    pub fn employee(
        &self,
        identity: Option<&Identity>,
        id: &str,
    ) -> Result<Option<Employee>, DirectoryError> {
        staffdir_auth::require_authenticated(identity)?;
        Ok(EmployeeId::parse(id).and_then(|id| self.store.get(id)))
    }

    /// Create a record and insert it at the front of the collection.
    ///
    /// # Errors
    /// Returns [`DirectoryError::Unauthenticated`]/[`DirectoryError::Unauthorized`]
    /// when the gate refuses the caller, or [`DirectoryError::Validation`]
    /// naming the first invalid field.
    pub fn add_employee(
        &self,
        identity: Option<&Identity>,
        input: &AddEmployeeInput,
    ) -> Result<Employee, DirectoryError> {
        staffdir_auth::require_admin(identity)?;
        let employee = build_employee(input, OffsetDateTime::now_utc())?;
        self.store.insert_front(employee.clone());
        Ok(employee)
    }

    /// Apply a partial update; absent fields stay untouched.
    ///
    /// # Errors
    /// Gate errors as for [`Self::add_employee`];
    /// [`DirectoryError::NotFound`] for unknown ids;
    /// [`DirectoryError::Validation`] for invalid present fields.
    pub fn update_employee(
        &self,
        identity: Option<&Identity>,
        id: &str,
        input: &UpdateEmployeeInput,
    ) -> Result<Employee, DirectoryError> {
        staffdir_auth::require_admin(identity)?;
        let Some(parsed) = EmployeeId::parse(id) else {
            return Err(DirectoryError::NotFound(id.to_string()));
        };
        let now = OffsetDateTime::now_utc();
        self.store
            .update(parsed, |employee| apply_update(employee, input, now))?
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    /// Remove a record. Unknown ids yield `false`, keeping delete idempotent
    /// from the caller's perspective.
    ///
    /// # Errors
    /// Gate errors as for [`Self::add_employee`].
    pub fn delete_employee(
        &self,
        identity: Option<&Identity>,
        id: &str,
    ) -> Result<bool, DirectoryError> {
        staffdir_auth::require_admin(identity)?;
        Ok(EmployeeId::parse(id).is_some_and(|id| self.store.remove(id)))
    }

    /// Set the flagged marker to the supplied value (not a toggle).
    ///
    /// # Errors
    /// Gate errors as for [`Self::add_employee`];
    /// [`DirectoryError::NotFound`] for unknown ids.
    pub fn flag_employee(
        &self,
        identity: Option<&Identity>,
        id: &str,
        flagged: bool,
    ) -> Result<Employee, DirectoryError> {
        staffdir_auth::require_admin(identity)?;
        let Some(parsed) = EmployeeId::parse(id) else {
            return Err(DirectoryError::NotFound(id.to_string()));
        };
        let now = OffsetDateTime::now_utc();
        self.store
            .update(parsed, |employee| {
                employee.flagged = flagged;
                employee.updated_at = now;
                Ok::<(), DirectoryError>(())
            })?
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }
}
