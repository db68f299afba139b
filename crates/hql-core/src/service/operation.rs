//! Operation lifecycle: states, handles, fetch orientations.

use super::schema::{RowSet, TableSchema};
use crate::{OperationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Initialized,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
    Unknown,
    Pending,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Initialized => "INITIALIZED",
            OperationState::Running => "RUNNING",
            OperationState::Finished => "FINISHED",
            OperationState::Canceled => "CANCELED",
            OperationState::Closed => "CLOSED",
            OperationState::Error => "ERROR",
            OperationState::Unknown => "UKNOWN",
            OperationState::Pending => "PENDING",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        match self {
            Initialized => matches!(next, Pending | Running | Canceled | Closed),
            Pending => matches!(next, Running | Finished | Canceled | Error | Closed),
            Running => matches!(next, Finished | Canceled | Error | Closed),
            Finished | Canceled | Error => next == Closed,
            Closed | Unknown => false,
        }
    }

    /// Check a transition, failing with the offending pair.
    pub fn validate_transition(&self, next: OperationState) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(OperationError::IllegalStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            }
            .into())
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Finished
                | OperationState::Canceled
                | OperationState::Closed
                | OperationState::Error
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    ExecuteStatement,
    GetTypeInfo,
    GetCatalogs,
    GetSchemas,
    GetTables,
    GetTableTypes,
    GetColumns,
    GetFunctions,
    Unknown,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::ExecuteStatement => "EXECUTE_STATEMENT",
            OperationType::GetTypeInfo => "GET_TYPE_INFO",
            OperationType::GetCatalogs => "GET_CATALOGS",
            OperationType::GetSchemas => "GET_SCHEMAS",
            OperationType::GetTables => "GET_TABLES",
            OperationType::GetTableTypes => "GET_TABLE_TYPES",
            OperationType::GetColumns => "GET_COLUMNS",
            OperationType::GetFunctions => "GET_FUNCTIONS",
            OperationType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchOrientation {
    FetchNext,
    FetchPrior,
    FetchRelative,
    FetchAbsolute,
    FetchFirst,
    FetchLast,
}

impl FetchOrientation {
    /// Orientations every result set supports.
    pub const DEFAULT_SET: [FetchOrientation; 2] =
        [FetchOrientation::FetchNext, FetchOrientation::FetchFirst];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOrientation::FetchNext => "FETCH_NEXT",
            FetchOrientation::FetchPrior => "FETCH_PRIOR",
            FetchOrientation::FetchRelative => "FETCH_RELATIVE",
            FetchOrientation::FetchAbsolute => "FETCH_ABSOLUTE",
            FetchOrientation::FetchFirst => "FETCH_FIRST",
            FetchOrientation::FetchLast => "FETCH_LAST",
        }
    }
}

impl fmt::Display for FetchOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one operation within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle {
    pub id: Uuid,
    pub operation_type: OperationType,
    pub has_result_set: bool,
}

impl OperationHandle {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type,
            has_result_set: true,
        }
    }
}

/// State shared by every operation.
#[derive(Debug)]
pub struct OperationBase {
    handle: OperationHandle,
    state: OperationState,
}

impl OperationBase {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            handle: OperationHandle::new(operation_type),
            state: OperationState::Initialized,
        }
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn set_state(&mut self, next: OperationState) -> Result<()> {
        self.state.validate_transition(next)?;
        debug!(
            operation = %self.handle.id,
            operation_type = %self.handle.operation_type,
            from = %self.state,
            to = %next,
            "Operation state change"
        );
        self.state = next;
        Ok(())
    }

    pub fn assert_state(&self, expected: OperationState) -> Result<()> {
        if self.state != expected {
            return Err(OperationError::UnexpectedState {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Accept only the orientations every result set supports.
    pub fn validate_default_fetch_orientation(&self, orientation: FetchOrientation) -> Result<()> {
        if !FetchOrientation::DEFAULT_SET.contains(&orientation) {
            return Err(OperationError::UnsupportedFetchOrientation(orientation.to_string()).into());
        }
        Ok(())
    }
}

/// A client operation producing a result set.
pub trait Operation: Send {
    fn base(&self) -> &OperationBase;
    fn base_mut(&mut self) -> &mut OperationBase;

    /// Execute the operation and materialize its result set.
    fn run(&mut self) -> Result<()>;

    /// Result schema; the operation must have finished.
    fn result_set_schema(&self) -> Result<TableSchema>;

    /// Next rows of the result set; the operation must have finished.
    fn next_row_set(&mut self, orientation: FetchOrientation, max_rows: usize) -> Result<RowSet>;

    fn handle(&self) -> &OperationHandle {
        self.base().handle()
    }

    fn state(&self) -> OperationState {
        self.base().state()
    }

    fn cancel(&mut self) -> Result<()> {
        self.base_mut().set_state(OperationState::Canceled)
    }

    fn close(&mut self) -> Result<()> {
        self.base_mut().set_state(OperationState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use OperationState::*;
        assert!(Initialized.can_transition_to(Running));
        assert!(Running.can_transition_to(Finished));
        assert!(Running.can_transition_to(Error));
        assert!(Finished.can_transition_to(Closed));
        assert!(Pending.can_transition_to(Running));
        assert!(!Finished.can_transition_to(Running));
        assert!(!Closed.can_transition_to(Running));
        assert!(!Initialized.can_transition_to(Finished));

        let err = Closed.validate_transition(Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation error: Illegal Operation state transition from CLOSED to RUNNING"
        );
    }

    #[test]
    fn test_operation_base() {
        let mut base = OperationBase::new(OperationType::GetTableTypes);
        assert_eq!(base.state(), OperationState::Initialized);
        assert!(base.assert_state(OperationState::Finished).is_err());

        base.set_state(OperationState::Running).unwrap();
        base.set_state(OperationState::Finished).unwrap();
        base.assert_state(OperationState::Finished).unwrap();
        assert!(base.set_state(OperationState::Running).is_err());
        assert_eq!(base.handle().operation_type, OperationType::GetTableTypes);
    }

    #[test]
    fn test_fetch_orientation_validation() {
        let base = OperationBase::new(OperationType::GetSchemas);
        base.validate_default_fetch_orientation(FetchOrientation::FetchNext)
            .unwrap();
        base.validate_default_fetch_orientation(FetchOrientation::FetchFirst)
            .unwrap();
        let err = base
            .validate_default_fetch_orientation(FetchOrientation::FetchPrior)
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("The fetch type FETCH_PRIOR is not supported for this resultset"));
    }

    #[test]
    fn test_handles_are_unique() {
        let a = OperationHandle::new(OperationType::GetTables);
        let b = OperationHandle::new(OperationType::GetTables);
        assert_ne!(a.id, b.id);
    }
}
