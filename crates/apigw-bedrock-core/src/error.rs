//! Error types for stack composition, synthesis and the runtime models

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Context value missing or unusable
    E001InvalidContext,
    /// E002: Derived resource name violates provider naming rules
    E002InvalidName,
    /// E003: Resource graph is malformed (cycle, unknown or duplicate node)
    E003InvalidGraph,
    /// E004: Policy document is malformed
    E004InvalidPolicy,
    /// E005: Action denied by the execution role
    E005AccessDenied,
    /// E006: Provisioning lifecycle transition not allowed
    E006InvalidTransition,
    /// E007: Template rendering failed
    E007RenderFailure,
    /// E008: Function runtime environment or object store failure
    E008RuntimeFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidContext => "E001",
            Self::E002InvalidName => "E002",
            Self::E003InvalidGraph => "E003",
            Self::E004InvalidPolicy => "E004",
            Self::E005AccessDenied => "E005",
            Self::E006InvalidTransition => "E006",
            Self::E007RenderFailure => "E007",
            Self::E008RuntimeFailure => "E008",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StackError {
    #[error("[E001] Invalid context value '{field}': {reason}")]
    InvalidContext { field: &'static str, reason: String },

    #[error("[E002] Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("[E003] Resource graph contains a cycle through '{logical_id}'")]
    GraphCycle { logical_id: String },

    #[error("[E003] Duplicate logical id '{logical_id}'")]
    DuplicateResource { logical_id: String },

    #[error("[E003] '{logical_id}' depends on unknown resource '{dependency}'")]
    UnknownDependency {
        logical_id: String,
        dependency: String,
    },

    #[error("[E004] Invalid policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("[E005] {principal} is not authorized to perform: {action} on resource: {resource}")]
    AccessDenied {
        principal: String,
        action: String,
        resource: String,
    },

    #[error("[E006] Cannot {operation} '{logical_id}' while it is {state}")]
    InvalidTransition {
        logical_id: String,
        operation: &'static str,
        state: String,
    },

    #[error("[E007] Failed to render template as {format}: {reason}")]
    Render {
        format: &'static str,
        reason: String,
    },

    #[error("[E008] Object store error: {reason}")]
    Storage { reason: String },

    #[error("[E008] Missing function environment variable '{name}'")]
    MissingEnvironment { name: &'static str },
}

impl StackError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidContext { .. } => ErrorCode::E001InvalidContext,
            Self::InvalidName { .. } => ErrorCode::E002InvalidName,
            Self::GraphCycle { .. }
            | Self::DuplicateResource { .. }
            | Self::UnknownDependency { .. } => ErrorCode::E003InvalidGraph,
            Self::InvalidPolicy { .. } => ErrorCode::E004InvalidPolicy,
            Self::AccessDenied { .. } => ErrorCode::E005AccessDenied,
            Self::InvalidTransition { .. } => ErrorCode::E006InvalidTransition,
            Self::Render { .. } => ErrorCode::E007RenderFailure,
            Self::Storage { .. } | Self::MissingEnvironment { .. } => {
                ErrorCode::E008RuntimeFailure
            }
        }
    }

    pub fn invalid_context(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidContext {
            field,
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn invalid_name(kind: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for StackError
pub type Result<T> = std::result::Result<T, StackError>;
