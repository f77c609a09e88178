//! Assembly Errors
//!
//! Client-visible failure vocabulary of the assembly service. Expected empty
//! results (no associations, empty intersections, directory "not found")
//! never become one of these; they are folded into zero-member outcomes where
//! they occur.

use thiserror::Error;

use crate::bus::BusError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("{kind} '{id}' was not found")]
    ResourceNotFound { kind: &'static str, id: String },

    #[error("the property '{0}' is a required property and must be included in the request")]
    PropertyMissing(String),

    #[error("the property '{0}' is not in the list of valid properties for the resource")]
    PropertyUnknown(String),

    #[error("the value '{value}' for the property '{property}' is not a format that the property can accept")]
    PropertyValueFormatError { value: String, property: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AssemblyError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn format_error(value: &serde_json::Value, property: impl Into<String>) -> Self {
        Self::PropertyValueFormatError {
            value: value.to_string(),
            property: property.into(),
        }
    }

    /// Whether the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AssemblyError::Internal(_))
    }

    /// Redfish Base registry message name.
    pub fn message_id(&self) -> &'static str {
        match self {
            AssemblyError::ResourceNotFound { .. } => "ResourceNotFound",
            AssemblyError::PropertyMissing(_) => "PropertyMissing",
            AssemblyError::PropertyUnknown(_) => "PropertyUnknown",
            AssemblyError::PropertyValueFormatError { .. } => "PropertyValueFormatError",
            AssemblyError::Internal(_) => "InternalError",
        }
    }

    /// Arguments of the registry message, in registry order.
    pub fn message_args(&self) -> Vec<String> {
        match self {
            AssemblyError::ResourceNotFound { kind, id } => vec![kind.to_string(), id.clone()],
            AssemblyError::PropertyMissing(p) | AssemblyError::PropertyUnknown(p) => vec![p.clone()],
            AssemblyError::PropertyValueFormatError { value, property } => vec![value.clone(), property.clone()],
            AssemblyError::Internal(_) => Vec::new(),
        }
    }
}

impl From<BusError> for AssemblyError {
    fn from(err: BusError) -> Self {
        AssemblyError::Internal(err.to_string())
    }
}

pub type AssemblyResult<T> = std::result::Result<T, AssemblyError>;
