//! Error conversion between sklad and the MCP wire model.
//!
//! The [`McpErrorExt`] trait converts `sklad_core::Error` into
//! `rmcp::ErrorData` for protocol-level failures. Execution failures of a
//! resolved component are not protocol errors; [`crate::bridge`] turns those
//! into `CallToolResult` values with `is_error` set.

use rmcp::model::ErrorData;
use sklad_core::Error;

/// Extension trait for converting sklad errors to MCP `ErrorData`.
pub trait McpErrorExt {
    /// Convert to an MCP `ErrorData`, with details masked when requested.
    fn to_mcp_error_masked(&self, mask_details: bool) -> ErrorData;

    /// Convert to an MCP `ErrorData` with full details.
    fn to_mcp_error(&self) -> ErrorData {
        self.to_mcp_error_masked(false)
    }
}

impl McpErrorExt for Error {
    fn to_mcp_error_masked(&self, mask_details: bool) -> ErrorData {
        let structured = self.to_structured(mask_details);
        let data = Some(serde_json::json!({ "code": structured.code }));
        match self {
            Error::NotFound { .. } | Error::TaskNotFound { .. } => {
                ErrorData::resource_not_found(structured.message, data)
            }
            Error::InvalidArguments { .. } | Error::ModeViolation { .. } => {
                ErrorData::invalid_params(structured.message, data)
            }
            _ => ErrorData::internal_error(structured.message, data),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
