//! Type definitions for the render VM.
//!
//! - VmError: Error types that can occur during render or update passes
//! - VmConfig: VM configuration options
//! - ScopeMark: Scope depths recorded when an invocation opens

use serde::Deserialize;

/// Result of VM execution
pub type VmResult<T> = Result<T, VmError>;

/// Errors that can occur during render or update passes.
///
/// None of these are recovered inside the VM; they propagate to whoever
/// drives the pass.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// Manager returned an inconsistent instance
    ManagerContract { component: String, reason: String },
    /// Failure raised from inside a manager hook
    Manager(String),
    /// A dynamic component resolved to a different definition on update
    DynamicIdentityChanged { expected: String, found: String },
    /// Pop on a scope stack holding only its root
    ScopeUnderflow(&'static str),
    /// Scope or frame stack grew past the configured limit
    StackOverflow { stack: &'static str, limit: usize },
    /// Scope depths after a close differ from those before the matching open
    UnbalancedScopes {
        expected_lexical: usize,
        found_lexical: usize,
        expected_dynamic: usize,
        found_dynamic: usize,
    },
    /// Close without a matching open
    UnmatchedClose,
    /// Render finished with invocations still open
    UnclosedInvocations(usize),
    /// Opcode needs an invocation context but runs outside a layout
    NoInvocation(&'static str),
    /// Dynamic invocation without pending arguments
    NoPendingArgs,
    /// Dynamic invocation without a pending definition reference
    NoDynamicComponent,
    /// Element opcode with no element open
    NoCurrentElement(&'static str),
    /// Yield outside a layout
    NoCallerScope,
    /// Lexical symbol with no binding
    UnknownSymbol(usize),
    /// Layout resolution failed
    Layout(String),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManagerContract { component, reason } => {
                write!(f, "Manager contract violated by '{}': {}", component, reason)
            }
            Self::Manager(msg) => write!(f, "Component manager error: {}", msg),
            Self::DynamicIdentityChanged { expected, found } => write!(
                f,
                "Dynamic component changed identity from '{}' to '{}'",
                expected, found
            ),
            Self::ScopeUnderflow(stack) => write!(f, "{} scope stack underflow", stack),
            Self::StackOverflow { stack, limit } => {
                write!(f, "{} stack overflow (limit {})", stack, limit)
            }
            Self::UnbalancedScopes {
                expected_lexical,
                found_lexical,
                expected_dynamic,
                found_dynamic,
            } => write!(
                f,
                "Unbalanced scopes at close: lexical {} (expected {}), dynamic {} (expected {})",
                found_lexical, expected_lexical, found_dynamic, expected_dynamic
            ),
            Self::UnmatchedClose => write!(f, "Close component without matching open"),
            Self::UnclosedInvocations(n) => write!(f, "{} component invocation(s) left open", n),
            Self::NoInvocation(op) => write!(f, "{} executed outside a component invocation", op),
            Self::NoPendingArgs => write!(f, "No pending arguments for dynamic component"),
            Self::NoDynamicComponent => write!(f, "No pending dynamic component definition"),
            Self::NoCurrentElement(op) => write!(f, "{} executed with no open element", op),
            Self::NoCallerScope => write!(f, "Yield executed outside a component layout"),
            Self::UnknownSymbol(symbol) => write!(f, "Unknown symbol: {}", symbol),
            Self::Layout(msg) => write!(f, "Layout error: {}", msg),
        }
    }
}

impl std::error::Error for VmError {}

/// Configuration for the VM
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum lexical and dynamic scope depth
    pub max_scope_depth: usize,
    /// Maximum frame depth (layout and block nesting)
    pub max_frame_depth: usize,
    /// Log every executed opcode with its dump
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_scope_depth: 1024,
            max_frame_depth: 512,
            trace: false,
        }
    }
}

/// Scope depths captured before an invocation pushes its scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeMark {
    pub lexical: usize,
    pub dynamic: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: VmConfig = toml::from_str("trace = true").expect("valid toml");
        assert!(config.trace);
        assert_eq!(config.max_scope_depth, 1024);
        assert_eq!(config.max_frame_depth, 512);
    }

    #[test]
    fn test_error_display() {
        let err = VmError::DynamicIdentityChanged {
            expected: "a".into(),
            found: "b".into(),
        };
        assert_eq!(
            err.to_string(),
            "Dynamic component changed identity from 'a' to 'b'"
        );
    }
}
