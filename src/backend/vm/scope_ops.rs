//! Scope and frame stack operations for the render VM.
//!
//! Both scope stacks keep their root entry for the lifetime of the VM;
//! popping it is a stack-discipline violation, as is growing past the
//! configured depth.

use tracing::trace;

use crate::backend::reference::Reference;
use crate::backend::scope::Scope;
use crate::backend::value::Value;

use super::frame::Frame;
use super::types::{ScopeMark, VmError, VmResult};
use super::RenderVm;

impl RenderVm {
    // === Scope Operations ===

    pub(super) fn scope_mark(&self) -> ScopeMark {
        ScopeMark {
            lexical: self.scopes.len(),
            dynamic: self.dynamic_scopes.len(),
        }
    }

    /// Push a child of the current dynamic scope.
    pub fn push_dynamic_scope(&mut self) -> VmResult<()> {
        if self.dynamic_scopes.len() >= self.config.max_scope_depth {
            return Err(VmError::StackOverflow {
                stack: "dynamic scope",
                limit: self.config.max_scope_depth,
            });
        }
        let child = self.dynamic_scope().child();
        self.dynamic_scopes.push(child);
        trace!(target: "rendervm::vm::scope", depth = self.dynamic_scopes.len(), "push dynamic scope");
        Ok(())
    }

    pub fn pop_dynamic_scope(&mut self) -> VmResult<()> {
        if self.dynamic_scopes.len() <= 1 {
            return Err(VmError::ScopeUnderflow("dynamic"));
        }
        self.dynamic_scopes.pop();
        trace!(target: "rendervm::vm::scope", depth = self.dynamic_scopes.len(), "pop dynamic scope");
        Ok(())
    }

    /// Push a lexical scope rooted at `self_ref` with `symbols` further slots.
    pub fn push_root_scope(&mut self, self_ref: Reference<Value>, symbols: usize) -> VmResult<()> {
        self.push_scope(Scope::root(self_ref, symbols))
    }

    pub(super) fn push_scope(&mut self, scope: Scope) -> VmResult<()> {
        if self.scopes.len() >= self.config.max_scope_depth {
            return Err(VmError::StackOverflow {
                stack: "lexical scope",
                limit: self.config.max_scope_depth,
            });
        }
        self.scopes.push(scope);
        trace!(target: "rendervm::vm::scope", depth = self.scopes.len(), "push scope");
        Ok(())
    }

    pub fn pop_scope(&mut self) -> VmResult<()> {
        if self.scopes.len() <= 1 {
            return Err(VmError::ScopeUnderflow("lexical"));
        }
        self.scopes.pop();
        trace!(target: "rendervm::vm::scope", depth = self.scopes.len(), "pop scope");
        Ok(())
    }

    // === Frame Operations ===

    pub(super) fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        if self.frames.len() >= self.config.max_frame_depth {
            return Err(VmError::StackOverflow {
                stack: "frame",
                limit: self.config.max_frame_depth,
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(super) fn pop_frame(&mut self) {
        // The root frame stays for the lifetime of the VM.
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}
