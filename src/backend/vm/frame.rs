//! Invocation frames.
//!
//! Each layout or yielded block runs in its own [`Frame`]. A layout frame
//! carries the [`InvocationContext`] established by the open opcode so that
//! `DidCreateElement` and `ShadowAttributes` later in the same layout see
//! exactly what open produced, without going through the arguments.

use std::rc::Rc;

use crate::backend::args::EvaluatedArgs;
use crate::backend::component::{Component, DefinitionHandle};
use crate::backend::environment::Templates;
use crate::backend::reference::Reference;
use crate::backend::scope::Scope;

/// State established by an open opcode for the rest of its invocation.
#[derive(Debug)]
pub struct InvocationContext {
    pub definition: DefinitionHandle,
    pub component: Component,
    /// Call-site attribute names re-applied after the layout's own attributes
    pub shadow: Vec<String>,
    /// Open-element depth at the call site; the layout's root element sits
    /// above it
    pub element_depth: usize,
}

#[derive(Debug, Default)]
pub struct Frame {
    /// Arguments of the invocation whose layout runs in this frame
    pub(super) args: Option<EvaluatedArgs>,
    /// Set by `PutArgs`, consumed by the next dynamic open
    pub(super) pending_args: Option<EvaluatedArgs>,
    pub(super) dynamic_component: Option<Reference<DefinitionHandle>>,
    pub(super) invocation: Option<Rc<InvocationContext>>,
    pub(super) templates: Templates,
    pub(super) caller_scope: Option<Scope>,
    /// First index of the updating list written while this frame runs
    pub(super) updating_floor: usize,
}

impl Frame {
    pub(super) fn root() -> Self {
        Self::default()
    }

    pub(super) fn for_layout(
        args: EvaluatedArgs,
        invocation: Rc<InvocationContext>,
        templates: Templates,
        caller_scope: Scope,
        updating_floor: usize,
    ) -> Self {
        Self {
            args: Some(args),
            pending_args: None,
            dynamic_component: None,
            invocation: Some(invocation),
            templates,
            caller_scope: Some(caller_scope),
            updating_floor,
        }
    }

    /// Frame for a yielded block, which sees the caller's arguments.
    pub(super) fn for_block(caller_args: Option<EvaluatedArgs>, updating_floor: usize) -> Self {
        Self {
            args: caller_args,
            updating_floor,
            ..Self::default()
        }
    }

    pub fn args(&self) -> Option<&EvaluatedArgs> {
        self.args.as_ref()
    }

    pub fn pending_args(&self) -> Option<&EvaluatedArgs> {
        self.pending_args.as_ref()
    }

    pub fn invocation(&self) -> Option<&Rc<InvocationContext>> {
        self.invocation.as_ref()
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn has_dynamic_component(&self) -> bool {
        self.dynamic_component.is_some()
    }
}
