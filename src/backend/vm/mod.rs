//! Render Virtual Machine
//!
//! The render VM walks compiled opcodes once, building the host tree and, as
//! a side effect, the list of updating opcodes that later update passes walk.
//!
//! This module is organized into submodules by functionality:
//! - `types`: Core type definitions (VmError, VmConfig, ScopeMark)
//! - `frame`: Invocation frames and the per-invocation context
//! - `scope_ops`: Lexical and dynamic scope push/pop discipline
//! - `component_ops`: Component lifecycle opcodes
//! - `dom_ops`: Element, text and yield opcodes
//! - `updating`: The update-pass interpreter and the render result

use std::rc::Rc;

use tracing::trace;

use super::component::{DestroyGuard, DestroyableList};
use super::environment::Environment;
use super::host::{ElementStack, HostTree};
use super::opcodes::{Opcode, UpdatingOpcode};
use super::reference::Reference;
use super::scope::{DynamicScope, Scope};
use super::value::Value;

// === Submodules ===

mod component_ops;
mod dom_ops;
mod frame;
mod scope_ops;
mod types;
mod updating;


// === Re-exports ===

pub use frame::{Frame, InvocationContext};
pub use types::{ScopeMark, VmConfig, VmError, VmResult};
pub use updating::{RenderResult, UpdatingVm};

// === RenderVm Struct ===

/// The render interpreter.
pub struct RenderVm {
    pub(super) env: Rc<dyn Environment>,

    /// Element building state and the host tree under construction
    pub(super) elements: ElementStack,

    /// Lexical scopes; index 0 is the root scope and is never popped
    pub(super) scopes: Vec<Scope>,

    /// Dynamic scopes; index 0 is the root scope and is never popped
    pub(super) dynamic_scopes: Vec<DynamicScope>,

    /// Frames for the root program, layouts and yielded blocks
    pub(super) frames: Vec<Frame>,

    /// One mark per open, unclosed invocation
    pub(super) invocations: Vec<ScopeMark>,

    /// Updating opcodes produced so far, in open order
    pub(super) updating: Vec<UpdatingOpcode>,

    /// Release actions registered by opened components
    pub(super) destroyables: DestroyableList,

    pub(super) config: VmConfig,
}

impl std::fmt::Debug for RenderVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderVm")
            .field("scopes", &self.scopes.len())
            .field("dynamic_scopes", &self.dynamic_scopes.len())
            .field("frames", &self.frames.len())
            .field("invocations", &self.invocations.len())
            .field("updating", &self.updating.len())
            .field("destroyables", &self.destroyables.len())
            .finish()
    }
}

impl RenderVm {
    // === Constructors ===

    /// Create a VM rendering into a fresh host tree with `self_ref` as the
    /// root `self`.
    pub fn new(env: Rc<dyn Environment>, self_ref: Reference<Value>) -> Self {
        Self::with_config(env, self_ref, VmConfig::default())
    }

    /// Create a VM with custom configuration
    pub fn with_config(env: Rc<dyn Environment>, self_ref: Reference<Value>, config: VmConfig) -> Self {
        Self {
            env,
            elements: ElementStack::new(HostTree::new()),
            scopes: vec![Scope::root(self_ref, 0)],
            dynamic_scopes: vec![DynamicScope::new()],
            frames: vec![Frame::root()],
            invocations: Vec::new(),
            updating: Vec::new(),
            destroyables: DestroyableList::default(),
            config,
        }
    }

    /// Use `scope` as the root dynamic scope.
    pub fn with_dynamic_scope(mut self, scope: DynamicScope) -> Self {
        self.dynamic_scopes = vec![scope];
        self
    }

    // === Accessors ===

    pub fn env(&self) -> &Rc<dyn Environment> {
        &self.env
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Current lexical scope.
    pub fn scope(&self) -> &Scope {
        // The root scope is never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Current dynamic scope.
    pub fn dynamic_scope(&self) -> &DynamicScope {
        &self.dynamic_scopes[self.dynamic_scopes.len() - 1]
    }

    /// Current frame.
    pub fn frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    pub(super) fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn dynamic_scope_depth(&self) -> usize {
        self.dynamic_scopes.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn open_invocations(&self) -> usize {
        self.invocations.len()
    }

    pub fn elements(&self) -> &ElementStack {
        &self.elements
    }

    pub fn tree(&self) -> &HostTree {
        self.elements.tree()
    }

    pub fn updating_opcodes(&self) -> &[UpdatingOpcode] {
        &self.updating
    }

    pub fn destroyable_count(&self) -> usize {
        self.destroyables.len()
    }

    // === Execution Methods ===

    /// Execute a single opcode.
    pub fn execute(&mut self, opcode: &Opcode) -> VmResult<()> {
        if self.config.trace {
            trace!(target: "rendervm::vm::step", opcode = %opcode.to_json(), scope_depth = self.scopes.len());
        }

        match opcode {
            // Invocation setup
            Opcode::PutArgs { args, .. } => self.op_put_args(args),
            Opcode::PutComponentDefinition { factory, .. } => {
                self.op_put_component_definition(factory)
            }

            // Component lifecycle
            Opcode::OpenComponent {
                definition,
                args,
                shadow,
                templates,
                ..
            } => self.op_open_component(definition, args, shadow, templates),
            Opcode::OpenDynamicComponent {
                shadow, templates, ..
            } => self.op_open_dynamic_component(shadow, templates),
            Opcode::DidCreateElement { .. } => self.op_did_create_element(),
            Opcode::ShadowAttributes { .. } => self.op_shadow_attributes(),
            Opcode::CloseComponent { .. } => self.op_close_component(),

            // Element building
            Opcode::OpenElement { tag, .. } => {
                self.op_open_element(tag);
                Ok(())
            }
            Opcode::StaticAttr { name, value, .. } => self.op_static_attr(name, value),
            Opcode::DynamicAttr { name, value, .. } => self.op_dynamic_attr(name, value),
            Opcode::FlushElement { .. } => self.op_flush_element(),
            Opcode::CloseElement { .. } => self.op_close_element(),
            Opcode::Text { text, .. } => {
                self.op_text(text);
                Ok(())
            }
            Opcode::DynamicContent { value, .. } => self.op_dynamic_content(value),
            Opcode::Yield { block, .. } => self.op_yield(*block),
        }
    }

    /// Execute opcodes in order, stopping at the first error.
    pub fn execute_block(&mut self, opcodes: &[Opcode]) -> VmResult<()> {
        for opcode in opcodes {
            self.execute(opcode)?;
        }
        Ok(())
    }

    /// Run a whole program and hand over the host tree, the updating opcodes
    /// and the registered destructors.
    ///
    /// On error the VM is dropped, which runs every destructor registered
    /// so far; the partial scope state is discarded.
    pub fn render(mut self, program: &[Opcode]) -> VmResult<RenderResult> {
        self.execute_block(program)?;

        if !self.invocations.is_empty() {
            return Err(VmError::UnclosedInvocations(self.invocations.len()));
        }

        trace!(
            target: "rendervm::vm::render",
            updating = self.updating.len(),
            destroyables = self.destroyables.len(),
            "render complete"
        );

        Ok(RenderResult::new(
            self.env,
            self.elements.into_tree(),
            self.updating,
            self.destroyables,
        ))
    }

    // === Shared Helpers ===

    pub(super) fn register_destructor(&mut self, guard: DestroyGuard) {
        self.destroyables.push(guard);
    }
}
