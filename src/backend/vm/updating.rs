//! Update passes.
//!
//! [`UpdatingVm`] walks the updating opcodes a render produced, in open
//! order. [`RenderResult`] owns everything a finished render hands over and
//! drives repeated passes until it is destroyed.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::backend::component::DestroyableList;
use crate::backend::environment::Environment;
use crate::backend::host::HostTree;
use crate::backend::opcodes::{OpcodeJson, UpdatingOpcode};
use crate::backend::reference::Validation;

use super::dom_ops::apply_attribute;
use super::types::{VmError, VmResult};

/// Interpreter for one update pass.
pub struct UpdatingVm<'a> {
    env: &'a dyn Environment,
    tree: &'a mut HostTree,
}

impl<'a> UpdatingVm<'a> {
    pub fn new(env: &'a dyn Environment, tree: &'a mut HostTree) -> Self {
        Self { env, tree }
    }

    /// Run every opcode once, stopping at the first error.
    pub fn execute(&mut self, opcodes: &mut [UpdatingOpcode]) -> VmResult<()> {
        for opcode in opcodes.iter_mut() {
            self.evaluate(opcode)?;
        }
        Ok(())
    }

    fn evaluate(&mut self, opcode: &mut UpdatingOpcode) -> VmResult<()> {
        match opcode {
            UpdatingOpcode::UpdateComponent {
                name,
                component,
                manager,
                args,
                dynamic_scope,
                ..
            } => {
                trace!(target: "rendervm::vm::update", component = %name, "update component");
                manager.update(component, args, dynamic_scope)?;
                self.env.did_update(component, manager);
            }
            UpdatingOpcode::Assert {
                expected, cache, ..
            } => {
                cache.revalidate();
                let found = cache.peek();
                if found != *expected {
                    return Err(VmError::DynamicIdentityChanged {
                        expected: expected.name.clone(),
                        found: found.name.clone(),
                    });
                }
            }
            UpdatingOpcode::UpdateAttribute {
                element,
                name,
                cache,
                ..
            } => {
                if let Validation::Modified(value) = cache.revalidate() {
                    trace!(target: "rendervm::vm::update", element = *element, name = %name, value = %value, "update attribute");
                    apply_attribute(self.tree, *element, name, &value);
                }
            }
            UpdatingOpcode::UpdateText { node, cache, .. } => {
                if let Validation::Modified(value) = cache.revalidate() {
                    self.tree.set_text(*node, &value.to_string());
                }
            }
        }
        Ok(())
    }
}

/// Output of a completed render: the host tree, the updating program and
/// the destructors of every component still alive.
///
/// Dropping the result destroys the components, innermost first.
pub struct RenderResult {
    env: Rc<dyn Environment>,
    tree: HostTree,
    updating: Vec<UpdatingOpcode>,
    destroyables: DestroyableList,
    passes: usize,
}

impl std::fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResult")
            .field("nodes", &self.tree.len())
            .field("updating", &self.updating.len())
            .field("destroyables", &self.destroyables.len())
            .field("passes", &self.passes)
            .finish()
    }
}

impl RenderResult {
    pub(super) fn new(
        env: Rc<dyn Environment>,
        tree: HostTree,
        updating: Vec<UpdatingOpcode>,
        destroyables: DestroyableList,
    ) -> Self {
        Self {
            env,
            tree,
            updating,
            destroyables,
            passes: 0,
        }
    }

    /// Run one update pass over the updating opcodes.
    pub fn rerender(&mut self) -> VmResult<()> {
        let mut vm = UpdatingVm::new(&*self.env, &mut self.tree);
        vm.execute(&mut self.updating)?;
        self.passes += 1;
        debug!(target: "rendervm::vm::update", pass = self.passes, opcodes = self.updating.len(), "update pass complete");
        Ok(())
    }

    pub fn tree(&self) -> &HostTree {
        &self.tree
    }

    pub fn to_html(&self) -> String {
        self.tree.to_html()
    }

    pub fn updating_opcodes(&self) -> &[UpdatingOpcode] {
        &self.updating
    }

    /// Structured dump of the updating program.
    pub fn dump_updating(&self) -> Vec<OpcodeJson> {
        self.updating.iter().map(UpdatingOpcode::to_json).collect()
    }

    /// The updating program dump as a JSON array.
    pub fn dump_updating_json(&self) -> String {
        serde_json::to_string(&self.dump_updating()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Completed update passes.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn destroyable_count(&self) -> usize {
        self.destroyables.len()
    }

    /// Destroy every component now, innermost first, and drop the updating
    /// program.
    pub fn destroy(mut self) {
        debug!(target: "rendervm::vm::render", components = self.destroyables.len(), "destroy render");
        self.destroyables.destroy_all();
    }
}
