//! Element, text and yield operations for the render VM.
//!
//! Values coming from volatile references are written once during render
//! and register an updating opcode that re-applies them when they change.

use tracing::trace;

use crate::backend::args::Expression;
use crate::backend::environment::BlockKind;
use crate::backend::host::NodeId;
use crate::backend::opcodes::UpdatingOpcode;
use crate::backend::reference::{Reference, ReferenceCache};
use crate::backend::value::Value;

use super::frame::Frame;
use super::types::{VmError, VmResult};
use super::RenderVm;

/// Write `value` as attribute `name`, removing the attribute for `Null`.
pub(super) fn apply_attribute(
    tree: &mut crate::backend::host::HostTree,
    element: NodeId,
    name: &str,
    value: &Value,
) {
    if value.is_null() {
        tree.remove_attribute(element, name);
    } else {
        tree.set_attribute(element, name, &value.to_string());
    }
}

impl RenderVm {
    // === Element Operations ===

    pub(super) fn op_open_element(&mut self, tag: &str) {
        let id = self.elements.open_element(tag);
        trace!(target: "rendervm::vm::dom", tag, id, "open element");
    }

    pub(super) fn op_static_attr(&mut self, name: &str, value: &str) -> VmResult<()> {
        let element = self
            .elements
            .element()
            .ok_or(VmError::NoCurrentElement("static-attr"))?;
        self.elements.tree_mut().set_attribute(element, name, value);
        Ok(())
    }

    pub(super) fn op_dynamic_attr(&mut self, name: &str, value: &Expression) -> VmResult<()> {
        let reference = value.evaluate(self)?;
        self.set_dynamic_attribute(name, reference, "dynamic-attr")
    }

    /// Apply a reference as an attribute of the current element, registering
    /// an `UpdateAttribute` when the reference is volatile.
    ///
    /// The last writer of an attribute owns it: an earlier `UpdateAttribute`
    /// for the same element and name is dropped, so a shadowed call-site
    /// value keeps winning over the layout's own on every update pass.
    pub(super) fn set_dynamic_attribute(
        &mut self,
        name: &str,
        reference: Reference<Value>,
        opcode: &'static str,
    ) -> VmResult<()> {
        let element = self
            .elements
            .element()
            .ok_or(VmError::NoCurrentElement(opcode))?;
        self.release_attribute(element, name);

        let value = match ReferenceCache::for_reference(&reference) {
            Some(mut cache) => {
                let value = cache.peek();
                self.updating
                    .push(UpdatingOpcode::update_attribute(element, name, cache));
                value
            }
            None => reference.value(),
        };
        apply_attribute(self.elements.tree_mut(), element, name, &value);
        trace!(target: "rendervm::vm::dom", element, name, value = %value, "set attribute");
        Ok(())
    }

    /// Drop updating opcodes that write `name` on `element`. Only the running
    /// frame's range is searched; enclosing splice slots must not shift.
    fn release_attribute(&mut self, element: NodeId, name: &str) {
        let floor = self.frame().updating_floor.min(self.updating.len());
        let before = self.updating.len();
        let mut index = floor;
        while index < self.updating.len() {
            let owned = matches!(
                &self.updating[index],
                UpdatingOpcode::UpdateAttribute { element: e, name: n, .. }
                    if *e == element && n == name
            );
            if owned {
                self.updating.remove(index);
            } else {
                index += 1;
            }
        }
        if self.updating.len() != before {
            trace!(target: "rendervm::vm::dom", element, name, "attribute writer replaced");
        }
    }

    pub(super) fn op_flush_element(&mut self) -> VmResult<()> {
        if self.elements.constructing().is_none() {
            return Err(VmError::NoCurrentElement("flush-element"));
        }
        self.elements.flush_element();
        Ok(())
    }

    pub(super) fn op_close_element(&mut self) -> VmResult<()> {
        self.elements
            .close_element()
            .map(|_| ())
            .ok_or(VmError::NoCurrentElement("close-element"))
    }

    // === Content Operations ===

    pub(super) fn op_text(&mut self, text: &str) {
        self.elements.append_text(text);
    }

    pub(super) fn op_dynamic_content(&mut self, value: &Expression) -> VmResult<()> {
        let reference = value.evaluate(self)?;
        match ReferenceCache::for_reference(&reference) {
            Some(mut cache) => {
                let text = cache.peek().to_string();
                let node = self.elements.append_text(&text);
                self.updating.push(UpdatingOpcode::update_text(node, cache));
            }
            None => {
                self.elements.append_text(&reference.value().to_string());
            }
        }
        Ok(())
    }

    // === Yield ===

    /// Run the caller's template in the caller's lexical scope, with the
    /// caller's named arguments. A missing template renders nothing.
    pub(super) fn op_yield(&mut self, kind: BlockKind) -> VmResult<()> {
        let frame = self.frame();
        let Some(block) = frame.templates.get(kind).cloned() else {
            return Ok(());
        };
        let caller_scope = frame.caller_scope.clone().ok_or(VmError::NoCallerScope)?;
        let floor = frame.updating_floor;
        // The caller's frame sits directly below the layout frame.
        let caller_args = self
            .frames
            .iter()
            .rev()
            .nth(1)
            .and_then(|caller| caller.args.clone());

        trace!(target: "rendervm::vm::dom", block = kind.as_str(), "yield");
        self.push_scope(caller_scope)?;
        if let Err(err) = self.push_frame(Frame::for_block(caller_args, floor)) {
            self.scopes.pop();
            return Err(err);
        }
        let result = self.execute_block(&block.opcodes);
        self.pop_frame();
        self.pop_scope()?;
        result
    }
}
