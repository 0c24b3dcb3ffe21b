//! Component lifecycle operations for the render VM.
//!
//! An invocation is `[PutArgs, PutComponentDefinition,] Open*` ... `Close`.
//! Open pushes a dynamic scope and a lexical scope, creates the component,
//! runs its layout to completion and registers the updating opcodes that
//! keep it alive across update passes. Close pops both scopes and checks
//! that the depths match what they were before Open.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::backend::args::{CompiledArgs, EvaluatedArgs};
use crate::backend::component::{DefinitionHandle, DestroyGuard};
use crate::backend::environment::{Layout, Templates};
use crate::backend::opcodes::{DynamicComponentFactory, UpdatingOpcode};
use crate::backend::reference::{Reference, ReferenceCache};
use crate::backend::scope::Scope;
use crate::backend::value::Value;

use super::frame::{Frame, InvocationContext};
use super::types::{ScopeMark, VmError, VmResult};
use super::RenderVm;

impl RenderVm {
    // === Invocation Setup ===

    pub(super) fn op_put_args(&mut self, args: &CompiledArgs) -> VmResult<()> {
        let evaluated = args.evaluate(self)?;
        trace!(target: "rendervm::vm::component", named = evaluated.named.len(), "put args");
        self.frame_mut().pending_args = Some(evaluated);
        Ok(())
    }

    pub(super) fn op_put_component_definition(
        &mut self,
        factory: &DynamicComponentFactory,
    ) -> VmResult<()> {
        let args = self
            .frame()
            .pending_args
            .clone()
            .unwrap_or_else(EvaluatedArgs::empty);
        let reference = factory.call(&args, self)?;
        trace!(
            target: "rendervm::vm::component",
            constant = reference.is_const(),
            "put component definition"
        );
        self.frame_mut().dynamic_component = Some(reference);
        Ok(())
    }

    // === Open ===

    pub(super) fn op_open_component(
        &mut self,
        definition: &DefinitionHandle,
        args: &CompiledArgs,
        shadow: &[String],
        templates: &Templates,
    ) -> VmResult<()> {
        let mark = self.scope_mark();
        self.push_dynamic_scope()?;

        let args = args.evaluate(self)?;
        self.invoke_component(definition.clone(), args, shadow, templates, None, mark)
    }

    pub(super) fn op_open_dynamic_component(
        &mut self,
        shadow: &[String],
        templates: &Templates,
    ) -> VmResult<()> {
        let mark = self.scope_mark();
        self.push_dynamic_scope()?;

        let args = self
            .frame_mut()
            .pending_args
            .take()
            .ok_or(VmError::NoPendingArgs)?;
        let definition_ref = self
            .frame_mut()
            .dynamic_component
            .take()
            .ok_or(VmError::NoDynamicComponent)?;

        let (definition, cache) = match definition_ref {
            Reference::Const(definition) => (definition, None),
            Reference::Volatile(source) => {
                let mut cache = ReferenceCache::new(source);
                (cache.peek(), Some(cache))
            }
        };

        self.invoke_component(definition, args, shadow, templates, cache, mark)
    }

    /// Shared tail of both open opcodes. The dynamic scope is already pushed.
    fn invoke_component(
        &mut self,
        definition: DefinitionHandle,
        args: EvaluatedArgs,
        shadow: &[String],
        templates: &Templates,
        cache: Option<ReferenceCache<DefinitionHandle>>,
        mark: ScopeMark,
    ) -> VmResult<()> {
        let name = definition.name.clone();
        let dynamic_scope = self.dynamic_scope().clone();
        let manager = definition.manager();

        let component = manager.create(&definition, &args, &dynamic_scope)?;
        let self_ref = manager
            .get_self(&component)
            .ok_or_else(|| VmError::ManagerContract {
                component: name.clone(),
                reason: "no self reference".to_string(),
            })?;
        if let Some(destructor) = manager.get_destructor(&component) {
            self.register_destructor(DestroyGuard::new(name.as_str(), destructor));
        }

        let caller_scope = self.scope().clone();
        let invocation = Rc::new(InvocationContext {
            definition: definition.clone(),
            component: Rc::clone(&component),
            shadow: shadow.to_vec(),
            element_depth: self.elements.depth(),
        });

        let layout = self.env.layout_for(&definition)?;

        // Opcodes produced by the layout land after this invocation's own.
        let slot = self.updating.len();

        self.push_root_scope(self_ref, layout.symbols)?;
        self.invocations.push(mark);
        debug!(
            target: "rendervm::vm::component",
            component = %name,
            dynamic = cache.is_some(),
            shadow = shadow.len(),
            "open component"
        );

        self.invoke_layout(&layout, args.clone(), invocation, templates, caller_scope, slot)?;
        self.env.did_create(&component, &manager);

        let mut registered = Vec::with_capacity(2);
        if let Some(cache) = cache {
            registered.push(UpdatingOpcode::assert(definition, cache));
        }
        registered.push(UpdatingOpcode::update_component(
            name,
            component,
            manager,
            args,
            dynamic_scope,
        ));
        self.updating.splice(slot..slot, registered);
        Ok(())
    }

    /// Run a layout body in its own frame.
    fn invoke_layout(
        &mut self,
        layout: &Rc<Layout>,
        args: EvaluatedArgs,
        invocation: Rc<InvocationContext>,
        templates: &Templates,
        caller_scope: Scope,
        updating_floor: usize,
    ) -> VmResult<()> {
        self.push_frame(Frame::for_layout(
            args,
            invocation,
            templates.clone(),
            caller_scope,
            updating_floor,
        ))?;
        let result = self.execute_block(&layout.body);
        self.pop_frame();
        result
    }

    // === Element Hooks ===

    pub(super) fn op_did_create_element(&mut self) -> VmResult<()> {
        let invocation = self
            .frame()
            .invocation
            .clone()
            .ok_or(VmError::NoInvocation("did-create-element"))?;
        self.require_root_element(&invocation, "did-create-element")?;
        let manager = invocation.definition.manager();

        let mut operations = self
            .elements
            .operations()
            .ok_or(VmError::NoCurrentElement("did-create-element"))?;
        let element = operations.element();
        trace!(target: "rendervm::vm::component", component = %invocation.definition.name, element, "did create element");
        manager.did_create_element(&invocation.component, element, &mut operations);
        Ok(())
    }

    /// Re-apply call-site attributes on the current element, in shadow list
    /// order. Names missing from the named arguments remove the attribute.
    pub(super) fn op_shadow_attributes(&mut self) -> VmResult<()> {
        let frame = self.frame();
        let Some(invocation) = frame.invocation.clone() else {
            return Ok(());
        };
        self.require_root_element(&invocation, "shadow-attributes")?;
        if invocation.shadow.is_empty() {
            return Ok(());
        }
        let args = frame.args.clone().unwrap_or_else(EvaluatedArgs::empty);

        for name in &invocation.shadow {
            let value = args
                .named
                .get(name)
                .unwrap_or_else(|| Reference::constant(Value::Null));
            self.set_dynamic_attribute(name, value, "shadow-attributes")?;
        }
        Ok(())
    }

    /// The hooks act on the layout's own root element, never on an element
    /// opened by an enclosing invocation.
    fn require_root_element(
        &self,
        invocation: &InvocationContext,
        opcode: &'static str,
    ) -> VmResult<()> {
        if self.elements.depth() <= invocation.element_depth {
            return Err(VmError::NoCurrentElement(opcode));
        }
        Ok(())
    }

    // === Close ===

    pub(super) fn op_close_component(&mut self) -> VmResult<()> {
        let mark = self.invocations.pop().ok_or(VmError::UnmatchedClose)?;

        self.pop_scope()?;
        self.pop_dynamic_scope()?;

        let after = self.scope_mark();
        if after != mark {
            return Err(VmError::UnbalancedScopes {
                expected_lexical: mark.lexical,
                found_lexical: after.lexical,
                expected_dynamic: mark.dynamic,
                found_dynamic: after.dynamic,
            });
        }
        trace!(target: "rendervm::vm::component", depth = after.lexical, "close component");
        Ok(())
    }
}
