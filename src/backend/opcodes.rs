//! Render-time and revalidation opcodes.
//!
//! Two sum types that share no execution path: [`Opcode`] is executed once
//! by the render interpreter while walking a compiled template, and
//! [`UpdatingOpcode`] is produced as a side effect of render and executed
//! once per update pass by the updating interpreter.
//!
//! Every opcode carries a guid assigned at construction and exposes a
//! structured dump ([`OpcodeJson`]) for tooling. Dumps are diagnostics only.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::args::{CompiledArgs, EvaluatedArgs, Expression};
use super::component::{Component, ComponentManager, DefinitionHandle};
use super::environment::{BlockKind, Templates};
use super::host::NodeId;
use super::reference::{Reference, ReferenceCache};
use super::scope::DynamicScope;
use super::value::Value;
use super::vm::{RenderVm, VmResult};

pub type Guid = u64;

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);

fn next_guid() -> Guid {
    NEXT_GUID.fetch_add(1, Ordering::Relaxed)
}

/// Structured dump of an opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpcodeJson {
    pub guid: Guid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub args: Vec<String>,
}

impl OpcodeJson {
    fn new(guid: Guid, kind: &'static str, args: Vec<String>) -> Self {
        Self { guid, kind, args }
    }
}

impl fmt::Display for OpcodeJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// JSON string literal, used for names in dump arguments.
fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Produces the definition reference for a dynamic invocation from the
/// pending arguments.
#[derive(Clone)]
pub struct DynamicComponentFactory(
    Rc<dyn Fn(&EvaluatedArgs, &RenderVm) -> VmResult<Reference<DefinitionHandle>>>,
);

impl DynamicComponentFactory {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&EvaluatedArgs, &RenderVm) -> VmResult<Reference<DefinitionHandle>> + 'static,
    {
        Self(Rc::new(factory))
    }

    pub fn call(
        &self,
        args: &EvaluatedArgs,
        vm: &RenderVm,
    ) -> VmResult<Reference<DefinitionHandle>> {
        (self.0)(args, vm)
    }
}

impl fmt::Debug for DynamicComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynamicComponentFactory")
    }
}

/// Render-time instruction.
///
/// Cloning assigns the copy a fresh guid, so every opcode in a program
/// stays distinguishable in dumps.
#[derive(Debug)]
pub enum Opcode {
    // === Invocation setup ===
    /// Evaluate call-site arguments into the frame's pending args
    PutArgs { guid: Guid, args: CompiledArgs },
    /// Store the dynamic component reference produced by `factory`
    PutComponentDefinition {
        guid: Guid,
        factory: DynamicComponentFactory,
    },

    // === Component lifecycle ===
    OpenComponent {
        guid: Guid,
        definition: DefinitionHandle,
        args: CompiledArgs,
        shadow: Vec<String>,
        templates: Templates,
    },
    OpenDynamicComponent {
        guid: Guid,
        shadow: Vec<String>,
        templates: Templates,
    },
    DidCreateElement { guid: Guid },
    ShadowAttributes { guid: Guid },
    CloseComponent { guid: Guid },

    // === Element building ===
    OpenElement { guid: Guid, tag: String },
    StaticAttr {
        guid: Guid,
        name: String,
        value: String,
    },
    DynamicAttr {
        guid: Guid,
        name: String,
        value: Expression,
    },
    FlushElement { guid: Guid },
    CloseElement { guid: Guid },
    Text { guid: Guid, text: String },
    DynamicContent { guid: Guid, value: Expression },
    /// Run a caller-supplied template in the caller's scope
    Yield { guid: Guid, block: BlockKind },
}

impl Opcode {
    pub fn put_args(args: CompiledArgs) -> Self {
        Opcode::PutArgs {
            guid: next_guid(),
            args,
        }
    }

    pub fn put_component_definition(factory: DynamicComponentFactory) -> Self {
        Opcode::PutComponentDefinition {
            guid: next_guid(),
            factory,
        }
    }

    pub fn open_component(
        definition: DefinitionHandle,
        args: CompiledArgs,
        shadow: Vec<String>,
        templates: Templates,
    ) -> Self {
        Opcode::OpenComponent {
            guid: next_guid(),
            definition,
            args,
            shadow,
            templates,
        }
    }

    pub fn open_dynamic_component(shadow: Vec<String>, templates: Templates) -> Self {
        Opcode::OpenDynamicComponent {
            guid: next_guid(),
            shadow,
            templates,
        }
    }

    pub fn did_create_element() -> Self {
        Opcode::DidCreateElement { guid: next_guid() }
    }

    pub fn shadow_attributes() -> Self {
        Opcode::ShadowAttributes { guid: next_guid() }
    }

    pub fn close_component() -> Self {
        Opcode::CloseComponent { guid: next_guid() }
    }

    pub fn open_element(tag: impl Into<String>) -> Self {
        Opcode::OpenElement {
            guid: next_guid(),
            tag: tag.into(),
        }
    }

    pub fn static_attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Opcode::StaticAttr {
            guid: next_guid(),
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn dynamic_attr(name: impl Into<String>, value: Expression) -> Self {
        Opcode::DynamicAttr {
            guid: next_guid(),
            name: name.into(),
            value,
        }
    }

    pub fn flush_element() -> Self {
        Opcode::FlushElement { guid: next_guid() }
    }

    pub fn close_element() -> Self {
        Opcode::CloseElement { guid: next_guid() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Opcode::Text {
            guid: next_guid(),
            text: text.into(),
        }
    }

    pub fn dynamic_content(value: Expression) -> Self {
        Opcode::DynamicContent {
            guid: next_guid(),
            value,
        }
    }

    pub fn yield_block(block: BlockKind) -> Self {
        Opcode::Yield {
            guid: next_guid(),
            block,
        }
    }

    pub fn guid(&self) -> Guid {
        match self {
            Opcode::PutArgs { guid, .. }
            | Opcode::PutComponentDefinition { guid, .. }
            | Opcode::OpenComponent { guid, .. }
            | Opcode::OpenDynamicComponent { guid, .. }
            | Opcode::DidCreateElement { guid }
            | Opcode::ShadowAttributes { guid }
            | Opcode::CloseComponent { guid }
            | Opcode::OpenElement { guid, .. }
            | Opcode::StaticAttr { guid, .. }
            | Opcode::DynamicAttr { guid, .. }
            | Opcode::FlushElement { guid }
            | Opcode::CloseElement { guid }
            | Opcode::Text { guid, .. }
            | Opcode::DynamicContent { guid, .. }
            | Opcode::Yield { guid, .. } => *guid,
        }
    }

    /// Human-readable type tag.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::PutArgs { .. } => "put-args",
            Opcode::PutComponentDefinition { .. } => "put-component-definition",
            Opcode::OpenComponent { .. } => "open-component",
            Opcode::OpenDynamicComponent { .. } => "open-dynamic-component",
            Opcode::DidCreateElement { .. } => "did-create-element",
            Opcode::ShadowAttributes { .. } => "shadow-attributes",
            Opcode::CloseComponent { .. } => "close-component",
            Opcode::OpenElement { .. } => "open-element",
            Opcode::StaticAttr { .. } => "static-attr",
            Opcode::DynamicAttr { .. } => "dynamic-attr",
            Opcode::FlushElement { .. } => "flush-element",
            Opcode::CloseElement { .. } => "close-element",
            Opcode::Text { .. } => "text",
            Opcode::DynamicContent { .. } => "dynamic-content",
            Opcode::Yield { .. } => "yield",
        }
    }

    pub fn to_json(&self) -> OpcodeJson {
        let args = match self {
            Opcode::PutArgs { args, .. } => args.named.iter().map(|(n, _)| quoted(n)).collect(),
            Opcode::OpenComponent { definition, .. } => vec![quoted(&definition.name)],
            Opcode::OpenDynamicComponent { .. } => vec!["$DYNAMIC_COMPONENT".to_string()],
            Opcode::DidCreateElement { .. } | Opcode::ShadowAttributes { .. } => {
                vec!["$ARGS".to_string()]
            }
            Opcode::OpenElement { tag, .. } => vec![quoted(tag)],
            Opcode::StaticAttr { name, value, .. } => vec![quoted(name), quoted(value)],
            Opcode::DynamicAttr { name, .. } => vec![quoted(name)],
            Opcode::Text { text, .. } => vec![quoted(text)],
            Opcode::Yield { block, .. } => vec![quoted(block.as_str())],
            Opcode::PutComponentDefinition { .. }
            | Opcode::CloseComponent { .. }
            | Opcode::FlushElement { .. }
            | Opcode::CloseElement { .. }
            | Opcode::DynamicContent { .. } => Vec::new(),
        };
        OpcodeJson::new(self.guid(), self.mnemonic(), args)
    }
}

impl Clone for Opcode {
    fn clone(&self) -> Self {
        let guid = next_guid();
        match self {
            Opcode::PutArgs { args, .. } => Opcode::PutArgs {
                guid,
                args: args.clone(),
            },
            Opcode::PutComponentDefinition { factory, .. } => Opcode::PutComponentDefinition {
                guid,
                factory: factory.clone(),
            },
            Opcode::OpenComponent {
                definition,
                args,
                shadow,
                templates,
                ..
            } => Opcode::OpenComponent {
                guid,
                definition: definition.clone(),
                args: args.clone(),
                shadow: shadow.clone(),
                templates: templates.clone(),
            },
            Opcode::OpenDynamicComponent {
                shadow, templates, ..
            } => Opcode::OpenDynamicComponent {
                guid,
                shadow: shadow.clone(),
                templates: templates.clone(),
            },
            Opcode::DidCreateElement { .. } => Opcode::DidCreateElement { guid },
            Opcode::ShadowAttributes { .. } => Opcode::ShadowAttributes { guid },
            Opcode::CloseComponent { .. } => Opcode::CloseComponent { guid },
            Opcode::OpenElement { tag, .. } => Opcode::OpenElement {
                guid,
                tag: tag.clone(),
            },
            Opcode::StaticAttr { name, value, .. } => Opcode::StaticAttr {
                guid,
                name: name.clone(),
                value: value.clone(),
            },
            Opcode::DynamicAttr { name, value, .. } => Opcode::DynamicAttr {
                guid,
                name: name.clone(),
                value: value.clone(),
            },
            Opcode::FlushElement { .. } => Opcode::FlushElement { guid },
            Opcode::CloseElement { .. } => Opcode::CloseElement { guid },
            Opcode::Text { text, .. } => Opcode::Text {
                guid,
                text: text.clone(),
            },
            Opcode::DynamicContent { value, .. } => Opcode::DynamicContent {
                guid,
                value: value.clone(),
            },
            Opcode::Yield { block, .. } => Opcode::Yield {
                guid,
                block: *block,
            },
        }
    }
}

/// Persistent instruction re-executed on every update pass.
pub enum UpdatingOpcode {
    /// Dispatch the manager's update hook for one component
    UpdateComponent {
        guid: Guid,
        name: String,
        component: Component,
        manager: Rc<dyn ComponentManager>,
        args: EvaluatedArgs,
        dynamic_scope: DynamicScope,
    },
    /// Fail the pass when a dynamic component resolves to another definition
    Assert {
        guid: Guid,
        expected: DefinitionHandle,
        cache: ReferenceCache<DefinitionHandle>,
    },
    UpdateAttribute {
        guid: Guid,
        element: NodeId,
        name: String,
        cache: ReferenceCache<Value>,
    },
    UpdateText {
        guid: Guid,
        node: NodeId,
        cache: ReferenceCache<Value>,
    },
}

impl UpdatingOpcode {
    pub fn update_component(
        name: impl Into<String>,
        component: Component,
        manager: Rc<dyn ComponentManager>,
        args: EvaluatedArgs,
        dynamic_scope: DynamicScope,
    ) -> Self {
        UpdatingOpcode::UpdateComponent {
            guid: next_guid(),
            name: name.into(),
            component,
            manager,
            args,
            dynamic_scope,
        }
    }

    pub fn assert(expected: DefinitionHandle, cache: ReferenceCache<DefinitionHandle>) -> Self {
        UpdatingOpcode::Assert {
            guid: next_guid(),
            expected,
            cache,
        }
    }

    pub fn update_attribute(
        element: NodeId,
        name: impl Into<String>,
        cache: ReferenceCache<Value>,
    ) -> Self {
        UpdatingOpcode::UpdateAttribute {
            guid: next_guid(),
            element,
            name: name.into(),
            cache,
        }
    }

    pub fn update_text(node: NodeId, cache: ReferenceCache<Value>) -> Self {
        UpdatingOpcode::UpdateText {
            guid: next_guid(),
            node,
            cache,
        }
    }

    pub fn guid(&self) -> Guid {
        match self {
            UpdatingOpcode::UpdateComponent { guid, .. }
            | UpdatingOpcode::Assert { guid, .. }
            | UpdatingOpcode::UpdateAttribute { guid, .. }
            | UpdatingOpcode::UpdateText { guid, .. } => *guid,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            UpdatingOpcode::UpdateComponent { .. } => "update-component",
            UpdatingOpcode::Assert { .. } => "assert",
            UpdatingOpcode::UpdateAttribute { .. } => "update-attribute",
            UpdatingOpcode::UpdateText { .. } => "update-text",
        }
    }

    pub fn to_json(&self) -> OpcodeJson {
        let args = match self {
            UpdatingOpcode::UpdateComponent { name, .. } => vec![quoted(name)],
            UpdatingOpcode::Assert { expected, .. } => vec![quoted(&expected.name)],
            UpdatingOpcode::UpdateAttribute { name, .. } => vec![quoted(name)],
            UpdatingOpcode::UpdateText { .. } => Vec::new(),
        };
        OpcodeJson::new(self.guid(), self.mnemonic(), args)
    }
}

impl fmt::Debug for UpdatingOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guids_are_unique() {
        let a = Opcode::close_component();
        let b = Opcode::close_component();
        assert_ne!(a.guid(), b.guid());
    }

    #[test]
    fn test_clone_gets_fresh_guid() {
        let op = Opcode::static_attr("class", "card");
        let copy = op.clone();
        assert_ne!(op.guid(), copy.guid());
        assert_eq!(copy.mnemonic(), "static-attr");
        assert_eq!(copy.to_json().args, op.to_json().args);
    }

    #[test]
    fn test_dump_is_reproducible() {
        let op = Opcode::static_attr("class", "a \"b\"");
        let first = op.to_json().to_string();
        let second = op.to_json().to_string();
        assert_eq!(first, second);

        let expected = format!(
            r#"{{"guid":{},"type":"static-attr","args":["\"class\"","\"a \\\"b\\\"\""]}}"#,
            op.guid()
        );
        assert_eq!(first, expected);
    }

    #[test]
    fn test_lifecycle_dump_args() {
        let dynamic = Opcode::open_dynamic_component(Vec::new(), Templates::empty());
        assert_eq!(dynamic.to_json().args, vec!["$DYNAMIC_COMPONENT".to_string()]);
        assert_eq!(dynamic.mnemonic(), "open-dynamic-component");

        let did_create = Opcode::did_create_element();
        assert_eq!(did_create.to_json().args, vec!["$ARGS".to_string()]);

        let close = Opcode::close_component();
        assert!(close.to_json().args.is_empty());
        assert_eq!(close.to_json().kind, "close-component");
    }
}
