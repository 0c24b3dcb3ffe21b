// Backend for the component render VM
//
// This module provides the runtime pieces the opcodes operate on:
// - `reference` / `value`: pull-based values and their revalidation caches
// - `component` / `environment`: host-supplied managers, layouts and hooks
// - `opcodes`: render-time and updating instruction sets
// - `vm`: the render interpreter, update passes and render results

pub mod args;
pub mod component;
pub mod environment;
pub mod host;
pub mod opcodes;
pub mod reference;
pub mod scope;
pub mod value;
pub mod vm;

pub use args::{CompiledArgs, EvaluatedArgs, Expression, NamedArgs};
pub use component::{
    Component, ComponentDefinition, ComponentManager, DefinitionHandle, DestroyGuard,
    DestroyableList, Destructor,
};
pub use environment::{
    BasicEnvironment, Block, BlockKind, Environment, Layout, LayoutRegistry, Templates,
};
pub use host::{ElementOperations, ElementStack, HostTree, NodeId, NodeKind};
pub use opcodes::{DynamicComponentFactory, Guid, Opcode, OpcodeJson, UpdatingOpcode};
pub use reference::{Reference, ReferenceCache, Revision, Source, UpdatableReference, Validation};
pub use scope::{DynamicScope, Scope};
pub use value::Value;
pub use vm::{RenderResult, RenderVm, UpdatingVm, VmConfig, VmError, VmResult};
