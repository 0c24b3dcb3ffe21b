//! Rendervm - Component Invocation Engine for a Template Rendering VM
//!
//! This library provides the part of a template-rendering virtual machine
//! that instantiates components, runs their layouts, applies caller
//! supplied attributes and registers the opcodes that revalidate
//! components on later update passes.
//!
//! # Architecture
//!
//! Rendering happens in two kinds of pass:
//!
//! 1. **Render** (`backend::vm::RenderVm`)
//!    - Executes render-time `Opcode`s once, building the host tree
//!    - Maintains lexical scopes, dynamic scopes and invocation frames
//!    - Produces `UpdatingOpcode`s as a side effect, in open order
//!
//! 2. **Update** (`backend::vm::RenderResult::rerender`)
//!    - Walks the updating opcodes top to bottom, once per pass
//!    - Calls every live component manager's `update` exactly once
//!    - Re-applies only those attribute and text values whose references
//!      changed
//!
//! Component kinds are supplied by the host through the
//! `backend::component::ComponentManager` trait.
//!
//! # Example
//!
//! ```rust
//! use rendervm::scenario::Scenario;
//!
//! let scenario = Scenario::parse(r#"
//!     [[component]]
//!     name = "greeting"
//!     tag = "p"
//!     content = "who"
//!
//!     [[invoke]]
//!     component = "greeting"
//!     args = { who = "world" }
//! "#).unwrap();
//!
//! let compiled = scenario.compile().unwrap();
//! let result = compiled.render().unwrap();
//! assert_eq!(result.to_html(), r#"<p data-component="greeting">world</p>"#);
//! ```

pub mod backend;
pub mod scenario;

pub use backend::{
    ComponentManager, DefinitionHandle, Environment, Opcode, Reference, RenderResult, RenderVm,
    UpdatingOpcode, Value, VmConfig, VmError, VmResult,
};
pub use scenario::{CompiledScenario, Scenario, ScenarioError};
