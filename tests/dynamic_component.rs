//! Integration tests for dynamic component invocations
//!
//! A dynamic invocation resolves its definition from a reference. Constant
//! references are trusted; volatile ones get an identity assertion that
//! fails the update pass once the reference resolves elsewhere.

mod common;

use common::{update_order, Event, Harness};
use rendervm::backend::*;

/// `[PutArgs, PutComponentDefinition, OpenDynamicComponent, Close]`
fn dynamic_invoke(
    reference: Reference<DefinitionHandle>,
    named: Vec<(&str, Expression)>,
    shadow: &[&str],
) -> Vec<Opcode> {
    vec![
        Opcode::put_args(CompiledArgs::named(named)),
        Opcode::put_component_definition(DynamicComponentFactory::new(move |_, _| {
            Ok(reference.clone())
        })),
        Opcode::open_dynamic_component(
            shadow.iter().map(|s| s.to_string()).collect(),
            Templates::empty(),
        ),
        Opcode::close_component(),
    ]
}

fn asserts(result: &RenderResult) -> usize {
    result
        .updating_opcodes()
        .iter()
        .filter(|op| matches!(op, UpdatingOpcode::Assert { .. }))
        .count()
}

#[test]
fn test_constant_reference_registers_no_assert() {
    let h = Harness::new();
    let d = h.define("d", "div");

    let program = dynamic_invoke(
        Reference::constant(d.clone()),
        vec![("name", Expression::literal("x"))],
        &[],
    );
    let mut result = h.vm().render(&program).expect("render should succeed");

    assert_eq!(asserts(&result), 0);
    assert_eq!(update_order(&result), vec!["d"]);
    assert_eq!(result.to_html(), r#"<div class="d">x</div>"#);
    result.rerender().expect("update should succeed");
}

#[test]
fn test_volatile_reference_registers_one_assert_before_update() {
    let h = Harness::new();
    let d = h.define("d", "div");
    let cell = UpdatableReference::new(d.clone());

    let program = dynamic_invoke(UpdatableReference::reference(&cell), Vec::new(), &[]);
    let result = h.vm().render(&program).expect("render should succeed");

    let kinds: Vec<&str> = result
        .updating_opcodes()
        .iter()
        .map(UpdatingOpcode::mnemonic)
        .collect();
    assert_eq!(kinds, vec!["assert", "update-component"]);
    assert_eq!(asserts(&result), 1);
}

#[test]
fn test_identity_change_fails_update_pass() {
    let h = Harness::new();
    let d1 = h.define("d1", "div");
    let d2 = h.define("d2", "div");
    let cell = UpdatableReference::new(d1.clone());

    let program = dynamic_invoke(UpdatableReference::reference(&cell), Vec::new(), &[]);
    let mut result = h.vm().render(&program).expect("render should succeed");
    result.rerender().expect("unchanged definition passes");

    cell.update(d2.clone());
    assert_eq!(
        result.rerender(),
        Err(VmError::DynamicIdentityChanged {
            expected: "d1".to_string(),
            found: "d2".to_string(),
        })
    );
    // No silent re-creation.
    assert_eq!(h.count(|e| matches!(e, Event::Create { .. })), 1);
    assert_eq!(result.passes(), 1);
}

#[test]
fn test_same_name_different_definition_is_an_identity_change() {
    let h = Harness::new();
    let d = h.define("d", "div");
    let impostor = DefinitionHandle::new("d", h.manager.clone());
    let cell = UpdatableReference::new(d.clone());

    let mut result = h
        .vm()
        .render(&dynamic_invoke(UpdatableReference::reference(&cell), Vec::new(), &[]))
        .expect("render should succeed");

    cell.update(impostor);
    assert!(matches!(
        result.rerender(),
        Err(VmError::DynamicIdentityChanged { .. })
    ));
}

#[test]
fn test_revision_bump_with_same_definition_passes() {
    let h = Harness::new();
    let d = h.define("d", "div");
    let cell = UpdatableReference::new(d.clone());

    let mut result = h
        .vm()
        .render(&dynamic_invoke(UpdatableReference::reference(&cell), Vec::new(), &[]))
        .expect("render should succeed");

    cell.dirty();
    result.rerender().expect("same definition passes");
    cell.update(d);
    result.rerender().expect("same definition passes");
    assert_eq!(h.count(|e| matches!(e, Event::Update { .. })), 2);
}

#[test]
fn test_dynamic_path_runs_hooks_and_shadow() {
    let h = Harness::new();
    let d = h.define("d", "p");
    let mut vm = h.vm();
    let program = dynamic_invoke(
        Reference::constant(d),
        vec![("class", Expression::literal("red"))],
        &["class"],
    );

    for opcode in &program[..3] {
        vm.execute(opcode).expect("opcode should succeed");
    }
    assert_eq!(h.count(|e| matches!(e, Event::DidCreateElement { .. })), 1);
    assert_eq!(vm.open_invocations(), 1);

    vm.execute(&program[3]).expect("close should succeed");
    assert_eq!(vm.tree().to_html(), r#"<p class="red"></p>"#);
}

#[test]
fn test_pending_args_are_consumed_by_open() {
    let h = Harness::new();
    let d = h.define("d", "div");
    let mut vm = h.vm();
    let program = dynamic_invoke(Reference::constant(d), Vec::new(), &[]);

    vm.execute_block(&program).expect("invocation should succeed");
    assert!(vm.frame().pending_args().is_none());
    assert!(!vm.frame().has_dynamic_component());
}

#[test]
fn test_open_without_definition_is_error() {
    let h = Harness::new();
    let mut vm = h.vm();

    vm.execute(&Opcode::put_args(CompiledArgs::empty()))
        .expect("args should evaluate");
    assert_eq!(
        vm.execute(&Opcode::open_dynamic_component(Vec::new(), Templates::empty())),
        Err(VmError::NoDynamicComponent)
    );
}

#[test]
fn test_factory_sees_pending_args() {
    let h = Harness::new();
    let small = h.define("small", "span");
    let large = h.define("large", "div");

    let pick = DynamicComponentFactory::new(move |args, _vm| {
        let chosen = match args.named.value("size").as_str() {
            Some("large") => large.clone(),
            _ => small.clone(),
        };
        Ok(Reference::constant(chosen))
    });
    let program = vec![
        Opcode::put_args(CompiledArgs::named([("size", Expression::literal("large"))])),
        Opcode::put_component_definition(pick),
        Opcode::open_dynamic_component(Vec::new(), Templates::empty()),
        Opcode::close_component(),
    ];
    let result = h.vm().render(&program).expect("render should succeed");
    assert_eq!(update_order(&result), vec!["large"]);
}

#[test]
fn test_dynamic_dump_args() {
    let h = Harness::new();
    let d = h.define("d", "div");
    let cell = UpdatableReference::new(d);
    let program = dynamic_invoke(
        UpdatableReference::reference(&cell),
        vec![("name", Expression::literal("x"))],
        &[],
    );

    assert_eq!(program[0].to_json().args, vec!["\"name\"".to_string()]);
    assert_eq!(program[2].to_json().args, vec!["$DYNAMIC_COMPONENT".to_string()]);

    let result = h.vm().render(&program).expect("render should succeed");
    let dump = result.dump_updating();
    assert_eq!(dump[0].kind, "assert");
    assert_eq!(dump[0].args, vec!["\"d\"".to_string()]);
    assert_eq!(dump[1].kind, "update-component");
    assert_ne!(dump[0].guid, dump[1].guid);
}
