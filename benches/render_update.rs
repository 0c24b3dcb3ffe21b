//! Render and Update Pass Benchmarks
//!
//! Measures the two interpreter passes over a flat list of component
//! invocations:
//! - render: open, layout, shadow attributes and close for every component
//! - update: one revalidation pass with all references unchanged
//! - update (changed): one pass where every shadowed attribute changed
//!
//! Run with:
//!   cargo bench --bench render_update

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rendervm::backend::*;

struct BenchManager;

impl ComponentManager for BenchManager {
    fn create(
        &self,
        _definition: &ComponentDefinition,
        _args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> VmResult<Component> {
        Ok(Rc::new(()))
    }

    fn get_self(&self, _component: &Component) -> Option<Reference<Value>> {
        Some(Reference::constant(Value::Null))
    }

    fn get_destructor(&self, _component: &Component) -> Option<Box<dyn Destructor>> {
        None
    }

    fn did_create_element(
        &self,
        _component: &Component,
        _element: NodeId,
        operations: &mut ElementOperations<'_>,
    ) {
        operations.add_class("managed");
    }

    fn update(
        &self,
        _component: &Component,
        _args: &EvaluatedArgs,
        _dynamic_scope: &DynamicScope,
    ) -> VmResult<()> {
        Ok(())
    }
}

fn setup(count: usize) -> (Rc<BasicEnvironment>, Vec<Opcode>, Rc<UpdatableReference<Value>>) {
    let mut layouts = LayoutRegistry::new();
    layouts.register(Layout::new(
        "item",
        0,
        vec![
            Opcode::open_element("li"),
            Opcode::static_attr("class", "item"),
            Opcode::did_create_element(),
            Opcode::shadow_attributes(),
            Opcode::flush_element(),
            Opcode::dynamic_content(Expression::arg("label")),
            Opcode::close_element(),
        ],
    ));
    let item = DefinitionHandle::new("item", Rc::new(BenchManager));
    let color = UpdatableReference::new(Value::from("red"));

    let mut program = vec![Opcode::open_element("ul"), Opcode::flush_element()];
    for i in 0..count {
        program.push(Opcode::open_component(
            item.clone(),
            CompiledArgs::named([
                ("label", Expression::literal(i as i64)),
                ("class", Expression::Ref(UpdatableReference::reference(&color))),
            ]),
            vec!["class".to_string()],
            Templates::empty(),
        ));
        program.push(Opcode::close_component());
    }
    program.push(Opcode::close_element());

    (Rc::new(BasicEnvironment::new(layouts)), program, color)
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for count in [10usize, 100, 1000] {
        let (env, program, _color) = setup(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &program, |b, program| {
            b.iter(|| {
                let vm = RenderVm::new(env.clone(), Reference::constant(Value::Null));
                black_box(vm.render(program).expect("render"))
            })
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for count in [10usize, 100, 1000] {
        let (env, program, color) = setup(count);
        let mut result = RenderVm::new(env.clone(), Reference::constant(Value::Null))
            .render(&program)
            .expect("render");

        group.bench_function(BenchmarkId::new("unchanged", count), |b| {
            b.iter(|| result.rerender().expect("update"))
        });

        let mut flip = false;
        group.bench_function(BenchmarkId::new("changed", count), |b| {
            b.iter(|| {
                flip = !flip;
                color.update(Value::from(if flip { "blue" } else { "red" }));
                result.rerender().expect("update")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render, bench_update);
criterion_main!(benches);
