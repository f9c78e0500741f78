use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vesper_graphics::{
    ChannelMask, CompileData, DummyDevice, PassError, RenderContext, RenderData, RenderGraph, RenderPass,
    RenderPassReflection,
};

/// Reads `in` (unless it is the first link) and writes `out`.
struct Link {
    first: bool,
}

impl RenderPass for Link {
    fn type_name(&self) -> &str {
        "Link"
    }

    fn reflect(&self, _data: &CompileData) -> Result<RenderPassReflection, PassError> {
        let mut reflector = RenderPassReflection::new();
        if !self.first {
            reflector.add_input("in", "");
        }
        reflector.add_output("out", "");
        Ok(reflector)
    }

    fn execute(&mut self, ctx: &mut RenderContext<'_>, data: &mut RenderData<'_>) -> Result<(), PassError> {
        let inputs: Vec<_> = data.get("in").into_iter().collect();
        ctx.draw("link", &inputs, &[data.require("out")?]);
        Ok(())
    }
}

fn chain(len: usize) -> RenderGraph {
    let mut graph = RenderGraph::new("chain");
    graph.add_pass(Box::new(Link { first: true }), "pass_0").unwrap();
    for i in 1..len {
        let name = format!("pass_{i}");
        graph.add_pass(Box::new(Link { first: false }), &name).unwrap();
        graph
            .add_edge(&format!("pass_{}.out", i - 1), &format!("{name}.in"))
            .unwrap();
    }
    graph
        .mark_output(&format!("pass_{}.out", len - 1), ChannelMask::RGB)
        .unwrap();
    graph
}

// ---------------------------------------------------------------------------
// Render graph construction
// ---------------------------------------------------------------------------

fn bench_graph_build_small(c: &mut Criterion) {
    c.bench_function("render_graph_build_4_passes", |b| {
        b.iter(|| black_box(chain(4)));
    });
}

fn bench_graph_build_large(c: &mut Criterion) {
    c.bench_function("render_graph_build_32_passes_chain", |b| {
        b.iter(|| black_box(chain(32)));
    });
}

// ---------------------------------------------------------------------------
// Render graph compilation
// ---------------------------------------------------------------------------

fn bench_graph_compile_small(c: &mut Criterion) {
    c.bench_function("render_graph_compile_4_passes", |b| {
        b.iter_with_setup(
            || chain(4),
            |mut graph| {
                graph.compile().unwrap();
                black_box(graph.execution_order().len());
            },
        );
    });
}

fn bench_graph_compile_large(c: &mut Criterion) {
    c.bench_function("render_graph_compile_32_passes_chain", |b| {
        b.iter_with_setup(
            || chain(32),
            |mut graph| {
                graph.compile().unwrap();
                black_box(graph.execution_order().len());
            },
        );
    });
}

// ---------------------------------------------------------------------------
// Frame execution on the dummy device
// ---------------------------------------------------------------------------

fn bench_graph_execute_large(c: &mut Criterion) {
    let mut device = DummyDevice::new();
    let mut graph = chain(32);

    c.bench_function("render_graph_execute_32_passes_chain", |b| {
        b.iter(|| {
            let mut ctx = RenderContext::new(&mut device);
            graph.execute(&mut ctx).unwrap();
            black_box(ctx.commands().len());
        });
    });
}

fn bench_graph_resize(c: &mut Criterion) {
    let mut device = DummyDevice::new();
    let mut graph = chain(32);
    let mut wide = false;

    c.bench_function("render_graph_resize_32_passes_chain", |b| {
        b.iter(|| {
            wide = !wide;
            let width = if wide { 1280 } else { 1920 };
            graph.on_resize(width, 720);
            let mut ctx = RenderContext::new(&mut device);
            graph.execute(&mut ctx).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_graph_build_small,
    bench_graph_build_large,
    bench_graph_compile_small,
    bench_graph_compile_large,
    bench_graph_execute_large,
    bench_graph_resize,
);
criterion_main!(benches);
