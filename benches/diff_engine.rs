use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use stylesync_css::media::Breakpoint;
use stylesync_css::value::StyleValue;
use stylesync_engine::config::EngineConfig;
use stylesync_engine::diff::DiffEngine;
use stylesync_engine::model::{Declarations, StyleDeclaration, StyleSourceSelections};
use stylesync_engine::store::StyleStores;
use stylesync_engine::SyncSession;
use stylesync_shared::abort::AbortController;
use stylesync_shared::node::InstanceId;
use stylesync_shared::scheduler::SchedulerHandle;

const SOURCES: usize = 500;
const PROPERTIES: [&str; 8] = [
    "color", "width", "height", "margin", "padding", "display", "opacity", "font-size",
];

fn breakpoints() -> Vec<Breakpoint> {
    vec![
        Breakpoint::base("base"),
        Breakpoint::max_width("tablet", 991),
        Breakpoint::max_width("mobile", 479),
    ]
}

/// Every style source declares every property on every breakpoint
fn large_declarations() -> Declarations {
    let mut declarations = Declarations::new();
    for source in 0..SOURCES {
        for breakpoint in breakpoints() {
            for (n, property) in PROPERTIES.iter().enumerate() {
                declarations.insert(StyleDeclaration::new(
                    &format!("s{source}"),
                    &breakpoint.id,
                    None,
                    property,
                    StyleValue::unit((source + n) as f64, "px"),
                ));
            }
        }
    }
    declarations
}

fn diff_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("Diff Engine");
    group.significance_level(0.1).sample_size(100);

    let declarations = large_declarations();
    let mut edited = declarations.clone();
    edited.insert(StyleDeclaration::new("s7", "base", None, "color", StyleValue::keyword("red")));

    group.bench_function("unchanged snapshot", |b| {
        let mut engine = DiffEngine::new();
        engine.diff(&declarations, None);
        b.iter(|| black_box(engine.diff(&declarations, None)))
    });

    group.bench_function("single edit", |b| {
        let mut engine = DiffEngine::new();
        b.iter(|| {
            engine.diff(&declarations, None);
            black_box(engine.diff(&edited, None))
        })
    });

    group.finish();
}

fn session_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sync Session");
    group.significance_level(0.1).sample_size(50);

    let selections: StyleSourceSelections = (0..SOURCES)
        .map(|n| (InstanceId::from(format!("i{n}")), vec![format!("s{n}")]))
        .collect();
    let declarations = large_declarations();

    group.bench_function("initial sync and render", |b| {
        b.iter(|| {
            let stores = StyleStores::new();
            stores.breakpoints.set(breakpoints());
            stores.selections.set(selections.clone());
            stores.declarations.set(declarations.clone());

            let controller = AbortController::new();
            let session = SyncSession::start(
                EngineConfig::default(),
                stores,
                SchedulerHandle::new(),
                None,
                &controller.signal(),
            );
            session.flush();
            black_box(session.user_css().len())
        })
    });

    group.finish();
}

criterion_group!(benches, diff_pass, session_sync);
criterion_main!(benches);
