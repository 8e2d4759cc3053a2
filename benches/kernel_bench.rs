//! Benchmarks for kernel reads and host activation

use criterion::{Criterion, criterion_group, criterion_main};
use hosted_injector::{
    BoxError, Container, HostActivatorRef, HostFactory, HostedApplication, KernelCell,
    KernelHooks, LifecycleEvent, ServiceEndpoint,
};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

#[allow(dead_code)]
#[derive(Clone)]
struct PriceList {
    currency: &'static str,
}

#[allow(dead_code)]
struct Quote {
    amount: u64,
}

struct BenchApp;

impl KernelHooks for BenchApp {
    fn create_kernel(&self) -> Result<Container, BoxError> {
        let kernel = Container::new();
        kernel.singleton(PriceList { currency: "EUR" })?;
        kernel.transient(|| Quote { amount: 42 })?;
        Ok(kernel)
    }
}

static CELL: KernelCell = KernelCell::new();

fn running_app() -> (HostedApplication<BenchApp>, Arc<HostFactory>) {
    let factory = Arc::new(HostFactory::new());
    let app = HostedApplication::builder(BenchApp)
        .cell(&CELL)
        .slot(factory.clone())
        .build();
    app.application_start(&LifecycleEvent::new("bench"))
        .expect("bench application starts");
    (app, factory)
}

fn bench_kernel(c: &mut Criterion) {
    let (app, factory) = running_app();
    let kernel = app.kernel().expect("kernel present");

    let mut group = c.benchmark_group("kernel");

    group.bench_function("read_handle", |b| b.iter(|| black_box(app.kernel())));

    group.bench_function("read_handle_contended", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..64 {
                            black_box(app.kernel());
                        }
                    });
                }
            })
        })
    });

    group.bench_function("resolve_singleton", |b| {
        b.iter(|| black_box(kernel.get::<PriceList>()))
    });

    group.bench_function("bindings_lookup", |b| {
        b.iter(|| black_box(kernel.bindings::<HostActivatorRef>()))
    });

    group.bench_function("create_host_and_instance", |b| {
        b.iter(|| {
            let host = factory
                .create_host(ServiceEndpoint::of::<Quote>())
                .expect("host created");
            host.open().expect("host opens");
            black_box(host.instance_of::<Quote>())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_kernel);
criterion_main!(benches);
