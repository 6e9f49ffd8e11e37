use criterion::{black_box, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};

use znode_registrar::registry::RegistrationEngine;
use znode_registrar::service::{ATTR_SERVICE_SUBPATH, ATTR_SERVICE_UUID};
use znode_registrar::store::MemoryStore;
use znode_registrar::{RegistryConfig, Service};

fn service(tags: usize, scoped: bool) -> Service {
    let mut service = Service::new("nginx", "10.0.0.5", 32768, "web-1", "80");
    for idx in 0..tags {
        service = service.with_tag(format!("tag-{idx}"));
    }
    if scoped {
        service = service
            .with_attr(ATTR_SERVICE_UUID, "abc")
            .with_attr(ATTR_SERVICE_SUBPATH, "p1");
    }
    service
}

fn bench_register_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_cycle");
    for &tags in &[0_usize, 4, 16] {
        for scoped in [false, true] {
            let id = format!("{tags}-{}", if scoped { "scoped" } else { "port" });
            group.bench_with_input(BenchmarkId::from_parameter(id), &tags, |b, &tags| {
                let store = MemoryStore::new();
                let engine = RegistrationEngine::new(store.session(), &RegistryConfig::new("/bench"))
                    .expect("engine");
                engine.bootstrap().expect("bootstrap");
                let service = service(tags, scoped);
                b.iter(|| {
                    engine.register(black_box(&service)).expect("register");
                    engine.deregister(black_box(&service)).expect("deregister");
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_register_cycle);
criterion_main!(benches);
