use criterion::{criterion_group, criterion_main, Criterion};

use kernex_core::{ComputeContext, DeviceBuffer};
use kernex_host::HostContext;

fn buffer_round_trip(c: &mut Criterion) {
    let ctx = HostContext::new();
    let buffer = ctx.create_buffer(1 << 20).unwrap();
    let payload = vec![0x5Au8; 1 << 20];

    c.bench_function("write_1mib", |b| {
        b.iter(|| buffer.write(0, &payload).unwrap())
    });

    c.bench_function("read_1mib", |b| b.iter(|| buffer.read(0, 1 << 20).unwrap()));

    let dest = ctx.create_buffer(1 << 20).unwrap();
    c.bench_function("device_copy_1mib", |b| {
        b.iter(|| dest.copy_from_buffer(&buffer, 0, 0, 1 << 20).unwrap())
    });
}

criterion_group!(benches, buffer_round_trip);
criterion_main!(benches);
