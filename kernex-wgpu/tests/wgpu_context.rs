//! GPU tests. Every test skips gracefully on machines without an adapter
//! so the suite stays green in headless CI.

use std::collections::HashMap;

use kernex_core::prelude::*;
use kernex_wgpu::WgpuContext;

fn test_context() -> Option<WgpuContext> {
    match WgpuContext::new() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

const FILL_DOUBLE_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;
@group(0) @binding(1) var<uniform> n: u32;

@compute @workgroup_size(64)
fn fill_double(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < n) {
        data[gid.x] = gid.x * 2u;
    }
}
"#;

fn fill_double_specs() -> HashMap<String, KernelSpec> {
    let mut specs = HashMap::new();
    specs.insert(
        "fill_double".to_string(),
        KernelSpec::new(ThreadCount::FromArg("n".into()))
            .arg("data", ArgKind::Pointer(DType::U32))
            .arg("n", ArgKind::Value(DType::U32)),
    );
    specs
}

#[test]
fn write_read_round_trip() {
    let Some(ctx) = test_context() else { return };
    let buffer = ctx.create_buffer(1024).unwrap();
    buffer.write(0, &[0xAB; 100]).unwrap();
    assert_eq!(buffer.read(0, 100).unwrap(), vec![0xAB; 100]);
    assert_eq!(buffer.read(100, 924).unwrap().len(), 924);
}

#[test]
fn out_of_range_operations_fail() {
    let Some(ctx) = test_context() else { return };
    let buffer = ctx.create_buffer(128).unwrap();
    assert!(matches!(
        buffer.write(120, &[0u8; 16]),
        Err(Error::Range { .. })
    ));
    assert!(matches!(buffer.read(0, 132), Err(Error::Range { .. })));
}

#[test]
fn unaligned_copies_are_rejected() {
    let Some(ctx) = test_context() else { return };
    let buffer = ctx.create_buffer(64).unwrap();
    // Offsets and byte counts must be whole words on this backend.
    assert!(matches!(
        buffer.write(2, &[0u8; 4]),
        Err(Error::Alignment { .. })
    ));
    assert!(matches!(buffer.read(0, 3), Err(Error::Alignment { .. })));
}

#[test]
fn region_copy_is_detached() {
    let Some(ctx) = test_context() else { return };
    let buffer = ctx.create_buffer(64).unwrap();
    buffer.write(0, &[9u8; 64]).unwrap();

    let snapshot = buffer.copy_region(16, 32).unwrap();
    assert_eq!(snapshot.read(0, 32).unwrap(), vec![9u8; 32]);

    buffer.write(16, &[1u8; 32]).unwrap();
    ctx.synchronize().unwrap();
    assert_eq!(snapshot.read(0, 32).unwrap(), vec![9u8; 32]);
}

#[test]
fn device_to_device_copies() {
    let Some(ctx) = test_context() else { return };
    let src = ctx.create_buffer(32).unwrap();
    src.write(0, &[7u8; 32]).unwrap();

    let dst = ctx.create_buffer(32).unwrap();
    src.copy_to_device(&dst).unwrap();
    assert_eq!(dst.read(0, 32).unwrap(), vec![7u8; 32]);

    // Same-buffer copy through the scratch path.
    let buffer = ctx.create_buffer(16).unwrap();
    buffer
        .write(0, &[1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    buffer.copy_from_buffer(&buffer.clone(), 0, 8, 4).unwrap();
    assert_eq!(buffer.read(8, 4).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn host_array_transfers() {
    let Some(ctx) = test_context() else { return };
    let host = HostArray::from_slice(&[1.5f32, -2.5, 3.0, 0.5], &[4]).unwrap();
    let device = ctx.to_device(&host).unwrap();
    let back = ctx.to_host(&device).unwrap();
    assert_eq!(back, host);

    let zeros = ctx.zeros(&[8], DType::U32).unwrap();
    assert_eq!(
        ctx.to_host(&zeros).unwrap().to_vec::<u32>().unwrap(),
        vec![0u32; 8]
    );
}

#[test]
fn kernel_launch_reflects_before_explicit_sync() {
    let Some(ctx) = test_context() else { return };
    ctx.add_kernels(
        &[Source::text(FILL_DOUBLE_WGSL)],
        &fill_double_specs(),
        &BuildOptions::default(),
    )
    .unwrap();

    let data = ctx.zeros(&[64], DType::U32).unwrap();
    // Wait-on-call launch: no synchronize() before the read.
    ctx.invoke(
        "fill_double",
        &Args::new().array("data", data.clone()).scalar("n", 64u32),
    )
    .unwrap();

    let result = ctx.to_host(&data).unwrap().to_vec::<u32>().unwrap();
    let expected: Vec<u32> = (0..64).map(|i| i * 2).collect();
    assert_eq!(result, expected);
}

#[test]
fn deferred_launch_completes_on_wait() {
    let Some(ctx) = test_context() else { return };
    let mut specs = fill_double_specs();
    specs
        .get_mut("fill_double")
        .unwrap()
        .wait = WaitPolicy::Deferred;
    ctx.add_kernels(
        &[Source::text(FILL_DOUBLE_WGSL)],
        &specs,
        &BuildOptions::default(),
    )
    .unwrap();

    let data = ctx.zeros(&[128], DType::U32).unwrap();
    let completion = ctx
        .invoke(
            "fill_double",
            &Args::new().array("data", data.clone()).scalar("n", 128u32),
        )
        .unwrap();
    completion.wait().unwrap();

    let result = ctx.to_host(&data).unwrap().to_vec::<u32>().unwrap();
    assert_eq!(result[127], 254);
}

#[test]
fn recompiling_a_name_replaces_the_binding() {
    let Some(ctx) = test_context() else { return };

    let stamp_one = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;
@compute @workgroup_size(64)
fn stamp(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < 16u) { data[gid.x] = 1u; }
}
"#;
    let stamp_two = stamp_one.replace("= 1u", "= 2u");

    let mut specs = HashMap::new();
    specs.insert(
        "stamp".to_string(),
        KernelSpec::new(ThreadCount::Fixed(16)).arg("data", ArgKind::Pointer(DType::U32)),
    );

    let data = ctx.zeros(&[16], DType::U32).unwrap();

    ctx.add_kernels(
        &[Source::text(stamp_one)],
        &specs,
        &BuildOptions::default(),
    )
    .unwrap();
    ctx.invoke("stamp", &Args::new().array("data", data.clone()))
        .unwrap();
    assert_eq!(
        ctx.to_host(&data).unwrap().to_vec::<u32>().unwrap(),
        vec![1u32; 16]
    );

    ctx.add_kernels(
        &[Source::text(&stamp_two)],
        &specs,
        &BuildOptions::default(),
    )
    .unwrap();
    ctx.invoke("stamp", &Args::new().array("data", data.clone()))
        .unwrap();
    assert_eq!(
        ctx.to_host(&data).unwrap().to_vec::<u32>().unwrap(),
        vec![2u32; 16]
    );
}

#[test]
fn bad_wgsl_is_a_compilation_error() {
    let Some(ctx) = test_context() else { return };
    let mut specs = HashMap::new();
    specs.insert(
        "broken".to_string(),
        KernelSpec::new(ThreadCount::Fixed(1)),
    );
    let err = ctx
        .add_kernels(
            &[Source::text("@compute fn broken( {")],
            &specs,
            &BuildOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Compilation { .. }));
}

#[test]
fn missing_entry_point_is_a_compilation_error() {
    let Some(ctx) = test_context() else { return };
    let mut specs = HashMap::new();
    specs.insert(
        "absent".to_string(),
        KernelSpec::new(ThreadCount::Fixed(1)),
    );
    let err = ctx
        .add_kernels(
            &[Source::text(FILL_DOUBLE_WGSL)],
            &specs,
            &BuildOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Compilation { .. }));
}

#[test]
fn argument_count_mismatch_submits_nothing() {
    let Some(ctx) = test_context() else { return };
    ctx.add_kernels(
        &[Source::text(FILL_DOUBLE_WGSL)],
        &fill_double_specs(),
        &BuildOptions::default(),
    )
    .unwrap();

    let data = ctx.zeros(&[16], DType::U32).unwrap();
    let err = ctx
        .invoke("fill_double", &Args::new().array("data", data.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentCount { .. }));
    assert_eq!(
        ctx.to_host(&data).unwrap().to_vec::<u32>().unwrap(),
        vec![0u32; 16]
    );
}

#[test]
fn kernel_arg_offsets_respect_device_alignment() {
    let Some(ctx) = test_context() else { return };
    let buffer = ctx.create_buffer(4096).unwrap();
    let align = buffer.alignment();
    assert!(buffer.as_kernel_arg(0, 64).is_ok());
    if align > 1 {
        // Half an alignment unit is never a valid pointer offset.
        assert!(matches!(
            buffer.as_kernel_arg(align + align / 2, 64),
            Err(Error::Alignment { .. })
        ));
    }
}

#[test]
fn transform_round_trip_in_place() {
    use num_complex::Complex;

    let Some(ctx) = test_context() else { return };
    let input: Vec<Complex<f32>> = (0..32)
        .map(|i| Complex::new((i as f32).cos(), (i as f32 * 0.7).sin()))
        .collect();
    let data = ctx
        .to_device(&HostArray::from_slice(&input, &[8, 4]).unwrap())
        .unwrap();

    // Shape rules are enforced before any plan exists.
    let bad = ctx.zeros(&[6, 8], DType::C64).unwrap();
    assert!(ctx.plan_fft(&bad, &[0, 1], WaitPolicy::Block).is_err());

    let plan = ctx.plan_fft(&data, &[0, 1], WaitPolicy::Block).unwrap();
    plan.forward(&data).unwrap().wait().unwrap();
    plan.inverse(&data).unwrap().wait().unwrap();

    let restored = ctx.to_host(&data).unwrap().to_vec::<Complex<f32>>().unwrap();
    for (a, b) in input.iter().zip(restored) {
        assert!((a - b).norm() < 1e-4);
    }
}
