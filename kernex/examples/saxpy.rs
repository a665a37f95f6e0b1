//! Compiles a WGSL saxpy kernel at runtime and launches it on the GPU.
//!
//! Run with `cargo run --example saxpy`; prints a message and exits when
//! no adapter is present.

use std::collections::HashMap;

use anyhow::Result;
use rand::Rng;

use kernex::prelude::*;

const SAXPY_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read_write> x: array<f32>;
@group(0) @binding(1) var<storage, read_write> y: array<f32>;
@group(0) @binding(2) var<uniform> a: f32;
@group(0) @binding(3) var<uniform> n: u32;

@compute @workgroup_size(64)
fn saxpy(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i < n) {
        y[i] = a * x[i] + y[i];
    }
}
"#;

fn main() -> Result<()> {
    env_logger::init();

    let ctx = match WgpuContext::new() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("saxpy needs a GPU adapter: {e}");
            return Ok(());
        }
    };
    println!(
        "running on {} ({})",
        ctx.adapter_name(),
        ctx.adapter_backend()
    );

    let mut specs = HashMap::new();
    specs.insert(
        "saxpy".to_string(),
        KernelSpec::new(ThreadCount::FromArg("n".into()))
            .arg("x", ArgKind::Pointer(DType::F32))
            .arg("y", ArgKind::Pointer(DType::F32))
            .arg("a", ArgKind::Value(DType::F32))
            .arg("n", ArgKind::Value(DType::U32)),
    );
    ctx.add_kernels(
        &[Source::text(SAXPY_WGSL)],
        &specs,
        &BuildOptions::default(),
    )?;

    let n = 1024usize;
    let mut rng = rand::thread_rng();
    let x: Vec<f32> = (0..n).map(|_| rng.gen::<f32>()).collect();
    let y: Vec<f32> = vec![1.0; n];

    let x_dev = ctx.to_device(&HostArray::from_slice(&x, &[n])?)?;
    let y_dev = ctx.to_device(&HostArray::from_slice(&y, &[n])?)?;

    ctx.invoke(
        "saxpy",
        &Args::new()
            .array("x", x_dev)
            .array("y", y_dev.clone())
            .scalar("a", 2.0f32)
            .scalar("n", n as u32),
    )?;

    let result = ctx.to_host(&y_dev)?.to_vec::<f32>()?;
    for (i, value) in result.iter().enumerate() {
        let expected = 2.0 * x[i] + 1.0;
        assert!((value - expected).abs() < 1e-5);
    }
    println!("saxpy verified on {n} elements");
    Ok(())
}
