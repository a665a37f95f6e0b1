//! Runs a registered native kernel on the host backend.

use std::collections::HashMap;

use anyhow::Result;

use kernex::prelude::*;
use kernex::NativeArg;

fn main() -> Result<()> {
    env_logger::init();

    let ctx = HostContext::new();

    // y[i] = a * x[i] + y[i], the host twin of the GPU saxpy example.
    ctx.register_kernel("saxpy", |n, args: &[NativeArg]| {
        let x: Vec<f32> = args[0].read_vec(n)?;
        let mut y: Vec<f32> = args[1].read_vec(n)?;
        let a = match args[2].as_scalar() {
            Some(Scalar::F32(v)) => v,
            _ => 0.0,
        };
        for i in 0..n {
            y[i] += a * x[i];
        }
        args[1].write_slice(&y)
    });

    let mut specs = HashMap::new();
    specs.insert(
        "saxpy".to_string(),
        KernelSpec::new(ThreadCount::FromArg("n".into()))
            .arg("x", ArgKind::Pointer(DType::F32))
            .arg("y", ArgKind::Pointer(DType::F32))
            .arg("a", ArgKind::Value(DType::F32))
            .arg("n", ArgKind::Value(DType::U32)),
    );
    ctx.add_kernels(&[], &specs, &BuildOptions::default())?;

    let n = 8usize;
    let x = ctx.to_device(&HostArray::from_slice(&vec![1.0f32; n], &[n])?)?;
    let y = ctx.to_device(&HostArray::from_slice(&vec![10.0f32; n], &[n])?)?;

    ctx.invoke(
        "saxpy",
        &Args::new()
            .array("x", x)
            .array("y", y.clone())
            .scalar("a", 0.5f32)
            .scalar("n", n as u32),
    )?;

    let result = ctx.to_host(&y)?.to_vec::<f32>()?;
    println!("saxpy on host backend: {result:?}");
    Ok(())
}
