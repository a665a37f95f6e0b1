//! The same generic code drives both backends; the backend is invisible
//! behind the contract.

use kernex::prelude::*;

/// Allocate, fill, snapshot, transfer: no backend-specific types.
fn exercise_buffers<C: ComputeContext>(ctx: &C) -> Result<()> {
    let buffer = ctx.create_buffer(1024)?;
    buffer.write(0, &[0xAB; 100])?;
    assert_eq!(buffer.read(0, 100)?, vec![0xAB; 100]);
    assert_eq!(buffer.read(100, 924)?.len(), 924);

    let snapshot = buffer.copy_region(0, 100)?;
    buffer.write(0, &[0u8; 100])?;
    assert_eq!(snapshot.read(0, 100)?, vec![0xAB; 100]);

    let host = HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2])?;
    let device = ctx.to_device(&host)?;
    assert_eq!(ctx.to_host(&device)?, host);

    ctx.synchronize()
}

fn exercise_transforms<C: ComputeContext>(ctx: &C) -> Result<()> {
    use num_complex::Complex;

    let input: Vec<Complex<f32>> = (0..16).map(|i| Complex::new(i as f32, 0.0)).collect();
    let data = ctx.to_device(&HostArray::from_slice(&input, &[4, 4])?)?;
    let plan = ctx.plan_fft(&data, &[0, 1], WaitPolicy::Block)?;
    plan.forward(&data)?.wait()?;
    plan.inverse(&data)?.wait()?;
    let restored = ctx.to_host(&data)?.to_vec::<Complex<f32>>()?;
    for (a, b) in input.iter().zip(restored) {
        assert!((a - b).norm() < 1e-4);
    }
    Ok(())
}

#[test]
fn host_backend_passes_the_generic_suite() {
    let ctx = HostContext::new();
    exercise_buffers(&ctx).unwrap();
    exercise_transforms(&ctx).unwrap();
}

#[test]
fn wgpu_backend_passes_the_generic_suite() {
    let ctx = match WgpuContext::new() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            return;
        }
    };
    exercise_buffers(&ctx).unwrap();
    exercise_transforms(&ctx).unwrap();
}
