//! Host implementations of a few reference kernels.
//!
//! Argument convention matches the harness: `args[0]` is the output, the
//! inputs follow in suite order. All built-ins except `fill_zeros` work on
//! little-endian f32 data.

use kbot_core::LaunchGeometry;

use super::HostKernel;

fn read_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn write_f32(dst: &mut [u8], values: &[f32]) {
    for (chunk, v) in dst.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn arity(args: &[Vec<u8>], expected: usize, name: &str) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!("{name} expects {expected} buffers, got {}", args.len()));
    }
    Ok(())
}

/// `out[i] = a[i] + b[i]`
pub fn elementwise_add() -> HostKernel {
    HostKernel::new(|_geometry: &LaunchGeometry, args: &mut [Vec<u8>]| {
        arity(args, 3, "elementwise_add")?;
        let a = read_f32(&args[1]);
        let b = read_f32(&args[2]);
        let n = args[0].len() / 4;
        if a.len() < n || b.len() < n {
            return Err("elementwise_add: inputs shorter than output".to_string());
        }
        let sum: Vec<f32> = a.iter().zip(&b).take(n).map(|(x, y)| x + y).collect();
        write_f32(&mut args[0], &sum);
        Ok(Some(n as u64))
    })
}

/// Square `out[N,N] = a[N,N] @ b[N,N]`.
pub fn matmul() -> HostKernel {
    HostKernel::new(|_geometry: &LaunchGeometry, args: &mut [Vec<u8>]| {
        arity(args, 3, "matmul")?;
        let a = read_f32(&args[1]);
        let b = read_f32(&args[2]);
        let n = (a.len() as f64).sqrt() as usize;
        if n * n != a.len() || b.len() != a.len() || args[0].len() != a.len() * 4 {
            return Err(format!(
                "matmul: expected three square f32 matrices, got {} / {} / {} elements",
                args[0].len() / 4,
                a.len(),
                b.len()
            ));
        }
        let mut c = vec![0.0f32; n * n];
        for i in 0..n {
            for p in 0..n {
                let aip = a[i * n + p];
                for j in 0..n {
                    c[i * n + j] += aip * b[p * n + j];
                }
            }
        }
        write_f32(&mut args[0], &c);
        Ok(Some(2 * (n as u64).pow(3)))
    })
}

/// Zero the output regardless of input.
pub fn fill_zeros() -> HostKernel {
    HostKernel::new(|_geometry: &LaunchGeometry, args: &mut [Vec<u8>]| {
        let out = args.first_mut().ok_or("fill_zeros expects an output buffer")?;
        out.iter_mut().for_each(|b| *b = 0);
        Ok(None)
    })
}

/// Every built-in, keyed by entry-point name.
pub fn all() -> Vec<(&'static str, HostKernel)> {
    vec![
        ("elementwise_add", elementwise_add()),
        ("matmul", matmul()),
        ("fill_zeros", fill_zeros()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    fn geometry() -> LaunchGeometry {
        LaunchGeometry::new([1, 1, 1], [1, 1, 1]).unwrap()
    }

    #[test]
    fn test_matmul_2x2() {
        let mut args = vec![
            vec![0u8; 16],
            f32_bytes(&[1.0, 2.0, 3.0, 4.0]),
            f32_bytes(&[5.0, 6.0, 7.0, 8.0]),
        ];
        let ops = matmul().call(&geometry(), &mut args).unwrap();
        assert_eq!(read_f32(&args[0]), vec![19.0, 22.0, 43.0, 50.0]);
        assert_eq!(ops, Some(16));
    }

    #[test]
    fn test_matmul_rejects_non_square() {
        let mut args = vec![vec![0u8; 12], f32_bytes(&[1.0; 3]), f32_bytes(&[1.0; 3])];
        assert!(matmul().call(&geometry(), &mut args).is_err());
    }

    #[test]
    fn test_elementwise_add() {
        let mut args = vec![vec![0u8; 12], f32_bytes(&[1.0, 2.0, 3.0]), f32_bytes(&[0.5, 0.5, 0.5])];
        let ops = elementwise_add().call(&geometry(), &mut args).unwrap();
        assert_eq!(read_f32(&args[0]), vec![1.5, 2.5, 3.5]);
        assert_eq!(ops, Some(3));
    }

    #[test]
    fn test_fill_zeros() {
        let mut args = vec![vec![7u8; 8], vec![1u8; 8]];
        assert_eq!(fill_zeros().call(&geometry(), &mut args).unwrap(), None);
        assert!(args[0].iter().all(|&b| b == 0));
        assert!(args[1].iter().all(|&b| b == 1));
    }
}
