//! Source checks shared by every compiler adapter.
//!
//! These run before any toolchain is invoked so that obviously broken
//! submissions fail fast with a readable diagnostic.

use crate::{DeviceError, KernelType};

/// Whether `name` is an identifier usable as a kernel entry point.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject empty sources and non-identifier entry points.
pub fn precheck(source: &str, entry: &str) -> Result<(), DeviceError> {
    if !is_identifier(entry) {
        return Err(DeviceError::Compile {
            name: entry.to_string(),
            log: format!("error: '{entry}' is not a valid entry point name"),
        });
    }
    if source.trim().is_empty() {
        return Err(DeviceError::Compile {
            name: entry.to_string(),
            log: "error: kernel source is empty".to_string(),
        });
    }
    Ok(())
}

/// Whether `source` declares `entry` as a kernel in the given dialect.
///
/// CUDA needs a `__global__` function named `entry`; PTX needs an
/// `.entry entry` directive.
pub fn declares_entry(source: &str, kernel_type: KernelType, entry: &str) -> bool {
    match kernel_type {
        KernelType::Cuda => {
            source.contains("__global__")
                && identifier_positions(source, entry).any(|end| {
                    source[end..].trim_start().starts_with('(')
                })
        }
        KernelType::Ptx => identifier_positions(source, entry).any(|end| {
            let start = end - entry.len();
            source[..start].trim_end().ends_with(".entry")
        }),
    }
}

/// `#error` directives in the source, as `(line, message)` pairs.
pub fn error_directives(source: &str) -> Vec<(usize, String)> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let rest = line.trim_start().strip_prefix('#')?.trim_start();
            let msg = rest.strip_prefix("error")?;
            if msg.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
                return None;
            }
            Some((i + 1, msg.trim().to_string()))
        })
        .collect()
}

/// Byte offsets just past each whole-identifier occurrence of `ident`.
fn identifier_positions<'a>(source: &'a str, ident: &'a str) -> impl Iterator<Item = usize> + 'a {
    let bytes = source.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    source.match_indices(ident).filter_map(move |(start, _)| {
        let end = start + ident.len();
        let before_ok = start == 0 || !is_ident(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_ident(bytes[end]);
        (before_ok && after_ok).then_some(end)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUDA_SRC: &str = r#"
extern "C" __global__ void matmul(float* out, const float* a, const float* b) {
  out[threadIdx.x] = a[threadIdx.x] * b[threadIdx.x];
}
"#;

    const PTX_SRC: &str = r#"
.version 7.0
.target sm_70
.address_size 64
.visible .entry fill_zeros(
  .param .u64 out
)
{
  ret;
}
"#;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("matmul"));
        assert!(is_identifier("_k2"));
        assert!(!is_identifier("2k"));
        assert!(!is_identifier("mat-mul"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a b"));
    }

    #[test]
    fn test_precheck() {
        assert!(precheck(CUDA_SRC, "matmul").is_ok());
        assert!(matches!(precheck("", "matmul"), Err(DeviceError::Compile { .. })));
        assert!(matches!(precheck(CUDA_SRC, "mat mul"), Err(DeviceError::Compile { .. })));
    }

    #[test]
    fn test_declares_entry_cuda() {
        assert!(declares_entry(CUDA_SRC, KernelType::Cuda, "matmul"));
        assert!(!declares_entry(CUDA_SRC, KernelType::Cuda, "mat"));
        assert!(!declares_entry(CUDA_SRC, KernelType::Cuda, "add"));
        assert!(!declares_entry("void matmul() {}", KernelType::Cuda, "matmul"));
    }

    #[test]
    fn test_declares_entry_ptx() {
        assert!(declares_entry(PTX_SRC, KernelType::Ptx, "fill_zeros"));
        assert!(!declares_entry(PTX_SRC, KernelType::Ptx, "fill"));
        assert!(!declares_entry(CUDA_SRC, KernelType::Ptx, "matmul"));
    }

    #[test]
    fn test_error_directives() {
        let src = "#include <x>\n  # error \"unsupported tile size\"\n#errorx no\n";
        let found = error_directives(src);
        assert_eq!(found, vec![(2, "\"unsupported tile size\"".to_string())]);
    }
}
