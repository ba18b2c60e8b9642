//! Hamming distance between null-terminated byte buffers.
//!
//! Buffers hold at most [`CAPACITY`] bytes; the logical length of a buffer is
//! the index of its first zero byte, or the capacity if there is none. Only the
//! overlapping prefix of two buffers is compared, [`LANES`] bytes per vector
//! compare. The last partial chunk is copied into zero-padded stack chunks, so
//! no byte at or past the logical length is ever loaded from the inputs.

use crate::capabilities::Backend;
use crate::error::{check_length, KernelError};

/// Maximum number of bytes in a buffer.
pub const CAPACITY: usize = 256;

/// Number of bytes compared per vector instruction.
pub const LANES: usize = 16;

// region: Helpers

/// Returns the smaller of two integers.
#[inline]
pub fn local_min(a: i32, b: i32) -> i32 {
    if a < b {
        a
    } else {
        b
    }
}

/// Returns the absolute value of `a`, saturating `i32::MIN` to `i32::MAX`.
#[inline]
pub fn local_abs(a: i32) -> i32 {
    a.saturating_abs()
}

/// Index of the first zero byte among the first `CAPACITY` bytes of `buffer`.
///
/// Returns `min(buffer.len(), CAPACITY)` if there is no zero byte, which for a
/// full buffer is the `CAPACITY` sentinel. Never looks past index 255.
pub fn logical_length(buffer: &[u8]) -> usize {
    let bound = buffer.len().min(CAPACITY);
    buffer[..bound]
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(bound)
}

/// Copies a tail of fewer than `LANES` bytes into a zeroed chunk.
/// The padding is equal in both operands and never counts as a mismatch.
#[inline]
fn pad_tail(tail: &[u8]) -> [u8; LANES] {
    debug_assert!(tail.len() < LANES);
    let mut chunk = [0_u8; LANES];
    chunk[..tail.len()].copy_from_slice(tail);
    chunk
}

// endregion: Helpers

// region: Operations

/// Counts the positions at which two buffers differ, over the shorter of
/// their logical lengths.
///
/// # Example
/// ```
/// use simdkernels::hamming::{hamming_distance, CAPACITY};
///
/// let mut a = [0_u8; CAPACITY];
/// let mut b = [0_u8; CAPACITY];
/// a[..7].copy_from_slice(b"karolin");
/// b[..7].copy_from_slice(b"kathrin");
/// assert_eq!(hamming_distance(&a, &b), 3);
/// ```
pub fn hamming_distance(a: &[u8; CAPACITY], b: &[u8; CAPACITY]) -> u32 {
    hamming_distance_with(a, b, Backend::detect())
}

/// [`hamming_distance`] on an explicit backend.
pub fn hamming_distance_with(a: &[u8; CAPACITY], b: &[u8; CAPACITY], backend: Backend) -> u32 {
    prefix_mismatches(a, b, backend)
}

/// [`hamming_distance`] over slices of up to `CAPACITY` bytes.
///
/// A slice without a zero byte has a logical length of `len()`.
///
/// # Errors
/// [`KernelError::InvalidLength`] if either slice is longer than `CAPACITY`.
pub fn hamming_distance_bytes(a: &[u8], b: &[u8]) -> Result<u32, KernelError> {
    hamming_distance_bytes_with(a, b, Backend::detect())
}

/// [`hamming_distance_bytes`] on an explicit backend.
pub fn hamming_distance_bytes_with(
    a: &[u8],
    b: &[u8],
    backend: Backend,
) -> Result<u32, KernelError> {
    check_length(a.len(), CAPACITY)?;
    check_length(b.len(), CAPACITY)?;
    Ok(prefix_mismatches(a, b, backend))
}

/// Like [`hamming_distance`], but every position in the longer buffer past the
/// end of the shorter one also counts as a mismatch.
pub fn hamming_distance_padded(a: &[u8; CAPACITY], b: &[u8; CAPACITY]) -> u32 {
    hamming_distance_padded_with(a, b, Backend::detect())
}

/// [`hamming_distance_padded`] on an explicit backend.
pub fn hamming_distance_padded_with(
    a: &[u8; CAPACITY],
    b: &[u8; CAPACITY],
    backend: Backend,
) -> u32 {
    // Both lengths are at most CAPACITY, so the casts are lossless.
    let difference = local_abs(logical_length(a) as i32 - logical_length(b) as i32);
    prefix_mismatches(a, b, backend) + difference as u32
}

fn prefix_mismatches(a: &[u8], b: &[u8], backend: Backend) -> u32 {
    let n = local_min(logical_length(a) as i32, logical_length(b) as i32) as usize;
    let (a, b) = (&a[..n], &b[..n]);

    match backend.resolve() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        Backend::Sse => unsafe { x86::mismatches(a, b) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::mismatches(a, b) },
        _ => a.iter().zip(b).filter(|(x, y)| x != y).count() as u32,
    }
}

// endregion: Operations

// region: SSE2

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::*;

    use super::{pad_tail, LANES};

    /// Mismatching bytes in one chunk. Both slices hold at least `LANES` bytes.
    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn chunk_mismatches(a: &[u8], b: &[u8]) -> u32 {
        debug_assert!(a.len() >= LANES && b.len() >= LANES);
        let first = _mm_loadu_si128(a.as_ptr() as *const __m128i);
        let second = _mm_loadu_si128(b.as_ptr() as *const __m128i);
        // One bit per lane, set where the bytes are equal.
        let matches = _mm_movemask_epi8(_mm_cmpeq_epi8(first, second)) as u32;
        LANES as u32 - matches.count_ones()
    }

    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn mismatches(a: &[u8], b: &[u8]) -> u32 {
        debug_assert_eq!(a.len(), b.len());
        let mut a_chunks = a.chunks_exact(LANES);
        let mut b_chunks = b.chunks_exact(LANES);

        let mut result = 0;
        for (x, y) in a_chunks.by_ref().zip(b_chunks.by_ref()) {
            result += chunk_mismatches(x, y);
        }
        if !a_chunks.remainder().is_empty() {
            let x = pad_tail(a_chunks.remainder());
            let y = pad_tail(b_chunks.remainder());
            result += chunk_mismatches(&x, &y);
        }
        result
    }
}

// endregion: SSE2

// region: NEON

#[cfg(target_arch = "aarch64")]
mod neon {
    use core::arch::aarch64::*;

    use super::{pad_tail, LANES};

    #[inline]
    #[target_feature(enable = "neon")]
    unsafe fn chunk_mismatches(a: &[u8], b: &[u8]) -> u32 {
        debug_assert!(a.len() >= LANES && b.len() >= LANES);
        // 0xFF where equal, shifted down to 1 so the lanes add up to the match count.
        let equal = vceqq_u8(vld1q_u8(a.as_ptr()), vld1q_u8(b.as_ptr()));
        let matches = vaddvq_u8(vshrq_n_u8::<7>(equal)) as u32;
        LANES as u32 - matches
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn mismatches(a: &[u8], b: &[u8]) -> u32 {
        debug_assert_eq!(a.len(), b.len());
        let mut a_chunks = a.chunks_exact(LANES);
        let mut b_chunks = b.chunks_exact(LANES);

        let mut result = 0;
        for (x, y) in a_chunks.by_ref().zip(b_chunks.by_ref()) {
            result += chunk_mismatches(x, y);
        }
        if !a_chunks.remainder().is_empty() {
            let x = pad_tail(a_chunks.remainder());
            let y = pad_tail(b_chunks.remainder());
            result += chunk_mismatches(&x, &y);
        }
        result
    }
}

// endregion: NEON
