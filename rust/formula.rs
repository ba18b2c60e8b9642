//! Square-root sums and per-element `x² + 1` over `f32` sequences.
//!
//! Inputs are processed in chunks of [`LANES`] floats. Full chunks go through
//! the SIMD backend, the `length % LANES` tail goes through the scalar terms
//! below, so both paths share one per-element formula.
//!
//! - [`sqrt_sum`]: `Σ √xᵢ`
//! - [`squares_plus_one`]: `xᵢ² + 1`, element-wise
//! - [`reduce_add4`], [`reduce_mul4`]: horizontal sum and product of one chunk
//!
//! Negative inputs are not rejected: their square root is NaN, and so is the sum.

use crate::capabilities::Backend;
use crate::error::{check_length, KernelError};

/// Number of `f32` lanes in one chunk.
pub const LANES: usize = 4;

#[inline(always)]
fn sqrt_term(x: f32) -> f32 {
    x.sqrt()
}

#[inline(always)]
fn square_plus_one_term(x: f32) -> f32 {
    x * x + 1.0
}

// region: Operations

/// Sums the square roots of the first `length` elements of `values`.
///
/// # Errors
/// [`KernelError::InvalidLength`] if `length > values.len()`.
///
/// # Example
/// ```
/// use simdkernels::sqrt_sum;
///
/// let sum = sqrt_sum(&[1.0, 4.0, 9.0, 16.0, 25.0], 5).unwrap();
/// assert!((sum - 15.0).abs() < 1e-5);
/// ```
pub fn sqrt_sum(values: &[f32], length: usize) -> Result<f32, KernelError> {
    sqrt_sum_with(values, length, Backend::detect())
}

/// [`sqrt_sum`] on an explicit backend.
///
/// Square roots are taken in `f32`; the running sum is kept in `f64` on every
/// backend and rounded to `f32` once at the end.
pub fn sqrt_sum_with(
    values: &[f32],
    length: usize,
    backend: Backend,
) -> Result<f32, KernelError> {
    check_length(length, values.len())?;
    let (body, tail) = split_chunks(&values[..length]);

    let mut sum: f64 = match backend.resolve() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        Backend::Sse => unsafe { x86::sqrt_sum_chunks(body) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::sqrt_sum_chunks(body) },
        _ => body.iter().map(|&x| sqrt_term(x) as f64).sum(),
    };
    for &x in tail {
        sum += sqrt_term(x) as f64;
    }
    Ok(sum as f32)
}

/// Writes `x * x + 1` for each of the first `length` elements of `values`
/// into the front of `result`.
///
/// # Errors
/// [`KernelError::InvalidLength`] if `length` exceeds either slice.
pub fn squares_plus_one(
    values: &[f32],
    length: usize,
    result: &mut [f32],
) -> Result<(), KernelError> {
    squares_plus_one_with(values, length, result, Backend::detect())
}

/// [`squares_plus_one`] on an explicit backend.
pub fn squares_plus_one_with(
    values: &[f32],
    length: usize,
    result: &mut [f32],
    backend: Backend,
) -> Result<(), KernelError> {
    check_length(length, values.len())?;
    check_length(length, result.len())?;
    let (body, tail) = split_chunks(&values[..length]);
    let (result_body, result_tail) = result[..length].split_at_mut(body.len());

    match backend.resolve() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        Backend::Sse => unsafe { x86::squares_plus_one_chunks(body, result_body) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::squares_plus_one_chunks(body, result_body) },
        _ => {
            for (out, &x) in result_body.iter_mut().zip(body) {
                *out = square_plus_one_term(x);
            }
        }
    }
    for (out, &x) in result_tail.iter_mut().zip(tail) {
        *out = square_plus_one_term(x);
    }
    Ok(())
}

/// Horizontal sum of one chunk.
pub fn reduce_add4(chunk: [f32; LANES]) -> f32 {
    reduce_add4_with(chunk, Backend::detect())
}

/// [`reduce_add4`] on an explicit backend.
pub fn reduce_add4_with(chunk: [f32; LANES], backend: Backend) -> f32 {
    match backend.resolve() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        Backend::Sse => unsafe { x86::reduce_add4(&chunk) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::reduce_add4(&chunk) },
        _ => chunk.iter().sum(),
    }
}

/// Horizontal product of one chunk.
pub fn reduce_mul4(chunk: [f32; LANES]) -> f32 {
    reduce_mul4_with(chunk, Backend::detect())
}

/// [`reduce_mul4`] on an explicit backend.
pub fn reduce_mul4_with(chunk: [f32; LANES], backend: Backend) -> f32 {
    match backend.resolve() {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        Backend::Sse => unsafe { x86::reduce_mul4(&chunk) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::reduce_mul4(&chunk) },
        _ => chunk.iter().product(),
    }
}

/// Splits `values` into whole chunks and the tail.
#[inline]
fn split_chunks(values: &[f32]) -> (&[f32], &[f32]) {
    values.split_at(values.len() - values.len() % LANES)
}

// endregion: Operations

// region: SSE

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::*;

    use super::LANES;

    #[inline]
    #[target_feature(enable = "sse")]
    unsafe fn reduce_add_ps(v: __m128) -> f32 {
        // [a, b, c, d] -> [b, a, d, c]
        let swapped = _mm_shuffle_ps::<0b10_11_00_01>(v, v);
        let pairs = _mm_add_ps(v, swapped); // [a+b, a+b, c+d, c+d]
        let high = _mm_movehl_ps(pairs, pairs); // [c+d, c+d, c+d, c+d]
        _mm_cvtss_f32(_mm_add_ss(pairs, high))
    }

    #[inline]
    #[target_feature(enable = "sse")]
    unsafe fn reduce_mul_ps(v: __m128) -> f32 {
        let swapped = _mm_shuffle_ps::<0b10_11_00_01>(v, v);
        let pairs = _mm_mul_ps(v, swapped);
        let high = _mm_movehl_ps(pairs, pairs);
        _mm_cvtss_f32(_mm_mul_ss(pairs, high))
    }

    /// Roots in `f32` lanes, widened into two `f64` accumulators per chunk.
    #[target_feature(enable = "sse,sse2")]
    pub(super) unsafe fn sqrt_sum_chunks(body: &[f32]) -> f64 {
        debug_assert_eq!(body.len() % LANES, 0);
        let mut low_sum = _mm_setzero_pd();
        let mut high_sum = _mm_setzero_pd();
        for chunk in body.chunks_exact(LANES) {
            let roots = _mm_sqrt_ps(_mm_loadu_ps(chunk.as_ptr()));
            low_sum = _mm_add_pd(low_sum, _mm_cvtps_pd(roots));
            high_sum = _mm_add_pd(high_sum, _mm_cvtps_pd(_mm_movehl_ps(roots, roots)));
        }
        let sum = _mm_add_pd(low_sum, high_sum); // [a+c, b+d]
        _mm_cvtsd_f64(_mm_add_sd(sum, _mm_unpackhi_pd(sum, sum)))
    }

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn squares_plus_one_chunks(body: &[f32], result: &mut [f32]) {
        debug_assert_eq!(body.len(), result.len());
        let one = _mm_set1_ps(1.0);
        for (chunk, out) in body
            .chunks_exact(LANES)
            .zip(result.chunks_exact_mut(LANES))
        {
            let values = _mm_loadu_ps(chunk.as_ptr());
            let squares = _mm_mul_ps(values, values);
            _mm_storeu_ps(out.as_mut_ptr(), _mm_add_ps(squares, one));
        }
    }

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn reduce_add4(chunk: &[f32; LANES]) -> f32 {
        reduce_add_ps(_mm_loadu_ps(chunk.as_ptr()))
    }

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn reduce_mul4(chunk: &[f32; LANES]) -> f32 {
        reduce_mul_ps(_mm_loadu_ps(chunk.as_ptr()))
    }
}

// endregion: SSE

// region: NEON

#[cfg(target_arch = "aarch64")]
mod neon {
    use core::arch::aarch64::*;

    use super::LANES;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn sqrt_sum_chunks(body: &[f32]) -> f64 {
        debug_assert_eq!(body.len() % LANES, 0);
        let mut low_sum = vdupq_n_f64(0.0);
        let mut high_sum = vdupq_n_f64(0.0);
        for chunk in body.chunks_exact(LANES) {
            let roots = vsqrtq_f32(vld1q_f32(chunk.as_ptr()));
            low_sum = vaddq_f64(low_sum, vcvt_f64_f32(vget_low_f32(roots)));
            high_sum = vaddq_f64(high_sum, vcvt_high_f64_f32(roots));
        }
        vaddvq_f64(vaddq_f64(low_sum, high_sum))
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn squares_plus_one_chunks(body: &[f32], result: &mut [f32]) {
        debug_assert_eq!(body.len(), result.len());
        let one = vdupq_n_f32(1.0);
        for (chunk, out) in body
            .chunks_exact(LANES)
            .zip(result.chunks_exact_mut(LANES))
        {
            let values = vld1q_f32(chunk.as_ptr());
            // Separate multiply and add, no fused rounding.
            let squares = vmulq_f32(values, values);
            vst1q_f32(out.as_mut_ptr(), vaddq_f32(squares, one));
        }
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn reduce_add4(chunk: &[f32; LANES]) -> f32 {
        vaddvq_f32(vld1q_f32(chunk.as_ptr()))
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn reduce_mul4(chunk: &[f32; LANES]) -> f32 {
        let values = vld1q_f32(chunk.as_ptr());
        let pairs = vmul_f32(vget_low_f32(values), vget_high_f32(values)); // [a*c, b*d]
        vget_lane_f32::<0>(pairs) * vget_lane_f32::<1>(pairs)
    }
}

// endregion: NEON

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const BACKENDS: [Backend; 3] = [Backend::Serial, Backend::Sse, Backend::Neon];

    fn assert_almost_equal(left: f32, right: f32, tolerance: f32) {
        let lower = right - tolerance;
        let upper = right + tolerance;
        assert!(
            left >= lower && left <= upper,
            "expected {} but got {}, tolerance {}",
            right,
            left,
            tolerance
        );
    }

    fn assert_relative_equal(left: f32, right: f32) {
        let tolerance = 1e-5 * right.abs().max(1.0);
        assert_almost_equal(left, right, tolerance);
    }

    fn reference_sqrt_sum(values: &[f32]) -> f32 {
        let mut sum = 0.0_f64;
        for &x in values {
            sum += (x as f64).sqrt();
        }
        sum as f32
    }

    fn random_vector(rng: &mut StdRng, length: usize) -> Vec<f32> {
        (0..length).map(|_| rng.gen_range(0.0..100.0)).collect()
    }

    #[test]
    fn sqrt_sum_empty() {
        for backend in BACKENDS {
            assert_eq!(sqrt_sum_with(&[], 0, backend), Ok(0.0));
        }
    }

    #[test]
    fn sqrt_sum_perfect_squares() {
        let values = [1.0_f32, 4.0, 9.0, 16.0, 25.0, 36.0, 49.0, 64.0];
        for backend in BACKENDS {
            let sum = sqrt_sum_with(&values, values.len(), backend).unwrap();
            assert_almost_equal(sum, 36.0, 1e-5);
        }
    }

    #[test]
    fn sqrt_sum_tail_lengths() {
        let mut rng = StdRng::seed_from_u64(42);
        let values = random_vector(&mut rng, 20);
        for length in 0..=20 {
            let expected = reference_sqrt_sum(&values[..length]);
            for backend in BACKENDS {
                let sum = sqrt_sum_with(&values, length, backend).unwrap();
                assert_relative_equal(sum, expected);
            }
        }
    }

    #[test]
    fn sqrt_sum_only_reads_declared_length() {
        // A NaN-producing element past `length` must not leak into the sum.
        let values = [4.0_f32, 4.0, 4.0, 4.0, 4.0, -1.0, -1.0, -1.0];
        for backend in BACKENDS {
            let sum = sqrt_sum_with(&values, 5, backend).unwrap();
            assert_almost_equal(sum, 10.0, 1e-5);
        }
    }

    #[test]
    fn sqrt_sum_backends_agree() {
        let mut rng = StdRng::seed_from_u64(7);
        let values = random_vector(&mut rng, 1537);
        let serial = sqrt_sum_with(&values, values.len(), Backend::Serial).unwrap();
        let detected = sqrt_sum(&values, values.len()).unwrap();
        assert_relative_equal(detected, serial);
        assert_relative_equal(serial, reference_sqrt_sum(&values));
    }

    #[test]
    fn sqrt_sum_long_constant_input() {
        // Rounding in an `f32` running sum drifts well past 1e-5 at this length.
        let length = 1 << 20;
        let values = vec![2.0_f32; length];
        let expected = 2.0_f64.sqrt() * length as f64;
        for backend in BACKENDS {
            let sum = sqrt_sum_with(&values, length, backend).unwrap() as f64;
            let relative_error = (sum - expected).abs() / expected;
            assert!(
                relative_error < 1e-5,
                "{} backend: expected {} but got {}, relative error {}",
                backend.name(),
                expected,
                sum,
                relative_error
            );
        }
        // A tail on top of the whole chunks.
        let sum = sqrt_sum(&values, length - 3).unwrap() as f64;
        let expected = 2.0_f64.sqrt() * (length - 3) as f64;
        assert!((sum - expected).abs() / expected < 1e-5);
    }

    #[test]
    fn sqrt_sum_negative_is_nan() {
        for backend in BACKENDS {
            // In a full chunk and in the tail.
            let sum = sqrt_sum_with(&[1.0, -4.0, 9.0, 16.0], 4, backend).unwrap();
            assert!(sum.is_nan());
            let sum = sqrt_sum_with(&[1.0, 4.0, 9.0, 16.0, -1.0], 5, backend).unwrap();
            assert!(sum.is_nan());
        }
    }

    #[test]
    fn sqrt_sum_length_past_end() {
        assert_eq!(
            sqrt_sum(&[1.0, 2.0, 3.0], 4),
            Err(KernelError::InvalidLength {
                length: 4,
                capacity: 3
            })
        );
    }

    #[test]
    fn squares_plus_one_values() {
        let values = [0.0_f32, 1.0, -2.0, 3.0, 0.5, -1.5, 10.0];
        let expected = [1.0_f32, 2.0, 5.0, 10.0, 1.25, 3.25, 101.0];
        for backend in BACKENDS {
            let mut result = [0.0_f32; 7];
            squares_plus_one_with(&values, values.len(), &mut result, backend).unwrap();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn squares_plus_one_leaves_rest_untouched() {
        let values = [2.0_f32; 8];
        let mut result = [-1.0_f32; 8];
        squares_plus_one(&values, 5, &mut result).unwrap();
        assert_eq!(result, [5.0, 5.0, 5.0, 5.0, 5.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn squares_plus_one_backends_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let values = random_vector(&mut rng, 103);
        let mut serial = vec![0.0_f32; values.len()];
        let mut detected = vec![0.0_f32; values.len()];
        squares_plus_one_with(&values, values.len(), &mut serial, Backend::Serial).unwrap();
        squares_plus_one(&values, values.len(), &mut detected).unwrap();
        assert_eq!(serial, detected);
    }

    #[test]
    fn squares_plus_one_short_result() {
        let values = [1.0_f32; 6];
        let mut result = [0.0_f32; 4];
        assert_eq!(
            squares_plus_one(&values, 6, &mut result),
            Err(KernelError::InvalidLength {
                length: 6,
                capacity: 4
            })
        );
        assert!(squares_plus_one(&values, 7, &mut [0.0; 8]).is_err());
    }

    #[test]
    fn reduce_add4_matches_sum() {
        let chunk = [1.5_f32, -2.25, 3.0, 100.125];
        for backend in BACKENDS {
            assert_almost_equal(reduce_add4_with(chunk, backend), 102.375, 1e-4);
        }
    }

    #[test]
    fn reduce_mul4_matches_product() {
        let chunk = [1.5_f32, -2.0, 3.0, 0.25];
        for backend in BACKENDS {
            assert_almost_equal(reduce_mul4_with(chunk, backend), -2.25, 1e-6);
        }
    }

    #[test]
    fn reductions_permutation_invariant() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..64 {
            let [a, b, c, d]: [f32; 4] = core::array::from_fn(|_| rng.gen_range(-10.0..10.0));
            let sum = a + b + c + d;
            let product = a * b * c * d;
            let permutations = [
                [a, b, c, d],
                [d, c, b, a],
                [b, a, d, c],
                [c, d, a, b],
                [a, c, b, d],
                [d, a, c, b],
            ];
            for chunk in permutations {
                for backend in BACKENDS {
                    assert_almost_equal(reduce_add4_with(chunk, backend), sum, 1e-4);
                    let tolerance = 1e-5 * product.abs().max(1.0);
                    assert_almost_equal(reduce_mul4_with(chunk, backend), product, tolerance);
                }
            }
        }
    }
}
