//! # simdkernels - SIMD-Accelerated Square-Root Sums and Hamming Distances
//!
//! * Pure Rust kernels over `std::arch` intrinsics, no C toolchain required.
//! * Targets x86 SSE/SSE2 and ARM NEON, with a serial fallback everywhere.
//! * Backends are detected at runtime and can be pinned to serial at build time.
//!
//! ## Implemented kernels:
//!
//! * Sum of square roots over `f32` sequences, in chunks of 4 with a scalar tail.
//! * Element-wise `x² + 1` over `f32` sequences.
//! * Horizontal sum and product of a single 4-lane chunk.
//! * Hamming distance between null-terminated 256-byte buffers, 16 bytes per compare.
//!
//! # Example
//!
//! ```rust
//! use simdkernels::{hamming_distance, sqrt_sum, CAPACITY};
//!
//! // Sum of square roots
//! let sum = sqrt_sum(&[1.0, 4.0, 9.0], 3).unwrap();
//! assert!((sum - 6.0).abs() < 1e-5);
//!
//! // Hamming distance over the common prefix
//! let mut a = [0_u8; CAPACITY];
//! let mut b = [0_u8; CAPACITY];
//! a[..5].copy_from_slice(b"toned");
//! b[..5].copy_from_slice(b"roses");
//! assert_eq!(hamming_distance(&a, &b), 3);
//!
//! // Record what the running CPU offers
//! simdkernels::capabilities::log_report();
//! ```
//!
//! # Backends
//!
//! Every operation has a `*_with` variant taking a [`Backend`]. The plain form
//! uses [`Backend::detect`]. Requesting a backend the CPU lacks runs the serial
//! kernel instead. All backends return the same result as the serial kernel,
//! exactly for integer outputs and up to floating-point rounding for sums.
//!
//! # Safety
//!
//! The SIMD kernels are `unsafe` `#[target_feature]` functions internally. They
//! are only entered after runtime detection confirmed the feature, and only over
//! slices already bounded by the validated lengths.

pub mod capabilities;
pub mod error;
pub mod formula;
pub mod hamming;

pub use capabilities::{cap, Backend};
pub use error::KernelError;
pub use formula::{reduce_add4, reduce_mul4, sqrt_sum, squares_plus_one};
pub use hamming::{
    hamming_distance, hamming_distance_bytes, hamming_distance_padded, local_abs, local_min,
    logical_length, CAPACITY,
};
