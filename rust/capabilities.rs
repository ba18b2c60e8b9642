//! Hardware capability detection and backend selection.
//!
//! Every kernel in this crate has a serial implementation and one SIMD
//! implementation per supported architecture. Which one runs is decided by a
//! [`Backend`] value, normally obtained from [`Backend::detect`]. Enabling the
//! `serial` Cargo feature pins detection to [`Backend::Serial`].

use std::sync::OnceLock;

/// Capability bit masks.
pub mod cap {
    pub const SERIAL: u64 = 1 << 0; // Always: Fallback
    pub const SSE: u64 = 1 << 1; // 1999: Intel SSE, 4 x f32
    pub const SSE2: u64 = 1 << 2; // 2001: Intel SSE2, 16 x u8
    pub const NEON: u64 = 1 << 3; // 2013: ARM NEON (AArch64)
}

static AVAILABLE: OnceLock<u64> = OnceLock::new();
static DETECTED: OnceLock<Backend> = OnceLock::new();

/// Returns the bitmask of available CPU capabilities.
/// Use with `cap::*` constants to check for specific features.
///
/// # Example
/// ```
/// use simdkernels::{cap, capabilities};
///
/// let caps = capabilities::available();
/// assert!(caps & cap::SERIAL != 0);
/// if caps & cap::NEON != 0 {
///     println!("NEON is available");
/// }
/// ```
pub fn available() -> u64 {
    *AVAILABLE.get_or_init(query_available)
}

fn query_available() -> u64 {
    #[allow(unused_mut)]
    let mut caps = cap::SERIAL;

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if std::arch::is_x86_feature_detected!("sse") {
            caps |= cap::SSE;
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            caps |= cap::SSE2;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            caps |= cap::NEON;
        }
    }

    caps
}

pub fn uses_sse() -> bool {
    available() & cap::SSE != 0
}

pub fn uses_sse2() -> bool {
    available() & cap::SSE2 != 0
}

pub fn uses_neon() -> bool {
    available() & cap::NEON != 0
}

/// Logs the detected capabilities and the backend [`Backend::detect`] picks.
/// Call once at startup to record them.
pub fn log_report() {
    let caps = available();
    log::info!("SIMD capabilities detected: {:#x}", caps);
    log::info!("- sse: {}", caps & cap::SSE != 0);
    log::info!("- sse2: {}", caps & cap::SSE2 != 0);
    log::info!("- neon: {}", caps & cap::NEON != 0);
    log::info!("Kernels dispatch to the {} backend", Backend::detect().name());
}

/// Implementation family a kernel call runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Portable scalar loops. Always available, used for tails and verification.
    Serial,
    /// 128-bit SSE and SSE2 registers on x86 and x86-64.
    Sse,
    /// 128-bit NEON registers on AArch64.
    Neon,
}

impl Backend {
    /// Picks the best backend the running CPU supports.
    /// Detection runs on the first call, later calls return the cached choice.
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let backend = Backend::select();
            log::debug!("dispatching to the {} backend", backend.name());
            backend
        })
    }

    fn select() -> Self {
        if cfg!(feature = "serial") {
            Backend::Serial
        } else if Backend::Neon.is_supported() {
            Backend::Neon
        } else if Backend::Sse.is_supported() {
            Backend::Sse
        } else {
            Backend::Serial
        }
    }

    /// Returns `true` if this backend can run on the current CPU.
    pub fn is_supported(self) -> bool {
        match self {
            Backend::Serial => true,
            Backend::Sse => uses_sse() && uses_sse2(),
            Backend::Neon => uses_neon(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Backend::Serial => "serial",
            Backend::Sse => "sse",
            Backend::Neon => "neon",
        }
    }

    /// Returns `self` if supported, otherwise [`Backend::Serial`].
    ///
    /// The SIMD kernels are only entered through a resolved backend, so a
    /// request for missing hardware never reaches an illegal instruction.
    pub(crate) fn resolve(self) -> Self {
        if self.is_supported() {
            return self;
        }
        log::debug!(
            "{} backend is not supported on this CPU, falling back to serial",
            self.name()
        );
        Backend::Serial
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::detect()
    }
}
