//! Error type shared by the kernels.

/// Errors returned by the kernels in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A declared length exceeds the buffer it describes.
    InvalidLength { length: usize, capacity: usize },
}

impl std::error::Error for KernelError {}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            KernelError::InvalidLength { length, capacity } => {
                write!(f, "length {} exceeds buffer capacity {}", length, capacity)
            }
        }
    }
}

/// Checks that `length` elements fit into a buffer of `capacity` elements.
#[inline]
pub(crate) fn check_length(length: usize, capacity: usize) -> Result<(), KernelError> {
    if length > capacity {
        return Err(KernelError::InvalidLength { length, capacity });
    }
    Ok(())
}
