//! Error taxonomy for the VM subsystem.

use derive_more::Display;

/// The errno space this subsystem reports through, kept intentionally
/// small: callers translate these into the host kernel's own error type
/// at the boundary (typically `vm_fault`'s `i32` return value).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// Bad memory reference: dereferencing an address with no defined
    /// region, or a data access aimed at kernel space from user mode.
    #[display(fmt = "bad memory reference")]
    Efault,
    /// An invalid argument was passed to a VM operation, e.g. a fault
    /// kind the hardware should never generate, or overlapping regions.
    #[display(fmt = "invalid argument")]
    Einval,
    /// The frame allocator could not satisfy an allocation request.
    #[display(fmt = "out of memory")]
    Enomem,
}

impl VmError {
    /// The POSIX-style errno this subsystem maps this error to at the
    /// kernel boundary.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::Efault => EFAULT,
            Self::Einval => EINVAL,
            Self::Enomem => ENOMEM,
        }
    }
}

/// Bad address.
pub const EFAULT: i32 = 14;
/// Invalid argument.
pub const EINVAL: i32 = 22;
/// Out of memory.
pub const ENOMEM: i32 = 12;

pub type VmResult<T> = Result<T, VmError>;
