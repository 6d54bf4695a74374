//  Errors.

use core::{error, fmt};

use crate::utils::alloc::AllocError;

/// An error in allocating memory, either for the slots or for the occupancy maps.
///
/// Also reported when the requested capacity is too large to be represented, even before attempting to allocate.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AllocationError;

impl fmt::Display for AllocationError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("AllocationError")
    }
}

impl error::Error for AllocationError {}

impl From<AllocError> for AllocationError {
    #[inline]
    fn from(_: AllocError) -> Self {
        Self
    }
}

/// An error in emplacing a value, as returned by `SparseVec::try_emplace_with`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EmplaceError<E> {
    /// No free slot existed, and growing the storage failed.
    Allocation(AllocationError),
    /// The value could not be constructed.
    ///
    /// No slot was occupied.
    Construction(E),
}

impl<E> fmt::Display for EmplaceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Allocation(error) => write!(f, "EmplaceError: {error}"),
            Self::Construction(error) => write!(f, "EmplaceError: construction failed, {error}"),
        }
    }
}

impl<E> error::Error for EmplaceError<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Allocation(error) => Some(error),
            Self::Construction(error) => Some(error),
        }
    }
}

impl<E> From<AllocationError> for EmplaceError<E> {
    #[inline]
    fn from(error: AllocationError) -> Self {
        Self::Allocation(error)
    }
}
