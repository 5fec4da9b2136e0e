use core::{
    fmt,
    ops::{Add, AddAssign},
};

/// Represents an address in the simulated virtual address space. Values are not validated on
/// construction - whether an address fits in the configured `VIRTUAL_ADDRESS_WIDTH` is a property
/// of the geometry, and is checked by the translation entry points.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct VirtualAddress(usize);

impl VirtualAddress {
    pub const fn new(address: usize) -> VirtualAddress {
        VirtualAddress(address)
    }
}

impl fmt::LowerHex for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::UpperHex for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VirtualAddress({:#x})", self)
    }
}

impl From<VirtualAddress> for usize {
    fn from(address: VirtualAddress) -> usize {
        address.0
    }
}

impl From<usize> for VirtualAddress {
    fn from(address: usize) -> VirtualAddress {
        VirtualAddress::new(address)
    }
}

impl Add<usize> for VirtualAddress {
    type Output = VirtualAddress;

    fn add(self, rhs: usize) -> Self::Output {
        VirtualAddress::new(self.0 + rhs)
    }
}

impl AddAssign<usize> for VirtualAddress {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}
