//! IPv4 CIDR parsing and subnet allocation.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{ResourceError, ResourceResult};

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Cidr {
    network: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> ResourceResult<Self> {
        if prefix > 32 {
            return Err(ResourceError::InvalidCidr(format!("{}/{}", address, prefix)));
        }
        let network = u32::from(address) & mask(prefix);
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix && other.network & mask(self.prefix) == self.network
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResourceError::InvalidCidr(s.to_string());
        let (address, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = address.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        if prefix > 32 || u32::from(address) & !mask(prefix) != 0 {
            return Err(invalid());
        }
        Ipv4Cidr::new(address, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

/// Hands out consecutive, aligned, non-overlapping blocks of a network.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    block: Ipv4Cidr,
    next: u64,
}

impl CidrAllocator {
    pub fn new(block: Ipv4Cidr) -> Self {
        Self {
            next: u64::from(block.network),
            block,
        }
    }

    /// Smallest prefix that fits `count` equal subnets in the block.
    pub fn prefix_for(&self, count: usize) -> ResourceResult<u8> {
        let bits = (count.max(1) as u64).next_power_of_two().trailing_zeros() as u8;
        let prefix = self.block.prefix + bits;
        if prefix > 28 {
            return Err(ResourceError::CidrExhausted {
                block: self.block.to_string(),
                prefix,
                requested: count,
            });
        }
        Ok(prefix)
    }

    /// Next free block of size `/prefix`.
    pub fn allocate(&mut self, prefix: u8) -> ResourceResult<Ipv4Cidr> {
        let exhausted = || ResourceError::CidrExhausted {
            block: self.block.to_string(),
            prefix,
            requested: 1,
        };
        if prefix < self.block.prefix || prefix > 32 {
            return Err(exhausted());
        }
        let size = 1u64 << (32 - u32::from(prefix));
        let start = self.next.div_ceil(size) * size;
        let end = u64::from(self.block.network) + self.block.size();
        if start + size > end {
            return Err(exhausted());
        }
        self.next = start + size;
        // `start` lies inside the block, so it fits in 32 bits.
        Ipv4Cidr::new(Ipv4Addr::from(start as u32), prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(cidr("10.10.0.0/16").to_string(), "10.10.0.0/16");
        assert!("10.10.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.10.0.0/33".parse::<Ipv4Cidr>().is_err());
        assert!("10.10.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("300.0.0.0/8".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_even_split() {
        let mut allocator = CidrAllocator::new(cidr("10.0.0.0/16"));
        let prefix = allocator.prefix_for(2).unwrap();
        assert_eq!(prefix, 17);
        assert_eq!(allocator.allocate(prefix).unwrap(), cidr("10.0.0.0/17"));
        assert_eq!(allocator.allocate(prefix).unwrap(), cidr("10.0.128.0/17"));
        assert!(allocator.allocate(prefix).is_err());
    }

    #[test]
    fn test_mixed_sizes_stay_aligned() {
        let mut allocator = CidrAllocator::new(cidr("10.0.0.0/16"));
        assert_eq!(allocator.allocate(24).unwrap(), cidr("10.0.0.0/24"));
        assert_eq!(allocator.allocate(20).unwrap(), cidr("10.0.16.0/20"));
        assert_eq!(allocator.allocate(24).unwrap(), cidr("10.0.32.0/24"));
        assert!(cidr("10.0.0.0/16").contains(&cidr("10.0.32.0/24")));
    }

    #[test]
    fn test_too_many_subnets() {
        let allocator = CidrAllocator::new(cidr("10.0.0.0/24"));
        assert!(matches!(
            allocator.prefix_for(32),
            Err(ResourceError::CidrExhausted { .. })
        ));
    }
}
