//! IPv4 CIDR blocks and subnet carving.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network block, e.g. `10.0.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Block {
    base: u32,
    prefix: u8,
}

impl Ipv4Block {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, String> {
        if prefix > 32 {
            return Err(format!("prefix length {prefix} exceeds 32"));
        }
        let base = u32::from(addr);
        if base & !Self::mask(prefix) != 0 {
            return Err(format!("{addr}/{prefix} has host bits set"));
        }
        Ok(Self { base, prefix })
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Carve the `index`-th block of length `prefix` out of this one.
    pub fn subnet(&self, prefix: u8, index: u32) -> Result<Ipv4Block, String> {
        if prefix < self.prefix || prefix > 32 {
            return Err(format!("cannot carve /{prefix} subnets out of {self}"));
        }
        let available = 1u64 << (prefix - self.prefix);
        if u64::from(index) >= available {
            return Err(format!(
                "{self} holds {available} /{prefix} subnets, subnet #{} requested",
                index + 1
            ));
        }
        let size = 1u64 << (32 - prefix);
        let base = u64::from(self.base) + u64::from(index) * size;
        Ok(Ipv4Block {
            base: base as u32,
            prefix,
        })
    }

    /// Whether two blocks share any address.
    pub fn overlaps(&self, other: &Ipv4Block) -> bool {
        let shared = self.prefix.min(other.prefix);
        let mask = Self::mask(shared);
        self.base & mask == other.base & mask
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }
}

impl FromStr for Ipv4Block {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("'{s}' is not in address/prefix form"))?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| format!("invalid address in '{s}'"))?;
        let prefix: u8 = prefix.parse().map_err(|_| format!("invalid prefix in '{s}'"))?;
        Ipv4Block::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.base), self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let block: Ipv4Block = "10.0.0.0/16".parse().unwrap();
        assert_eq!(block.to_string(), "10.0.0.0/16");
        assert!("10.0.0.1/16".parse::<Ipv4Block>().is_err());
        assert!("10.0.0.0".parse::<Ipv4Block>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Block>().is_err());
    }

    #[test]
    fn carves_sequential_subnets() {
        let block: Ipv4Block = "10.0.0.0/16".parse().unwrap();
        assert_eq!(block.subnet(24, 0).unwrap().to_string(), "10.0.0.0/24");
        assert_eq!(block.subnet(24, 1).unwrap().to_string(), "10.0.1.0/24");
        assert_eq!(block.subnet(24, 255).unwrap().to_string(), "10.0.255.0/24");
        assert!(block.subnet(24, 256).is_err());
        assert!(block.subnet(8, 0).is_err());
    }

    #[test]
    fn overlap_detection() {
        let a: Ipv4Block = "10.0.0.0/24".parse().unwrap();
        let b: Ipv4Block = "10.0.1.0/24".parse().unwrap();
        let wide: Ipv4Block = "10.0.0.0/16".parse().unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&wide));
        assert!(wide.overlaps(&b));
    }
}
