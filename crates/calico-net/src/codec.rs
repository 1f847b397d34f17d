//! Mixed-radix packing of value tuples into single integers.

use smallvec::SmallVec;

use crate::ids::Color;

/// A bijection between tuples of bounded components and a dense integer
/// range `[0, max)`.
///
/// Component `i` ranges over `[0, sizes[i])`; the packed id orders tuples
/// lexicographically with the first component most significant. This is the
/// codec behind both packed color tuples and binding ids, so decode order
/// here *is* the enumeration order of the successor generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackCodec {
    sizes: SmallVec<[Color; 4]>,
    /// `divisors[i]` is the product of all sizes to the right of `i`.
    divisors: SmallVec<[u64; 4]>,
    max: u64,
}

impl PackCodec {
    pub fn new(sizes: &[Color]) -> Self {
        let mut divisors: SmallVec<[u64; 4]> = SmallVec::with_capacity(sizes.len());
        let mut product: u64 = 1;
        for &size in sizes.iter().rev() {
            divisors.push(product);
            product = product.saturating_mul(u64::from(size));
        }
        divisors.reverse();
        Self {
            sizes: SmallVec::from_slice(sizes),
            divisors,
            max: product,
        }
    }

    /// Total number of packed ids; `0` if any component domain is empty.
    #[inline]
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Number of tuple positions.
    #[inline]
    pub fn positions(&self) -> usize {
        self.sizes.len()
    }

    /// Domain size of position `pos`.
    #[inline]
    pub fn size_of(&self, pos: usize) -> Color {
        self.sizes[pos]
    }

    /// Pack a full tuple. Components must be in range.
    pub fn encode(&self, components: &[Color]) -> u64 {
        debug_assert_eq!(components.len(), self.sizes.len());
        let mut id = 0u64;
        for (i, &component) in components.iter().enumerate() {
            debug_assert!(component < self.sizes[i], "component out of domain");
            id += u64::from(component) * self.divisors[i];
        }
        id
    }

    /// Extract the component at `pos` from a packed id.
    #[inline]
    pub fn decode(&self, id: u64, pos: usize) -> Color {
        debug_assert!(id < self.max, "packed id out of range");
        ((id / self.divisors[pos]) % u64::from(self.sizes[pos])) as Color
    }
}

impl Default for PackCodec {
    /// Codec of the empty tuple: a single id, `0`.
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tuple_has_one_id() {
        let codec = PackCodec::default();
        assert_eq!(codec.max(), 1);
        assert_eq!(codec.positions(), 0);
        assert_eq!(codec.encode(&[]), 0);
    }

    #[test]
    fn lexicographic_order() {
        let codec = PackCodec::new(&[2, 3]);
        assert_eq!(codec.max(), 6);
        assert_eq!(codec.encode(&[0, 0]), 0);
        assert_eq!(codec.encode(&[0, 2]), 2);
        assert_eq!(codec.encode(&[1, 0]), 3);
        assert_eq!(codec.encode(&[1, 2]), 5);
    }

    #[test]
    fn decode_reverses_encode() {
        let codec = PackCodec::new(&[3, 4, 2]);
        for id in 0..codec.max() {
            let tuple = [codec.decode(id, 0), codec.decode(id, 1), codec.decode(id, 2)];
            assert_eq!(codec.encode(&tuple), id);
        }
    }

    #[test]
    fn empty_domain_yields_no_ids() {
        let codec = PackCodec::new(&[3, 0]);
        assert_eq!(codec.max(), 0);
    }
}
