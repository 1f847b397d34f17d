use calico_net::{ColorMultiset, PackCodec};
use proptest::prelude::*;

proptest! {
    #[test]
    fn packed_ids_decode_back_to_their_tuple(
        sizes in prop::collection::vec(1u32..6, 0..4),
        seed in any::<u64>(),
    ) {
        let codec = PackCodec::new(&sizes);
        prop_assume!(codec.max() > 0);
        let id = seed % codec.max();
        let tuple: Vec<u32> = (0..codec.positions()).map(|pos| codec.decode(id, pos)).collect();
        prop_assert_eq!(codec.encode(&tuple), id);
        for (pos, &component) in tuple.iter().enumerate() {
            prop_assert!(component < sizes[pos]);
        }
    }

    #[test]
    fn multiset_equality_is_insertion_order_independent(
        entries in prop::collection::vec((0u32..8, 1u32..4), 0..12),
    ) {
        let forward = ColorMultiset::from_entries(entries.iter().copied());
        let backward = ColorMultiset::from_entries(entries.iter().rev().copied());
        prop_assert_eq!(&forward, &backward);
        let expected: u32 = entries.iter().map(|&(_, c)| c).sum();
        prop_assert_eq!(forward.total(), expected);
    }
}
