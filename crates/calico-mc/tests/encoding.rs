//! The passed list keys on encoded bytes, so equal markings must encode
//! to identical bytes no matter how they were assembled.

use calico_mc::{ColoredEncoder, ProductEncoder};
use calico_net::Marking;
use proptest::prelude::*;

fn arb_tokens() -> impl Strategy<Value = Vec<(u32, u32)>> {
    proptest::collection::vec((0u32..300, 1u32..4), 0..8)
}

fn build(place_count: usize, tokens: &[(u32, u32)]) -> Marking {
    let mut marking = Marking::empty(place_count);
    for &(color, count) in tokens {
        marking.place_mut(color % place_count as u32).add(color, count);
    }
    marking
}

proptest! {
    #[test]
    fn insertion_order_never_changes_the_encoding(tokens in arb_tokens()) {
        let forward = build(3, &tokens);
        let reversed: Vec<_> = tokens.iter().rev().copied().collect();
        let backward = build(3, &reversed);
        prop_assert_eq!(&forward, &backward);

        let mut encoder = ColoredEncoder::new(3);
        let a = encoder.encode(&forward).to_vec();
        let b = encoder.encode(&backward).to_vec();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn parked_states_decode_to_the_original_marking(
        tokens in arb_tokens(),
        automaton_state in 0u32..64,
    ) {
        let marking = build(4, &tokens);

        let mut encoder = ColoredEncoder::new(4);
        let bytes = encoder.encode(&marking).to_vec();
        prop_assert_eq!(encoder.decode(&bytes), marking.clone());

        let mut product = ProductEncoder::new(4);
        let bytes = product.encode(&marking, automaton_state).to_vec();
        let (decoded, state) = product.decode(&bytes);
        prop_assert_eq!(state, automaton_state);
        prop_assert_eq!(decoded, marking);
    }
}
