//! Net markings: one token multiset per place.

use crate::ids::{MarkingCount, PlaceId};
use crate::multiset::ColorMultiset;

/// A full marking of the net, indexed by place.
///
/// Structural equality on the underlying multisets is marking equality,
/// since multisets keep a canonical sorted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Marking {
    places: Vec<ColorMultiset>,
}

impl Marking {
    /// An empty marking over `place_count` places.
    pub fn empty(place_count: usize) -> Self {
        Self {
            places: vec![ColorMultiset::new(); place_count],
        }
    }

    pub fn from_places(places: Vec<ColorMultiset>) -> Self {
        Self { places }
    }

    #[inline]
    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    #[inline]
    pub fn place(&self, place: PlaceId) -> &ColorMultiset {
        &self.places[place as usize]
    }

    #[inline]
    pub fn place_mut(&mut self, place: PlaceId) -> &mut ColorMultiset {
        &mut self.places[place as usize]
    }

    /// Total token count over all places.
    pub fn total_tokens(&self) -> MarkingCount {
        self.places.iter().map(ColorMultiset::total).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorMultiset> {
        self.places.iter()
    }
}
