//! Canonical byte encodings of markings.
//!
//! The passed list keys on these bytes, so the encoding must be canonical:
//! equal markings always produce identical bytes. That falls out of the
//! sorted multiset representation; the encoder just serializes it with
//! LEB128 varints.
//!
//! Encodings are expected to fit a 16-bit length. A marking that encodes
//! longer is still stored exactly (lookups stay sound), but the encoder
//! drops its completeness claim and the search can no longer report a
//! definite negative.

use calico_net::Marking;

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut value = 0u64;
    let mut shift = 0;
    loop {
        let byte = bytes[*pos];
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return value;
        }
        shift += 7;
    }
}

fn write_marking(buf: &mut Vec<u8>, marking: &Marking) {
    for place in marking.iter() {
        write_varint(buf, place.distinct() as u64);
        for (color, count) in place.iter() {
            write_varint(buf, u64::from(color));
            write_varint(buf, u64::from(count));
        }
    }
}

fn read_marking(bytes: &[u8], pos: &mut usize, place_count: usize) -> Marking {
    let mut marking = Marking::empty(place_count);
    for place in 0..place_count {
        let distinct = read_varint(bytes, pos);
        for _ in 0..distinct {
            let color = read_varint(bytes, pos) as u32;
            let count = read_varint(bytes, pos) as u32;
            marking.place_mut(place as u32).add(color, count);
        }
    }
    marking
}

/// Encoder for plain net markings.
#[derive(Debug)]
pub struct ColoredEncoder {
    scratch: Vec<u8>,
    place_count: usize,
    biggest: usize,
    full_statespace: bool,
}

impl ColoredEncoder {
    pub fn new(place_count: usize) -> Self {
        Self {
            scratch: Vec::new(),
            place_count,
            biggest: 0,
            full_statespace: true,
        }
    }

    pub fn encode(&mut self, marking: &Marking) -> &[u8] {
        self.scratch.clear();
        write_marking(&mut self.scratch, marking);
        self.note_size(self.scratch.len());
        &self.scratch
    }

    pub fn decode(&self, bytes: &[u8]) -> Marking {
        let mut pos = 0;
        read_marking(bytes, &mut pos, self.place_count)
    }

    /// Largest encoding produced so far, in bytes.
    pub fn biggest(&self) -> usize {
        self.biggest
    }

    /// False once any encoding exceeded the supported size, meaning a
    /// finished search may still have missed states it cannot vouch for.
    pub fn full_statespace(&self) -> bool {
        self.full_statespace
    }

    fn note_size(&mut self, len: usize) {
        self.biggest = self.biggest.max(len);
        if len > usize::from(u16::MAX) {
            self.full_statespace = false;
        }
    }
}

/// Encoder for product states: an automaton state prefix followed by the
/// marking bytes.
#[derive(Debug)]
pub struct ProductEncoder {
    inner: ColoredEncoder,
}

impl ProductEncoder {
    pub fn new(place_count: usize) -> Self {
        Self {
            inner: ColoredEncoder::new(place_count),
        }
    }

    pub fn encode(&mut self, marking: &Marking, automaton_state: u32) -> &[u8] {
        self.inner.scratch.clear();
        write_varint(&mut self.inner.scratch, u64::from(automaton_state));
        write_marking(&mut self.inner.scratch, marking);
        let len = self.inner.scratch.len();
        self.inner.note_size(len);
        &self.inner.scratch
    }

    pub fn decode(&self, bytes: &[u8]) -> (Marking, u32) {
        let mut pos = 0;
        let automaton_state = read_varint(bytes, &mut pos) as u32;
        let marking = read_marking(bytes, &mut pos, self.inner.place_count);
        (marking, automaton_state)
    }

    pub fn biggest(&self) -> usize {
        self.inner.biggest()
    }

    pub fn full_statespace(&self) -> bool {
        self.inner.full_statespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marking() -> Marking {
        let mut m = Marking::empty(3);
        m.place_mut(0).add(0, 1);
        m.place_mut(0).add(200, 3);
        m.place_mut(2).add(7, 1);
        m
    }

    #[test]
    fn decode_reverses_encode() {
        let mut encoder = ColoredEncoder::new(3);
        let bytes = encoder.encode(&marking()).to_vec();
        assert_eq!(encoder.decode(&bytes), marking());
    }

    #[test]
    fn equal_markings_encode_identically() {
        let mut encoder = ColoredEncoder::new(3);
        let mut reordered = Marking::empty(3);
        reordered.place_mut(2).add(7, 1);
        reordered.place_mut(0).add(200, 3);
        reordered.place_mut(0).add(0, 1);
        let a = encoder.encode(&marking()).to_vec();
        let b = encoder.encode(&reordered).to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn varints_round_trip_multibyte_values() {
        let mut buf = Vec::new();
        for value in [0u64, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            buf.clear();
            write_varint(&mut buf, value);
            let mut pos = 0;
            assert_eq!(read_varint(&buf, &mut pos), value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn product_prefix_round_trips() {
        let mut encoder = ProductEncoder::new(3);
        let bytes = encoder.encode(&marking(), 5).to_vec();
        let (decoded, automaton_state) = encoder.decode(&bytes);
        assert_eq!(automaton_state, 5);
        assert_eq!(decoded, marking());
    }

    #[test]
    fn oversized_encodings_clear_the_completeness_claim() {
        let mut encoder = ColoredEncoder::new(1);
        let mut big = Marking::empty(1);
        for color in 0..30_000u32 {
            big.place_mut(0).add(color, 1);
        }
        encoder.encode(&big);
        assert!(!encoder.full_statespace());
        assert!(encoder.biggest() > usize::from(u16::MAX));
    }
}
