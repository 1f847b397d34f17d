//! Waiting-state containers for the reachability search.
//!
//! Every structure hands out its current state through `peek` and drops
//! it with `remove`; successors are pushed with `add`. When waiting-state
//! encoding is enabled, states that are not at the front are parked:
//! their marking is dropped and only the canonical bytes kept, to be
//! decoded again when they surface.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use calico_net::Marking;

use crate::encoder::ColoredEncoder;
use crate::query::GammaQuery;
use crate::successor::Cursor;

/// A state waiting to be expanded.
#[derive(Debug)]
pub struct WaitingState {
    pub id: u64,
    pub cursor: Cursor,
    marking: Option<Marking>,
    encoding: Option<Box<[u8]>>,
}

impl WaitingState {
    pub fn new(id: u64, cursor: Cursor, marking: Marking) -> Self {
        Self {
            id,
            cursor,
            marking: Some(marking),
            encoding: None,
        }
    }

    /// Drop the marking, keeping only the encoding.
    fn park(&mut self, encoder: &mut ColoredEncoder) {
        if let Some(marking) = self.marking.take() {
            if self.encoding.is_none() {
                self.encoding = Some(encoder.encode(&marking).into());
            }
        }
    }

    /// Make sure the marking is materialized.
    fn unpark(&mut self, encoder: &ColoredEncoder) {
        if self.marking.is_none() {
            let bytes = self.encoding.as_ref().expect("parked state has no encoding");
            self.marking = Some(encoder.decode(bytes));
        }
    }

    pub fn marking(&self) -> &Marking {
        self.marking.as_ref().expect("state is parked")
    }

    /// Split borrow for successor expansion.
    pub fn expand_parts(&mut self) -> (&Marking, &mut Cursor) {
        (
            self.marking.as_ref().expect("state is parked"),
            &mut self.cursor,
        )
    }
}

/// Waiting-state container abstraction over the search strategies.
pub trait Worklist {
    fn add(&mut self, state: WaitingState, encoder: &mut ColoredEncoder);
    /// The state to expand next. Must not be called on an empty list.
    fn peek(&mut self, encoder: &mut ColoredEncoder) -> &mut WaitingState;
    /// Drop the state `peek` returned.
    fn remove(&mut self, encoder: &mut ColoredEncoder);
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
    /// Hint that sibling order may be re-randomized.
    fn shuffle(&mut self, _encoder: &mut ColoredEncoder) {}
}

/// Plain depth-first stack. Parks everything below the top.
pub struct Dfs {
    stack: Vec<WaitingState>,
    encode_waiting: bool,
}

impl Dfs {
    pub fn new(encode_waiting: bool) -> Self {
        Self {
            stack: Vec::new(),
            encode_waiting,
        }
    }
}

impl Worklist for Dfs {
    fn add(&mut self, state: WaitingState, encoder: &mut ColoredEncoder) {
        if self.encode_waiting {
            if let Some(top) = self.stack.last_mut() {
                top.park(encoder);
            }
        }
        self.stack.push(state);
    }

    fn peek(&mut self, encoder: &mut ColoredEncoder) -> &mut WaitingState {
        let top = self.stack.last_mut().expect("peek on empty worklist");
        top.unpark(encoder);
        top
    }

    fn remove(&mut self, encoder: &mut ColoredEncoder) {
        self.stack.pop();
        if let Some(top) = self.stack.last_mut() {
            top.unpark(encoder);
        }
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    fn len(&self) -> usize {
        self.stack.len()
    }
}

/// Breadth-first queue. Parks on entry.
pub struct Bfs {
    queue: VecDeque<WaitingState>,
    encode_waiting: bool,
}

impl Bfs {
    pub fn new(encode_waiting: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            encode_waiting,
        }
    }
}

impl Worklist for Bfs {
    fn add(&mut self, mut state: WaitingState, encoder: &mut ColoredEncoder) {
        if self.encode_waiting {
            state.park(encoder);
        }
        self.queue.push_back(state);
    }

    fn peek(&mut self, encoder: &mut ColoredEncoder) -> &mut WaitingState {
        let front = self.queue.front_mut().expect("peek on empty worklist");
        front.unpark(encoder);
        front
    }

    fn remove(&mut self, _encoder: &mut ColoredEncoder) {
        self.queue.pop_front();
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Depth-first with randomized sibling order. Successors collect in a
/// cache that is shuffled onto the stack whenever the current state is
/// dropped or the search asks for a reshuffle.
pub struct Rdfs {
    stack: Vec<WaitingState>,
    cache: Vec<WaitingState>,
    rng: StdRng,
    encode_waiting: bool,
}

impl Rdfs {
    pub fn new(seed: u64, encode_waiting: bool) -> Self {
        Self {
            stack: Vec::new(),
            cache: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            encode_waiting,
        }
    }
}

impl Worklist for Rdfs {
    fn add(&mut self, mut state: WaitingState, encoder: &mut ColoredEncoder) {
        if self.encode_waiting {
            state.park(encoder);
        }
        self.cache.push(state);
    }

    fn peek(&mut self, encoder: &mut ColoredEncoder) -> &mut WaitingState {
        if self.stack.is_empty() {
            self.shuffle(encoder);
        }
        let top = self.stack.last_mut().expect("peek on empty worklist");
        top.unpark(encoder);
        top
    }

    fn remove(&mut self, encoder: &mut ColoredEncoder) {
        self.stack.pop();
        self.shuffle(encoder);
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty() && self.cache.is_empty()
    }

    fn len(&self) -> usize {
        self.stack.len() + self.cache.len()
    }

    fn shuffle(&mut self, encoder: &mut ColoredEncoder) {
        if self.cache.is_empty() {
            return;
        }
        if self.encode_waiting {
            if let Some(top) = self.stack.last_mut() {
                top.park(encoder);
            }
        }
        self.cache.shuffle(&mut self.rng);
        self.stack.append(&mut self.cache);
    }
}

struct WeightedState {
    weight: u64,
    /// Insertion order, used as a FIFO tie break.
    seq: u64,
    state: WaitingState,
}

impl WeightedState {
    fn key(&self) -> (u64, u64) {
        (self.weight, self.seq)
    }
}

/// Best-first ordering by query distance; smallest distance surfaces
/// first. Implemented as a hand-rolled binary min-heap so the top entry
/// can be borrowed mutably while its cursor advances. Does not park.
pub struct BestFs {
    heap: Vec<WeightedState>,
    query: Arc<GammaQuery>,
    negated: bool,
    next_seq: u64,
}

impl BestFs {
    pub fn new(query: Arc<GammaQuery>, negated: bool) -> Self {
        Self {
            heap: Vec::new(),
            query,
            negated,
            next_seq: 0,
        }
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if self.heap[child].key() >= self.heap[parent].key() {
                break;
            }
            self.heap.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        loop {
            let left = 2 * parent + 1;
            if left >= self.heap.len() {
                break;
            }
            let right = left + 1;
            let smallest = if right < self.heap.len() && self.heap[right].key() < self.heap[left].key()
            {
                right
            } else {
                left
            };
            if self.heap[parent].key() <= self.heap[smallest].key() {
                break;
            }
            self.heap.swap(parent, smallest);
            parent = smallest;
        }
    }
}

impl Worklist for BestFs {
    fn add(&mut self, state: WaitingState, _encoder: &mut ColoredEncoder) {
        let weight = self.query.distance(state.marking(), self.negated);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(WeightedState { weight, seq, state });
        self.sift_up(self.heap.len() - 1);
    }

    fn peek(&mut self, _encoder: &mut ColoredEncoder) -> &mut WaitingState {
        &mut self.heap.first_mut().expect("peek on empty worklist").state
    }

    fn remove(&mut self, _encoder: &mut ColoredEncoder) {
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        self.heap.pop();
        self.sift_down(0);
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CountValue, GammaQuery};
    use calico_net::CmpOp;

    fn state(id: u64, tokens: u32) -> WaitingState {
        let mut marking = Marking::empty(1);
        marking.place_mut(0).add(0, tokens);
        WaitingState::new(id, Cursor::fixed(), marking)
    }

    #[test]
    fn dfs_parks_everything_below_the_top() {
        let mut encoder = ColoredEncoder::new(1);
        let mut wl = Dfs::new(true);
        wl.add(state(0, 1), &mut encoder);
        wl.add(state(1, 2), &mut encoder);
        wl.add(state(2, 3), &mut encoder);
        assert_eq!(wl.len(), 3);
        assert_eq!(wl.peek(&mut encoder).id, 2);
        assert_eq!(wl.peek(&mut encoder).marking().place(0).count(0), 3);
        wl.remove(&mut encoder);
        // The parked state below comes back with its marking intact.
        assert_eq!(wl.peek(&mut encoder).id, 1);
        assert_eq!(wl.peek(&mut encoder).marking().place(0).count(0), 2);
    }

    #[test]
    fn bfs_is_first_in_first_out() {
        let mut encoder = ColoredEncoder::new(1);
        let mut wl = Bfs::new(true);
        wl.add(state(0, 1), &mut encoder);
        wl.add(state(1, 2), &mut encoder);
        assert_eq!(wl.peek(&mut encoder).id, 0);
        wl.remove(&mut encoder);
        assert_eq!(wl.peek(&mut encoder).id, 1);
        assert_eq!(wl.peek(&mut encoder).marking().place(0).count(0), 2);
    }

    #[test]
    fn rdfs_same_seed_same_order() {
        let drain = |seed: u64| {
            let mut encoder = ColoredEncoder::new(1);
            let mut wl = Rdfs::new(seed, false);
            for id in 0..8 {
                wl.add(state(id, id as u32 + 1), &mut encoder);
            }
            let mut order = Vec::new();
            while !wl.is_empty() {
                order.push(wl.peek(&mut encoder).id);
                wl.remove(&mut encoder);
            }
            order
        };
        assert_eq!(drain(7), drain(7));
    }

    #[test]
    fn bestfs_surfaces_the_closest_state_first() {
        // Distance to "count of place 0 >= 4".
        let query = Arc::new(GammaQuery::Compare {
            op: CmpOp::Ge,
            lhs: CountValue::Place(0),
            rhs: CountValue::Constant(4),
        });
        let mut encoder = ColoredEncoder::new(1);
        let mut wl = BestFs::new(query, false);
        wl.add(state(0, 1), &mut encoder);
        wl.add(state(1, 4), &mut encoder);
        wl.add(state(2, 3), &mut encoder);
        assert_eq!(wl.peek(&mut encoder).id, 1);
        wl.remove(&mut encoder);
        assert_eq!(wl.peek(&mut encoder).id, 2);
        wl.remove(&mut encoder);
        assert_eq!(wl.peek(&mut encoder).id, 0);
        wl.remove(&mut encoder);
        assert!(wl.is_empty());
    }
}
