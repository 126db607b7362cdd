//! Pairwise reduction of partial sums.
//!
//! `P` partial sums held in slots `0..P` are combined into slot `0` in `ceil(log2(P))` rounds.
//! In round `r` (starting at one), with `skip = 2^r` and `players` the number of slots still
//! alive, slot `b·skip + skip/2` is added into slot `b·skip` for every `b < players / 2`. An odd
//! slot out is carried over to the next round unchanged.
//!
//! ```text
//! P = 5     0   1   2   3   4
//! round 1   0 ← 1   2 ← 3   4
//! round 2   0 ←──── 2       4
//! round 3   0 ←──────────── 4
//! ```

use crate::{linalg::kernels::add_in_place, ComplexField, Mat};

/// One round of a reduction: a set of independent `(dst, src)` slot pairs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Round {
    skip: usize,
    brackets: usize,
}

impl Round {
    /// Returns the `(dst, src)` pairs of the round. The pairs of a round touch disjoint slots.
    #[inline]
    pub fn pairs(self) -> impl Iterator<Item = (usize, usize)> {
        let skip = self.skip;
        (0..self.brackets).map(move |b| (b * skip, b * skip + skip / 2))
    }
}

/// Iterator over the rounds of the reduction of `players` slots.
#[derive(Clone, Debug)]
pub struct Tournament {
    players: usize,
    skip: usize,
}

impl Tournament {
    /// Returns the schedule for the reduction of `players` slots into slot `0`.
    #[inline]
    pub fn new(players: usize) -> Self {
        Self { players, skip: 2 }
    }
}

impl Iterator for Tournament {
    type Item = Round;

    #[inline]
    fn next(&mut self) -> Option<Round> {
        if self.players <= 1 {
            return None;
        }
        let round = Round {
            skip: self.skip,
            brackets: self.players / 2,
        };
        self.players = (self.players + 1) / 2;
        self.skip *= 2;
        Some(round)
    }
}

/// Number of rounds needed to reduce `players` slots.
#[inline]
pub fn round_count(players: usize) -> usize {
    Tournament::new(players).count()
}

/// Reduces `slots` into `slots[0]` following the [`Tournament`] schedule.
pub fn reduce_in_place<E: ComplexField>(slots: &mut [Mat<E>]) {
    for round in Tournament::new(slots.len()) {
        for (dst, src) in round.pairs() {
            let (head, tail) = slots.split_at_mut(src);
            add_in_place(head[dst].as_mut(), tail[0].as_ref());
        }
    }
}
