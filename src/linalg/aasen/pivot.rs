//! Propagation of the row interchanges of a panel factorization.
//!
//! After the panel `L(k+1.., k+1)` has been factored, its row interchanges must be applied:
//! * as row swaps to the previously computed columns of `L`, stored in the tile columns
//!   `A(.., 0..k)`,
//! * as symmetric row and column swaps to the trailing submatrix `A(k+1.., k+1..)`, of which
//!   only the lower half is stored.
//!
//! Row indices are global. Interchanges with `ipiv[i] == i` are skipped, so applying the same
//! identity interchanges again leaves the data untouched.

use crate::{assert, debug_assert, tile::TileMut, utils::DivCeil, ComplexField, Entity};
use core::ops::Range;

#[inline]
fn two_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert!(a < b);
    let (head, tail) = slice.split_at_mut(b);
    (&mut head[a], &mut tail[0])
}

/// One tile column, restricted to the tile rows `first_tile_row..`, with exclusive access.
pub struct TileColumnMut<'a, E: Entity> {
    tiles: Vec<TileMut<'a, E>>,
    first_tile_row: usize,
    nb: usize,
}

impl<'a, E: Entity> TileColumnMut<'a, E> {
    /// Creates a view over `tiles`, which hold the tile rows `first_tile_row..` of a tile column
    /// of a matrix with block size `nb`.
    #[inline]
    pub fn new(tiles: Vec<TileMut<'a, E>>, first_tile_row: usize, nb: usize) -> Self {
        Self {
            tiles,
            first_tile_row,
            nb,
        }
    }

    #[inline]
    fn locate(&self, row: usize) -> (usize, usize) {
        (row / self.nb - self.first_tile_row, row % self.nb)
    }

    /// Swaps the global rows `r1` and `r2` across all the columns of the tile column.
    #[track_caller]
    pub fn swap_rows(&mut self, r1: usize, r2: usize) {
        if r1 == r2 {
            return;
        }
        let (r1, r2) = (Ord::min(r1, r2), Ord::max(r1, r2));
        let (t1, i1) = self.locate(r1);
        let (t2, i2) = self.locate(r2);
        if t1 == t2 {
            let tile = &mut self.tiles[t1];
            for c in 0..tile.ncols() {
                let a = tile.read(i1, c);
                let b = tile.read(i2, c);
                tile.write(i1, c, b);
                tile.write(i2, c, a);
            }
        } else {
            let (top, bot) = two_mut(&mut self.tiles, t1, t2);
            for c in 0..top.ncols() {
                let a = top.read(i1, c);
                let b = bot.read(i2, c);
                top.write(i1, c, b);
                bot.write(i2, c, a);
            }
        }
    }
}

/// Applies the interchanges `ipiv[rows]` to the rows of `column`, in increasing order.
#[track_caller]
pub fn apply_row_swaps<E: Entity>(
    column: &mut TileColumnMut<'_, E>,
    ipiv: &[usize],
    rows: Range<usize>,
) {
    for i in rows {
        let p = ipiv[i];
        if p != i {
            column.swap_rows(i, p);
        }
    }
}

/// Lower half of the trailing submatrix starting at tile `(first, first)`, with exclusive access.
///
/// Tiles are held in packed order: tile `(i, j)` with `first ≤ j ≤ i` is at index
/// `(i - first)·(i - first + 1)/2 + (j - first)`.
pub struct LowerTilesMut<'a, E: Entity> {
    tiles: Vec<TileMut<'a, E>>,
    first: usize,
    nb: usize,
    end: usize,
}

impl<'a, E: Entity> LowerTilesMut<'a, E> {
    /// Creates a view over the lower tiles of the trailing submatrix `A(first.., first..)` of a
    /// matrix of dimension `n` with block size `nb`. `tiles` must be in packed order.
    #[track_caller]
    pub fn new(tiles: Vec<TileMut<'a, E>>, first: usize, nb: usize, n: usize) -> Self {
        let count = n.msrv_div_ceil(nb).saturating_sub(first);
        assert!(tiles.len() == count * (count + 1) / 2);
        Self {
            tiles,
            first,
            nb,
            end: n,
        }
    }

    /// Global index of the first row (and column) of the trailing submatrix.
    #[inline]
    pub fn origin(&self) -> usize {
        self.first * self.nb
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> (usize, usize, usize) {
        debug_assert!(all(row >= col, col >= self.origin(), row < self.end));
        let i = row / self.nb - self.first;
        let j = col / self.nb - self.first;
        (i * (i + 1) / 2 + j, row % self.nb, col % self.nb)
    }

    /// Reads the entry at global position `(row, col)`, with `row ≥ col`.
    #[inline]
    pub fn read(&self, row: usize, col: usize) -> E {
        let (t, i, j) = self.index(row, col);
        self.tiles[t].read(i, j)
    }

    /// Writes the entry at global position `(row, col)`, with `row ≥ col`.
    #[inline]
    pub fn write(&mut self, row: usize, col: usize, value: E) {
        let (t, i, j) = self.index(row, col);
        self.tiles[t].write(i, j, value)
    }

    #[inline]
    fn swap(&mut self, a: (usize, usize), b: (usize, usize)) {
        let x = self.read(a.0, a.1);
        let y = self.read(b.0, b.1);
        self.write(a.0, a.1, y);
        self.write(b.0, b.1, x);
    }
}

/// Swaps rows and columns `i1 < i2` of the Hermitian matrix whose lower half is held by `a`.
///
/// ```text
///          i1        i2
///     ┌─────────────────────┐
///     │ ╲                   │
///  i1 │ a  d                │   a: rows i1, i2 left of i1, swapped
///     │    b  ╲             │   b: column i1 and row i2 between i1 and i2, swapped and
///  i2 │ a  c  b  d          │      conjugated
///     │    e        e  ╲    │   c: conjugated in place
///     └─────────────────────┘   d: diagonal entries, swapped
///                               e: columns i1, i2 below i2, swapped
/// ```
pub fn swap_symmetric<E: ComplexField>(a: &mut LowerTilesMut<'_, E>, i1: usize, i2: usize) {
    debug_assert!(i1 < i2);
    let origin = a.origin();
    let end = a.end;

    for c in origin..i1 {
        a.swap((i1, c), (i2, c));
    }
    a.swap((i1, i1), (i2, i2));
    for r in i1 + 1..i2 {
        let x = a.read(r, i1);
        let y = a.read(i2, r);
        a.write(r, i1, y.faer_conj());
        a.write(i2, r, x.faer_conj());
    }
    let c = a.read(i2, i1);
    a.write(i2, i1, c.faer_conj());
    for r in i2 + 1..end {
        a.swap((r, i1), (r, i2));
    }
}

/// Applies the interchanges `ipiv[rows]` symmetrically to `a`, in increasing order.
pub fn apply_symmetric_swaps<E: ComplexField>(
    a: &mut LowerTilesMut<'_, E>,
    ipiv: &[usize],
    rows: Range<usize>,
) {
    for i in rows {
        let p = ipiv[i];
        if p != i {
            debug_assert!(p > i);
            swap_symmetric(a, i, p);
        }
    }
}
