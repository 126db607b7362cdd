//! Tiled storage for square matrices.
//!
//! A [`TileMatrix`] of dimension `n` and block size `nb` is split into `mt = ceil(n / nb)` tile
//! rows and tile columns. Tile `(i, j)` is a column-major [`Mat`] of shape
//! `live(i) × live(j)`, where `live(i) = min(nb, n - i·nb)`, so that only the tiles on the last
//! tile row and column can be partial.
//!
//! ```text
//!       ┌──────┬──────┬────┐
//!       │ A00  │ A01  │A02 │   nb = 4, n = 10
//!       ├──────┼──────┼────┤   mt = 3
//!       │ A10  │ A11  │A12 │   live(2) = 2
//!       ├──────┼──────┼────┤
//!       │ A20  │ A21  │A22 │
//!       └──────┴──────┴────┘
//! ```
//!
//! The factored lower triangular matrix `L` is stored with a one tile column offset:
//! `L(m, n)` lives in `A(m, n - 1)` for `1 ≤ n ≤ m`, and its first block column is the identity
//! and is not stored.

use crate::{assert, debug_assert, utils::DivCeil, ComplexField, Entity, Mat, MatRef};

mod cell;

pub use cell::{TileCell, TileMut, TileRef};

/// Dimension of tile `i` of a matrix of dimension `n` split with block size `nb`.
#[inline]
pub fn live_dim(n: usize, nb: usize, i: usize) -> usize {
    debug_assert!(i * nb < n);
    Ord::min(nb, n - i * nb)
}

/// Square matrix stored as a grid of tiles.
pub struct TileMatrix<E: Entity> {
    n: usize,
    nb: usize,
    mt: usize,
    tiles: Box<[TileCell<E>]>,
}

impl<E: Entity> core::fmt::Debug for TileMatrix<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileMatrix")
            .field("n", &self.n)
            .field("nb", &self.nb)
            .field("mt", &self.mt)
            .finish_non_exhaustive()
    }
}

impl<E: ComplexField> TileMatrix<E> {
    /// Returns a zero matrix of dimension `n`, split into tiles of size `nb`.
    ///
    /// # Panics
    /// Panics if `nb == 0`.
    #[track_caller]
    pub fn zeros(n: usize, nb: usize) -> Self {
        assert!(nb > 0);
        let mt = n.msrv_div_ceil(nb);
        let mut tiles = Vec::with_capacity(mt * mt);
        for j in 0..mt {
            for i in 0..mt {
                tiles.push(TileCell::new(Mat::zeros(
                    live_dim(n, nb, i),
                    live_dim(n, nb, j),
                )));
            }
        }
        Self {
            n,
            nb,
            mt,
            tiles: tiles.into_boxed_slice(),
        }
    }

    /// Copies a dense square matrix into the tiled layout.
    ///
    /// # Panics
    /// Panics if `a` is not square, or if `nb == 0`.
    #[track_caller]
    pub fn from_dense(a: MatRef<'_, E>, nb: usize) -> Self {
        assert!(a.nrows() == a.ncols());
        let mut this = Self::zeros(a.nrows(), nb);
        for j in 0..this.mt {
            for i in 0..this.mt {
                let (r, c) = (i * nb, j * nb);
                let tile = this.tile_get_mut(i, j);
                let (m, n) = (tile.nrows(), tile.ncols());
                tile.as_mut().copy_from(a.submatrix(r, c, m, n));
            }
        }
        this
    }

    /// Copies the tiled matrix into a dense column-major matrix.
    ///
    /// # Panics
    /// Panics if a tile is currently borrowed for writing.
    pub fn to_dense(&self) -> Mat<E> {
        let mut out = Mat::zeros(self.n, self.n);
        for j in 0..self.mt {
            for i in 0..self.mt {
                let tile = self.tile(i, j);
                out.as_mut()
                    .submatrix_mut(i * self.nb, j * self.nb, tile.nrows(), tile.ncols())
                    .copy_from(tile.as_ref());
            }
        }
        out
    }
}

impl<E: Entity> TileMatrix<E> {
    /// Returns the dimension of the matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Returns the block size.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.nb
    }

    /// Returns the number of tile rows (equal to the number of tile columns).
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.mt
    }

    /// Returns the number of rows of the tiles on tile row `i`.
    #[track_caller]
    #[inline]
    pub fn tile_nrows(&self, i: usize) -> usize {
        assert!(i < self.mt);
        live_dim(self.n, self.nb, i)
    }

    /// Returns the number of columns of the tiles on tile column `j`.
    #[track_caller]
    #[inline]
    pub fn tile_ncols(&self, j: usize) -> usize {
        self.tile_nrows(j)
    }

    #[track_caller]
    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        assert!(all(i < self.mt, j < self.mt));
        i + j * self.mt
    }

    /// Returns a shared guard over tile `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn tile(&self, i: usize, j: usize) -> TileRef<'_, E> {
        self.tiles[self.index(i, j)].borrow()
    }

    /// Returns an exclusive guard over tile `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn tile_mut(&self, i: usize, j: usize) -> TileMut<'_, E> {
        self.tiles[self.index(i, j)].borrow_mut()
    }

    /// Returns a mutable reference to tile `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn tile_get_mut(&mut self, i: usize, j: usize) -> &mut Mat<E> {
        let idx = self.index(i, j);
        self.tiles[idx].get_mut()
    }

    /// Returns the coordinates of the tile storing `L(m, n)`.
    #[track_caller]
    #[inline]
    pub fn l_coords(m: usize, n: usize) -> (usize, usize) {
        assert!(all(n >= 1, m >= n));
        (m, n - 1)
    }

    /// Returns a shared guard over the tile storing `L(m, n)`, for `1 ≤ n ≤ m`.
    #[track_caller]
    #[inline]
    pub fn l_tile(&self, m: usize, n: usize) -> TileRef<'_, E> {
        let (i, j) = Self::l_coords(m, n);
        self.tile(i, j)
    }

    /// Returns an exclusive guard over the tile storing `L(m, n)`, for `1 ≤ n ≤ m`.
    #[track_caller]
    #[inline]
    pub fn l_tile_mut(&self, m: usize, n: usize) -> TileMut<'_, E> {
        let (i, j) = Self::l_coords(m, n);
        self.tile_mut(i, j)
    }
}

/// Block tridiagonal matrix, storing only the diagonal, sub-diagonal and super-diagonal tiles.
pub struct BandMatrix<E: Entity> {
    n: usize,
    nb: usize,
    mt: usize,
    diag: Box<[TileCell<E>]>,
    sub: Box<[TileCell<E>]>,
    sup: Box<[TileCell<E>]>,
}

impl<E: Entity> core::fmt::Debug for BandMatrix<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BandMatrix")
            .field("n", &self.n)
            .field("nb", &self.nb)
            .field("mt", &self.mt)
            .finish_non_exhaustive()
    }
}

impl<E: ComplexField> BandMatrix<E> {
    /// Returns a zero band matrix of dimension `n` with block size `nb`.
    ///
    /// # Panics
    /// Panics if `nb == 0`.
    #[track_caller]
    pub fn zeros(n: usize, nb: usize) -> Self {
        assert!(nb > 0);
        let mt = n.msrv_div_ceil(nb);
        let live = |i| live_dim(n, nb, i);
        let diag = (0..mt)
            .map(|k| TileCell::new(Mat::zeros(live(k), live(k))))
            .collect();
        let sub = (0..mt.saturating_sub(1))
            .map(|k| TileCell::new(Mat::zeros(live(k + 1), live(k))))
            .collect();
        let sup = (0..mt.saturating_sub(1))
            .map(|k| TileCell::new(Mat::zeros(live(k), live(k + 1))))
            .collect();
        Self {
            n,
            nb,
            mt,
            diag,
            sub,
            sup,
        }
    }

    /// Expands the band into a dense matrix, with zeros outside of the band.
    pub fn to_dense(&self) -> Mat<E> {
        let nb = self.nb;
        let mut out = Mat::zeros(self.n, self.n);
        let mut put = |i: usize, j: usize, tile: MatRef<'_, E>| {
            out.as_mut()
                .submatrix_mut(i * nb, j * nb, tile.nrows(), tile.ncols())
                .copy_from(tile);
        };
        for k in 0..self.mt {
            put(k, k, self.diag(k).as_ref());
            if k + 1 < self.mt {
                put(k + 1, k, self.sub(k).as_ref());
                put(k, k + 1, self.sup(k).as_ref());
            }
        }
        out
    }
}

impl<E: Entity> BandMatrix<E> {
    /// Returns the dimension of the matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Returns the block size.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.nb
    }

    /// Returns the number of diagonal tiles.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.mt
    }

    /// `T(k, k)`.
    #[track_caller]
    #[inline]
    pub fn diag(&self, k: usize) -> TileRef<'_, E> {
        self.diag[k].borrow()
    }

    /// `T(k, k)`, exclusively.
    #[track_caller]
    #[inline]
    pub fn diag_mut(&self, k: usize) -> TileMut<'_, E> {
        self.diag[k].borrow_mut()
    }

    /// `T(k + 1, k)`.
    #[track_caller]
    #[inline]
    pub fn sub(&self, k: usize) -> TileRef<'_, E> {
        self.sub[k].borrow()
    }

    /// `T(k + 1, k)`, exclusively.
    #[track_caller]
    #[inline]
    pub fn sub_mut(&self, k: usize) -> TileMut<'_, E> {
        self.sub[k].borrow_mut()
    }

    /// `T(k, k + 1)`.
    #[track_caller]
    #[inline]
    pub fn sup(&self, k: usize) -> TileRef<'_, E> {
        self.sup[k].borrow()
    }

    /// `T(k, k + 1)`, exclusively.
    #[track_caller]
    #[inline]
    pub fn sup_mut(&self, k: usize) -> TileMut<'_, E> {
        self.sup[k].borrow_mut()
    }
}
