//! Workspace of the Aasen factorization.
//!
//! The workspace is made of `nb × nb` tiles split into four disjoint zones, all reused from one
//! tile column to the next:
//!
//! ```text
//! ┌─────────┬───────────────┬─────────────────────┬─────────────────────┐
//! │ staging │ H(0..mt)      │ diagonal slots      │ update slots        │
//! │ 1 tile  │ mt tiles      │ `slots` tiles       │ `slots` tiles       │
//! └─────────┴───────────────┴─────────────────────┴─────────────────────┘
//! ```
//!
//! * staging holds `L(k, k)·T(k, k-1)` during the reduction of `T(k, k)`,
//! * `H(m)` holds `H(m, k)` for the current tile column,
//! * the diagonal slots hold the partial sums of `Σ L(k, m)·H(m, k)`,
//! * the update slots hold the partial sums of `Σ L(i, m)·H(m, k)` for each remaining tile row.
//!
//! The panel factorization additionally gathers its tiles in a contiguous buffer.

use crate::{
    assert,
    tile::{TileCell, TileMut, TileRef},
    utils::DivCeil,
    ComplexField, Entity, Mat, Parallelism,
};
use dyn_stack::{GlobalPodBuffer, SizeOverflow, StackReq};
use faer::{linalg::temp_mat_req, utils::thread::parallelism_degree};

use super::AasenParams;

/// Strategy for the update `L(k+1.., k+1) -= Σ L(k+1.., m)·H(m, k)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Each remaining tile row accumulates its products into `slots_per_row` update slots, which
    /// are then reduced and added into the target tile. Exposes more parallelism when the
    /// remaining tile rows, together with the current one, are fewer than the threads.
    Workspace {
        /// Number of update slots assigned to each remaining tile row.
        slots_per_row: usize,
    },
    /// Each product is subtracted directly from the target tile, one after the other.
    Direct,
}

impl UpdateStrategy {
    /// Selects the strategy for tile column `k`, with `remaining_rows` tile rows below it,
    /// `threads` worker threads and `slots` update slots.
    pub fn select(k: usize, remaining_rows: usize, threads: usize, slots: usize) -> Self {
        if k == 0 || remaining_rows == 0 || remaining_rows + 1 >= threads {
            return UpdateStrategy::Direct;
        }
        let slots_per_row = Ord::min(k, slots / remaining_rows);
        if slots_per_row == 0 {
            UpdateStrategy::Direct
        } else {
            UpdateStrategy::Workspace { slots_per_row }
        }
    }
}

/// Number of diagonal slots used for the accumulation at tile column `k ≥ 2`.
#[inline]
pub fn diag_slot_count(k: usize, slots: usize) -> usize {
    Ord::min(slots, k.saturating_sub(1))
}

/// Sizes of the workspace zones for a given problem.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Dimension of the matrix.
    pub n: usize,
    /// Block size.
    pub nb: usize,
    /// Number of tile rows.
    pub mt: usize,
    /// Number of tiles in each of the two slot zones.
    pub slots: usize,
    /// Number of threads the layout was computed for.
    pub threads: usize,
}

impl WorkspaceLayout {
    /// Computes the layout for a matrix of dimension `n` with block size `nb`.
    #[track_caller]
    pub fn new(n: usize, nb: usize, parallelism: Parallelism, params: AasenParams) -> Self {
        assert!(nb > 0);
        let mt = n.msrv_div_ceil(nb);
        let threads = parallelism_degree(parallelism).max(1);
        let slots = if params.reduction_slots > 0 {
            params.reduction_slots
        } else {
            Ord::max(2 * mt, threads)
        }
        .max(1);
        Self {
            n,
            nb,
            mt,
            slots,
            threads,
        }
    }

    /// Total number of tiles in the four zones.
    #[inline]
    pub fn tile_count(&self) -> usize {
        1 + self.mt + 2 * self.slots
    }

    /// Dimensions of the largest panel, gathered at tile column `0`.
    #[inline]
    pub fn panel_dims(&self) -> (usize, usize) {
        (self.n.saturating_sub(self.nb), Ord::min(self.n, self.nb))
    }

    /// Memory requirement of the workspace, for entities of type `E`.
    pub fn req<E: Entity>(&self) -> Result<StackReq, SizeOverflow> {
        let tile_len = self.nb.checked_mul(self.nb).ok_or(SizeOverflow)?;
        let zones_len = tile_len
            .checked_mul(self.tile_count())
            .ok_or(SizeOverflow)?;
        StackReq::try_all_of([
            StackReq::try_new::<E>(zones_len)?,
            self.panel_req::<E>()?,
        ])
    }

    #[inline]
    fn panel_req<E: Entity>(&self) -> Result<StackReq, SizeOverflow> {
        let (rows, cols) = self.panel_dims();
        temp_mat_req::<E>(rows, cols)
    }
}

pub(crate) struct Zones<E: Entity> {
    staging: TileCell<E>,
    h: Box<[TileCell<E>]>,
    diag_slots: Box<[TileCell<E>]>,
    update_slots: Box<[TileCell<E>]>,
}

impl<E: Entity> Zones<E> {
    #[inline]
    pub fn staging_mut(&self) -> TileMut<'_, E> {
        self.staging.borrow_mut()
    }

    #[inline]
    pub fn staging(&self) -> TileRef<'_, E> {
        self.staging.borrow()
    }

    #[inline]
    pub fn h(&self, m: usize) -> TileRef<'_, E> {
        self.h[m].borrow()
    }

    #[inline]
    pub fn h_mut(&self, m: usize) -> TileMut<'_, E> {
        self.h[m].borrow_mut()
    }

    #[inline]
    pub fn diag_slot(&self, s: usize) -> TileRef<'_, E> {
        self.diag_slots[s].borrow()
    }

    #[inline]
    pub fn diag_slot_mut(&self, s: usize) -> TileMut<'_, E> {
        self.diag_slots[s].borrow_mut()
    }

    #[inline]
    pub fn update_slot(&self, s: usize) -> TileRef<'_, E> {
        self.update_slots[s].borrow()
    }

    #[inline]
    pub fn update_slot_mut(&self, s: usize) -> TileMut<'_, E> {
        self.update_slots[s].borrow_mut()
    }
}

/// Workspace of the Aasen factorization, reusable across factorizations with the same layout.
pub struct Workspace<E: Entity> {
    layout: WorkspaceLayout,
    zones: Zones<E>,
    panel: GlobalPodBuffer,
}

impl<E: Entity> core::fmt::Debug for Workspace<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Workspace")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<E: ComplexField> Workspace<E> {
    /// Allocates a workspace with the given layout.
    ///
    /// # Panics
    /// Panics if the memory requirement overflows, or if the allocation fails.
    pub fn new(layout: WorkspaceLayout) -> Self {
        let nb = layout.nb;
        let tiles = |count: usize| -> Box<[TileCell<E>]> {
            (0..count)
                .map(|_| TileCell::new(Mat::zeros(nb, nb)))
                .collect()
        };
        let panel_req = match layout.panel_req::<E>() {
            Ok(req) => req,
            Err(SizeOverflow) => panic!("panel workspace size overflows"),
        };
        Self {
            layout,
            zones: Zones {
                staging: TileCell::new(Mat::zeros(nb, nb)),
                h: tiles(layout.mt),
                diag_slots: tiles(layout.slots),
                update_slots: tiles(layout.slots),
            },
            panel: GlobalPodBuffer::new(panel_req),
        }
    }
}

impl<E: Entity> Workspace<E> {
    /// Returns the layout of the workspace.
    #[inline]
    pub fn layout(&self) -> WorkspaceLayout {
        self.layout
    }

    #[inline]
    pub(crate) fn parts(&mut self) -> (&Zones<E>, &mut GlobalPodBuffer) {
        (&self.zones, &mut self.panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;

    #[test]
    fn strategy_selection() {
        use UpdateStrategy::*;

        // nothing to accumulate for the first column
        assert_eq!(UpdateStrategy::select(0, 1, 8, 16), Direct);
        // enough rows to keep every thread busy
        assert_eq!(UpdateStrategy::select(3, 8, 8, 16), Direct);
        assert_eq!(UpdateStrategy::select(3, 9, 8, 16), Direct);
        // the current tile row counts towards the threshold
        assert_eq!(UpdateStrategy::select(3, 7, 8, 16), Direct);
        assert_eq!(UpdateStrategy::select(1, 1, 2, 4), Direct);
        // fewer rows than threads
        assert_eq!(
            UpdateStrategy::select(3, 2, 8, 16),
            Workspace { slots_per_row: 3 }
        );
        assert_eq!(
            UpdateStrategy::select(10, 2, 8, 16),
            Workspace { slots_per_row: 8 }
        );
        assert_eq!(
            UpdateStrategy::select(3, 6, 8, 16),
            Workspace { slots_per_row: 2 }
        );
        assert_eq!(
            UpdateStrategy::select(1, 1, 3, 4),
            Workspace { slots_per_row: 1 }
        );
        // not enough slots for a single one per row
        assert_eq!(UpdateStrategy::select(4, 5, 8, 4), Direct);
        // sequential execution never uses the workspace
        assert_eq!(UpdateStrategy::select(4, 1, 1, 4), Direct);
    }

    #[test]
    fn diag_slots() {
        assert_eq!(diag_slot_count(2, 8), 1);
        assert_eq!(diag_slot_count(5, 8), 4);
        assert_eq!(diag_slot_count(20, 8), 8);
    }

    #[test]
    fn layout() {
        let mut params = AasenParams::default();
        let layout = WorkspaceLayout::new(10, 4, Parallelism::Rayon(2), params);
        assert_eq!(layout.mt, 3);
        assert_eq!(layout.slots, 6);
        assert_eq!(layout.tile_count(), 1 + 3 + 12);
        assert_eq!(layout.panel_dims(), (6, 4));
        assert_eq!(WorkspaceLayout::new(3, 4, Parallelism::None, params).panel_dims(), (0, 3));

        let layout = WorkspaceLayout::new(10, 4, Parallelism::Rayon(32), params);
        assert_eq!(layout.slots, 32);

        params.reduction_slots = 5;
        let layout = WorkspaceLayout::new(10, 4, Parallelism::None, params);
        assert_eq!(layout.slots, 5);
        assert_eq!(layout.threads, 1);

        let req = layout.req::<f64>().unwrap();
        assert!(req.size_bytes() >= (16 * layout.tile_count() + 24) * core::mem::size_of::<f64>());

        let huge = WorkspaceLayout::new(usize::MAX / 2, usize::MAX / 4, Parallelism::None, params);
        assert!(huge.req::<f64>().is_err());
    }

    #[test]
    fn zones_are_disjoint() {
        let layout = WorkspaceLayout::new(9, 3, Parallelism::None, AasenParams::default());
        let ws = Workspace::<f64>::new(layout);
        let _a = ws.zones.staging_mut();
        let _b = ws.zones.h_mut(0);
        let _c = ws.zones.diag_slot_mut(0);
        let _d = ws.zones.update_slot_mut(0);
        assert_eq!(ws.layout().slots, 6);
    }
}
