use crate::{Entity, Mat};
use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicIsize, Ordering},
};

/// Interior-mutable tile shared between tasks.
///
/// Accesses are checked at runtime with a reader/writer flag. A conflicting access panics
/// instead of blocking: two tasks touching the same tile concurrently means a dependency edge
/// is missing from the task graph.
pub struct TileCell<E: Entity> {
    flag: AtomicIsize,
    value: UnsafeCell<Mat<E>>,
}

// SAFETY: every access to `value` through a shared reference goes through a guard, and the
// guards enforce either a single writer or any number of readers.
unsafe impl<E: Entity> Sync for TileCell<E> {}

impl<E: Entity> TileCell<E> {
    /// Wraps `value` in a cell with no outstanding borrows.
    #[inline]
    pub fn new(value: Mat<E>) -> Self {
        Self {
            flag: AtomicIsize::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Returns a shared guard over the tile.
    ///
    /// # Panics
    /// Panics if the tile is currently borrowed for writing.
    #[track_caller]
    #[inline]
    pub fn borrow(&self) -> TileRef<'_, E> {
        let prev = self.flag.fetch_add(1, Ordering::Acquire);
        if prev < 0 {
            self.flag.fetch_sub(1, Ordering::Release);
            panic!("tile read while it is being written");
        }
        TileRef { cell: self }
    }

    /// Returns an exclusive guard over the tile.
    ///
    /// # Panics
    /// Panics if the tile is currently borrowed.
    #[track_caller]
    #[inline]
    pub fn borrow_mut(&self) -> TileMut<'_, E> {
        if self
            .flag
            .compare_exchange(0, -1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            panic!("tile written while it is borrowed");
        }
        TileMut { cell: self }
    }

    /// Returns a mutable reference to the tile, statically checked through `&mut self`.
    #[inline]
    pub fn get_mut(&mut self) -> &mut Mat<E> {
        self.value.get_mut()
    }
}

impl<E: Entity> core::fmt::Debug for TileCell<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileCell")
            .field("flag", &self.flag.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Shared guard returned by [`TileCell::borrow`].
pub struct TileRef<'a, E: Entity> {
    cell: &'a TileCell<E>,
}

/// Exclusive guard returned by [`TileCell::borrow_mut`].
pub struct TileMut<'a, E: Entity> {
    cell: &'a TileCell<E>,
}

impl<E: Entity> Deref for TileRef<'_, E> {
    type Target = Mat<E>;

    #[inline]
    fn deref(&self) -> &Mat<E> {
        // SAFETY: the reader count is positive for the lifetime of the guard.
        unsafe { &*self.cell.value.get() }
    }
}

impl<E: Entity> Drop for TileRef<'_, E> {
    #[inline]
    fn drop(&mut self) {
        self.cell.flag.fetch_sub(1, Ordering::Release);
    }
}

impl<E: Entity> Deref for TileMut<'_, E> {
    type Target = Mat<E>;

    #[inline]
    fn deref(&self) -> &Mat<E> {
        // SAFETY: the guard holds the writer flag.
        unsafe { &*self.cell.value.get() }
    }
}

impl<E: Entity> DerefMut for TileMut<'_, E> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Mat<E> {
        // SAFETY: the guard holds the writer flag.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<E: Entity> Drop for TileMut<'_, E> {
    #[inline]
    fn drop(&mut self) {
        self.cell.flag.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_share() {
        let cell = TileCell::new(Mat::<f64>::zeros(2, 2));
        let a = cell.borrow();
        let b = cell.borrow();
        assert_eq!(a.nrows(), b.ncols());
        drop((a, b));
        let mut w = cell.borrow_mut();
        w.write(0, 1, 3.0);
        drop(w);
        assert_eq!(cell.borrow().read(0, 1), 3.0);
    }

    #[test]
    #[should_panic]
    fn writer_excludes_reader() {
        let cell = TileCell::new(Mat::<f64>::zeros(1, 1));
        let _w = cell.borrow_mut();
        let _r = cell.borrow();
    }

    #[test]
    #[should_panic]
    fn reader_excludes_writer() {
        let cell = TileCell::new(Mat::<f64>::zeros(1, 1));
        let _r = cell.borrow();
        let _w = cell.borrow_mut();
    }

    #[test]
    fn exclusive_access_leaves_no_borrow() {
        let mut cell = TileCell::new(Mat::<f64>::zeros(2, 2));
        cell.get_mut().write(1, 0, -1.0);
        let mut w = cell.borrow_mut();
        w.write(1, 1, 2.0);
        drop(w);
        let r = cell.borrow();
        assert_eq!(r.read(1, 0), -1.0);
        assert_eq!(r.read(1, 1), 2.0);
    }
}
