use super::{
    panel,
    pivot::{self, LowerTilesMut, TileColumnMut},
    reduction::Tournament,
    workspace::{diag_slot_count, Workspace, WorkspaceLayout, Zones},
    AasenError, AasenInfo, AasenParams, ColumnStats, UpdateStrategy,
};
use crate::{
    assert, debug_assert,
    dataflow::{GraphStats, Sequence, TaskGraph},
    linalg::kernels,
    tile::{live_dim, BandMatrix, TileMatrix},
    ComplexField, Conj, Entity, Parallelism, Side,
};
use dyn_stack::{GlobalPodBuffer, PodStack, SizeOverflow, StackReq};
use faer::{
    linalg::{
        matmul::{matmul, matmul_with_conj},
        temp_mat_uninit,
    },
    utils::thread::parallelism_degree,
};
use reborrow::*;

use self::Region::*;
use crate::dataflow::Access::{Read, Write};

const LOG_TARGET: &str = "faer_aasen";

/// Unit of data tracked by the dependency analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Region {
    /// Tile `(i, j)` of `A`.
    A(usize, usize),
    /// `T(k, k)`.
    Diag(usize),
    /// `T(k + 1, k)`.
    Sub(usize),
    /// `T(k, k + 1)`.
    Sup(usize),
    Staging,
    H(usize),
    DiagSlot(usize),
    UpdateSlot(usize),
    /// Pivots of the panel starting at tile row `k`.
    Pivots(usize),
}

struct Ctx<'a, E: Entity> {
    a: &'a TileMatrix<E>,
    t: &'a BandMatrix<E>,
    w: &'a Zones<E>,
    n: usize,
    nb: usize,
    mt: usize,
}

impl<E: Entity> Clone for Ctx<'_, E> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}
impl<E: Entity> Copy for Ctx<'_, E> {}

impl<E: Entity> Ctx<'_, E> {
    #[inline]
    fn live(&self, i: usize) -> usize {
        live_dim(self.n, self.nb, i)
    }
}

#[inline]
fn one<E: ComplexField>() -> E {
    E::faer_one()
}

#[inline]
fn minus_one<E: ComplexField>() -> E {
    E::faer_one().faer_neg()
}

/// `H(m, k)` for `1 ≤ m < k`:
///
/// `H(m, k) = T(m, m)·L(k, m)ᴴ + T(m, m-1)·L(k, m-1)ᴴ + T(m+1, m)ᴴ·L(k, m+1)ᴴ`,
/// where the middle term vanishes for `m = 1`.
fn submit_offdiagonal_h<'a, E: ComplexField>(
    graph: &mut TaskGraph<'a, Region>,
    ctx: Ctx<'a, E>,
    k: usize,
) {
    let mvak = ctx.live(k);
    for m in 1..k {
        let mvam = ctx.live(m);

        graph.submit("gemm", &[Read(Diag(m)), Read(A(k, m - 1)), Write(H(m))], move || {
            let t = ctx.t.diag(m);
            let l = ctx.a.l_tile(k, m);
            let mut h = ctx.w.h_mut(m);
            matmul_with_conj(
                h.as_mut().submatrix_mut(0, 0, mvam, mvak),
                t.as_ref(),
                Conj::No,
                l.as_ref().submatrix(0, 0, mvak, mvam).transpose(),
                Conj::Yes,
                None,
                one(),
                Parallelism::None,
            );
        });

        if m > 1 {
            let mvamm1 = ctx.live(m - 1);
            graph.submit(
                "gemm",
                &[Read(Sub(m - 1)), Read(A(k, m - 2)), Write(H(m))],
                move || {
                    let t = ctx.t.sub(m - 1);
                    let l = ctx.a.l_tile(k, m - 1);
                    let mut h = ctx.w.h_mut(m);
                    matmul_with_conj(
                        h.as_mut().submatrix_mut(0, 0, mvam, mvak),
                        t.as_ref(),
                        Conj::No,
                        l.as_ref().submatrix(0, 0, mvak, mvamm1).transpose(),
                        Conj::Yes,
                        Some(one()),
                        one(),
                        Parallelism::None,
                    );
                },
            );
        }

        let mvamp1 = ctx.live(m + 1);
        graph.submit("gemm", &[Read(Sub(m)), Read(A(k, m)), Write(H(m))], move || {
            let t = ctx.t.sub(m);
            let l = ctx.a.l_tile(k, m + 1);
            let mut h = ctx.w.h_mut(m);
            matmul_with_conj(
                h.as_mut().submatrix_mut(0, 0, mvam, mvak),
                t.as_ref().transpose(),
                Conj::Yes,
                l.as_ref().submatrix(0, 0, mvak, mvamp1).transpose(),
                Conj::Yes,
                Some(one()),
                one(),
                Parallelism::None,
            );
        });
    }
}

/// `T(k, k) = A(k, k) - Σ_{1 ≤ m < k} L(k, m)·H(m, k)`, lower half only.
///
/// The products are spread over `min(slots, k - 1)` diagonal slots and then reduced pairwise.
fn submit_diagonal_assembly<'a, E: ComplexField>(
    graph: &mut TaskGraph<'a, Region>,
    ctx: Ctx<'a, E>,
    k: usize,
    slots: usize,
) {
    let mvak = ctx.live(k);

    if k <= 1 {
        graph.submit("lacpy", &[Read(A(k, k)), Write(Diag(k))], move || {
            let a = ctx.a.tile(k, k);
            let mut t = ctx.t.diag_mut(k);
            kernels::copy_lower(t.as_mut(), a.as_ref());
        });
        graph.submit("mirror", &[Write(Diag(k))], move || {
            kernels::mirror_lower(ctx.t.diag_mut(k).as_mut());
        });
        return;
    }

    let num = diag_slot_count(k, slots);
    for m in 1..k {
        let mvam = ctx.live(m);
        let slot = (m - 1) % num;
        let alpha = if m <= num { None } else { Some(one()) };
        graph.submit(
            "gemm",
            &[Read(A(k, m - 1)), Read(H(m)), Write(DiagSlot(slot))],
            move || {
                let l = ctx.a.l_tile(k, m);
                let h = ctx.w.h(m);
                let mut w = ctx.w.diag_slot_mut(slot);
                matmul(
                    w.as_mut().submatrix_mut(0, 0, mvak, mvak),
                    l.as_ref().submatrix(0, 0, mvak, mvam),
                    h.as_ref().submatrix(0, 0, mvam, mvak),
                    alpha,
                    minus_one(),
                    Parallelism::None,
                );
            },
        );
    }

    for round in Tournament::new(num) {
        for (dst, src) in round.pairs() {
            graph.submit(
                "geadd",
                &[Read(DiagSlot(src)), Write(DiagSlot(dst))],
                move || {
                    let src = ctx.w.diag_slot(src);
                    let mut dst = ctx.w.diag_slot_mut(dst);
                    kernels::add_in_place(
                        dst.as_mut().submatrix_mut(0, 0, mvak, mvak),
                        src.as_ref().submatrix(0, 0, mvak, mvak),
                    );
                },
            );
        }
    }

    graph.submit("lacpy", &[Read(A(k, k)), Write(Diag(k))], move || {
        let a = ctx.a.tile(k, k);
        let mut t = ctx.t.diag_mut(k);
        kernels::copy_lower(t.as_mut(), a.as_ref());
    });
    graph.submit("geadd", &[Read(DiagSlot(0)), Write(Diag(k))], move || {
        let w = ctx.w.diag_slot(0);
        let mut t = ctx.t.diag_mut(k);
        kernels::add_in_place(t.as_mut(), w.as_ref().submatrix(0, 0, mvak, mvak));
    });
}

/// `T(k, k) ← L(k, k)⁻¹·(T(k, k) - L(k, k)·T(k, k-1)·L(k, k-1)ᴴ)·L(k, k)⁻ᴴ`, for `k ≥ 1`.
fn submit_congruence<'a, E: ComplexField>(
    graph: &mut TaskGraph<'a, Region>,
    ctx: Ctx<'a, E>,
    k: usize,
) {
    let mvak = ctx.live(k);

    if k > 1 {
        let mvakm1 = ctx.live(k - 1);
        graph.submit(
            "gemm",
            &[Read(A(k, k - 1)), Read(Sub(k - 1)), Write(Staging)],
            move || {
                let l = ctx.a.l_tile(k, k);
                let t = ctx.t.sub(k - 1);
                let mut w = ctx.w.staging_mut();
                matmul(
                    w.as_mut().submatrix_mut(0, 0, mvak, mvakm1),
                    l.as_ref().submatrix(0, 0, mvak, mvak),
                    t.as_ref(),
                    None,
                    one(),
                    Parallelism::None,
                );
            },
        );
        graph.submit(
            "gemm",
            &[Read(Staging), Read(A(k, k - 2)), Write(Diag(k))],
            move || {
                let w = ctx.w.staging();
                let l = ctx.a.l_tile(k, k - 1);
                let mut t = ctx.t.diag_mut(k);
                matmul_with_conj(
                    t.as_mut(),
                    w.as_ref().submatrix(0, 0, mvak, mvakm1),
                    Conj::No,
                    l.as_ref().submatrix(0, 0, mvak, mvakm1).transpose(),
                    Conj::Yes,
                    Some(one()),
                    minus_one(),
                    Parallelism::None,
                );
            },
        );
        graph.submit("mirror", &[Write(Diag(k))], move || {
            kernels::mirror_lower(ctx.t.diag_mut(k).as_mut());
        });
    }

    graph.submit("hegst", &[Read(A(k, k - 1)), Write(Diag(k))], move || {
        let l = ctx.a.l_tile(k, k);
        let mut t = ctx.t.diag_mut(k);
        kernels::hermitian_congruence_in_place(
            t.as_mut(),
            l.as_ref().submatrix(0, 0, mvak, mvak),
            Parallelism::None,
        );
    });
    graph.submit("mirror", &[Write(Diag(k))], move || {
        kernels::mirror_lower(ctx.t.diag_mut(k).as_mut());
    });
}

/// `H(k, k) = T(k, k-1)·L(k, k-1)ᴴ + T(k, k)·L(k, k)ᴴ`, then
/// `L(k+1.., k+1) = A(k+1.., k) - Σ_{1 ≤ m ≤ k} L(k+1.., m)·H(m, k)`.
fn submit_column_update<'a, E: ComplexField>(
    graph: &mut TaskGraph<'a, Region>,
    ctx: Ctx<'a, E>,
    k: usize,
    strategy: UpdateStrategy,
) {
    let mt = ctx.mt;
    let mvak = ctx.live(k);

    if k > 1 {
        let mvakm1 = ctx.live(k - 1);
        graph.submit(
            "gemm",
            &[Read(Sub(k - 1)), Read(A(k, k - 2)), Write(H(k))],
            move || {
                let t = ctx.t.sub(k - 1);
                let l = ctx.a.l_tile(k, k - 1);
                let mut h = ctx.w.h_mut(k);
                matmul_with_conj(
                    h.as_mut().submatrix_mut(0, 0, mvak, mvak),
                    t.as_ref(),
                    Conj::No,
                    l.as_ref().submatrix(0, 0, mvak, mvakm1).transpose(),
                    Conj::Yes,
                    None,
                    one(),
                    Parallelism::None,
                );
            },
        );
    }
    if k > 0 {
        let alpha = if k > 1 { Some(one()) } else { None };
        graph.submit(
            "gemm",
            &[Read(Diag(k)), Read(A(k, k - 1)), Write(H(k))],
            move || {
                let t = ctx.t.diag(k);
                let l = ctx.a.l_tile(k, k);
                let mut h = ctx.w.h_mut(k);
                matmul_with_conj(
                    h.as_mut().submatrix_mut(0, 0, mvak, mvak),
                    t.as_ref(),
                    Conj::No,
                    l.as_ref().submatrix(0, 0, mvak, mvak).transpose(),
                    Conj::Yes,
                    alpha,
                    one(),
                    Parallelism::None,
                );
            },
        );
    }

    match strategy {
        UpdateStrategy::Direct => {
            for m in k + 1..mt {
                let mvam = ctx.live(m);
                for n in 1..=k {
                    let mvan = ctx.live(n);
                    graph.submit(
                        "gemm",
                        &[Read(A(m, n - 1)), Read(H(n)), Write(A(m, k))],
                        move || {
                            let l = ctx.a.l_tile(m, n);
                            let h = ctx.w.h(n);
                            let mut target = ctx.a.tile_mut(m, k);
                            matmul(
                                target.as_mut(),
                                l.as_ref().submatrix(0, 0, mvam, mvan),
                                h.as_ref().submatrix(0, 0, mvan, mvak),
                                Some(one()),
                                minus_one(),
                                Parallelism::None,
                            );
                        },
                    );
                }
            }
        }
        UpdateStrategy::Workspace { slots_per_row } => {
            for m in k + 1..mt {
                let mvam = ctx.live(m);
                let base = (m - k - 1) * slots_per_row;
                for n in 1..=k {
                    let mvan = ctx.live(n);
                    let slot = base + (n - 1) % slots_per_row;
                    let alpha = if n <= slots_per_row {
                        None
                    } else {
                        Some(one())
                    };
                    graph.submit(
                        "gemm",
                        &[Read(A(m, n - 1)), Read(H(n)), Write(UpdateSlot(slot))],
                        move || {
                            let l = ctx.a.l_tile(m, n);
                            let h = ctx.w.h(n);
                            let mut w = ctx.w.update_slot_mut(slot);
                            matmul(
                                w.as_mut().submatrix_mut(0, 0, mvam, mvak),
                                l.as_ref().submatrix(0, 0, mvam, mvan),
                                h.as_ref().submatrix(0, 0, mvan, mvak),
                                alpha,
                                minus_one(),
                                Parallelism::None,
                            );
                        },
                    );
                }

                for round in Tournament::new(slots_per_row) {
                    for (dst, src) in round.pairs() {
                        let (dst, src) = (base + dst, base + src);
                        graph.submit(
                            "geadd",
                            &[Read(UpdateSlot(src)), Write(UpdateSlot(dst))],
                            move || {
                                let src = ctx.w.update_slot(src);
                                let mut dst = ctx.w.update_slot_mut(dst);
                                kernels::add_in_place(
                                    dst.as_mut().submatrix_mut(0, 0, mvam, mvak),
                                    src.as_ref().submatrix(0, 0, mvam, mvak),
                                );
                            },
                        );
                    }
                }

                graph.submit(
                    "geadd",
                    &[Read(UpdateSlot(base)), Write(A(m, k))],
                    move || {
                        let w = ctx.w.update_slot(base);
                        let mut target = ctx.a.tile_mut(m, k);
                        kernels::add_in_place(
                            target.as_mut(),
                            w.as_ref().submatrix(0, 0, mvam, mvak),
                        );
                    },
                );
            }
        }
    }
}

/// LU factorization with partial pivoting of `L(k+1.., k+1)`, stored in the tiles
/// `A(k+1.., k)`.
fn factor_panel<E: ComplexField>(
    ctx: Ctx<'_, E>,
    k: usize,
    buffer: &mut GlobalPodBuffer,
    pivots: &mut [usize],
    group_size: usize,
    sequence: &Sequence,
) {
    let nb = ctx.nb;
    let origin = (k + 1) * nb;
    let rows = ctx.n - origin;
    let cols = ctx.live(k);
    let size = Ord::min(rows, cols);
    debug_assert!(pivots.len() == size);

    let (mut panel, _) = temp_mat_uninit::<E>(rows, cols, PodStack::new(buffer));

    let mut tiles: Vec<_> = (k + 1..ctx.mt).map(|m| ctx.a.tile_mut(m, k)).collect();
    for (idx, tile) in tiles.iter().enumerate() {
        panel
            .rb_mut()
            .submatrix_mut(idx * nb, 0, tile.nrows(), cols)
            .copy_from(tile.as_ref());
    }

    let first_zero = panel::lu_in_place(panel.rb_mut(), pivots, group_size);

    for (idx, tile) in tiles.iter_mut().enumerate() {
        let m = tile.nrows();
        tile.as_mut()
            .copy_from(panel.rb().submatrix(idx * nb, 0, m, cols));
    }
    for p in pivots.iter_mut() {
        *p += origin;
    }

    if let Some(j) = first_zero {
        let pos = origin + j + 1;
        log::warn!(
            target: LOG_TARGET,
            "zero pivot in tile column {k} at global position {pos}"
        );
        sequence.fail(AasenError::Factorization { row: pos, col: pos });
    }
}

/// Row interchanges on `L(k+1.., 1..=k)`, symmetric interchanges on the trailing submatrix, and
/// `T(k+1, k)`, `T(k, k+1)` from the factored panel.
fn submit_propagation<'a, E: ComplexField>(
    graph: &mut TaskGraph<'a, Region>,
    ctx: Ctx<'a, E>,
    k: usize,
    ipiv: &'a [usize],
) {
    let (n, nb, mt) = (ctx.n, ctx.nb, ctx.mt);
    let origin = (k + 1) * nb;
    let size = Ord::min(n - origin, ctx.live(k));
    let rows = origin..origin + size;

    for c in 0..k {
        let accesses: Vec<_> = core::iter::once(Read(Pivots(k + 1)))
            .chain((k + 1..mt).map(|m| Write(A(m, c))))
            .collect();
        let rows = rows.clone();
        graph.submit("laswp", &accesses, move || {
            let tiles = (k + 1..mt).map(|m| ctx.a.tile_mut(m, c)).collect();
            let mut column = TileColumnMut::new(tiles, k + 1, nb);
            pivot::apply_row_swaps(&mut column, ipiv, rows);
        });
    }

    let trailing = move || (k + 1..mt).flat_map(move |i| (k + 1..=i).map(move |j| (i, j)));
    let accesses: Vec<_> = core::iter::once(Read(Pivots(k + 1)))
        .chain(trailing().map(|(i, j)| Write(A(i, j))))
        .collect();
    graph.submit("laswp_sym", &accesses, move || {
        let tiles = trailing().map(|(i, j)| ctx.a.tile_mut(i, j)).collect();
        let mut lower = LowerTilesMut::new(tiles, k + 1, nb, n);
        pivot::apply_symmetric_swaps(&mut lower, ipiv, rows);
    });

    graph.submit("lacpy", &[Read(A(k + 1, k)), Write(Sub(k))], move || {
        let l = ctx.a.tile(k + 1, k);
        let mut t = ctx.t.sub_mut(k);
        kernels::copy_upper(t.as_mut(), l.as_ref());
        kernels::zero_strictly_lower(t.as_mut());
    });
    graph.submit("laset", &[Write(A(k + 1, k))], move || {
        kernels::set_upper(ctx.a.tile_mut(k + 1, k).as_mut(), E::faer_zero(), one());
    });
    if k > 0 {
        let mvak = ctx.live(k);
        graph.submit("trsm", &[Read(A(k, k - 1)), Write(Sub(k))], move || {
            let l = ctx.a.l_tile(k, k);
            let mut t = ctx.t.sub_mut(k);
            kernels::solve_unit_lower_adjoint_on_the_right_in_place(
                l.as_ref().submatrix(0, 0, mvak, mvak),
                t.as_mut(),
                Parallelism::None,
            );
        });
    }
    graph.submit("adjoint", &[Read(Sub(k)), Write(Sup(k))], move || {
        let sub = ctx.t.sub(k);
        let mut sup = ctx.t.sup_mut(k);
        kernels::adjoint_into(sup.as_mut(), sub.as_ref());
    });
}

/// Overwrites the strictly lower tiles with the adjoint of the upper ones, and completes the
/// diagonal tiles from their upper half.
fn lower_from_upper<E: ComplexField>(a: &TileMatrix<E>) {
    let mt = a.tile_count();
    for j in 0..mt {
        kernels::mirror_upper(a.tile_mut(j, j).as_mut());
        for i in j + 1..mt {
            let src = a.tile(j, i);
            let mut dst = a.tile_mut(i, j);
            kernels::adjoint_into(dst.as_mut(), src.as_ref());
        }
    }
}

/// Overwrites the strictly upper tiles with the adjoint of the lower ones, and completes the
/// diagonal tiles from their lower half.
fn upper_from_lower<E: ComplexField>(a: &TileMatrix<E>) {
    let mt = a.tile_count();
    for j in 0..mt {
        kernels::mirror_lower(a.tile_mut(j, j).as_mut());
        for i in j + 1..mt {
            let src = a.tile(i, j);
            let mut dst = a.tile_mut(j, i);
            kernels::adjoint_into(dst.as_mut(), src.as_ref());
        }
    }
}

/// Computes the size and alignment of the workspace required by the Aasen factorization of a
/// matrix of dimension `n` with block size `nb`.
pub fn factorize_req<E: Entity>(
    n: usize,
    nb: usize,
    parallelism: Parallelism,
    params: AasenParams,
) -> Result<StackReq, SizeOverflow> {
    WorkspaceLayout::new(n, nb, parallelism, params).req::<E>()
}

/// Computes the Aasen factorization of the Hermitian matrix stored in `a`, in place.
///
/// The decomposition is such that:
/// $$P^\top A P = L T L^H,$$
/// where $P$ is the permutation described by the transpositions in `ipiv`, $L$ is unit lower
/// triangular with an identity first block column, and $T$ is Hermitian block tridiagonal with
/// upper triangular sub-diagonal blocks.
///
/// With [`Side::Lower`], only the tiles `A(i, j)` with `i ≥ j` are read, and only the lower half
/// of the diagonal tiles. On output, `L(m, n)` is stored in `A(m, n - 1)` for `1 ≤ n ≤ m`.
///
/// With [`Side::Upper`], only the tiles `A(i, j)` with `i ≤ j` are read, and only the upper half
/// of the diagonal tiles. On output, $U = L^H$ is stored with `U(n, m)` in `A(n - 1, m)`, so
/// that $P^\top A P = U^H T U$. The lower tiles are used as scratch space.
///
/// `T` is written to `t`. `ipiv` receives the transpositions: for `i` in increasing order, rows
/// and columns `i` and `ipiv[i]` were swapped. The first `nb` entries are the identity.
///
/// The function returns once every task has completed. If the panel factorization meets an
/// exactly zero pivot, `sequence` records [`AasenError::Factorization`] and the remaining tasks
/// are skipped; the outputs are then unspecified.
///
/// # Errors
/// Returns [`AasenError::SequenceFlushed`] without doing any work if `sequence` had already
/// failed.
///
/// # Panics
/// - Panics if `t` or `workspace` do not have the same dimension and block size as `a`.
/// - Panics if `ipiv.len() != a.dim()`.
#[track_caller]
pub fn factorize_in_place<E: ComplexField>(
    side: Side,
    a: &mut TileMatrix<E>,
    t: &mut BandMatrix<E>,
    ipiv: &mut [usize],
    workspace: &mut Workspace<E>,
    sequence: &Sequence,
    parallelism: Parallelism,
    params: AasenParams,
) -> Result<AasenInfo, AasenError> {
    let n = a.dim();
    let nb = a.block_size();
    let mt = a.tile_count();
    let layout = workspace.layout();
    assert!(all(
        t.dim() == n,
        t.block_size() == nb,
        layout.n == n,
        layout.nb == nb,
        ipiv.len() == n,
    ));

    if !sequence.is_ok() {
        return Err(AasenError::SequenceFlushed);
    }

    let threads = parallelism_degree(parallelism).max(1);
    log::debug!(
        target: LOG_TARGET,
        "aasen: n={n} nb={nb} mt={mt} side={side:?} threads={threads} slots={}",
        layout.slots
    );

    for (i, p) in ipiv.iter_mut().enumerate() {
        *p = i;
    }

    let a = &*a;
    let t = &*t;
    if side == Side::Upper {
        lower_from_upper(a);
    }

    let (zones, buffer) = workspace.parts();
    let ctx = Ctx {
        a,
        t,
        w: zones,
        n,
        nb,
        mt,
    };

    let mut columns = Vec::with_capacity(mt);
    for k in 0..mt {
        let mut stats = GraphStats::default();
        let mut update = None;

        let mut graph = TaskGraph::new();
        submit_offdiagonal_h(&mut graph, ctx, k);
        submit_diagonal_assembly(&mut graph, ctx, k, layout.slots);
        if k > 0 {
            submit_congruence(&mut graph, ctx, k);
        }
        if k + 1 < mt {
            let strategy = UpdateStrategy::select(k, mt - k - 1, threads, layout.slots);
            log::trace!(target: LOG_TARGET, "column {k}: update strategy {strategy:?}");
            submit_column_update(&mut graph, ctx, k, strategy);
            update = Some(strategy);
        }
        stats += graph.execute(sequence, parallelism);

        if k + 1 < mt {
            let origin = (k + 1) * nb;
            let size = Ord::min(n - origin, ctx.live(k));
            let group_size = if params.panel_threads > 0 {
                params.panel_threads
            } else {
                Ord::min(threads, mt - k - 1)
            };

            {
                let pivots = &mut ipiv[origin..origin + size];
                let buffer = &mut *buffer;
                let accesses: Vec<_> = (k + 1..mt)
                    .map(|m| Write(A(m, k)))
                    .chain(core::iter::once(Write(Pivots(k + 1))))
                    .collect();
                let mut graph = TaskGraph::new();
                graph.submit("getrf", &accesses, move || {
                    factor_panel(ctx, k, buffer, pivots, group_size, sequence)
                });
                stats += graph.execute(sequence, parallelism);
            }

            let mut graph = TaskGraph::new();
            submit_propagation(&mut graph, ctx, k, &*ipiv);
            stats += graph.execute(sequence, parallelism);
        }

        log::debug!(
            target: LOG_TARGET,
            "column {k}: {} tasks executed, {} skipped",
            stats.executed,
            stats.skipped
        );
        columns.push(ColumnStats {
            column: k,
            tasks_executed: stats.executed,
            tasks_skipped: stats.skipped,
            update,
        });
    }

    if side == Side::Upper {
        upper_from_lower(a);
    }

    let transposition_count = ipiv.iter().enumerate().filter(|&(i, &p)| i != p).count();
    Ok(AasenInfo {
        transposition_count,
        columns,
    })
}

/// Computes the Aasen factorization of the Hermitian matrix stored in `a`, in place, allocating
/// the required workspace.
///
/// See [`factorize_in_place`] for the storage conventions.
///
/// # Errors
/// Returns [`AasenError::Factorization`] if the panel factorization met an exactly zero pivot.
#[track_caller]
pub fn factorize<E: ComplexField>(
    side: Side,
    a: &mut TileMatrix<E>,
    t: &mut BandMatrix<E>,
    ipiv: &mut [usize],
    parallelism: Parallelism,
    params: AasenParams,
) -> Result<AasenInfo, AasenError> {
    let layout = WorkspaceLayout::new(a.dim(), a.block_size(), parallelism, params);
    let mut workspace = Workspace::new(layout);
    let sequence = Sequence::new();
    let info = factorize_in_place(
        side,
        a,
        t,
        ipiv,
        &mut workspace,
        &sequence,
        parallelism,
        params,
    )?;
    sequence.status()?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use crate::{c64, linalg::aasen::reconstruct, Mat};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_hermitian(rng: &mut StdRng, n: usize) -> Mat<c64> {
        let mut a = Mat::from_fn(n, n, |_, _| c64::new(rng.gen(), rng.gen()));
        kernels::mirror_lower(a.as_mut());
        a
    }

    #[test]
    fn req() {
        let params = AasenParams::default();
        assert!(factorize_req::<f64>(10, 4, Parallelism::Rayon(2), params).is_ok());
        assert!(factorize_req::<c64>(0, 4, Parallelism::None, params).is_ok());
    }

    #[test]
    fn single_tile_is_copied_to_the_band() {
        let rng = &mut StdRng::seed_from_u64(0);
        let a = random_hermitian(rng, 3);
        let mut tiles = TileMatrix::from_dense(a.as_ref(), 4);
        let mut band = BandMatrix::zeros(3, 4);
        let mut ipiv = vec![7usize; 3];

        let info = factorize(
            Side::Lower,
            &mut tiles,
            &mut band,
            &mut ipiv,
            Parallelism::None,
            AasenParams::default(),
        )
        .unwrap();

        assert_eq!(ipiv, vec![0, 1, 2]);
        assert_eq!(info.transposition_count, 0);
        assert_eq!(info.columns.len(), 1);
        assert_eq!(info.columns[0].update, None);
        assert!(band.to_dense() == a);
    }

    #[test]
    fn empty_matrix() {
        let mut tiles = TileMatrix::<f64>::zeros(0, 4);
        let mut band = BandMatrix::zeros(0, 4);
        let info = factorize(
            Side::Upper,
            &mut tiles,
            &mut band,
            &mut [],
            Parallelism::Rayon(2),
            AasenParams::default(),
        )
        .unwrap();
        assert!(info.columns.is_empty());
    }

    #[test]
    fn flushed_sequence_does_no_work() {
        let rng = &mut StdRng::seed_from_u64(1);
        let n = 9;
        let a = random_hermitian(rng, n);
        let mut tiles = TileMatrix::from_dense(a.as_ref(), 3);
        let mut band = BandMatrix::zeros(n, 3);
        let mut ipiv = vec![0usize; n];
        let params = AasenParams::default();
        let mut workspace = Workspace::new(WorkspaceLayout::new(n, 3, Parallelism::None, params));

        let sequence = Sequence::new();
        sequence.fail(AasenError::Factorization { row: 1, col: 1 });
        let result = factorize_in_place(
            Side::Lower,
            &mut tiles,
            &mut band,
            &mut ipiv,
            &mut workspace,
            &sequence,
            Parallelism::None,
            params,
        );
        assert_eq!(result.unwrap_err(), AasenError::SequenceFlushed);
        assert!(tiles.to_dense() == a);
        assert_eq!(ipiv, vec![0; n]);
    }

    #[test]
    fn workspace_is_reusable() {
        let rng = &mut StdRng::seed_from_u64(2);
        let (n, nb) = (11, 3);
        let params = AasenParams::default();
        let parallelism = Parallelism::Rayon(3);
        let mut workspace = Workspace::new(WorkspaceLayout::new(n, nb, parallelism, params));

        for _ in 0..2 {
            let a = random_hermitian(rng, n);
            let mut tiles = TileMatrix::from_dense(a.as_ref(), nb);
            let mut band = BandMatrix::zeros(n, nb);
            let mut ipiv = vec![0usize; n];
            let sequence = Sequence::new();
            factorize_in_place(
                Side::Lower,
                &mut tiles,
                &mut band,
                &mut ipiv,
                &mut workspace,
                &sequence,
                parallelism,
                params,
            )
            .unwrap();
            assert!(sequence.is_ok());

            let (perm, _) = reconstruct::permutation(&ipiv);
            let lhs = reconstruct::permute_symmetric(a.as_ref(), &perm);
            let rhs = reconstruct::reconstruct(Side::Lower, &tiles, &band);
            assert!((&lhs - &rhs).norm_max() < 1e-10);
        }
    }
}
