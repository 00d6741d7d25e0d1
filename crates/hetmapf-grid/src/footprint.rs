//! Footprint projection: fleet cells down to base-grid cells.
//!
//! Every conflict the planner evaluates is evaluated on the base grid, so
//! this projection is on the hot path of the reservation table, the push
//! generator, and the constraint enumerator.  The iterator is allocation
//! free and yields base cells in deterministic row-major order.
//!
//! No clipping happens at the right/bottom edge: fleet graphs truncate
//! their dimensions to `⌊base / cell_size⌋`, so a valid fleet cell always
//! projects fully inside the base grid.

use hetmapf_core::VertexId;

use crate::Graph;

/// Base cells covered by the fleet cell at `(fx, fy)` with the given
/// footprint side, in row-major order.
#[inline]
pub fn base_cells(
    fx: u32,
    fy: u32,
    cell_size: u32,
    base_width: usize,
) -> impl Iterator<Item = usize> {
    let s = cell_size as usize;
    let (fx, fy) = (fx as usize, fy as usize);
    (0..s).flat_map(move |dy| {
        let row = base_width * (fy * s + dy) + fx * s;
        (0..s).map(move |dx| row + dx)
    })
}

/// Base cells covered by a fleet cell given by its linear index on a fleet
/// graph of width `fleet_width`.
#[inline]
pub fn base_cells_of_index(
    cell_index: usize,
    fleet_width: usize,
    cell_size: u32,
    base_width: usize,
) -> impl Iterator<Item = usize> {
    base_cells(
        (cell_index % fleet_width) as u32,
        (cell_index / fleet_width) as u32,
        cell_size,
        base_width,
    )
}

/// Base cells covered by fleet-graph vertex `v`.
#[inline]
pub fn base_cells_of_vertex(
    fleet_graph: &Graph,
    v: VertexId,
    cell_size: u32,
    base_width: usize,
) -> impl Iterator<Item = usize> {
    let vx = fleet_graph.vertex(v);
    base_cells(vx.x, vx.y, cell_size, base_width)
}
