//! Grid graph representation and constructors.
//!
//! # Data layout
//!
//! Passable cells become dense [`Vertex`] records indexed by `VertexId`;
//! a `lookup` table of length `width * height` maps the linear grid index
//! `width * y + x` back to `Some(VertexId)` or `None` (obstacle).
//!
//! Adjacency uses **Compressed Sparse Row (CSR)** format: the neighbors of
//! vertex `v` occupy the slice
//!
//! ```text
//! adj[ adj_start[v] .. adj_start[v+1] ]
//! ```
//!
//! so neighbor iteration is a contiguous memory scan — ideal for the BFS
//! inner loops that dominate the distance oracle and the lookahead.
//!
//! # Constructors
//!
//! - [`Graph::from_map_file`] / [`Graph::from_map_str`]: parse the movingai
//!   benchmark map format (base grid).
//! - [`Graph::tiled`]: derive a coarser fleet graph by non-overlapping
//!   tiling at a given cell size.

use std::fs;
use std::path::Path;

use hetmapf_core::VertexId;

use crate::{GridError, GridResult};

/// A passable cell of some grid graph.
///
/// `id` is dense and graph-local; `index` is the linear grid index
/// `width * y + x` within the owning graph's dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub id: VertexId,
    pub index: usize,
    pub x: u32,
    pub y: u32,
}

/// A 4-connected grid graph.  Owns its vertices; everything else refers to
/// them by `VertexId`.
#[derive(Debug)]
pub struct Graph {
    vertices: Vec<Vertex>,
    /// Linear grid index → vertex, `None` for obstacles.  Length `width * height`.
    lookup: Vec<Option<VertexId>>,
    /// CSR row pointer, length `vertices.len() + 1`.
    adj_start: Vec<u32>,
    /// CSR neighbor lists, ordered left / right / down / up per vertex.
    adj: Vec<VertexId>,
    pub width: usize,
    pub height: usize,
}

impl Graph {
    // ── Constructors ──────────────────────────────────────────────────────

    /// Parse a movingai-format map file.
    ///
    /// Header lines `height <N>` and `width <N>` set the dimensions; a line
    /// equal to `map` ends the header.  In the body, `T` and `@` are
    /// obstacles and every other character is passable.  Trailing `\r` is
    /// stripped, so DOS line endings are fine.
    pub fn from_map_file(path: impl AsRef<Path>) -> GridResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_map_str(&text)
    }

    /// Same as [`Graph::from_map_file`] but from in-memory text.
    pub fn from_map_str(text: &str) -> GridResult<Self> {
        let mut width = 0usize;
        let mut height = 0usize;
        let mut lines = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));

        let mut saw_map = false;
        for line in lines.by_ref() {
            if let Some(rest) = line.strip_prefix("height ") {
                height = rest.trim().parse().unwrap_or(0);
            } else if let Some(rest) = line.strip_prefix("width ") {
                width = rest.trim().parse().unwrap_or(0);
            } else if line.trim() == "map" {
                saw_map = true;
                break;
            }
        }
        if !saw_map {
            return Err(GridError::MissingHeader("map"));
        }
        if width == 0 || height == 0 {
            return Err(GridError::BadDimensions { width, height });
        }

        let mut passable = vec![false; width * height];
        for (y, line) in lines.take(height).enumerate() {
            for (x, c) in line.chars().take(width).enumerate() {
                passable[width * y + x] = c != 'T' && c != '@';
            }
        }

        Ok(Self::from_passable(width, height, &passable))
    }

    /// Derive a fleet graph by non-overlapping tiling at `cell_size`.
    ///
    /// Fleet cell `(fx, fy)` covers base cells
    /// `[fx*s, (fx+1)*s) × [fy*s, (fy+1)*s)` and is passable only if every
    /// one of them is.  Dimensions truncate to `⌊base / s⌋`; a ragged strip
    /// at the right/bottom edge of the base grid is simply unreachable to
    /// this fleet.
    pub fn tiled(base: &Graph, cell_size: u32) -> GridResult<Self> {
        if cell_size == 0 {
            return Err(GridError::BadCellSize(cell_size));
        }
        let s = cell_size as usize;
        let width = base.width / s;
        let height = base.height / s;

        let mut passable = vec![false; width * height];
        for fy in 0..height {
            for fx in 0..width {
                let mut all_free = true;
                'scan: for dy in 0..s {
                    for dx in 0..s {
                        let bx = fx * s + dx;
                        let by = fy * s + dy;
                        if base.lookup[base.width * by + bx].is_none() {
                            all_free = false;
                            break 'scan;
                        }
                    }
                }
                passable[width * fy + fx] = all_free;
            }
        }

        Ok(Self::from_passable(width, height, &passable))
    }

    /// Build vertices and CSR adjacency from a passability bitmap.
    fn from_passable(width: usize, height: usize, passable: &[bool]) -> Self {
        let mut vertices = Vec::new();
        let mut lookup = vec![None; width * height];
        for y in 0..height {
            for x in 0..width {
                let index = width * y + x;
                if passable[index] {
                    let id = VertexId(vertices.len() as u32);
                    vertices.push(Vertex { id, index, x: x as u32, y: y as u32 });
                    lookup[index] = Some(id);
                }
            }
        }

        // CSR adjacency, neighbor order left / right / down / up.
        let mut adj_start = Vec::with_capacity(vertices.len() + 1);
        let mut adj = Vec::new();
        adj_start.push(0u32);
        for v in &vertices {
            let (x, y) = (v.x as usize, v.y as usize);
            if x > 0 {
                if let Some(u) = lookup[width * y + (x - 1)] {
                    adj.push(u);
                }
            }
            if x + 1 < width {
                if let Some(u) = lookup[width * y + (x + 1)] {
                    adj.push(u);
                }
            }
            if y + 1 < height {
                if let Some(u) = lookup[width * (y + 1) + x] {
                    adj.push(u);
                }
            }
            if y > 0 {
                if let Some(u) = lookup[width * (y - 1) + x] {
                    adj.push(u);
                }
            }
            adj_start.push(adj.len() as u32);
        }

        Self { vertices, lookup, adj_start, adj, width, height }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Vertex at grid coordinates, `None` for obstacles or out of range.
    pub fn at(&self, x: usize, y: usize) -> Option<VertexId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.lookup[self.width * y + x]
    }

    /// Vertex at a linear grid index (`width * y + x`).
    #[inline]
    pub fn at_index(&self, index: usize) -> Option<VertexId> {
        self.lookup.get(index).copied().flatten()
    }

    /// Neighbors of `v` as a contiguous slice — no heap allocation.
    #[inline]
    pub fn neighbors(&self, v: VertexId) -> &[VertexId] {
        let start = self.adj_start[v.index()] as usize;
        let end = self.adj_start[v.index() + 1] as usize;
        &self.adj[start..end]
    }

    /// Number of passable vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterator over all vertices in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }
}
