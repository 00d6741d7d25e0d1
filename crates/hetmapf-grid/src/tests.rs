//! Unit tests for hetmapf-grid.
//!
//! All tests use in-memory map text so they run without any asset files.

#[cfg(test)]
mod helpers {
    use crate::Graph;

    /// An obstacle-free 8x8 base grid.
    pub fn empty_8x8() -> Graph {
        let mut text = String::from("type octile\nheight 8\nwidth 8\nmap\n");
        for _ in 0..8 {
            text.push_str("........\n");
        }
        Graph::from_map_str(&text).unwrap()
    }

    /// A 4x4 grid with one obstacle at (1, 1).
    pub fn blocked_4x4() -> Graph {
        Graph::from_map_str("height 4\nwidth 4\nmap\n....\n.@..\n....\n....\n").unwrap()
    }
}

// ── Map parsing ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod parsing {
    use crate::{Graph, GridError};

    #[test]
    fn empty_map_is_fully_passable() {
        let g = super::helpers::empty_8x8();
        assert_eq!(g.width, 8);
        assert_eq!(g.height, 8);
        assert_eq!(g.vertex_count(), 64);
    }

    #[test]
    fn obstacles_are_skipped() {
        let g = super::helpers::blocked_4x4();
        assert_eq!(g.vertex_count(), 15);
        assert!(g.at(1, 1).is_none());
        assert!(g.at(0, 0).is_some());
    }

    #[test]
    fn t_and_at_are_both_obstacles() {
        let g = Graph::from_map_str("height 1\nwidth 3\nmap\n.T@\n").unwrap();
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn crlf_lines_accepted() {
        let g = Graph::from_map_str("height 2\r\nwidth 2\r\nmap\r\n..\r\n..\r\n").unwrap();
        assert_eq!(g.vertex_count(), 4);
    }

    #[test]
    fn missing_map_line_rejected() {
        let err = Graph::from_map_str("height 2\nwidth 2\n..\n..\n").unwrap_err();
        assert!(matches!(err, GridError::MissingHeader("map")));
    }

    #[test]
    fn zero_dimensions_rejected() {
        let err = Graph::from_map_str("height 0\nwidth 4\nmap\n").unwrap_err();
        assert!(matches!(err, GridError::BadDimensions { .. }));
    }

    #[test]
    fn vertex_ids_are_dense_row_major() {
        let g = super::helpers::blocked_4x4();
        // First row is fully passable, so ids 0..4 are (0,0)..(3,0).
        for x in 0..4 {
            let v = g.at(x, 0).unwrap();
            assert_eq!(g.vertex(v).x as usize, x);
            assert_eq!(g.vertex(v).index, x);
        }
    }
}

// ── Adjacency ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod adjacency {
    #[test]
    fn interior_vertex_has_four_neighbors() {
        let g = super::helpers::empty_8x8();
        let v = g.at(3, 3).unwrap();
        assert_eq!(g.neighbors(v).len(), 4);
    }

    #[test]
    fn corner_vertex_has_two_neighbors() {
        let g = super::helpers::empty_8x8();
        let v = g.at(0, 0).unwrap();
        assert_eq!(g.neighbors(v).len(), 2);
    }

    #[test]
    fn obstacle_removes_edge() {
        let g = super::helpers::blocked_4x4();
        // (1,0) sits above the obstacle: left, right, up only... but y=0 has
        // no up, so neighbors are (0,0) and (2,0).
        let v = g.at(1, 0).unwrap();
        let n = g.neighbors(v);
        assert_eq!(n.len(), 2);
        assert!(n.contains(&g.at(0, 0).unwrap()));
        assert!(n.contains(&g.at(2, 0).unwrap()));
    }

    #[test]
    fn neighbors_are_symmetric() {
        let g = super::helpers::blocked_4x4();
        for v in g.iter() {
            for &u in g.neighbors(v.id) {
                assert!(
                    g.neighbors(u).contains(&v.id),
                    "edge {} -> {} has no reverse",
                    v.id,
                    u
                );
            }
        }
    }
}

// ── Fleet-graph tiling ────────────────────────────────────────────────────────

#[cfg(test)]
mod tiling {
    use crate::Graph;

    #[test]
    fn tiling_halves_dimensions() {
        let base = super::helpers::empty_8x8();
        let fleet = Graph::tiled(&base, 2).unwrap();
        assert_eq!(fleet.width, 4);
        assert_eq!(fleet.height, 4);
        assert_eq!(fleet.vertex_count(), 16);
    }

    #[test]
    fn tiling_truncates_ragged_edge() {
        let base = Graph::from_map_str("height 5\nwidth 5\nmap\n.....\n.....\n.....\n.....\n.....\n")
            .unwrap();
        let fleet = Graph::tiled(&base, 2).unwrap();
        assert_eq!(fleet.width, 2);
        assert_eq!(fleet.height, 2);
    }

    #[test]
    fn partially_blocked_tile_is_obstacle() {
        // Obstacle at (1,1) poisons the fleet cell (0,0) at cell_size 2.
        let base = super::helpers::blocked_4x4();
        let fleet = Graph::tiled(&base, 2).unwrap();
        assert!(fleet.at(0, 0).is_none());
        assert!(fleet.at(1, 0).is_some());
        assert_eq!(fleet.vertex_count(), 3);
    }

    #[test]
    fn degenerate_full_grid_tile() {
        let base = super::helpers::empty_8x8();
        let fleet = Graph::tiled(&base, 8).unwrap();
        assert_eq!(fleet.vertex_count(), 1);
        let only = fleet.at(0, 0).unwrap();
        assert!(fleet.neighbors(only).is_empty());
    }

    #[test]
    fn cell_size_zero_rejected() {
        let base = super::helpers::empty_8x8();
        assert!(Graph::tiled(&base, 0).is_err());
    }

    #[test]
    fn unit_tiling_matches_base() {
        let base = super::helpers::blocked_4x4();
        let fleet = Graph::tiled(&base, 1).unwrap();
        assert_eq!(fleet.vertex_count(), base.vertex_count());
        assert!(fleet.at(1, 1).is_none());
    }
}

// ── Footprint projection ──────────────────────────────────────────────────────

#[cfg(test)]
mod footprint {
    use crate::footprint::{base_cells, base_cells_of_index};

    #[test]
    fn unit_footprint_is_identity() {
        let cells: Vec<_> = base_cells(3, 2, 1, 8).collect();
        assert_eq!(cells, vec![8 * 2 + 3]);
    }

    #[test]
    fn square_footprint_row_major() {
        // Fleet cell (1, 1) at cell_size 2 on a base grid of width 8
        // covers base cells (2,2) (3,2) (2,3) (3,3).
        let cells: Vec<_> = base_cells(1, 1, 2, 8).collect();
        assert_eq!(cells, vec![18, 19, 26, 27]);
    }

    #[test]
    fn projection_is_idempotent() {
        let a: Vec<_> = base_cells(2, 0, 3, 12).collect();
        let b: Vec<_> = base_cells(2, 0, 3, 12).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn index_form_agrees_with_xy_form() {
        // Fleet graph of width 4: linear index 6 = (2, 1).
        let from_index: Vec<_> = base_cells_of_index(6, 4, 2, 8).collect();
        let from_xy: Vec<_> = base_cells(2, 1, 2, 8).collect();
        assert_eq!(from_index, from_xy);
    }

    #[test]
    fn disjoint_fleet_cells_have_disjoint_footprints() {
        let a: std::collections::HashSet<_> = base_cells(0, 0, 2, 8).collect();
        let b: std::collections::HashSet<_> = base_cells(1, 0, 2, 8).collect();
        assert!(a.is_disjoint(&b));
    }
}
