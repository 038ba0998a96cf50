//! Tile grid: terrain assignment and occupancy.

use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, TerrainKind};
use crate::registry::StructureId;
use crate::rng::RngManager;

/// Grid coordinate. Signed so that requests hanging off the west or north
/// edge are reported as out of bounds instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub z: u32,
    pub terrain: TerrainKind,
    pub occupant: Option<StructureId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimensions {width}x{height} must both be positive")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("terrain weights are unusable: {0}")]
    InvalidWeights(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tile {0} lies outside the grid")]
pub struct OutOfBounds(pub TilePos);

/// Inputs to terrain generation. The generated layout is a pure function of
/// these values.
#[derive(Debug, Clone)]
pub struct GridSpec {
    pub width: u32,
    pub height: u32,
    pub weights: Vec<(TerrainKind, f64)>,
    pub infrastructure_lines: u32,
    pub fast_traversal: TerrainKind,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl WorldGrid {
    pub fn generate(spec: &GridSpec) -> Result<Self, GridError> {
        let (width, height) = (spec.width, spec.height);
        if width == 0 || height == 0 || i32::try_from(width.max(height)).is_err() {
            return Err(GridError::InvalidDimensions { width, height });
        }
        let sampler = WeightedIndex::new(spec.weights.iter().map(|(_, weight)| *weight))
            .map_err(|err| GridError::InvalidWeights(err.to_string()))?;

        let mut rng = RngManager::new(spec.seed);
        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        {
            let terrain_rng = rng.stream("terrain");
            for z in 0..height {
                for x in 0..width {
                    let (terrain, _) = spec.weights[sampler.sample(terrain_rng)];
                    tiles.push(Tile {
                        x,
                        z,
                        terrain,
                        occupant: None,
                    });
                }
            }
        }

        let mut grid = Self {
            width,
            height,
            tiles,
        };

        let lines = rng.stream("infrastructure");
        for _ in 0..spec.infrastructure_lines {
            if lines.gen_bool(0.5) {
                let z = lines.gen_range(0..height);
                for x in 0..width {
                    grid.set_terrain(x, z, spec.fast_traversal);
                }
            } else {
                let x = lines.gen_range(0..width);
                for z in 0..height {
                    grid.set_terrain(x, z, spec.fast_traversal);
                }
            }
        }

        Ok(grid)
    }

    /// Overwrites the square of side `2 * radius + 1` around the centre with
    /// `terrain`, clipped to the grid.
    pub fn reserve_center(&mut self, center_x: u32, center_z: u32, radius: u32, terrain: TerrainKind) {
        let (width, height) = (self.width, self.height);
        let x_range = center_x.saturating_sub(radius)..=center_x.saturating_add(radius);
        for x in x_range.filter(|x| *x < width) {
            let z_range = center_z.saturating_sub(radius)..=center_z.saturating_add(radius);
            for z in z_range.filter(|z| *z < height) {
                self.set_terrain(x, z, terrain);
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn center(&self) -> TilePos {
        TilePos::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    pub fn is_in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.z >= 0 && (pos.x as u32) < self.width && (pos.z as u32) < self.height
    }

    pub fn tile_at(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|index| &self.tiles[index])
    }

    /// True when the tile exists and nothing stands on it.
    pub fn is_free(&self, pos: TilePos) -> bool {
        self.tile_at(pos).is_some_and(|tile| tile.occupant.is_none())
    }

    pub fn is_buildable(&self, pos: TilePos, catalog: &Catalog) -> bool {
        self.tile_at(pos)
            .and_then(|tile| catalog.lookup_terrain(tile.terrain).ok())
            .is_some_and(|terrain| terrain.buildable)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub(crate) fn occupy(&mut self, tiles: &[TilePos], id: StructureId) -> Result<(), OutOfBounds> {
        let indices = self.indices(tiles)?;
        for index in indices {
            self.tiles[index].occupant = Some(id);
        }
        Ok(())
    }

    pub(crate) fn vacate(&mut self, tiles: &[TilePos]) -> Result<(), OutOfBounds> {
        let indices = self.indices(tiles)?;
        for index in indices {
            self.tiles[index].occupant = None;
        }
        Ok(())
    }

    fn indices(&self, tiles: &[TilePos]) -> Result<Vec<usize>, OutOfBounds> {
        tiles
            .iter()
            .map(|pos| self.index(*pos).ok_or(OutOfBounds(*pos)))
            .collect()
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if self.is_in_bounds(pos) {
            Some(pos.z as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    fn set_terrain(&mut self, x: u32, z: u32, terrain: TerrainKind) {
        let index = z as usize * self.width as usize + x as usize;
        self.tiles[index].terrain = terrain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSpec;

    fn catalog() -> Catalog {
        let spec: CatalogSpec = serde_yaml::from_str(
            r#"
starter: hut
fast_traversal: road
reserve_terrain: meadow
resources: [{ key: gold }]
stats: [{ key: income }, { key: upkeep }]
terrain:
  - { key: meadow, name: Meadow, buildable: true, movement_cost: 1.0 }
  - { key: marsh, name: Marsh, buildable: false, movement_cost: 4.0 }
  - { key: road, name: Road, buildable: false, movement_cost: 0.5 }
buildings:
  - { key: hut, name: Hut, footprint: { width: 1, length: 1 } }
"#,
        )
        .unwrap();
        Catalog::from_spec(spec).unwrap()
    }

    fn spec(catalog: &Catalog, seed: u64) -> GridSpec {
        GridSpec {
            width: 12,
            height: 8,
            weights: vec![
                (catalog.terrain_kind("meadow").unwrap(), 0.3),
                (catalog.terrain_kind("marsh").unwrap(), 0.7),
            ],
            infrastructure_lines: 2,
            fast_traversal: catalog.fast_traversal(),
            seed,
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let catalog = catalog();
        let a = WorldGrid::generate(&spec(&catalog, 99)).unwrap();
        let b = WorldGrid::generate(&spec(&catalog, 99)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tiles().len(), 96);
    }

    #[test]
    fn infrastructure_lines_span_the_grid() {
        let catalog = catalog();
        let road = catalog.fast_traversal();
        let grid = WorldGrid::generate(&spec(&catalog, 5)).unwrap();
        let full_row = (0..grid.height()).any(|z| {
            (0..grid.width()).all(|x| grid.tile_at(TilePos::new(x as i32, z as i32)).unwrap().terrain == road)
        });
        let full_column = (0..grid.width()).any(|x| {
            (0..grid.height()).all(|z| grid.tile_at(TilePos::new(x as i32, z as i32)).unwrap().terrain == road)
        });
        assert!(full_row || full_column);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let catalog = catalog();
        let mut spec = spec(&catalog, 1);
        spec.width = 0;
        assert_eq!(
            WorldGrid::generate(&spec).unwrap_err(),
            GridError::InvalidDimensions { width: 0, height: 8 }
        );
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let catalog = catalog();
        let mut spec = spec(&catalog, 1);
        for (_, weight) in &mut spec.weights {
            *weight = 0.0;
        }
        assert!(matches!(
            WorldGrid::generate(&spec),
            Err(GridError::InvalidWeights(_))
        ));
    }

    #[test]
    fn reserve_center_clips_at_edges() {
        let catalog = catalog();
        let meadow = catalog.reserve_terrain();
        let mut grid = WorldGrid::generate(&spec(&catalog, 3)).unwrap();
        grid.reserve_center(0, 0, 2, meadow);
        for x in 0..=2 {
            for z in 0..=2 {
                assert!(grid.is_buildable(TilePos::new(x, z), &catalog));
            }
        }
    }

    #[test]
    fn occupy_is_all_or_nothing() {
        let catalog = catalog();
        let mut grid = WorldGrid::generate(&spec(&catalog, 3)).unwrap();
        let before = grid.clone();
        let tiles = [TilePos::new(0, 0), TilePos::new(12, 0)];
        assert_eq!(
            grid.occupy(&tiles, StructureId::new(1)),
            Err(OutOfBounds(TilePos::new(12, 0)))
        );
        assert_eq!(grid, before);

        let tiles = [TilePos::new(0, 0), TilePos::new(1, 0)];
        grid.occupy(&tiles, StructureId::new(1)).unwrap();
        assert!(!grid.is_free(TilePos::new(1, 0)));
        grid.vacate(&tiles).unwrap();
        assert!(grid.is_free(TilePos::new(1, 0)));
        assert!(!grid.is_free(TilePos::new(-1, 0)));
    }
}
