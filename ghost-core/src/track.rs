//! Track geometry and sector lookup
//!
//! A circuit is described by its sector end distances. The last boundary is
//! the lap length. Sector `i` covers `[boundary[i-1], boundary[i])`, with
//! the lap length itself belonging to the final sector.

use crate::config::TrackConfig;
use crate::error::{CoachError, Result};
use crate::model::Position;
use crate::units::{lerp, Meters};
use serde::Serialize;
use std::sync::Arc;

/// Static description of a circuit, loaded once and shared read-only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackGeometry {
    name: String,
    boundaries_m: Vec<f64>,
}

impl TrackGeometry {
    pub fn new(name: impl Into<String>, boundaries_m: Vec<f64>) -> Result<Self> {
        if boundaries_m.is_empty() {
            return Err(CoachError::InvalidGeometry(
                "at least one sector boundary is required".to_string(),
            ));
        }
        if boundaries_m.iter().any(|b| !b.is_finite()) {
            return Err(CoachError::InvalidGeometry(
                "sector boundaries must be finite".to_string(),
            ));
        }
        if boundaries_m[0] <= 0.0 {
            return Err(CoachError::InvalidGeometry(format!(
                "first sector boundary must be positive, got {}",
                boundaries_m[0]
            )));
        }
        if let Some(w) = boundaries_m.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CoachError::InvalidGeometry(format!(
                "sector boundaries must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }

        Ok(Self {
            name: name.into(),
            boundaries_m,
        })
    }

    /// Split a lap of `total` meters into `sectors` equal sectors
    pub fn even(name: impl Into<String>, total: Meters, sectors: usize) -> Result<Self> {
        if sectors == 0 {
            return Err(CoachError::InvalidGeometry(
                "sector count must be positive".to_string(),
            ));
        }
        let boundaries = (1..=sectors)
            .map(|i| total.0 * i as f64 / sectors as f64)
            .collect();
        Self::new(name, boundaries)
    }

    pub fn from_config(config: &TrackConfig) -> Result<Self> {
        Self::new(config.name.clone(), config.boundaries_m.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_distance(&self) -> Meters {
        // non-empty by construction
        Meters(self.boundaries_m[self.boundaries_m.len() - 1])
    }

    pub fn sector_count(&self) -> usize {
        self.boundaries_m.len()
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries_m
    }

    /// End distance of sector `index`
    pub fn sector_end(&self, index: usize) -> Option<Meters> {
        self.boundaries_m.get(index).copied().map(Meters)
    }

    /// Start distance of sector `index`
    pub fn sector_start(&self, index: usize) -> Option<Meters> {
        match index {
            0 => Some(Meters(0.0)),
            i if i < self.boundaries_m.len() => Some(Meters(self.boundaries_m[i - 1])),
            _ => None,
        }
    }

    /// Sector containing `distance`, binary search over the boundaries
    pub fn sector_of(&self, distance: Meters) -> Result<usize> {
        let total = self.total_distance().0;
        if !(0.0..=total).contains(&distance.0) {
            return Err(CoachError::OutOfRange {
                distance: distance.0,
                min: 0.0,
                max: total,
            });
        }
        Ok(self.bucket(distance.0))
    }

    /// Like [`sector_of`](Self::sector_of) but clamps to the first/last sector
    pub fn sector_of_clamped(&self, distance: Meters) -> usize {
        self.bucket(distance.0.clamp(0.0, self.total_distance().0))
    }

    fn bucket(&self, d: f64) -> usize {
        self.boundaries_m
            .partition_point(|&b| b <= d)
            .min(self.boundaries_m.len() - 1)
    }
}

/// Ordered polyline of track coordinates with their lap distance
#[derive(Debug, Clone)]
pub struct Centerline {
    vertices: Vec<(Position, f64)>,
}

impl Centerline {
    pub fn new(vertices: Vec<(Position, Meters)>) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(CoachError::InvalidGeometry(
                "centerline needs at least two vertices".to_string(),
            ));
        }
        Ok(Self {
            vertices: vertices.into_iter().map(|(p, d)| (p, d.0)).collect(),
        })
    }

    /// Project a coordinate onto the nearest segment and return its lap distance
    pub fn project(&self, position: &Position) -> Meters {
        let mut best = (f64::INFINITY, self.vertices[0].1);

        for pair in self.vertices.windows(2) {
            let (a, da) = pair[0];
            let (b, db) = pair[1];
            let (ex, ey) = (b.x - a.x, b.y - a.y);
            let len_sq = ex * ex + ey * ey;
            let t = if len_sq > 0.0 {
                (((position.x - a.x) * ex + (position.y - a.y) * ey) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let foot = Position::new(a.x + ex * t, a.y + ey * t);
            let gap = foot.distance_to(position);
            if gap < best.0 {
                best = (gap, lerp(da, db, t));
            }
        }

        Meters(best.1)
    }
}

/// A raw track position as reported by a telemetry source
#[derive(Debug, Clone, Copy)]
pub enum TrackPosition {
    Distance(Meters),
    Coordinate(Position),
}

/// Result of a sector lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub distance: Meters,
    pub sector: usize,
}

/// Maps raw positions to sectors
#[derive(Debug, Clone)]
pub struct SectorLocator {
    geometry: Arc<TrackGeometry>,
    centerline: Option<Centerline>,
}

impl SectorLocator {
    pub fn new(geometry: Arc<TrackGeometry>) -> Self {
        Self {
            geometry,
            centerline: None,
        }
    }

    pub fn with_centerline(mut self, centerline: Centerline) -> Self {
        self.centerline = Some(centerline);
        self
    }

    pub fn geometry(&self) -> &TrackGeometry {
        &self.geometry
    }

    /// Sector for a live distance, clamped to the first/last sector
    pub fn sector_clamped(&self, distance: Meters) -> usize {
        self.geometry.sector_of_clamped(distance)
    }

    pub fn locate(&self, position: TrackPosition) -> Result<Location> {
        let distance = match position {
            TrackPosition::Distance(d) => d,
            TrackPosition::Coordinate(p) => self
                .centerline
                .as_ref()
                .ok_or_else(|| {
                    CoachError::InvalidGeometry(
                        "coordinate lookup requires a centerline".to_string(),
                    )
                })?
                .project(&p),
        };
        let sector = self.geometry.sector_of(distance)?;
        Ok(Location { distance, sector })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_sectors() -> TrackGeometry {
        TrackGeometry::new("Test", vec![1216.0, 1608.0, 1943.0, 3699.0]).unwrap()
    }

    #[test]
    fn test_rejects_non_increasing_boundaries() {
        let err = TrackGeometry::new("Bad", vec![100.0, 100.0, 300.0]).unwrap_err();
        assert!(matches!(err, CoachError::InvalidGeometry(_)));
        assert!(TrackGeometry::new("Bad", vec![]).is_err());
        assert!(TrackGeometry::new("Bad", vec![0.0, 10.0]).is_err());
    }

    #[test]
    fn test_sector_of_boundaries() {
        let track = four_sectors();
        assert_eq!(track.sector_of(Meters(0.0)).unwrap(), 0);
        assert_eq!(track.sector_of(Meters(1215.9)).unwrap(), 0);
        assert_eq!(track.sector_of(Meters(1216.0)).unwrap(), 1);
        assert_eq!(track.sector_of(Meters(1943.0)).unwrap(), 3);
        assert_eq!(track.sector_of(Meters(3699.0)).unwrap(), 3);
    }

    #[test]
    fn test_sector_of_out_of_range() {
        let track = four_sectors();
        assert!(matches!(
            track.sector_of(Meters(-0.1)),
            Err(CoachError::OutOfRange { .. })
        ));
        assert!(matches!(
            track.sector_of(Meters(3700.0)),
            Err(CoachError::OutOfRange { .. })
        ));
        assert_eq!(track.sector_of_clamped(Meters(3700.0)), 3);
        assert_eq!(track.sector_of_clamped(Meters(-5.0)), 0);
    }

    #[test]
    fn test_even_split() {
        let track = TrackGeometry::even("Even", Meters(4000.0), 4).unwrap();
        assert_eq!(track.boundaries(), &[1000.0, 2000.0, 3000.0, 4000.0]);
        assert_eq!(track.sector_start(2), Some(Meters(2000.0)));
        assert_eq!(track.sector_end(2), Some(Meters(3000.0)));
        assert_eq!(track.sector_start(4), None);
    }

    #[test]
    fn test_centerline_projection() {
        let line = Centerline::new(vec![
            (Position::new(0.0, 0.0), Meters(0.0)),
            (Position::new(100.0, 0.0), Meters(100.0)),
            (Position::new(100.0, 100.0), Meters(200.0)),
        ])
        .unwrap();

        let d = line.project(&Position::new(40.0, 3.0));
        assert!((d.0 - 40.0).abs() < 1e-9);

        let d = line.project(&Position::new(104.0, 50.0));
        assert!((d.0 - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_centerline_clamps_past_the_ends() {
        let line = Centerline::new(vec![
            (Position::new(0.0, 0.0), Meters(0.0)),
            (Position::new(100.0, 0.0), Meters(100.0)),
            (Position::new(100.0, 100.0), Meters(200.0)),
        ])
        .unwrap();

        assert_eq!(line.project(&Position::new(104.0, 150.0)), Meters(200.0));
        assert_eq!(line.project(&Position::new(-20.0, -5.0)), Meters(0.0));
    }

    #[test]
    fn test_locator_by_distance_and_coordinate() {
        let geometry = Arc::new(TrackGeometry::even("Square", Meters(200.0), 2).unwrap());
        let line = Centerline::new(vec![
            (Position::new(0.0, 0.0), Meters(0.0)),
            (Position::new(100.0, 0.0), Meters(100.0)),
            (Position::new(100.0, 100.0), Meters(200.0)),
        ])
        .unwrap();

        let bare = SectorLocator::new(geometry.clone());
        assert_eq!(
            bare.locate(TrackPosition::Distance(Meters(150.0))).unwrap().sector,
            1
        );
        assert!(bare
            .locate(TrackPosition::Coordinate(Position::new(1.0, 1.0)))
            .is_err());

        let locator = SectorLocator::new(geometry).with_centerline(line);
        let loc = locator
            .locate(TrackPosition::Coordinate(Position::new(50.0, -2.0)))
            .unwrap();
        assert_eq!(loc.sector, 0);
        assert!((loc.distance.0 - 50.0).abs() < 1e-9);
    }
}
