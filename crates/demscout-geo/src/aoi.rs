//! Area of interest geometry.
//!
//! The AOI is loaded once per run: every feature of the input file is
//! dissolved into one multipolygon, which is then reprojected into the target
//! CRS. The result is immutable and shared read-only by the discovery
//! workers.

use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Polygon, Rect};
use std::path::Path;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::{Crs, TileBox};

use crate::formats::{FormatRegistry, VectorLayer};
use crate::transform::reproject;

/// Dissolved AOI polygon in a fixed CRS
#[derive(Debug, Clone, PartialEq)]
pub struct AoiGeometry {
    polygon: MultiPolygon<f64>,
    crs: Crs,
    envelope: Rect<f64>,
}

impl AoiGeometry {
    /// Load an AOI file with the built-in readers and reproject it to `target`
    pub async fn load(path: &Path, target: &Crs) -> Result<Self> {
        Self::load_with(&FormatRegistry::with_default_readers(), path, target).await
    }

    pub async fn load_with(registry: &FormatRegistry, path: &Path, target: &Crs) -> Result<Self> {
        if !path.exists() {
            return Err(ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let layer = registry.read(path).await.map_err(|e| match e {
            ScrapeError::Io(io) => ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason: io.to_string(),
            },
            other => other,
        })?;

        let aoi = Self::from_layer(layer, path, target)?;
        tracing::info!(
            path = %path.display(),
            crs = %aoi.crs,
            polygons = aoi.polygon.0.len(),
            "Loaded area of interest"
        );
        Ok(aoi)
    }

    /// Dissolve a layer read from `path` and bring it into `target`
    pub fn from_layer(layer: VectorLayer, path: &Path, target: &Crs) -> Result<Self> {
        let geometries: Vec<geo::Geometry<f64>> =
            layer.features.into_iter().filter_map(|f| f.geometry).collect();

        let dissolved = dissolve(geometries).map_err(|e| match e {
            ScrapeError::GeometryLoad { reason, .. } => ScrapeError::GeometryLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        let projected = reproject(&dissolved, &layer.crs, target)?;
        Self::from_polygons(projected, target.clone()).ok_or_else(|| ScrapeError::GeometryLoad {
            path: path.to_path_buf(),
            reason: "AOI has no extent".to_string(),
        })
    }

    /// Wrap an already dissolved polygon. Returns `None` for an empty polygon.
    pub fn from_polygons(polygon: MultiPolygon<f64>, crs: Crs) -> Option<Self> {
        let envelope = polygon.bounding_rect()?;
        Some(Self { polygon, crs, envelope })
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    pub fn envelope(&self) -> Rect<f64> {
        self.envelope
    }

    /// Whether the tile rectangle shares at least one point with the AOI.
    ///
    /// The envelope test only short-circuits obvious misses; a hit is always
    /// confirmed against the exact polygon.
    pub fn intersects(&self, tile: &TileBox) -> Result<bool> {
        if !self.crs.matches(&tile.crs) {
            return Err(ScrapeError::CrsMismatch {
                expected: self.crs.to_string(),
                found: tile.crs.to_string(),
            });
        }

        let candidate = tile.to_polygon();
        if !self.envelope.intersects(&candidate) {
            return Ok(false);
        }

        Ok(self.polygon.intersects(&candidate))
    }
}

/// Merge polygonal geometries into a single multipolygon.
///
/// Fails when there is nothing to merge or when a non-polygonal geometry is
/// present. The path in the returned error is empty; callers fill it in.
pub fn dissolve(geometries: Vec<geo::Geometry<f64>>) -> Result<MultiPolygon<f64>> {
    let mut parts: Vec<Polygon<f64>> = Vec::new();

    for geometry in geometries {
        match geometry {
            geo::Geometry::Polygon(p) => parts.push(p),
            geo::Geometry::MultiPolygon(mp) => parts.extend(mp.0),
            geo::Geometry::Rect(r) => parts.push(r.to_polygon()),
            geo::Geometry::Triangle(t) => parts.push(t.to_polygon()),
            geo::Geometry::GeometryCollection(gc) => {
                parts.extend(dissolve(gc.0)?.0);
            }
            other => {
                return Err(ScrapeError::GeometryLoad {
                    path: Default::default(),
                    reason: format!("non-polygonal feature in AOI: {}", geometry_kind(&other)),
                });
            }
        }
    }

    let mut parts = parts.into_iter();
    let first = parts.next().ok_or_else(|| ScrapeError::GeometryLoad {
        path: Default::default(),
        reason: "AOI contains no polygon features".to_string(),
    })?;

    let dissolved = parts.fold(MultiPolygon::new(vec![first]), |acc, part| acc.union(&part));

    if dissolved.0.is_empty() {
        return Err(ScrapeError::GeometryLoad {
            path: Default::default(),
            reason: "AOI polygons dissolve to an empty area".to_string(),
        });
    }

    Ok(dissolved)
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon, Area};

    fn square(x0: f64, y0: f64, size: f64) -> geo::Geometry<f64> {
        geo::Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ])
    }

    #[test]
    fn test_dissolve_overlapping_squares() {
        let merged = dissolve(vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)]).unwrap();
        assert_eq!(merged.0.len(), 1);
        assert!((merged.unsigned_area() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_dissolve_keeps_disjoint_parts() {
        let merged = dissolve(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(merged.0.len(), 2);
    }

    #[test]
    fn test_dissolve_rejects_points_and_empty() {
        assert!(matches!(
            dissolve(vec![geo::Geometry::Point(point!(x: 1.0, y: 1.0))]),
            Err(ScrapeError::GeometryLoad { .. })
        ));
        assert!(matches!(dissolve(vec![]), Err(ScrapeError::GeometryLoad { .. })));
    }

    #[test]
    fn test_intersects_requires_matching_crs() {
        let polygon = dissolve(vec![square(-120.0, 35.0, 1.0)]).unwrap();
        let aoi = AoiGeometry::from_polygons(polygon, Crs::nad83()).unwrap();

        let tile = TileBox::new(-119.5, 35.5, -118.5, 36.5, Crs::wgs84());
        assert!(matches!(aoi.intersects(&tile), Err(ScrapeError::CrsMismatch { .. })));
    }

    #[test]
    fn test_shared_edge_counts_as_intersection() {
        let polygon = dissolve(vec![square(-120.0, 35.0, 1.0)]).unwrap();
        let aoi = AoiGeometry::from_polygons(polygon, Crs::nad83()).unwrap();

        let touching = TileBox::new(-119.0, 35.0, -118.0, 36.0, Crs::nad83());
        assert!(aoi.intersects(&touching).unwrap());

        let apart = TileBox::new(-118.5, 35.0, -118.0, 36.0, Crs::nad83());
        assert!(!aoi.intersects(&apart).unwrap());
    }

    #[test]
    fn test_envelope_hit_but_polygon_miss() {
        // L-shaped AOI; the tile sits in the notch, inside the envelope only
        let l_shape = geo::Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ]);
        let aoi = AoiGeometry::from_polygons(dissolve(vec![l_shape]).unwrap(), Crs::nad83()).unwrap();

        let in_notch = TileBox::new(2.0, 2.0, 3.0, 3.0, Crs::nad83());
        assert!(aoi.envelope().intersects(&in_notch.to_polygon()));
        assert!(!aoi.intersects(&in_notch).unwrap());

        let on_arm = TileBox::new(3.0, 0.5, 5.0, 2.0, Crs::nad83());
        assert!(aoi.intersects(&on_arm).unwrap());
    }
}
