//! CRS transformation of AOI polygons and tile boxes

use geo::{Coord, MapCoords, MultiPolygon};
use proj::Proj;

use demscout_core::error::{Result, ScrapeError};
use demscout_core::models::{Crs, TileBox};

/// Points sampled along each edge of a tile box before reprojection
const EDGE_SAMPLES: usize = 16;

/// Reproject a multipolygon from one CRS to another.
///
/// When both frames share an EPSG code the input is returned unchanged and
/// PROJ is never consulted.
pub fn reproject(polygon: &MultiPolygon<f64>, from: &Crs, to: &Crs) -> Result<MultiPolygon<f64>> {
    if from.matches(to) {
        return Ok(polygon.clone());
    }

    let transformer = Transformer::new(from, to)?;
    tracing::debug!(from = %from, to = %to, polygons = polygon.0.len(), "Reprojecting AOI");

    polygon.try_map_coords(|coord: Coord<f64>| transformer.convert(coord))
}

/// Bring a tile box into `to`.
///
/// The result is the envelope of the box outline, densified along every
/// edge, so it covers the whole reprojected footprint.
pub fn reproject_box(tile: &TileBox, to: &Crs) -> Result<TileBox> {
    if tile.crs.matches(to) {
        return Ok(tile.clone());
    }

    let transformer = Transformer::new(&tile.crs, to)?;
    let corners = [
        (tile.west, tile.south),
        (tile.east, tile.south),
        (tile.east, tile.north),
        (tile.west, tile.north),
    ];

    let mut projected = Vec::with_capacity(corners.len() * EDGE_SAMPLES);
    for (i, &(x0, y0)) in corners.iter().enumerate() {
        let (x1, y1) = corners[(i + 1) % corners.len()];
        for step in 0..EDGE_SAMPLES {
            let t = step as f64 / EDGE_SAMPLES as f64;
            projected.push(transformer.convert(Coord {
                x: x0 + (x1 - x0) * t,
                y: y0 + (y1 - y0) * t,
            })?);
        }
    }

    let (mut west, mut south) = (f64::INFINITY, f64::INFINITY);
    let (mut east, mut north) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for c in &projected {
        west = west.min(c.x);
        south = south.min(c.y);
        east = east.max(c.x);
        north = north.max(c.y);
    }

    Ok(TileBox::new(west, south, east, north, to.clone()))
}

/// PROJ pipeline between two EPSG frames, in x/y (lon/lat) axis order
struct Transformer {
    proj: Proj,
    from: String,
    to: String,
}

impl Transformer {
    fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let (from, to) = (from.authority(), to.authority());
        let proj = Proj::new_known_crs(&from, &to, None).map_err(|e| ScrapeError::Projection {
            from: from.clone(),
            to: to.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { proj, from, to })
    }

    fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        self.proj
            .convert((coord.x, coord.y))
            .map(|(x, y)| Coord { x, y })
            .map_err(|e| ScrapeError::Projection {
                from: self.from.clone(),
                to: self.to.clone(),
                reason: format!("({}, {}): {}", coord.x, coord.y, e),
            })
    }
}
