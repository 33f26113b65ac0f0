//! Coordinate reference system identity shared by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::nad83()
    }
}

impl Crs {
    pub fn new(epsg: u32, name: impl Into<String>) -> Self {
        Self { epsg, name: name.into() }
    }

    /// Build from a bare EPSG code, naming the well-known ones
    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4269 => Self::nad83(),
            4326 => Self::wgs84(),
            3857 => Self::new(3857, "Web Mercator"),
            other => Self::new(other, format!("EPSG:{}", other)),
        }
    }

    /// NAD83 geographic (EPSG:4269), the frame USGS publishes tile bounds in
    pub fn nad83() -> Self {
        Self::new(4269, "NAD83")
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// PROJ-compatible authority string
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// Two CRS are the same frame when their EPSG codes agree
    pub fn matches(&self, other: &Crs) -> bool {
        self.epsg == other.epsg
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{} ({})", self.epsg, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(Crs::from_epsg(4269), Crs::nad83());
        assert_eq!(Crs::from_epsg(4326).name, "WGS 84");
        assert_eq!(Crs::from_epsg(26910).name, "EPSG:26910");
    }

    #[test]
    fn test_matches_ignores_name() {
        let named = Crs::new(4269, "North American Datum 1983");
        assert!(named.matches(&Crs::nad83()));
        assert!(!named.matches(&Crs::wgs84()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Crs::nad83().to_string(), "EPSG:4269 (NAD83)");
        assert_eq!(Crs::nad83().authority(), "EPSG:4269");
    }
}
