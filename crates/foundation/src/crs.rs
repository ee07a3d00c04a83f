use crate::math::web_mercator_to_lon_lat;

/// Maps an (x, y) pair from one reference system into another.
pub type Transform = fn(f64, f64) -> (f64, f64);

/// Coordinate reference systems understood by the pipeline.
///
/// Every geometry-bearing table carries one of these. Spatial predicates are
/// only evaluated between tables whose `Crs` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Geographic lon/lat degrees on WGS84 (EPSG:4326, OGC CRS84).
    Wgs84,
    /// Spherical Web Mercator meters (EPSG:3857 and its aliases).
    WebMercator,
    /// Declared but not supported for reprojection.
    Other(String),
}

impl Crs {
    /// Parses the common spellings: `EPSG:4326`, `epsg:3857`,
    /// `urn:ogc:def:crs:EPSG::4326`, `urn:ogc:def:crs:OGC:1.3:CRS84`, bare codes.
    pub fn parse(raw: &str) -> Crs {
        let trimmed = raw.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper.ends_with("CRS84") || upper == "WGS84" {
            return Crs::Wgs84;
        }
        let code = upper
            .rsplit(':')
            .next()
            .unwrap_or(upper.as_str())
            .trim_start_matches("EPSG")
            .trim();
        match code {
            "4326" => Crs::Wgs84,
            "3857" | "900913" | "102100" | "102113" => Crs::WebMercator,
            _ => Crs::Other(trimmed.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Crs::Wgs84 => "EPSG:4326",
            Crs::WebMercator => "EPSG:3857",
            Crs::Other(raw) => raw,
        }
    }

    /// Returns a function mapping coordinates in `self` to WGS84 lon/lat,
    /// or `None` when no transform is known.
    pub fn to_wgs84(&self) -> Option<Transform> {
        match self {
            Crs::Wgs84 => Some(identity as Transform),
            Crs::WebMercator => Some(web_mercator_to_lon_lat as Transform),
            Crs::Other(_) => None,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn identity(x: f64, y: f64) -> (f64, f64) {
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::Crs;

    #[test]
    fn parses_epsg_spellings() {
        assert_eq!(Crs::parse("EPSG:4326"), Crs::Wgs84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:EPSG::4326"), Crs::Wgs84);
        assert_eq!(Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84"), Crs::Wgs84);
        assert_eq!(Crs::parse("epsg:3857"), Crs::WebMercator);
        assert_eq!(Crs::parse("EPSG:900913"), Crs::WebMercator);
        assert_eq!(Crs::parse("3857"), Crs::WebMercator);
        assert_eq!(
            Crs::parse("EPSG:32633"),
            Crs::Other("EPSG:32633".to_string())
        );
    }

    #[test]
    fn wgs84_transform_is_identity() {
        let f = Crs::Wgs84.to_wgs84().unwrap();
        assert_eq!(f(12.5, -7.25), (12.5, -7.25));
        assert!(Crs::parse("EPSG:2154").to_wgs84().is_none());
    }
}
