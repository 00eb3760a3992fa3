//! Inverse transverse Mercator for ETRS89 / UTM zone 33N (EPSG:25833).
//!
//! The district shapefile ships in projected meters; the choropleth wants
//! geographic lon/lat. This is the standard Snyder series on the GRS80
//! ellipsoid, accurate to well under a meter inside the zone.

/// GRS80 semi-major axis (meters).
const A: f64 = 6_378_137.0;
/// GRS80 flattening.
const F: f64 = 1.0 / 298.257_222_101;
/// UTM scale factor at the central meridian.
const K0: f64 = 0.9996;
/// UTM false easting (meters).
const FALSE_EASTING: f64 = 500_000.0;
/// Central meridian of zone 33 (degrees).
const LON_ORIGIN_DEG: f64 = 15.0;

/// Convert a zone-33N easting/northing pair to (lon, lat) in degrees.
pub fn utm33_to_lonlat(easting: f64, northing: f64) -> (f64, f64) {
    let e2 = F * (2.0 - F);
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let m = northing / K0;
    let mu = m
        / (A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));

    // Footpoint latitude.
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = (easting - FALSE_EASTING) / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * ep2
                    - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lon = (d
        - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
            * d.powi(5)
            / 120.0)
        / cos_phi1;

    (
        LON_ORIGIN_DEG + lon.to_degrees(),
        lat.to_degrees(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn berlin_center_lands_in_berlin() {
        // Alexanderplatz is roughly (391 000 E, 5 820 000 N) in zone 33N.
        let (lon, lat) = utm33_to_lonlat(391_000.0, 5_820_000.0);
        assert!((13.0..14.0).contains(&lon), "lon out of range: {lon}");
        assert!((52.3..52.8).contains(&lat), "lat out of range: {lat}");
    }

    #[test]
    fn central_meridian_maps_to_fifteen_degrees() {
        let (lon, _lat) = utm33_to_lonlat(FALSE_EASTING, 5_800_000.0);
        assert!((lon - 15.0).abs() < 1e-6, "lon was {lon}");
    }

    #[test]
    fn east_of_meridian_increases_longitude() {
        let (west, _) = utm33_to_lonlat(400_000.0, 5_820_000.0);
        let (east, _) = utm33_to_lonlat(600_000.0, 5_820_000.0);
        assert!(east > 15.0 && west < 15.0);
    }
}
