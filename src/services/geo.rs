//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in statute miles
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Calculate Haversine distance between two points in miles
pub fn haversine_miles(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

fn point(lng_lat: &[f64; 2]) -> Coordinates {
    Coordinates { lat: lng_lat[1], lng: lng_lat[0] }
}

/// Great-circle length of a `[lng, lat]` polyline in miles
pub fn polyline_miles(line: &[[f64; 2]]) -> f64 {
    line.windows(2)
        .map(|pair| haversine_miles(&point(&pair[0]), &point(&pair[1])))
        .sum()
}

/// Position at `fraction` (0..=1) of the polyline's length.
///
/// Interpolates linearly inside the containing vertex pair. Returns `None`
/// for an empty line.
pub fn point_along(line: &[[f64; 2]], fraction: f64) -> Option<Coordinates> {
    let first = line.first()?;
    let total = polyline_miles(line);
    if total <= 0.0 || line.len() == 1 {
        return Some(point(first));
    }

    let target = total * fraction.clamp(0.0, 1.0);
    let mut walked = 0.0;

    for pair in line.windows(2) {
        let (a, b) = (point(&pair[0]), point(&pair[1]));
        let step = haversine_miles(&a, &b);
        if step > 0.0 && walked + step >= target {
            let t = (target - walked) / step;
            return Some(Coordinates {
                lat: a.lat + (b.lat - a.lat) * t,
                lng: a.lng + (b.lng - a.lng) * t,
            });
        }
        walked += step;
    }

    line.last().map(point)
}
