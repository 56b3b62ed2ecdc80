//! Locality-preserving spatial keys for driver locations.
//!
//! Driver positions are indexed by geohash so the candidate search can prune
//! to the cells covering the pickup radius instead of scanning every driver.
//! Pruning is an optimization only: the exact haversine filter decides
//! membership.

use crate::geo::GeoPoint;

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used for stored driver location keys.
pub const STORED_PRECISION: usize = 9;

/// Smallest cell dimension (km) per geohash precision, measured at the
/// equator. Longitude cells shrink by cos(lat) away from it, so `cover`
/// derates these figures before comparing against the radius. A cover of
/// the center cell plus its eight neighbors contains every point within
/// `radius` when the cell's smallest side is at least `radius`.
const CELL_MIN_KM: [(usize, f64); 8] = [
    (1, 4_992.6),
    (2, 624.1),
    (3, 156.0),
    (4, 19.5),
    (5, 4.89),
    (6, 0.61),
    (7, 0.153),
    (8, 0.019),
];

pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut value = 0usize;
    let mut even_bit = true;

    while hash.len() < precision {
        let range = if even_bit {
            &mut lng_range
        } else {
            &mut lat_range
        };
        let coordinate = if even_bit { lng } else { lat };
        let mid = (range.0 + range.1) / 2.0;

        if coordinate >= mid {
            value = (value << 1) | 1;
            range.0 = mid;
        } else {
            value <<= 1;
            range.1 = mid;
        }

        even_bit = !even_bit;
        bits += 1;
        if bits == 5 {
            hash.push(BASE32[value] as char);
            bits = 0;
            value = 0;
        }
    }

    hash
}

/// Bounding box of a cell as ((lat_min, lat_max), (lng_min, lng_max)).
/// Returns `None` for characters outside the geohash alphabet.
fn decode_bounds(hash: &str) -> Option<((f64, f64), (f64, f64))> {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for byte in hash.bytes() {
        let index = BASE32
            .iter()
            .position(|&b| b == byte.to_ascii_lowercase())?;
        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            let range = if even_bit {
                &mut lng_range
            } else {
                &mut lat_range
            };
            let mid = (range.0 + range.1) / 2.0;
            if bit == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even_bit = !even_bit;
        }
    }

    Some((lat_range, lng_range))
}

/// The up-to-eight neighboring cells at the same precision. Cells clipped at
/// the poles are skipped; longitude wraps.
pub fn neighbors(hash: &str) -> Vec<String> {
    let Some((lat_range, lng_range)) = decode_bounds(hash) else {
        return Vec::new();
    };

    let center_lat = (lat_range.0 + lat_range.1) / 2.0;
    let center_lng = (lng_range.0 + lng_range.1) / 2.0;
    let cell_height = lat_range.1 - lat_range.0;
    let cell_width = lng_range.1 - lng_range.0;

    let mut cells = Vec::with_capacity(8);
    for lat_step in [-1.0, 0.0, 1.0] {
        for lng_step in [-1.0, 0.0, 1.0] {
            if lat_step == 0.0 && lng_step == 0.0 {
                continue;
            }

            let lat = center_lat + lat_step * cell_height;
            if !(-90.0..=90.0).contains(&lat) {
                continue;
            }

            let mut lng = center_lng + lng_step * cell_width;
            if lng > 180.0 {
                lng -= 360.0;
            } else if lng < -180.0 {
                lng += 360.0;
            }

            let neighbor = encode(lat, lng, hash.len());
            if neighbor != hash && !cells.contains(&neighbor) {
                cells.push(neighbor);
            }
        }
    }

    cells
}

/// Cell prefixes covering a disc of `radius_km` around `center`. An empty
/// result means no precision is coarse enough (radius spans more than a
/// top-level cell) and the caller must fall back to a full scan.
pub fn cover(center: &GeoPoint, radius_km: f64) -> Vec<String> {
    // Smallest actual side of a cell at this latitude is at least the
    // equator figure times cos(lat); near the poles the factor approaches
    // zero and every precision is rejected, falling back to a full scan.
    let lat_scale = center.lat.to_radians().cos().abs();

    let mut precision = 0;
    for &(p, min_km) in CELL_MIN_KM.iter() {
        if min_km * lat_scale >= radius_km {
            precision = p;
        } else {
            break;
        }
    }

    if precision == 0 {
        return Vec::new();
    }

    let center_cell = encode(center.lat, center.lng, precision);
    let mut cells = neighbors(&center_cell);
    cells.push(center_cell);
    cells
}
