//! Geohash encode/decode, bounding boxes, haversine distance, and 8-way
//! neighbor lookup. Longitude and latitude bits are interleaved starting
//! with longitude (matching the bit-interleaving order of the upstream
//! algorithm this module was ported from).

const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
pub const MAX_PRECISION: usize = 12;
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Coord {
        Coord {
            lat: (self.lat_min + self.lat_max) / 2.0,
            lon: (self.lon_min + self.lon_max) / 2.0,
        }
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.lat >= self.lat_min && c.lat <= self.lat_max && c.lon >= self.lon_min && c.lon <= self.lon_max
    }
}

fn alphabet_index(c: u8) -> Option<u8> {
    ALPHABET.iter().position(|&x| x == c).map(|p| p as u8)
}

/// Encode `coord` to a base32 geohash of `precision` characters (clamped to
/// `MAX_PRECISION`).
pub fn encode(coord: Coord, precision: usize) -> String {
    let precision = precision.min(MAX_PRECISION).max(1);
    let bits = precision * 5;

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);

    let mut out = String::with_capacity(precision);
    let mut ch: u8 = 0;
    let mut bit_in_char = 0u8;

    for i in 0..bits {
        let even = i % 2 == 0;
        let bit = if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if coord.lon > mid {
                lon_range.0 = mid;
                1
            } else {
                lon_range.1 = mid;
                0
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if coord.lat > mid {
                lat_range.0 = mid;
                1
            } else {
                lat_range.1 = mid;
                0
            }
        };
        ch = (ch << 1) | bit;
        bit_in_char += 1;
        if bit_in_char == 5 {
            out.push(ALPHABET[ch as usize] as char);
            ch = 0;
            bit_in_char = 0;
        }
    }
    out
}

/// Recover the bounding box a geohash string denotes.
pub fn bounding_box(hash: &str) -> Option<BoundingBox> {
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);

    let mut bit_idx = 0usize;
    for &c in hash.as_bytes() {
        let idx = alphabet_index(c)?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            let even = bit_idx % 2 == 0;
            if even {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            bit_idx += 1;
        }
    }

    Some(BoundingBox {
        lat_min: lat_range.0,
        lat_max: lat_range.1,
        lon_min: lon_range.0,
        lon_max: lon_range.1,
    })
}

/// Decode a geohash to the center of its bounding box.
pub fn decode(hash: &str) -> Option<Coord> {
    bounding_box(hash).map(|b| b.center())
}

/// Great-circle distance between two coordinates, in meters.
pub fn haversine(a: Coord, b: Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_METERS * c
}

/// The eight geohash cells surrounding `hash` at the same precision,
/// computed by offsetting the cell center by the cell's own lat/lon extent.
pub fn neighbors(hash: &str) -> Option<[String; 8]> {
    let bbox = bounding_box(hash)?;
    let precision = hash.len();
    let center = bbox.center();
    let lat_delta = bbox.lat_max - bbox.lat_min;
    let lon_delta = bbox.lon_max - bbox.lon_min;

    let at = |dlat: f64, dlon: f64| {
        encode(
            Coord {
                lat: center.lat + dlat,
                lon: center.lon + dlon,
            },
            precision,
        )
    };

    Some([
        at(lat_delta, -lon_delta),  // NW
        at(lat_delta, 0.0),         // N
        at(lat_delta, lon_delta),   // NE
        at(0.0, -lon_delta),        // W
        at(0.0, lon_delta),         // E
        at(-lat_delta, -lon_delta), // SW
        at(-lat_delta, 0.0),        // S
        at(-lat_delta, lon_delta),  // SE
    ])
}
