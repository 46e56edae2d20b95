//! Binary grid decoding.
//!
//! Two wire formats are recognized by magic strings at fixed offsets:
//!
//! * the legacy big-endian format: a fixed 176-byte header (record count at
//!   offset 8, bounding corners at 24/40/56/72, cell sizes at 88/104, all in
//!   degrees) followed by one row of 8-byte (lat, lon) shift pairs per
//!   scanline, values in arc-seconds and column order reversed relative to
//!   the in-memory convention;
//! * the self-describing little-endian format: a 160-byte header carrying an
//!   ASCII id, lower-left corner, cell sizes (radians) and dimensions,
//!   followed by a flat row-major array of f32 (lon, lat) shift pairs that
//!   matches the in-memory layout directly.
//!
//! Every field is decoded from the byte slice with explicit endianness; the
//! buffer is never reinterpreted as a struct.

use log::debug;
use ndarray::Array2;

use crate::error::GridError;
use crate::grid::Grid;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / 180.0 / 3600.0;
const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Largest accepted cell count per axis.
const MAX_DIM: i32 = 20_000;

const LEGACY_HEADER_LEN: usize = 176;
const SELFDESC_HEADER_LEN: usize = 160;

fn read_f64_be(data: &[u8], off: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[off..off + 8]);
    f64::from_be_bytes(b)
}

fn read_i32_be(data: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[off..off + 4]);
    i32::from_be_bytes(b)
}

fn read_f64_le(data: &[u8], off: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[off..off + 8]);
    f64::from_le_bytes(b)
}

fn read_f32_le(data: &[u8], off: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[off..off + 4]);
    f32::from_le_bytes(b)
}

fn read_i32_le(data: &[u8], off: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[off..off + 4]);
    i32::from_le_bytes(b)
}

fn check_dims(name: &str, width: i32, height: i32) -> Result<(usize, usize), GridError> {
    if width <= 0 || height <= 0 || width > MAX_DIM || height > MAX_DIM {
        debug!("{name}: rejecting grid dimensions {width}x{height}");
        return Err(GridError::BadDimensions(width, height));
    }
    Ok((width as usize, height as usize))
}

/// Detect the format of `data` and decode it into a [`Grid`].
pub fn load(name: &str, data: &[u8]) -> Result<Grid, GridError> {
    if data.len() >= 160
        && &data[0..6] == b"HEADER"
        && &data[96..102] == b"W GRID"
        && &data[144..160] == b"TO      NAD83   "
    {
        return load_legacy(name, data);
    }

    if data.len() >= 9 && &data[0..9] == b"CTABLE V2" {
        return load_selfdescribing(name, data);
    }

    Err(GridError::UnknownFormat(name.to_string()))
}

fn load_legacy(name: &str, data: &[u8]) -> Result<Grid, GridError> {
    if data.len() < LEGACY_HEADER_LEN {
        return Err(GridError::Truncated(name.to_string()));
    }

    if read_i32_be(data, 8) != 12 {
        return Err(GridError::CorruptHeader(format!(
            "{name}: wrong record count"
        )));
    }

    // Corner coordinates are stored in degrees, longitudes positive west
    let ll_lat = read_f64_be(data, 24);
    let ur_lat = read_f64_be(data, 40);
    let ur_lon = -read_f64_be(data, 56);
    let ll_lon = -read_f64_be(data, 72);
    let d_lat = read_f64_be(data, 88);
    let d_lon = read_f64_be(data, 104);

    if d_lon <= 0.0 || d_lat <= 0.0 {
        return Err(GridError::CorruptHeader(format!(
            "{name}: non-positive cell size"
        )));
    }

    let width = ((ur_lon - ll_lon).abs() / d_lon + 0.5) as i32 + 1;
    let height = ((ur_lat - ll_lat).abs() / d_lat + 0.5) as i32 + 1;
    let (width, height) = check_dims(name, width, height)?;

    debug!("legacy grid {name} {width}x{height}: LL=({ll_lon},{ll_lat}) UR=({ur_lon},{ur_lat})");

    let row_bytes = width * 16;
    if data.len() < LEGACY_HEADER_LEN + height * row_bytes {
        return Err(GridError::Truncated(name.to_string()));
    }

    let mut table = Array2::from_elem((height, width), [0.0f32; 2]);
    for row in 0..height {
        let base = LEGACY_HEADER_LEN + row * row_bytes;
        for i in 0..width {
            // (lat_shift, lon_shift) pairs in arc-seconds, west-to-east in
            // file order; in-memory column order is reversed
            let lat_shift = read_f64_be(data, base + i * 16);
            let lon_shift = read_f64_be(data, base + i * 16 + 8);
            table[(row, width - 1 - i)] = [
                (lon_shift * ARCSEC_TO_RAD) as f32,
                (lat_shift * ARCSEC_TO_RAD) as f32,
            ];
        }
    }

    Ok(Grid::new(
        name.to_string(),
        ll_lon * DEG_TO_RAD,
        ll_lat * DEG_TO_RAD,
        d_lon * DEG_TO_RAD,
        d_lat * DEG_TO_RAD,
        table,
    ))
}

fn load_selfdescribing(name: &str, data: &[u8]) -> Result<Grid, GridError> {
    if data.len() < SELFDESC_HEADER_LEN {
        return Err(GridError::Truncated(name.to_string()));
    }

    let id = String::from_utf8_lossy(&data[16..96])
        .trim_end_matches(['\0', ' '])
        .to_string();

    // Already in radians
    let ll_lon = read_f64_le(data, 96);
    let ll_lat = read_f64_le(data, 104);
    let d_lon = read_f64_le(data, 112);
    let d_lat = read_f64_le(data, 120);

    if !(ll_lon.abs() <= 4.0 * std::f64::consts::PI
        && ll_lat.abs() <= std::f64::consts::PI + 1e-5
        && d_lon > 1e-10
        && d_lat > 1e-10)
    {
        return Err(GridError::CorruptHeader(format!(
            "{name}: inconsistent georeferencing"
        )));
    }

    let (width, height) = check_dims(name, read_i32_le(data, 128), read_i32_le(data, 132))?;

    debug!("self-describing grid {name} ({id}) {width}x{height}");

    if data.len() < SELFDESC_HEADER_LEN + width * height * 8 {
        return Err(GridError::Truncated(name.to_string()));
    }

    let mut table = Array2::from_elem((height, width), [0.0f32; 2]);
    for row in 0..height {
        for col in 0..width {
            let off = SELFDESC_HEADER_LEN + (row * width + col) * 8;
            table[(row, col)] = [read_f32_le(data, off), read_f32_le(data, off + 4)];
        }
    }

    Ok(Grid::new(id, ll_lon, ll_lat, d_lon, d_lat, table))
}

#[cfg(test)]
pub(crate) mod testdata {
    /// Serialize a legacy big-endian grid file.
    ///
    /// `shifts` is row-major west-to-east, `(lat_arcsec, lon_arcsec)` pairs.
    pub fn legacy_file(
        ll_lon: f64,
        ll_lat: f64,
        ur_lon: f64,
        ur_lat: f64,
        d_lon: f64,
        d_lat: f64,
        shifts: &[(f64, f64)],
    ) -> Vec<u8> {
        let mut data = vec![0u8; 176];
        data[0..6].copy_from_slice(b"HEADER");
        data[96..102].copy_from_slice(b"W GRID");
        data[144..160].copy_from_slice(b"TO      NAD83   ");
        data[8..12].copy_from_slice(&12i32.to_be_bytes());
        data[24..32].copy_from_slice(&ll_lat.to_be_bytes());
        data[40..48].copy_from_slice(&ur_lat.to_be_bytes());
        data[56..64].copy_from_slice(&(-ur_lon).to_be_bytes());
        data[72..80].copy_from_slice(&(-ll_lon).to_be_bytes());
        data[88..96].copy_from_slice(&d_lat.to_be_bytes());
        data[104..112].copy_from_slice(&d_lon.to_be_bytes());
        for &(lat_s, lon_s) in shifts {
            data.extend_from_slice(&lat_s.to_be_bytes());
            data.extend_from_slice(&lon_s.to_be_bytes());
        }
        data
    }

    /// Serialize a self-describing little-endian grid file.
    ///
    /// `shifts` is row-major, `(lon_rad, lat_rad)` pairs.
    pub fn selfdescribing_file(
        id: &str,
        ll_lon: f64,
        ll_lat: f64,
        d_lon: f64,
        d_lat: f64,
        width: i32,
        height: i32,
        shifts: &[(f32, f32)],
    ) -> Vec<u8> {
        let mut data = vec![0u8; 160];
        data[0..9].copy_from_slice(b"CTABLE V2");
        data[16..16 + id.len()].copy_from_slice(id.as_bytes());
        data[96..104].copy_from_slice(&ll_lon.to_le_bytes());
        data[104..112].copy_from_slice(&ll_lat.to_le_bytes());
        data[112..120].copy_from_slice(&d_lon.to_le_bytes());
        data[120..128].copy_from_slice(&d_lat.to_le_bytes());
        data[128..132].copy_from_slice(&width.to_le_bytes());
        data[132..136].copy_from_slice(&height.to_le_bytes());
        for &(lon_s, lat_s) in shifts {
            data.extend_from_slice(&lon_s.to_le_bytes());
            data.extend_from_slice(&lat_s.to_le_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_legacy_decode() {
        // 3x2 grid over 110..112°W, 40..41°N
        let mut shifts = Vec::new();
        for row in 0..2 {
            for col in 0..3 {
                shifts.push((0.1 * (row * 3 + col) as f64, 1.0));
            }
        }
        let data =
            testdata::legacy_file(-112.0, 40.0, -110.0, 41.0, 1.0, 1.0, &shifts);
        let g = load("ntv1_test", &data).unwrap();

        assert_eq!(g.width, 3);
        assert_eq!(g.height, 2);
        assert_relative_eq!(g.ll_lon, (-112.0_f64).to_radians(), epsilon = 1e-12);
        assert_relative_eq!(g.ll_lat, 40.0_f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(g.d_lon, 1.0_f64.to_radians(), epsilon = 1e-12);

        // Column order is reversed on load: file cell 0 of row 0 lands in
        // the last column
        let (lon_s, lat_s) = g.value_at(2, 0);
        assert_relative_eq!(lon_s, 1.0 * ARCSEC_TO_RAD, epsilon = 1e-12);
        assert_relative_eq!(lat_s, 0.0, epsilon = 1e-12);
        let (_, lat_s) = g.value_at(0, 1);
        assert_relative_eq!(lat_s, 0.5 * ARCSEC_TO_RAD, epsilon = 1e-10);
    }

    #[test]
    fn test_legacy_wrong_record_count() {
        let mut data = testdata::legacy_file(-112.0, 40.0, -110.0, 41.0, 1.0, 1.0, &[(0.0, 0.0); 6]);
        data[8..12].copy_from_slice(&11i32.to_be_bytes());
        assert!(matches!(
            load("bad", &data),
            Err(GridError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_legacy_truncated_body() {
        let data = testdata::legacy_file(-112.0, 40.0, -110.0, 41.0, 1.0, 1.0, &[(0.0, 0.0); 5]);
        assert!(matches!(load("short", &data), Err(GridError::Truncated(_))));
    }

    #[test]
    fn test_legacy_dimension_sanity_bound() {
        // 0.0001° cells over 20° of longitude → 200001 columns, over the bound
        let data = testdata::legacy_file(-130.0, 40.0, -110.0, 41.0, 0.0001, 1.0, &[]);
        assert!(matches!(
            load("huge", &data),
            Err(GridError::BadDimensions(_, _))
        ));
    }

    #[test]
    fn test_selfdescribing_decode() {
        let shifts: Vec<(f32, f32)> = (0..6).map(|i| (i as f32 * 1e-6, 2e-6)).collect();
        let data = testdata::selfdescribing_file("test area", -1.9, 0.7, 0.001, 0.001, 3, 2, &shifts);
        let g = load("ct2_test", &data).unwrap();

        assert_eq!(g.id, "test area");
        assert_eq!((g.width, g.height), (3, 2));
        assert_relative_eq!(g.ll_lon, -1.9);
        assert_relative_eq!(g.ll_lat, 0.7);

        // Stored flat, no column reversal
        let (lon_s, lat_s) = g.value_at(1, 0);
        assert_relative_eq!(lon_s, 1e-6, epsilon = 1e-12);
        assert_relative_eq!(lat_s, 2e-6, epsilon = 1e-12);
        let (lon_s, _) = g.value_at(2, 1);
        assert_relative_eq!(lon_s, 5e-6, epsilon = 1e-12);
    }

    #[test]
    fn test_selfdescribing_bad_georeferencing() {
        let data = testdata::selfdescribing_file("x", 99.0, 0.7, 0.001, 0.001, 3, 2, &[(0.0, 0.0); 6]);
        assert!(matches!(
            load("bad", &data),
            Err(GridError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_selfdescribing_truncated() {
        let data = testdata::selfdescribing_file("x", -1.9, 0.7, 0.001, 0.001, 3, 2, &[(0.0, 0.0); 5]);
        assert!(matches!(load("short", &data), Err(GridError::Truncated(_))));
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            load("garbage", b"not a grid file at all"),
            Err(GridError::UnknownFormat(_))
        ));
    }
}
