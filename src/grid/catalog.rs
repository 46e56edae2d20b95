//! Grid catalogs: an index of named grids with coverage region, priority and
//! applicability date, used to pick the right grid for a query point/time
//! without loading grids that do not apply.
//!
//! Catalog files are UTF-8 text: one title line, then CSV rows
//! `gridname,ll_long,ll_lat,ur_long,ur_lat,priority,date` with `#`-led and
//! blank lines ignored. Coordinates are decimal degrees; `date` is either a
//! fractional year or an ISO `yyyy-mm-dd` string.

use std::io::Read;

use log::warn;

use crate::error::GridError;

/// A lon/lat bounding box, radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Region {
    pub ll_lon: f64,
    pub ll_lat: f64,
    pub ur_lon: f64,
    pub ur_lat: f64,
}

impl Region {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.ll_lon && lon <= self.ur_lon && lat >= self.ll_lat && lat <= self.ur_lat
    }
}

/// One catalog row. Read-only after the catalog file is parsed; the grid it
/// names is loaded lazily on first use.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    /// Grid list definition to load lazily
    pub definition: String,
    pub region: Region,
    /// Higher wins
    pub priority: i32,
    /// Fractional year; 0.0 when the row carries no date
    pub date: f64,
}

/// Which side of the query date an entry must lie on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateSide {
    /// Entry date must not be after the query date
    NotAfter,
    /// Entry date must not be before the query date
    NotBefore,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    pub name: String,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse a catalog from a reader.
    ///
    /// The title line is discarded. Rows with unparsable numeric fields are
    /// skipped with a warning; rows with fewer than five fields fail the
    /// whole file.
    pub fn parse<R: Read>(name: &str, reader: R) -> Result<Self, GridError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true) // discards the title line
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| GridError::BadCatalog(format!("{name}: {e}")))?;
            if record.is_empty() || (record.len() == 1 && record[0].is_empty()) {
                continue;
            }
            if record.len() < 5 {
                return Err(GridError::BadCatalog(format!(
                    "{name}: short line in grid catalog"
                )));
            }

            let coord = |i: usize| record[i].parse::<f64>().map(f64::to_radians);
            let region = match (coord(1), coord(2), coord(3), coord(4)) {
                (Ok(ll_lon), Ok(ll_lat), Ok(ur_lon), Ok(ur_lat)) => Region {
                    ll_lon,
                    ll_lat,
                    ur_lon,
                    ur_lat,
                },
                _ => {
                    warn!("{name}: skipping catalog row with malformed region: {record:?}");
                    continue;
                }
            };

            let priority = match record.get(5) {
                Some(s) if !s.is_empty() => match s.parse::<i32>() {
                    Ok(p) => p,
                    Err(_) => {
                        warn!("{name}: skipping catalog row with malformed priority: {record:?}");
                        continue;
                    }
                },
                _ => 0,
            };

            let date = record.get(6).map(parse_date).unwrap_or(0.0);

            entries.push(CatalogEntry {
                definition: record[0].to_string(),
                region,
                priority,
                date,
            });
        }

        Ok(Self {
            name: name.to_string(),
            entries,
        })
    }

    /// Pick the best entry for a query point and date.
    ///
    /// The winner covers the point, lies on the requested side of the query
    /// date, and has the highest priority among such entries; priority ties
    /// break to the date nearest the query.
    pub fn select(&self, lon: f64, lat: f64, date: f64, side: DateSide) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.region.contains(lon, lat))
            .filter(|e| match side {
                DateSide::NotAfter => e.date <= date,
                DateSide::NotBefore => e.date >= date,
            })
            .min_by(|a, b| {
                // Highest priority first, then nearest date
                b.priority.cmp(&a.priority).then(
                    (a.date - date)
                        .abs()
                        .partial_cmp(&(b.date - date).abs())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
            })
    }
}

/// Parse a date into a fractional year.
///
/// Accepts `yyyy.fraction` or `yyyy-mm-dd`; anything else yields 0.0. The
/// ISO form uses a 31-day-month approximation, which is coarse but adequate
/// for ordering grids, not for time arithmetic.
pub fn parse_date(s: &str) -> f64 {
    let bytes = s.as_bytes();
    if s.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        let year: f64 = s[0..4].parse().unwrap_or(0.0);
        let month: f64 = s[5..7].parse().unwrap_or(1.0);
        let day: f64 = s[8..10].parse().unwrap_or(1.0);
        year + ((month - 1.0) * 31.0 + (day - 1.0)) / 372.0
    } else {
        s.parse().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "\
Test grid catalog
# a comment line
conus_early,-130,20,-60,55,1,1985.0
conus_late,-130,20,-60,55,1,2002-07-01
alaska,-170,50,-130,72,5,1990.0

";

    #[test]
    fn test_parse_sample() {
        let cat = Catalog::parse("test.csv", SAMPLE.as_bytes()).unwrap();
        assert_eq!(cat.entries.len(), 3);
        assert_eq!(cat.entries[0].definition, "conus_early");
        assert_eq!(cat.entries[0].priority, 1);
        assert_relative_eq!(cat.entries[0].date, 1985.0);
        assert_relative_eq!(cat.entries[0].region.ll_lon, (-130.0_f64).to_radians());
        assert_eq!(cat.entries[2].priority, 5);
    }

    #[test]
    fn test_iso_date_conversion() {
        // 2002-07-01: 6 full 31-day months, 0 days → 186/372 = exactly half
        assert_relative_eq!(parse_date("2002-07-01"), 2002.5);
        assert_relative_eq!(parse_date("1985.25"), 1985.25);
        assert_relative_eq!(parse_date("1990-01-01"), 1990.0);
        assert_relative_eq!(parse_date("not-a-date"), 0.0);
    }

    #[test]
    fn test_short_line_is_an_error() {
        let text = "title\nconus,-130,20,-60\n";
        assert!(matches!(
            Catalog::parse("bad.csv", text.as_bytes()),
            Err(GridError::BadCatalog(_))
        ));
    }

    #[test]
    fn test_malformed_numeric_row_skipped() {
        let text = "title\nconus,-130,oops,-60,55,1,1985.0\nok,-130,20,-60,55,1,1985.0\n";
        let cat = Catalog::parse("warn.csv", text.as_bytes()).unwrap();
        assert_eq!(cat.entries.len(), 1);
        assert_eq!(cat.entries[0].definition, "ok");
    }

    #[test]
    fn test_optional_priority_and_date() {
        let text = "title\nconus,-130,20,-60,55\n";
        let cat = Catalog::parse("opt.csv", text.as_bytes()).unwrap();
        assert_eq!(cat.entries[0].priority, 0);
        assert_relative_eq!(cat.entries[0].date, 0.0);
    }

    #[test]
    fn test_selection_covering_and_priority() {
        let cat = Catalog::parse("test.csv", SAMPLE.as_bytes()).unwrap();
        let lon = (-100.0_f64).to_radians();
        let lat = 40.0_f64.to_radians();

        // Both conus entries cover; date side selects among them
        let e = cat.select(lon, lat, 2000.0, DateSide::NotAfter).unwrap();
        assert_eq!(e.definition, "conus_early");
        let e = cat.select(lon, lat, 2000.0, DateSide::NotBefore).unwrap();
        assert_eq!(e.definition, "conus_late");

        // Alaska point: the priority-5 entry wins
        let e = cat
            .select(
                (-150.0_f64).to_radians(),
                60.0_f64.to_radians(),
                2000.0,
                DateSide::NotAfter,
            )
            .unwrap();
        assert_eq!(e.definition, "alaska");

        // A point outside every region selects nothing
        assert!(cat
            .select(0.5, 0.5, 2000.0, DateSide::NotAfter)
            .is_none());
    }

    #[test]
    fn test_priority_tie_breaks_to_nearest_date() {
        let text = "\
title
a,-10,-10,10,10,3,1990.0
b,-10,-10,10,10,3,1999.0
c,-10,-10,10,10,1,2000.0
";
        let cat = Catalog::parse("tie.csv", text.as_bytes()).unwrap();
        let e = cat.select(0.0, 0.0, 2000.0, DateSide::NotAfter).unwrap();
        assert_eq!(e.definition, "b");
    }
}
