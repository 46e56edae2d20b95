//! Reference ellipsoid parameters and shape comparison.

/// Reference ellipsoid parameters.
#[derive(Clone, Copy, Debug)]
pub struct Ellipsoid {
    /// Semi-major axis (metres)
    pub a: f64,
    /// Flattening (dimensionless)
    pub f: f64,
    /// Semi-minor axis: a * (1 - f)
    pub b: f64,
    /// First eccentricity squared: 2f - f^2
    pub e2: f64,
    /// Second eccentricity squared: e^2 / (1 - e^2)
    pub ep2: f64,
    /// Third flattening: f / (2 - f)
    pub n: f64,
}

/// GRS80 and WGS84 differ in eccentricity only past this tolerance, and are
/// treated as the same shape for datum comparison purposes.
pub const ES_TOLERANCE: f64 = 5e-11;

impl Ellipsoid {
    pub const fn new(a: f64, f: f64) -> Self {
        let b = a * (1.0 - f);
        let e2 = 2.0 * f - f * f;
        let ep2 = e2 / (1.0 - e2);
        let n = f / (2.0 - f);
        Self { a, f, b, e2, ep2, n }
    }

    /// Build from semi-major and semi-minor axes.
    pub const fn from_axes(a: f64, b: f64) -> Self {
        Self::new(a, (a - b) / a)
    }

    /// First eccentricity (computed at runtime; sqrt is not const).
    pub fn eccentricity(&self) -> f64 {
        self.e2.sqrt()
    }

    /// Whether two ellipsoids have the same shape, within the tolerance that
    /// keeps GRS80 and WGS84 equivalent.
    pub fn shape_matches(&self, other: &Ellipsoid) -> bool {
        self.a == other.a && (self.e2 - other.e2).abs() <= ES_TOLERANCE
    }
}

pub const WGS84: Ellipsoid = Ellipsoid::new(6_378_137.0, 1.0 / 298.257_223_563);
pub const GRS80: Ellipsoid = Ellipsoid::new(6_378_137.0, 1.0 / 298.257_222_101);
pub const INTL: Ellipsoid = Ellipsoid::new(6_378_388.0, 1.0 / 297.0);
pub const CLARKE66: Ellipsoid = Ellipsoid::from_axes(6_378_206.4, 6_356_583.8);
