use thiserror::Error;

/// Failures while locating, reading or decoding grid and catalog files.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("grid file not found: {0}")]
    NotFound(String),

    #[error("unrecognized grid format: {0}")]
    UnknownFormat(String),

    #[error("corrupt grid header: {0}")]
    CorruptHeader(String),

    #[error("grid file truncated: {0}")]
    Truncated(String),

    #[error("grid dimensions out of bounds: {0}x{1}")]
    BadDimensions(i32, i32),

    #[error("malformed grid catalog: {0}")]
    BadCatalog(String),
}

/// Transform-time and construction-time failures.
///
/// Variants split into construction/configuration errors (always fatal, no
/// partial operation is ever returned), resource errors, and per-point
/// numeric conditions. `is_transient` is the classification consulted by the
/// orchestrator after every sub-call.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("malformed pipeline: {0}")]
    MalformedPipeline(String),

    #[error("operation '{0}' has no inverse")]
    NoInverse(&'static str),

    #[error("mismatched units between pipeline steps {0} and {1}")]
    UnitMismatch(usize, usize),

    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    #[error("no usable grid for datum shift")]
    NoUsableGrid,

    #[error("point outside grid area")]
    OutsideGridArea,

    #[error("latitude or longitude exceeded limits")]
    LatLonOutOfRange,

    #[error("point outside projection domain")]
    OutsideDomain,

    #[error("iteration failed to converge: {0}")]
    NonConvergent(&'static str),

    #[error("geocentric conversion requires a height component")]
    Geocentric,

    #[error("no transformation path between datums: {0}")]
    DatumPath(String),
}

impl TransformError {
    /// Whether this error invalidates only the point being transformed.
    ///
    /// Transient errors are absorbed by the orchestrator when the batch has
    /// more than one point: the offending point is marked unprojectable and
    /// processing continues. Everything else aborts the batch.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransformError::OutsideGridArea
                | TransformError::LatLonOutOfRange
                | TransformError::OutsideDomain
                | TransformError::NonConvergent(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransformError::OutsideGridArea.is_transient());
        assert!(TransformError::LatLonOutOfRange.is_transient());
        assert!(TransformError::NonConvergent("inverse grid shift").is_transient());
        assert!(TransformError::OutsideDomain.is_transient());

        assert!(!TransformError::InvalidParameter("zone".into()).is_transient());
        assert!(!TransformError::MalformedPipeline("empty".into()).is_transient());
        assert!(!TransformError::NoUsableGrid.is_transient());
        assert!(!TransformError::Geocentric.is_transient());
        assert!(!TransformError::Grid(GridError::NotFound("x".into())).is_transient());
    }

    #[test]
    fn test_grid_error_bridges_into_transform_error() {
        let e: TransformError = GridError::Truncated("conus".into()).into();
        assert!(matches!(e, TransformError::Grid(_)));
        assert!(!e.is_transient());
    }
}
