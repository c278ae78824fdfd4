//! Error types for streetmap operations.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Primary error type for every stage of map composition.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Invalid bounding box: {0}")]
    InvalidBounds(String),

    /// A fetch failed: unreachable provider, HTTP error, timeout or a
    /// response that could not be decoded.
    #[error("Data source '{provider}' failed during {call}: {message}")]
    DataSource {
        provider: String,
        call: String,
        message: String,
    },

    /// The fetch succeeded but matched nothing. Callers may substitute an
    /// empty collection.
    #[error("Data source '{provider}' returned no features for {call}")]
    EmptyResult { provider: String, call: String },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl MapError {
    pub fn data_source(
        provider: impl Into<String>,
        call: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MapError::DataSource {
            provider: provider.into(),
            call: call.into(),
            message: message.into(),
        }
    }

    pub fn empty_result(provider: impl Into<String>, call: impl Into<String>) -> Self {
        MapError::EmptyResult {
            provider: provider.into(),
            call: call.into(),
        }
    }

    /// Only an empty result may be recovered from; everything else fails
    /// the pipeline.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MapError::EmptyResult { .. })
    }

    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            MapError::InvalidBounds(_) => "invalid_bounds",
            MapError::DataSource { .. } => "data_source",
            MapError::EmptyResult { .. } => "empty_result",
            MapError::Geometry(_) => "geometry",
            MapError::Render(_) => "render",
        }
    }
}

/// Substitute a default value for [`MapError::EmptyResult`].
pub trait RecoverEmpty<T> {
    fn or_empty(self) -> MapResult<T>
    where
        T: Default;

    /// Like [`RecoverEmpty::or_empty`] but builds the replacement lazily.
    fn or_empty_with(self, f: impl FnOnce() -> T) -> MapResult<T>;
}

impl<T> RecoverEmpty<T> for MapResult<T> {
    fn or_empty(self) -> MapResult<T>
    where
        T: Default,
    {
        self.or_empty_with(T::default)
    }

    fn or_empty_with(self, f: impl FnOnce() -> T) -> MapResult<T> {
        match self {
            Err(e) if e.is_recoverable() => Ok(f()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_is_recovered() {
        let result: MapResult<Vec<u32>> = Err(MapError::empty_result("overpass", "fetch highway"));
        assert_eq!(result.or_empty().unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let result: MapResult<Vec<u32>> =
            Err(MapError::data_source("overpass", "fetch highway", "timed out"));
        let err = result.or_empty().unwrap_err();
        assert_eq!(err.kind(), "data_source");
        assert!(err.to_string().contains("timed out"));
    }
}
