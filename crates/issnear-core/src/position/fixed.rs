use crate::error::PositionError;
use crate::geo::Coordinate;

use super::{Accuracy, LocationProvider};

/// Device location taken from configuration instead of a GPS fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation {
    position: Option<Coordinate>,
}

impl FixedLocation {
    pub fn new(position: Option<Coordinate>) -> Self {
        Self { position }
    }

    pub fn at(position: Coordinate) -> Self {
        Self::new(Some(position))
    }
}

impl LocationProvider for FixedLocation {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Coordinate, PositionError> {
        self.position
            .ok_or_else(|| PositionError::Unavailable("no location configured".into()))
    }
}
