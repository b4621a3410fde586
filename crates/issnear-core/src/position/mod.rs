//! Position sources for the device and the tracked object.
//!
//! The engine sees a single [`PositionSource`]. Concrete deployments build
//! one from a [`LocationProvider`] (where am I?) and a [`TargetFeed`]
//! (where is the station?) with [`CompositeSource`].

mod fixed;
pub mod open_notify;

pub use fixed::FixedLocation;
pub use open_notify::{parse_iss_now, OpenNotifyClient, DEFAULT_ENDPOINT};

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::PositionError;
use crate::geo::Coordinate;

/// Accuracy requested from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Low,
    Balanced,
    High,
    #[default]
    Highest,
}

/// Everything the monitor needs to know about positions.
pub trait PositionSource: Send + Sync {
    /// One-shot device fix. Called once per session.
    fn acquire_own_position(
        &self,
    ) -> impl Future<Output = Result<Coordinate, PositionError>> + Send;

    /// Current position of the tracked object. Called on every poll tick.
    fn poll_target_position(
        &self,
    ) -> impl Future<Output = Result<Coordinate, PositionError>> + Send;
}

/// Device geolocation.
pub trait LocationProvider: Send + Sync {
    fn current_position(
        &self,
        accuracy: Accuracy,
    ) -> impl Future<Output = Result<Coordinate, PositionError>> + Send;
}

/// Remote feed for the tracked object.
pub trait TargetFeed: Send + Sync {
    fn fetch_position(&self) -> impl Future<Output = Result<Coordinate, PositionError>> + Send;
}

/// A [`PositionSource`] assembled from a location provider and a target feed.
#[derive(Debug, Clone)]
pub struct CompositeSource<L, T> {
    location: L,
    target: T,
    accuracy: Accuracy,
}

impl<L: LocationProvider, T: TargetFeed> CompositeSource<L, T> {
    pub fn new(location: L, target: T) -> Self {
        Self {
            location,
            target,
            accuracy: Accuracy::default(),
        }
    }

    pub fn with_accuracy(mut self, accuracy: Accuracy) -> Self {
        self.accuracy = accuracy;
        self
    }
}

impl<L: LocationProvider, T: TargetFeed> PositionSource for CompositeSource<L, T> {
    async fn acquire_own_position(&self) -> Result<Coordinate, PositionError> {
        self.location.current_position(self.accuracy).await
    }

    async fn poll_target_position(&self) -> Result<Coordinate, PositionError> {
        self.target.fetch_position().await
    }
}
