use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Context, Coordinates, Location, Result};

pub mod locationiq;

pub use locationiq::LocationIqGeolocator;

/// Turns coordinates or free text into a resolved [`Location`].
///
/// Implementations must stop outstanding work and return
/// [`crate::Error::Cancelled`] (or [`crate::Error::DeadlineExceeded`]) once
/// `ctx` is done.
#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    /// Reverse lookup. The returned coordinates may be snapped to the nearest
    /// known address and need not equal `coords`.
    async fn resolve_from_coordinates(
        &self,
        ctx: &Context,
        coords: Coordinates,
    ) -> Result<Location>;

    /// Forward lookup returning the single best match, or
    /// [`crate::Error::NotFound`] when there is none.
    async fn resolve_from_query(&self, ctx: &Context, query: &str) -> Result<Location>;
}
