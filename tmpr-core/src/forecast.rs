//! Forecast orchestration: fans out to a [`Geolocator`] and a
//! [`WeatherProvider`] and merges their answers into one [`Forecast`].
//!
//! Each call derives one shared [`Context`] for its two branches. The first
//! branch to fail cancels that context, so the sibling (and anything it has
//! started) stops early, and the error is returned on its own. A forecast is
//! only ever returned whole.

use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::{Context, Coordinates, Error, Forecast, Geolocator, Result, WeatherProvider};

#[async_trait]
pub trait Forecaster: Send + Sync + Debug {
    async fn forecast_at_coordinates(&self, ctx: &Context, coords: Coordinates) -> Result<Forecast>;

    async fn forecast_at_query(&self, ctx: &Context, query: &str) -> Result<Forecast>;
}

#[derive(Debug)]
pub struct ForecastService {
    geolocator: Box<dyn Geolocator>,
    weather: Box<dyn WeatherProvider>,
}

impl ForecastService {
    pub fn new(geolocator: Box<dyn Geolocator>, weather: Box<dyn WeatherProvider>) -> Self {
        Self {
            geolocator,
            weather,
        }
    }
}

/// One side of a fan-out. On failure the shared `group` context is cancelled
/// before the error is handed back to the join.
async fn branch<T, F>(group: &Context, what: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Ok(value),
        Err(err) => {
            if !group.is_cancelled() {
                warn!(branch = what, error = %err, "branch failed, cancelling sibling");
                group.cancel();
            }
            Err(err.context(format!("could not {what}")))
        }
    }
}

#[async_trait]
impl Forecaster for ForecastService {
    #[instrument(skip(self, ctx))]
    async fn forecast_at_coordinates(&self, ctx: &Context, coords: Coordinates) -> Result<Forecast> {
        let group = ctx.child();

        let weather = branch(
            &group,
            "get weather at coordinates",
            self.weather.weather_at_coordinates(&group, coords),
        );
        let location = branch(
            &group,
            "resolve location from coordinates",
            self.geolocator.resolve_from_coordinates(&group, coords),
        );

        let joined = ctx.run(async { tokio::try_join!(weather, location) }).await;
        // Released once joined, whatever the outcome.
        group.cancel();
        let (weather, location) = joined?;

        debug!(%location, "merged forecast");
        Ok(Forecast { location, weather })
    }

    /// The coordinate branch performs its own reverse lookup; the location
    /// resolved directly from `query` replaces it in the result.
    #[instrument(skip(self, ctx))]
    async fn forecast_at_query(&self, ctx: &Context, query: &str) -> Result<Forecast> {
        let group = ctx.child();
        let (coords_tx, coords_rx) = oneshot::channel::<Coordinates>();

        let group_ref = &group;
        let geolocator = &self.geolocator;

        let location = branch(group_ref, "resolve location from query", async move {
            let location = geolocator.resolve_from_query(group_ref, query).await?;
            // The receiver lives until the join completes.
            let _ = coords_tx.send(location.coordinates);
            Ok(location)
        });
        let forecast = branch(
            group_ref,
            "get forecast at resolved coordinates",
            async move {
                let coords = coords_rx.await.map_err(|_| Error::Cancelled)?;
                self.forecast_at_coordinates(group_ref, coords).await
            },
        );

        let joined = ctx.run(async { tokio::try_join!(location, forecast) }).await;
        group.cancel();
        let (location, mut forecast) = joined?;

        if forecast.location != location {
            debug!(
                direct = %location,
                incidental = %forecast.location,
                "replacing reverse-resolved location with query result"
            );
        }
        forecast.location = location;
        Ok(forecast)
    }
}
