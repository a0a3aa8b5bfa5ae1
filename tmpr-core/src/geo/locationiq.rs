use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    Context, Coordinates, Error, Location, Result, ResultExt, geo::Geolocator, http::get_json,
};

const DEFAULT_BASE_URL: &str = "https://us1.locationiq.com/v1";

/// Geolocator backed by the LocationIQ reverse and search endpoints.
#[derive(Debug, Clone)]
pub struct LocationIqGeolocator {
    api_key: String,
    base_url: String,
    http: Client,
}

impl LocationIqGeolocator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("no LocationIQ API key provided".into()));
        }

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Common query parameters: one best match with a normalized address.
    fn request(&self, path: &str) -> RequestBuilder {
        self.http.get(format!("{}/{path}", self.base_url)).query(&[
            ("key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", "1"),
            ("addressdetails", "1"),
            ("normalizeaddress", "1"),
            ("normalizecity", "1"),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct ApiPlace {
    lat: String,
    lon: String,
    display_name: String,
    address: ApiAddress,
}

#[derive(Debug, Deserialize)]
struct ApiAddress {
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    postcode: String,
}

impl TryFrom<ApiPlace> for Location {
    type Error = Error;

    fn try_from(place: ApiPlace) -> Result<Self> {
        let lon = parse_degrees(&place.lon, "longitude")?;
        let lat = parse_degrees(&place.lat, "latitude")?;
        let coordinates = Coordinates::new(lon, lat)
            .map_err(|e| Error::Decode(format!("upstream returned {e}")))?;

        Ok(Location {
            display_name: place.display_name,
            city: place.address.city,
            country: place.address.country,
            postcode: place.address.postcode,
            coordinates,
        })
    }
}

fn parse_degrees(raw: &str, what: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|e| Error::Decode(format!("could not parse {what} {raw:?}: {e}")))
}

/// The search endpoint answers with a list; only the first entry is used.
fn first_match(places: Vec<ApiPlace>, query: &str) -> Result<Location> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound(query.to_string()))?;

    Location::try_from(place)
}

#[async_trait]
impl Geolocator for LocationIqGeolocator {
    #[instrument(skip(self, ctx))]
    async fn resolve_from_coordinates(
        &self,
        ctx: &Context,
        coords: Coordinates,
    ) -> Result<Location> {
        let request = self.request("reverse").query(&[
            ("lat", coords.latitude().to_string()),
            ("lon", coords.longitude().to_string()),
        ]);

        let place: ApiPlace = ctx
            .run(get_json(request))
            .await
            .context("LocationIQ reverse lookup failed")?;

        let location = Location::try_from(place).context("LocationIQ reverse lookup failed")?;
        debug!(%location, "resolved coordinates");
        Ok(location)
    }

    #[instrument(skip(self, ctx))]
    async fn resolve_from_query(&self, ctx: &Context, query: &str) -> Result<Location> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".into()));
        }

        let request = self.request("search").query(&[("q", query)]);

        let places: Vec<ApiPlace> = ctx
            .run(get_json(request))
            .await
            .map_err(|err| match err {
                // LocationIQ answers an empty search with 404 rather than `[]`.
                Error::Status { status: 404, .. } => Error::NotFound(query.to_string()),
                other => other,
            })
            .context("LocationIQ search failed")?;

        let location = first_match(places, query).context("LocationIQ search failed")?;
        debug!(%location, "resolved query");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind,
        http::stub::{StubServer, refused_base_url},
    };
    use std::time::Duration;

    const SEARCH_BODY: &str = r#"[
        {
            "place_id": "321",
            "licence": "https://locationiq.com/attribution",
            "lat": "55.6867243",
            "lon": "12.5700724",
            "display_name": "Copenhagen, Copenhagen Municipality, Denmark",
            "address": {
                "city": "Copenhagen",
                "state": "Capital Region of Denmark",
                "postcode": "1050",
                "country": "Denmark",
                "country_code": "dk"
            }
        },
        {
            "lat": "0",
            "lon": "0",
            "display_name": "ignored",
            "address": {}
        }
    ]"#;

    fn places(body: &str) -> Vec<ApiPlace> {
        serde_json::from_str(body).expect("fixture must decode")
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = LocationIqGeolocator::new("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let geo = LocationIqGeolocator::new("KEY")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(geo.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn first_match_wins() {
        let location = first_match(places(SEARCH_BODY), "Copenhagen").unwrap();

        assert_eq!(location.city, "Copenhagen");
        assert_eq!(location.postcode, "1050");
        assert_eq!(location.coordinates.longitude(), 12.5700724);
        assert_eq!(location.coordinates.latitude(), 55.6867243);
        assert_eq!(location.to_string(), "1050, Copenhagen, Denmark");
    }

    #[test]
    fn empty_result_set_is_not_found() {
        let err = first_match(places("[]"), "Atlantis").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn unparsable_coordinate_is_decode_error() {
        let place = places(
            r#"[{"lat": "north-ish", "lon": "12.57", "display_name": "x", "address": {}}]"#,
        );
        let err = first_match(place, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn out_of_range_coordinate_is_decode_error() {
        let place = places(r#"[{"lat": "91", "lon": "0", "display_name": "x", "address": {}}]"#);
        let err = first_match(place, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn missing_fields_fail_to_decode() {
        let err = serde_json::from_str::<ApiPlace>(r#"{"lat": "1", "display_name": "x"}"#)
            .map_err(Error::from)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn reverse_payload_maps_address() {
        let place: ApiPlace = serde_json::from_str(
            r#"{
                "lat": "55.68",
                "lon": "12.57",
                "display_name": "Rådhuspladsen 1, 1550 København",
                "address": {"city": "København", "postcode": "1550", "country": "Danmark"}
            }"#,
        )
        .unwrap();

        let location = Location::try_from(place).unwrap();
        assert_eq!(location.display_name, "Rådhuspladsen 1, 1550 København");
        assert_eq!(location.country, "Danmark");
    }

    #[tokio::test]
    async fn blank_query_fails_before_network() {
        let geo = LocationIqGeolocator::new("KEY")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        let err = geo
            .resolve_from_query(&Context::background(), "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn cancelled_context_skips_request() {
        let geo = LocationIqGeolocator::new("KEY")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let ctx = Context::background();
        ctx.cancel();

        let coords = Coordinates::new(12.57, 55.68).unwrap();
        let err = geo.resolve_from_coordinates(&ctx, coords).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    fn geolocator(base_url: &str) -> LocationIqGeolocator {
        LocationIqGeolocator::new("KEY").unwrap().with_base_url(base_url)
    }

    #[tokio::test]
    async fn search_requests_one_normalized_match() {
        let server = StubServer::reply(200, SEARCH_BODY).await;

        let location = geolocator(&server.base_url)
            .resolve_from_query(&Context::background(), "Copenhagen")
            .await
            .unwrap();
        assert_eq!(location.city, "Copenhagen");

        let line = server.request_line().await;
        assert!(line.starts_with("GET /search?"), "{line}");
        for param in [
            "key=KEY",
            "format=json",
            "limit=1",
            "addressdetails=1",
            "normalizeaddress=1",
            "normalizecity=1",
            "q=Copenhagen",
        ] {
            assert!(line.contains(param), "{param} missing from {line}");
        }
    }

    #[tokio::test]
    async fn search_404_is_not_found() {
        let server = StubServer::reply(404, r#"{"error":"Unable to geocode"}"#).await;

        let err = geolocator(&server.base_url)
            .resolve_from_query(&Context::background(), "zzqqxx")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn search_empty_array_is_not_found() {
        let server = StubServer::reply(200, "[]").await;

        let err = geolocator(&server.base_url)
            .resolve_from_query(&Context::background(), "zzqqxx")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reverse_sends_coordinates_and_decodes_place() {
        let server = StubServer::reply(
            200,
            r#"{"lat": "55.6761", "lon": "12.5701", "display_name": "Rådhuspladsen 1",
                "address": {"city": "København", "postcode": "1550", "country": "Danmark"}}"#,
        )
        .await;

        let coords = Coordinates::new(12.57, 55.68).unwrap();
        let location = geolocator(&server.base_url)
            .resolve_from_coordinates(&Context::background(), coords)
            .await
            .unwrap();

        assert_eq!(location.postcode, "1550");
        assert_eq!(location.coordinates.latitude(), 55.6761);

        let line = server.request_line().await;
        assert!(line.starts_with("GET /reverse?"), "{line}");
        assert!(line.contains("lat=55.68") && line.contains("lon=12.57"), "{line}");
    }

    #[tokio::test]
    async fn reverse_404_stays_a_status_error() {
        let server = StubServer::reply(404, r#"{"error":"Unable to geocode"}"#).await;

        let err = geolocator(&server.base_url)
            .resolve_from_coordinates(&Context::background(), Coordinates::new(0.0, 0.0).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn malformed_reverse_body_is_decode_error() {
        let server = StubServer::reply(200, r#"{"lat": "55.68"}"#).await;

        let err = geolocator(&server.base_url)
            .resolve_from_coordinates(&Context::background(), Coordinates::new(12.57, 55.68).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let err = geolocator(&refused_base_url().await)
            .resolve_from_query(&Context::background(), "Copenhagen")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn cancel_aborts_request_in_flight() {
        let server = StubServer::silent().await;
        let ctx = Context::background();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = geolocator(&server.base_url)
            .resolve_from_query(&ctx, "Copenhagen")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
