//! Per-request metadata: the bearer token and the client context used for the
//! authentication history.

use crate::error::{AuthError, AuthResult};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use tracing::warn;

pub const TOKEN_KEY: &str = "token";
pub const LATITUDE_KEY: &str = "latitude";
pub const LONGITUDE_KEY: &str = "longitude";
pub const DEVICE_KEY: &str = "device";
pub const UNKNOWN_DEVICE: &str = "Unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    token: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    device: Option<String>,
}

impl RequestMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the metadata keys from HTTP headers. The `token` header wins over an
    /// `Authorization: Bearer` header.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = header_value(headers, TOKEN_KEY).or_else(|| bearer_token(headers));
        Self {
            token,
            latitude: header_value(headers, LATITUDE_KEY),
            longitude: header_value(headers, LONGITUDE_KEY),
            device: header_value(headers, DEVICE_KEY),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        self.latitude = Some(latitude.into());
        self.longitude = Some(longitude.into());
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// The presented token.
    ///
    /// # Errors
    /// `Unauthenticated` when the token is absent or blank.
    pub fn token(&self) -> AuthResult<&str> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::unauthenticated("missing token metadata")),
        }
    }

    /// Device and coordinates, defaulting to `Unknown` and `0,0`. The pair is
    /// all or nothing: one absent or unparsable coordinate resets both.
    #[must_use]
    pub fn client_context(&self) -> ClientContext {
        let device = self
            .device
            .as_deref()
            .map(str::trim)
            .filter(|device| !device.is_empty())
            .map_or_else(|| UNKNOWN_DEVICE.to_string(), str::to_string);

        let (latitude, longitude) = parse_coordinate(self.latitude.as_deref(), LATITUDE_KEY, 90.0)
            .zip(parse_coordinate(self.longitude.as_deref(), LONGITUDE_KEY, 180.0))
            .unwrap_or((0.0, 0.0));

        ClientContext {
            device,
            latitude,
            longitude,
        }
    }
}

/// Where an authentication came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientContext {
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            device: UNKNOWN_DEVICE.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

fn header_value(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn parse_coordinate(raw: Option<&str>, key: &'static str, bound: f64) -> Option<f64> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.abs() <= bound => Some(value),
        _ => {
            warn!(key, value = raw, "ignoring invalid coordinate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_or_blank_token_is_unauthenticated() {
        assert!(matches!(
            RequestMetadata::new().token(),
            Err(AuthError::Unauthenticated(_))
        ));
        assert!(matches!(
            RequestMetadata::new().with_token("   ").token(),
            Err(AuthError::Unauthenticated(_))
        ));
        assert_eq!(RequestMetadata::new().with_token(" abc ").token(), Ok("abc"));
    }

    #[test]
    fn token_header_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-auth"));
        assert_eq!(
            RequestMetadata::from_headers(&headers).token(),
            Ok("from-auth")
        );

        headers.insert(TOKEN_KEY, HeaderValue::from_static("from-token"));
        assert_eq!(
            RequestMetadata::from_headers(&headers).token(),
            Ok("from-token")
        );
    }

    #[test]
    fn client_context_defaults() {
        assert_eq!(
            RequestMetadata::new().client_context(),
            ClientContext::default()
        );

        let context = RequestMetadata::new()
            .with_location("55.67", "12.56")
            .with_device("iPhone")
            .client_context();
        assert_eq!(context.device, "iPhone");
        assert!((context.latitude - 55.67).abs() < f64::EPSILON);
        assert!((context.longitude - 12.56).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_coordinates_fall_back_to_zero() {
        let context = RequestMetadata::new()
            .with_location("north", "200")
            .client_context();
        assert!(context.latitude.abs() < f64::EPSILON);
        assert!(context.longitude.abs() < f64::EPSILON);
    }

    #[test]
    fn one_bad_coordinate_resets_the_pair() {
        let context = RequestMetadata::new()
            .with_location("55.67", "bogus")
            .client_context();
        assert_eq!((context.latitude, context.longitude), (0.0, 0.0));

        let context = RequestMetadata::new()
            .with_location("", "12.56")
            .client_context();
        assert_eq!((context.latitude, context.longitude), (0.0, 0.0));

        let mut headers = HeaderMap::new();
        headers.insert(LATITUDE_KEY, HeaderValue::from_static("-33.9"));
        let context = RequestMetadata::from_headers(&headers).client_context();
        assert_eq!((context.latitude, context.longitude), (0.0, 0.0));
    }

    #[test]
    fn headers_populate_client_context() {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_KEY, HeaderValue::from_static("Pixel"));
        headers.insert(LATITUDE_KEY, HeaderValue::from_static("-33.9"));
        headers.insert(LONGITUDE_KEY, HeaderValue::from_static("151.2"));
        let context = RequestMetadata::from_headers(&headers).client_context();
        assert_eq!(context.device, "Pixel");
        assert!((context.latitude + 33.9).abs() < f64::EPSILON);
    }
}
