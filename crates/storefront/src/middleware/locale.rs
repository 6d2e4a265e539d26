//! Request language and region extractors.

use axum::{
    extract::FromRequestParts,
    http::{header::CONTENT_LANGUAGE, request::Parts},
};

use vitrina_core::Language;

/// Country header set by the CDN in front of the API.
pub const REGION_HEADER: &str = "cf-ipcountry";

/// Language from `Content-Language`, `en` when absent or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLanguage(pub Language);

impl<S> FromRequestParts<S> for RequestLanguage
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let language = parts
            .headers
            .get(CONTENT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map_or(Language::En, Language::from_header);
        Ok(Self(language))
    }
}

/// Two-letter country code of the client, when the CDN knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRegion(pub Option<String>);

impl<S> FromRequestParts<S> for ClientRegion
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let region = parts
            .headers
            .get(REGION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_region);
        Ok(Self(region))
    }
}

/// `XX` (unknown) and `T1` (Tor) are not countries.
fn parse_region(value: &str) -> Option<String> {
    let code = value.trim().to_ascii_uppercase();
    let is_country = code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) && code != "XX";
    is_country.then_some(code)
}
