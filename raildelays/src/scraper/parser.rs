//! Parsers turning raw bodies into typed records.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::error::ScrapeError;

/// Converts a raw response body into a typed result.
pub trait StreamParser {
    type Output;

    fn parse(&self, body: &str) -> Result<Self::Output, ScrapeError>;
}

/// Parses a JSON body into `T`.
#[derive(Debug)]
pub struct JsonParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonParser<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> StreamParser for JsonParser<T> {
    type Output = T;

    fn parse(&self, body: &str) -> Result<T, ScrapeError> {
        serde_json::from_str(body).map_err(|e| ScrapeError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }
}
