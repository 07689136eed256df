pub mod drain;
pub mod store;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use serde::{Deserialize, Serialize};

pub use store::ProductStore;

pub const PRODUCTS_PATH: &str = "/products";

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

#[inline]
pub fn json_body<T: Serialize>(value: &T) -> anyhow::Result<Full<Bytes>> {
    let raw = serde_json::to_vec(value).context("Failed to serialize json body")?;
    Ok(byte_body(raw))
}

/// Payload of `POST /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

impl NewProduct {
    #[must_use]
    pub fn new(name: impl Into<String>, price: f64, quantity: i64) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
        }
    }

    /// Zero values count as missing, so `price: 0` or `quantity: 0` is a
    /// missing-fields error rather than an out-of-range one.
    pub fn validate(&self) -> Result<(), InvalidProduct> {
        if self.name.is_empty() || self.price == 0.0 || self.quantity == 0 {
            return Err(InvalidProduct::MissingFields);
        }
        if self.price < 0.0 || self.quantity < 0 {
            return Err(InvalidProduct::OutOfRange);
        }
        Ok(())
    }
}

/// A stored product, as returned by both catalog endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

impl Product {
    #[must_use]
    pub fn from_new(id: String, new: NewProduct) -> Self {
        Self {
            id,
            name: new.name,
            price: new.price,
            quantity: new.quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidProduct {
    MissingFields,
    OutOfRange,
}

impl InvalidProduct {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            InvalidProduct::MissingFields => {
                "Invalid input. Name, Price, and Quantity are required fields."
            }
            InvalidProduct::OutOfRange => {
                "Price must be positive, and Quantity cannot be negative."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
