//! Core types for geostash
//!
//! This crate defines the foundational types shared by the codec and store crates:
//! - AttributeValue: Tagged union for one attribute cell
//! - FieldKind: Column kind codes (non-contiguous, preserved bit-exactly)
//! - DateValue: Seven-component date/time cell payload
//! - FieldSchema: One column definition
//! - GeometryType: Layer and feature geometry type codes
//! - LayerMetadata, Feature: Layer-level and per-feature data
//! - Error: Error taxonomy for encode/decode and store access

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use types::{Feature, FieldSchema, GeometryKind, GeometryType, LayerMetadata};
pub use value::{AttributeValue, DateValue, FieldKind};
