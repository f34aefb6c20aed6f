//! Binary payloads stored inside TMX documents.

pub mod bitmap;
pub mod layer_data;
