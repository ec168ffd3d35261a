pub mod boundary;
pub mod normalizer;
pub mod orchestrator;
pub mod osm_geojson;
pub mod query_builder;

pub use crate::domain::model::{EntityRequest, FeatureCollection, University};
pub use crate::domain::ports::{ConfigProvider, ProviderClient};
pub use crate::utils::error::Result;
