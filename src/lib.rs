pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::HttpProviderClient;
pub use config::TomlConfig;
pub use crate::core::orchestrator::{LookupReport, Orchestrator, Phase, PresentationState};
pub use domain::model::{Coordinates, EntityRequest, OsmEntity, OsmType, Provider, University};
pub use utils::error::{ErrorKind, GeoError, Result};
