use crate::config::toml_config::TomlConfig;
use crate::domain::model::{Coordinates, EntityRequest, OsmEntity, OsmType};
use crate::utils::error::Result;
use crate::utils::validation::{validate_coordinates, validate_non_empty_string, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "campus-finder")]
#[command(about = "Find universities in a city from DBpedia and OpenStreetMap")]
pub struct CliConfig {
    /// OSM entity type of the place (node, way, relation)
    #[arg(long)]
    pub osm_type: OsmType,

    /// OSM entity id of the place
    #[arg(long)]
    pub osm_id: u64,

    /// City name used for both university lookups
    #[arg(long)]
    pub city: String,

    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub sparql_endpoint: Option<String>,

    #[arg(long)]
    pub overpass_endpoint: Option<String>,

    /// Overpass query timeout directive, in seconds
    #[arg(long)]
    pub query_timeout: Option<u64>,

    /// Client-side wait limit for every request, in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 載入設定檔 (若有) 並套用命令列覆蓋
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(endpoint) = &self.sparql_endpoint {
            config.providers.sparql_endpoint = Some(endpoint.clone());
        }
        if let Some(endpoint) = &self.overpass_endpoint {
            config.providers.overpass_endpoint = Some(endpoint.clone());
        }
        if let Some(seconds) = self.query_timeout {
            config.timeouts.query_seconds = Some(seconds);
        }
        if let Some(seconds) = self.request_timeout {
            config.timeouts.request_seconds = Some(seconds);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn entity_request(&self) -> EntityRequest {
        EntityRequest {
            entity: OsmEntity::new(self.osm_type, self.osm_id),
            city_name: self.city.clone(),
            center: Coordinates::new(self.lat, self.lon),
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("city", &self.city)?;
        validate_coordinates(self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ConfigProvider;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["campus-finder"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_entity_arguments() {
        let cli = parse(&[
            "--osm-type", "relation", "--osm-id", "120965", "--city", "Lyon", "--lat",
            "45.75", "--lon", "4.85",
        ]);

        let request = cli.entity_request();
        assert_eq!(request.entity, OsmEntity::new(OsmType::Relation, 120965));
        assert_eq!(request.city_name, "Lyon");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_negative_coordinates() {
        let cli = parse(&[
            "--osm-type", "R", "--osm-id", "1", "--city", "Lima", "--lat", "-12.04",
            "--lon", "-77.04",
        ]);
        assert_eq!(cli.lat, -12.04);
        assert_eq!(cli.lon, -77.04);
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cli = parse(&[
            "--osm-type", "way", "--osm-id", "7", "--city", "Lyon", "--lat", "45.0",
            "--lon", "4.0", "--overpass-endpoint", "http://localhost:12345/api/",
            "--query-timeout", "30",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.filter_endpoint(), "http://localhost:12345/api/");
        assert_eq!(config.query_timeout_seconds(), 30);
        assert_eq!(config.graph_endpoint(), "https://dbpedia.org/sparql");
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = parse(&[
            "--osm-type", "way", "--osm-id", "7", "--city", "Lyon", "--lat", "45.0",
            "--lon", "4.0", "--sparql-endpoint", "ftp://example.com",
        ]);
        assert!(cli.resolve().is_err());
    }

    #[test]
    fn test_unknown_osm_type_rejected() {
        let result = CliConfig::try_parse_from([
            "campus-finder", "--osm-type", "area", "--osm-id", "1", "--city", "X",
            "--lat", "0", "--lon", "0",
        ]);
        assert!(result.is_err());
    }
}
