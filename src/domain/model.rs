use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 資料來源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// SPARQL graph-query endpoint
    #[serde(rename = "DBPEDIA")]
    DbPedia,
    /// Overpass filter-query endpoint
    #[serde(rename = "OSM")]
    Osm,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::DbPedia => write!(f, "DBPEDIA"),
            Provider::Osm => write!(f, "OSM"),
        }
    }
}

/// (lat, lon)，序列化為 `[lat, lon]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl Serialize for Coordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.lat, self.lon].serialize(serializer)
    }
}

/// 各來源特有的選填欄位
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderDetail {
    Students { students: String },
    Phone { phone: String },
}

/// 統一的大學記錄。只能由 normalizer 建立，建立後 provider 不可變更。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct University {
    name: String,
    coordinates: Coordinates,
    website: String,
    #[serde(flatten)]
    detail: ProviderDetail,
    provider: Provider,
}

impl University {
    pub(crate) fn from_graph(
        name: String,
        coordinates: Coordinates,
        website: String,
        students: String,
    ) -> Self {
        Self {
            name,
            coordinates,
            website,
            detail: ProviderDetail::Students { students },
            provider: Provider::DbPedia,
        }
    }

    pub(crate) fn from_filter(
        name: String,
        coordinates: Coordinates,
        website: String,
        phone: String,
    ) -> Self {
        Self {
            name,
            coordinates,
            website,
            detail: ProviderDetail::Phone { phone },
            provider: Provider::Osm,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn website(&self) -> &str {
        &self.website
    }

    pub fn students(&self) -> Option<&str> {
        match &self.detail {
            ProviderDetail::Students { students } => Some(students),
            ProviderDetail::Phone { .. } => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match &self.detail {
            ProviderDetail::Phone { phone } => Some(phone),
            ProviderDetail::Students { .. } => None,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl OsmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsmType::Node => "node",
            OsmType::Way => "way",
            OsmType::Relation => "relation",
        }
    }
}

impl fmt::Display for OsmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsmType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // 也接受 Nominatim 的單字母縮寫
        match s.trim().to_ascii_lowercase().as_str() {
            "node" | "n" => Ok(OsmType::Node),
            "way" | "w" => Ok(OsmType::Way),
            "relation" | "r" => Ok(OsmType::Relation),
            other => Err(format!("unknown OSM entity type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsmEntity {
    pub kind: OsmType,
    pub id: u64,
}

impl OsmEntity {
    pub fn new(kind: OsmType, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for OsmEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// 觸發一次查詢的輸入
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRequest {
    pub entity: OsmEntity,
    pub city_name: String,
    pub center: Coordinates,
}

/// GeoJSON 幾何，座標順序為 `[lon, lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub properties: BTreeMap<String, String>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(id: String, properties: BTreeMap<String, String>, geometry: Geometry) -> Self {
        Self {
            kind: "Feature".to_string(),
            id,
            properties,
            geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// 被略過的 filter-query 元素及原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedElement {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterNormalization {
    pub universities: Vec<University>,
    pub skipped: Vec<SkippedElement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_university_serialization_shape() {
        let univ = University::from_filter(
            "Y University".to_string(),
            Coordinates::new(45.7, 4.8),
            "y.edu".to_string(),
            String::new(),
        );
        let json = serde_json::to_value(&univ).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Y University",
                "coordinates": [45.7, 4.8],
                "website": "y.edu",
                "phone": "",
                "provider": "OSM"
            })
        );
    }

    #[test]
    fn test_osm_type_parsing() {
        assert_eq!("relation".parse::<OsmType>().unwrap(), OsmType::Relation);
        assert_eq!("W".parse::<OsmType>().unwrap(), OsmType::Way);
        assert_eq!(" Node ".parse::<OsmType>().unwrap(), OsmType::Node);
        assert!("area".parse::<OsmType>().is_err());
    }

    #[test]
    fn test_geometry_is_tagged_by_type() {
        let geometry = Geometry::Point {
            coordinates: [4.8, 45.7],
        };
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"], serde_json::json!([4.8, 45.7]));
    }
}
