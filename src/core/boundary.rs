use crate::core::osm_geojson::osm_xml_to_geojson;
use crate::core::query_builder::build_boundary_query;
use crate::domain::model::{FeatureCollection, OsmEntity, Provider};
use crate::domain::ports::{Endpoint, ProviderClient, RawResponse, ResponseFormat};
use crate::utils::error::{GeoError, Result};

pub struct BoundaryResolver<'a, C: ProviderClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: ProviderClient + ?Sized> BoundaryResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// 取得實體及其引用的幾何並轉為 FeatureCollection。傳輸錯誤原樣傳遞。
    pub async fn resolve(&self, entity: &OsmEntity) -> Result<FeatureCollection> {
        let query = build_boundary_query(entity);
        tracing::debug!("🗺️ Boundary query for {}: {}", entity, query);

        let xml = match self
            .client
            .send(Endpoint::FilterInterpreter, &query, ResponseFormat::Xml)
            .await?
        {
            RawResponse::Xml(xml) => xml,
            RawResponse::Json(_) => {
                return Err(GeoError::malformed(
                    Provider::Osm,
                    "expected XML geometry for boundary query",
                ))
            }
        };

        let collection = osm_xml_to_geojson(&xml)?;
        tracing::info!("🗺️ Boundary for {} has {} features", entity, collection.len());
        Ok(collection)
    }
}
