use crate::domain::model::{
    Coordinates, FilterNormalization, Provider, SkippedElement, University,
};
use crate::utils::error::{GeoError, Result};
use serde_json::Value;

/// 將 SPARQL `results.bindings` 轉為大學記錄。
///
/// `univ`、`lat`、`long` 為必要欄位；任一筆缺少即回傳 `MalformedResponse`，
/// 錯誤訊息帶有該筆 binding 的索引。
pub fn normalize_graph_response(raw: &Value) -> Result<Vec<University>> {
    let bindings = raw
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .ok_or_else(|| GeoError::malformed(Provider::DbPedia, "missing results.bindings array"))?;

    let mut universities = Vec::with_capacity(bindings.len());
    for (index, binding) in bindings.iter().enumerate() {
        let name = required_binding(binding, "univ", index)?;
        let lat = parse_coordinate(required_binding(binding, "lat", index)?, "lat", index)?;
        let lon = parse_coordinate(required_binding(binding, "long", index)?, "long", index)?;

        universities.push(University::from_graph(
            name.to_string(),
            Coordinates::new(lat, lon),
            optional_binding(binding, "website"),
            optional_binding(binding, "students"),
        ));
    }

    tracing::debug!("Normalized {} DBpedia bindings", universities.len());
    Ok(universities)
}

/// 將 Overpass `elements` 轉為大學記錄。
///
/// 單一元素格式錯誤時略過並記錄原因，不影響同批次其他元素。
pub fn normalize_filter_response(raw: &Value) -> Result<FilterNormalization> {
    let elements = raw
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| GeoError::malformed(Provider::Osm, "missing elements array"))?;

    let mut universities = Vec::with_capacity(elements.len());
    let mut skipped = Vec::new();

    for (index, element) in elements.iter().enumerate() {
        match normalize_filter_element(element) {
            Ok(university) => universities.push(university),
            Err(reason) => {
                tracing::warn!("⚠️ Skipping OSM element #{}: {}", index, reason);
                skipped.push(SkippedElement { index, reason });
            }
        }
    }

    tracing::debug!(
        "Normalized {} OSM elements ({} skipped)",
        universities.len(),
        skipped.len()
    );
    Ok(FilterNormalization {
        universities,
        skipped,
    })
}

fn normalize_filter_element(element: &Value) -> std::result::Result<University, String> {
    let tags = element
        .get("tags")
        .and_then(Value::as_object)
        .ok_or_else(|| "element has no tags".to_string())?;

    let name = tags
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| "element has no name tag".to_string())?;

    let lat = element
        .get("lat")
        .and_then(Value::as_f64)
        .ok_or_else(|| "element has no numeric lat".to_string())?;
    let lon = element
        .get("lon")
        .and_then(Value::as_f64)
        .ok_or_else(|| "element has no numeric lon".to_string())?;

    let tag = |key: &str| {
        tags.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(University::from_filter(
        name.to_string(),
        Coordinates::new(lat, lon),
        tag("website"),
        tag("phone"),
    ))
}

fn required_binding<'a>(binding: &'a Value, field: &str, index: usize) -> Result<&'a str> {
    binding
        .get(field)
        .and_then(|b| b.get("value"))
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            GeoError::malformed(
                Provider::DbPedia,
                format!("binding #{} is missing required field '{}'", index, field),
            )
        })
}

fn optional_binding(binding: &Value, field: &str) -> String {
    binding
        .get(field)
        .and_then(|b| b.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_coordinate(value: &str, field: &str, index: usize) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        GeoError::malformed(
            Provider::DbPedia,
            format!("binding #{} has non-numeric {} '{}'", index, field, value),
        )
    })
}
