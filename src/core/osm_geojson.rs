//! OSM XML (`<osm>` document from the Overpass interpreter) to GeoJSON features.

use crate::domain::model::{Feature, FeatureCollection, Geometry, OsmType, Provider};
use crate::utils::error::{GeoError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tags that do not make an element worth rendering on their own.
const UNINTERESTING_TAGS: &[&str] = &[
    "source",
    "source_ref",
    "source:ref",
    "history",
    "attribution",
    "created_by",
    "tiger:county",
    "tiger:tlid",
    "tiger:upload_uuid",
];

/// Keys that make a closed way an area.
const AREA_KEYS: &[&str] = &[
    "building", "landuse", "amenity", "leisure", "natural", "place", "boundary",
];

type Position = [f64; 2];
type Tags = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct OsmNode {
    id: u64,
    lat: f64,
    lon: f64,
    tags: Tags,
}

#[derive(Debug, Default)]
struct OsmWay {
    id: u64,
    node_refs: Vec<u64>,
    tags: Tags,
}

#[derive(Debug)]
struct OsmMember {
    kind: OsmType,
    reference: u64,
    role: String,
}

#[derive(Debug, Default)]
struct OsmRelation {
    id: u64,
    members: Vec<OsmMember>,
    tags: Tags,
}

#[derive(Debug, Default)]
struct OsmDocument {
    nodes: Vec<OsmNode>,
    ways: Vec<OsmWay>,
    relations: Vec<OsmRelation>,
}

enum Current {
    None,
    Node(OsmNode),
    Way(OsmWay),
    Relation(OsmRelation),
}

pub fn osm_xml_to_geojson(xml: &str) -> Result<FeatureCollection> {
    let document = parse_document(xml)?;
    Ok(convert(&document))
}

fn parse_document(xml: &str) -> Result<OsmDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = OsmDocument::default();
    let mut current = Current::None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(started) = start_element(&e)? {
                    current = started;
                } else {
                    add_child(&mut current, &e)?;
                }
            }
            Event::Empty(e) => {
                // 自閉合的 node/way/relation 沒有子元素，直接收錄
                if let Some(element) = start_element(&e)? {
                    push_element(&mut document, element);
                } else {
                    add_child(&mut current, &e)?;
                }
            }
            Event::End(e) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    let finished = std::mem::replace(&mut current, Current::None);
                    push_element(&mut document, finished);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tracing::debug!(
        "Parsed OSM document: {} nodes, {} ways, {} relations",
        document.nodes.len(),
        document.ways.len(),
        document.relations.len()
    );
    Ok(document)
}

fn start_element(e: &BytesStart<'_>) -> Result<Option<Current>> {
    let element = match e.name().as_ref() {
        b"node" => {
            let attrs = attributes(e)?;
            Current::Node(OsmNode {
                id: parse_attr(&attrs, "id")?,
                lat: parse_attr(&attrs, "lat")?,
                lon: parse_attr(&attrs, "lon")?,
                tags: Tags::new(),
            })
        }
        b"way" => {
            let attrs = attributes(e)?;
            Current::Way(OsmWay {
                id: parse_attr(&attrs, "id")?,
                ..OsmWay::default()
            })
        }
        b"relation" => {
            let attrs = attributes(e)?;
            Current::Relation(OsmRelation {
                id: parse_attr(&attrs, "id")?,
                ..OsmRelation::default()
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(element))
}

fn add_child(current: &mut Current, e: &BytesStart<'_>) -> Result<()> {
    match (e.name().as_ref(), current) {
        (b"tag", Current::Node(OsmNode { tags, .. }))
        | (b"tag", Current::Way(OsmWay { tags, .. }))
        | (b"tag", Current::Relation(OsmRelation { tags, .. })) => {
            let mut attrs = attributes(e)?;
            if let (Some(k), Some(v)) = (attrs.remove("k"), attrs.remove("v")) {
                tags.insert(k, v);
            }
        }
        (b"nd", Current::Way(way)) => {
            let attrs = attributes(e)?;
            way.node_refs.push(parse_attr(&attrs, "ref")?);
        }
        (b"member", Current::Relation(relation)) => {
            let attrs = attributes(e)?;
            let kind = attrs
                .get("type")
                .and_then(|t| t.parse::<OsmType>().ok())
                .ok_or_else(|| GeoError::malformed(Provider::Osm, "member without valid type"))?;
            relation.members.push(OsmMember {
                kind,
                reference: parse_attr(&attrs, "ref")?,
                role: attrs.get("role").cloned().unwrap_or_default(),
            });
        }
        _ => {}
    }
    Ok(())
}

fn push_element(document: &mut OsmDocument, element: Current) {
    match element {
        Current::Node(node) => document.nodes.push(node),
        Current::Way(way) => document.ways.push(way),
        Current::Relation(relation) => document.relations.push(relation),
        Current::None => {}
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn parse_attr<T: std::str::FromStr>(attrs: &HashMap<String, String>, name: &str) -> Result<T> {
    let raw = attrs
        .get(name)
        .ok_or_else(|| GeoError::malformed(Provider::Osm, format!("missing attribute '{}'", name)))?;
    raw.parse::<T>().map_err(|_| {
        GeoError::malformed(
            Provider::Osm,
            format!("invalid value '{}' for attribute '{}'", raw, name),
        )
    })
}

fn has_interesting_tags(tags: &Tags) -> bool {
    tags.keys().any(|k| !UNINTERESTING_TAGS.contains(&k.as_str()))
}

fn is_area(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("no") => false,
        Some("yes") => true,
        _ => AREA_KEYS.iter().any(|k| tags.contains_key(*k)),
    }
}

fn properties(kind: OsmType, id: u64, tags: &Tags) -> Tags {
    let mut props = tags.clone();
    props.insert("@type".to_string(), kind.to_string());
    props.insert("@id".to_string(), id.to_string());
    props
}

fn convert(document: &OsmDocument) -> FeatureCollection {
    let positions: HashMap<u64, Position> = document
        .nodes
        .iter()
        .map(|n| (n.id, [n.lon, n.lat]))
        .collect();
    let ways: HashMap<u64, &OsmWay> = document.ways.iter().map(|w| (w.id, w)).collect();

    let mut features = Vec::new();
    let mut consumed_ways = HashSet::new();

    for relation in &document.relations {
        let area_relation = matches!(
            relation.tags.get("type").map(String::as_str),
            Some("multipolygon") | Some("boundary")
        );
        if !area_relation {
            tracing::debug!("Skipping non-area relation {}", relation.id);
            continue;
        }

        match relation_geometry(relation, &ways, &positions) {
            Some(geometry) => {
                for member in &relation.members {
                    if member.kind == OsmType::Way {
                        consumed_ways.insert(member.reference);
                    }
                }
                features.push(Feature::new(
                    format!("relation/{}", relation.id),
                    properties(OsmType::Relation, relation.id, &relation.tags),
                    geometry,
                ));
            }
            None => tracing::debug!("Relation {} has no closed outer ring", relation.id),
        }
    }

    let mut way_nodes = HashSet::new();
    for way in &document.ways {
        way_nodes.extend(way.node_refs.iter().copied());

        if consumed_ways.contains(&way.id) && !has_interesting_tags(&way.tags) {
            continue;
        }

        let coordinates: Vec<Position> = way
            .node_refs
            .iter()
            .filter_map(|id| positions.get(id).copied())
            .collect();
        if coordinates.len() < 2 {
            tracing::debug!("Way {} has fewer than 2 resolvable nodes", way.id);
            continue;
        }

        let closed = way.node_refs.len() >= 4 && way.node_refs.first() == way.node_refs.last();
        let geometry = if closed && coordinates.len() >= 4 && is_area(&way.tags) {
            Geometry::Polygon {
                coordinates: vec![coordinates],
            }
        } else {
            Geometry::LineString { coordinates }
        };

        features.push(Feature::new(
            format!("way/{}", way.id),
            properties(OsmType::Way, way.id, &way.tags),
            geometry,
        ));
    }

    for node in &document.nodes {
        if has_interesting_tags(&node.tags) || !way_nodes.contains(&node.id) {
            features.push(Feature::new(
                format!("node/{}", node.id),
                properties(OsmType::Node, node.id, &node.tags),
                Geometry::Point {
                    coordinates: [node.lon, node.lat],
                },
            ));
        }
    }

    FeatureCollection::new(features)
}

fn relation_geometry(
    relation: &OsmRelation,
    ways: &HashMap<u64, &OsmWay>,
    positions: &HashMap<u64, Position>,
) -> Option<Geometry> {
    let segments_for = |role: &str| -> Vec<Vec<u64>> {
        relation
            .members
            .iter()
            .filter(|m| m.kind == OsmType::Way)
            .filter(|m| match role {
                // 空角色視為 outer
                "outer" => m.role.is_empty() || m.role == "outer",
                _ => m.role == role,
            })
            .filter_map(|m| ways.get(&m.reference))
            .map(|w| w.node_refs.clone())
            .collect()
    };

    let outers = resolve_rings(join_rings(segments_for("outer")), positions);
    if outers.is_empty() {
        return None;
    }
    let inners = resolve_rings(join_rings(segments_for("inner")), positions);

    let mut polygons: Vec<Vec<Vec<Position>>> = outers.into_iter().map(|r| vec![r]).collect();
    for inner in inners {
        let anchor = inner[0];
        match polygons
            .iter_mut()
            .find(|polygon| point_in_ring(anchor, &polygon[0]))
        {
            Some(polygon) => polygon.push(inner),
            None => tracing::debug!("Relation {} has an orphan inner ring", relation.id),
        }
    }

    if polygons.len() == 1 {
        polygons.pop().map(|coordinates| Geometry::Polygon { coordinates })
    } else {
        Some(Geometry::MultiPolygon {
            coordinates: polygons,
        })
    }
}

/// Joins way segments end-to-end into closed rings. Segments that cannot be
/// closed are dropped.
fn join_rings(mut segments: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
    segments.retain(|s| s.len() >= 2);
    let mut rings = Vec::new();

    while !segments.is_empty() {
        let mut ring = segments.remove(0);
        let mut closed = ring.first() == ring.last();

        while !closed {
            let Some(&tail) = ring.last() else { break };
            let Some(position) = segments
                .iter()
                .position(|s| s.first() == Some(&tail) || s.last() == Some(&tail))
            else {
                break;
            };

            let segment = segments.remove(position);
            if segment.first() == Some(&tail) {
                ring.extend(segment.into_iter().skip(1));
            } else {
                ring.extend(segment.into_iter().rev().skip(1));
            }
            closed = ring.first() == ring.last();
        }

        if closed && ring.len() >= 4 {
            rings.push(ring);
        }
    }

    rings
}

fn resolve_rings(rings: Vec<Vec<u64>>, positions: &HashMap<u64, Position>) -> Vec<Vec<Position>> {
    rings
        .into_iter()
        .filter_map(|ring| {
            ring.iter()
                .map(|id| positions.get(id).copied())
                .collect::<Option<Vec<Position>>>()
        })
        .collect()
}

/// Ray casting; `point` and `ring` are `[lon, lat]`.
fn point_in_ring(point: Position, ring: &[Position]) -> bool {
    let [x, y] = point;
    let mut inside = false;
    let mut j = ring.len().saturating_sub(1);
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
