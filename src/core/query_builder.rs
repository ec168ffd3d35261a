//! Provider query construction.
//!
//! City names are interpolated as data: every builder escapes them for the
//! target language, so a name can never terminate the literal it sits in.

use crate::domain::model::OsmEntity;

pub const DEFAULT_FILTER_TIMEOUT_SECONDS: u64 = 60;

const ERE_METACHARACTERS: &str = ".[]{}()\\*+?^$|";

/// `type(id);(._;>;);out;`: the entity plus everything it references.
pub fn build_boundary_query(entity: &OsmEntity) -> String {
    format!("{}({});(._;>;);out;", entity.kind, entity.id)
}

pub fn build_graph_query(city_name: &str) -> String {
    let city = escape_sparql_literal(city_name);
    [
        "PREFIX geo: <http://www.w3.org/2003/01/geo/wgs84_pos#>",
        "PREFIX dbo: <http://dbpedia.org/ontology/>",
        "PREFIX dbp: <http://dbpedia.org/property/>",
        "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>",
        "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>",
        "SELECT ?name ?univ ?lat ?long ?students ?website WHERE {",
        "?p rdf:type dbo:Place.",
        "?p rdfs:label ?name.",
        "?u dbo:campus ?p.",
        "?u geo:lat ?lat.",
        "?u geo:long ?long.",
        "?u rdfs:label ?univ",
        "OPTIONAL {?u dbo:numberOfStudents ?students}.",
        "OPTIONAL {?u dbp:website ?website}.",
        "FILTER(LANG(?name) = \"en\").",
        &format!("FILTER(?name = \"{}\"@en).", city),
        "FILTER(LANG(?univ) = \"en\")",
        "}",
    ]
    .join(" ")
}

pub fn build_filter_query(city_name: &str, timeout_seconds: u64) -> String {
    format!(
        "[out:json][timeout:{}];\n\
         area[\"boundary\"~\"administrative\"][\"name\"~\"{}\"];\n\
         node(area)[\"amenity\"~\"university\"];\n\
         out;",
        timeout_seconds,
        escape_overpass_regex(city_name)
    )
}

/// Escapes a value for a double-quoted SPARQL string literal (`ECHAR`).
pub fn escape_sparql_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{08}' => escaped.push_str("\\b"),
            '\u{0C}' => escaped.push_str("\\f"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Turns a value into a literal-substring regex inside an Overpass QL string.
///
/// Only POSIX ERE metacharacters get a backslash; `-`, `&` and friends pass
/// through so hyphenated names go out unchanged.
pub fn escape_overpass_regex(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len());
    for c in value.chars() {
        if ERE_METACHARACTERS.contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }

    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OsmType;

    #[test]
    fn test_boundary_query() {
        let entity = OsmEntity::new(OsmType::Relation, 120965);
        assert_eq!(
            build_boundary_query(&entity),
            "relation(120965);(._;>;);out;"
        );
    }

    #[test]
    fn test_filter_query_for_lyon() {
        let query = build_filter_query("Lyon", DEFAULT_FILTER_TIMEOUT_SECONDS);
        assert!(query.starts_with("[out:json][timeout:60];"));
        assert!(query.contains(r#"area["boundary"~"administrative"]["name"~"Lyon"]"#));
        assert!(query.contains(r#"node(area)["amenity"~"university"]"#));
        assert!(query.ends_with("out;"));
    }

    #[test]
    fn test_filter_query_custom_timeout() {
        let query = build_filter_query("Lyon", 25);
        assert!(query.starts_with("[out:json][timeout:25];"));
    }

    #[test]
    fn test_filter_query_escapes_name() {
        let query = build_filter_query("St. Louis\"];out;", 60);
        // 名稱不得跳出字串字面量
        assert!(query.contains(r#"["name"~"St\\. Louis\"\\]"#));
        assert_eq!(query.matches("out;").count(), 2);
    }

    #[test]
    fn test_filter_query_keeps_hyphenated_name() {
        let query = build_filter_query("Aix-en-Provence", 60);
        assert!(query.contains(r#"["name"~"Aix-en-Provence"]"#));

        let query = build_filter_query("Saint-Étienne & #1 ~", 60);
        assert!(query.contains(r#"["name"~"Saint-Étienne & #1 ~"]"#));
    }

    #[test]
    fn test_escape_overpass_regex_metacharacters() {
        assert_eq!(escape_overpass_regex("a.b"), r"a\\.b");
        assert_eq!(escape_overpass_regex("(x)|y*"), r"\\(x\\)\\|y\\*");
        assert_eq!(escape_overpass_regex("^[1]{2}+?$"), r"\\^\\[1\\]\\{2\\}\\+\\?\\$");
        assert_eq!(escape_overpass_regex(r"a\b"), r"a\\\\b");
    }

    #[test]
    fn test_graph_query_for_plain_name() {
        let query = build_graph_query("Lyon");
        assert!(query.contains(r#"FILTER(?name = "Lyon"@en)."#));
        assert!(query.contains(r#"FILTER(LANG(?name) = "en")"#));
        assert!(query.contains("OPTIONAL {?u dbo:numberOfStudents ?students}"));
        assert!(query.contains("OPTIONAL {?u dbp:website ?website}"));
        assert!(query.contains("SELECT ?name ?univ ?lat ?long ?students ?website WHERE {"));
    }

    #[test]
    fn test_graph_query_escapes_quotes() {
        let query = build_graph_query("x\" || true) . #");
        assert!(query.contains(r#"FILTER(?name = "x\" || true) . #"@en)."#));
    }

    #[test]
    fn test_builders_are_deterministic() {
        assert_eq!(build_graph_query("Paris"), build_graph_query("Paris"));
        assert_eq!(build_filter_query("Paris", 60), build_filter_query("Paris", 60));
    }

    #[test]
    fn test_escape_sparql_literal() {
        assert_eq!(escape_sparql_literal("a\\b"), "a\\\\b");
        assert_eq!(escape_sparql_literal("l'Isle\n"), "l\\'Isle\\n");
    }
}
