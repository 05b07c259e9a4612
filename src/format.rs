use std::collections::BTreeMap;

use serde_json::Value;

use crate::diag::DiagnosticSink;

/// Render a structured property value into the flat string map attached to
/// an outbound telemetry record.
///
/// **Parameters**
/// - `key`: target property name, already simplified by the caller. Not
///   re-validated here.
/// - `value`: the typed value captured from the event, or `None` when the
///   field carried no value at all.
/// - `properties`: the record's property map, mutated by insertion only.
/// - `diag`: receives a note when an insertion is refused.
///
/// **Behavior**
///
/// An absent value becomes the empty string. Anything else is rendered to
/// its JSON text; when that text is a quoted string literal the two
/// boundary quotes are stripped so that plain strings arrive at the backend
/// unquoted (`"hello"` becomes `hello`). Objects, arrays, numbers, booleans
/// and `null` keep their JSON text verbatim.
///
/// The stripping is positional only. The interior of the literal is left
/// exactly as serialized, so escape sequences such as `\"` survive
/// untouched. Backends receive the raw serialized interior.
///
/// Never fails: the one anomaly this function recognizes (the key is
/// already present) is reported through `diag` and otherwise ignored.
pub fn write_value(
    key: &str,
    value: Option<&Value>,
    properties: &mut BTreeMap<String, String>,
    diag: &dyn DiagnosticSink,
) {
    let Some(value) = value else {
        append_property(properties, key, String::new(), diag);
        return;
    };

    let mut serialized = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            // Unreachable for tree-shaped `Value`s; keep the void contract
            // anyway and fall back to an empty property.
            diag.report(format_args!(
                "failed to serialize value for key {}: {}",
                key, e
            ));
            String::new()
        }
    };

    if serialized.len() >= 2
        && serialized.as_bytes()[0] == b'"'
        && serialized.as_bytes()[serialized.len() - 1] == b'"'
    {
        serialized.pop();
        serialized.remove(0);
    }

    append_property(properties, key, serialized, diag);
}

/// Insert `(key, value)` unless the key is already taken.
///
/// The first writer for a key wins; later attempts leave the map untouched
/// and surface only as a diagnostic line.
fn append_property(
    properties: &mut BTreeMap<String, String>,
    key: &str,
    value: String,
    diag: &dyn DiagnosticSink,
) {
    if properties.contains_key(key) {
        diag.report(format_args!(
            "the key {} is not unique after simplification, ignoring new value {}",
            key, value
        ));
        return;
    }
    properties.insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::test_support::CapturingDiagnostics;
    use crate::diag::NoopDiagnostics;
    use serde_json::json;

    fn format_one(value: Option<&Value>) -> String {
        let mut properties = BTreeMap::new();
        write_value("k", value, &mut properties, &NoopDiagnostics);
        properties.remove("k").expect("value inserted")
    }

    #[test]
    fn string_values_lose_their_boundary_quotes() {
        assert_eq!(format_one(Some(&json!("hello"))), "hello");
        assert_eq!(format_one(Some(&json!(""))), "");
    }

    #[test]
    fn non_string_values_keep_their_json_text() {
        assert_eq!(format_one(Some(&json!(42))), "42");
        assert_eq!(format_one(Some(&json!(true))), "true");
        assert_eq!(format_one(Some(&json!(null))), "null");
        assert_eq!(format_one(Some(&json!({"a": 1}))), r#"{"a":1}"#);
        assert_eq!(format_one(Some(&json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn absent_value_becomes_empty_string() {
        assert_eq!(format_one(None), "");
    }

    #[test]
    fn existing_key_is_never_overwritten() {
        let mut properties = BTreeMap::new();
        properties.insert("K".to_string(), "V1".to_string());

        let diag = CapturingDiagnostics::default();
        write_value("K", Some(&json!("V2")), &mut properties, &diag);

        assert_eq!(properties.get("K").map(String::as_str), Some("V1"));
        let lines = diag.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("K"));
        assert!(lines[0].contains("V2"));
    }

    #[test]
    fn duplicate_protection_also_covers_the_absent_path() {
        let mut properties = BTreeMap::new();
        properties.insert("K".to_string(), "V1".to_string());

        let diag = CapturingDiagnostics::default();
        write_value("K", None, &mut properties, &diag);

        assert_eq!(properties.get("K").map(String::as_str), Some("V1"));
        assert_eq!(diag.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn quote_stripping_is_positional_not_escape_aware() {
        // Serializes to "a\"b" (6 chars); only the boundary quotes go,
        // the interior escape stays as-is.
        let serialized = serde_json::to_string(&json!("a\"b")).unwrap();
        assert_eq!(serialized, r#""a\"b""#);

        let formatted = format_one(Some(&json!("a\"b")));
        assert_eq!(formatted, r#"a\"b"#);
        assert_eq!(formatted.len(), serialized.len() - 2);
    }

    #[test]
    fn mixed_properties_round_trip() {
        let mut properties = BTreeMap::new();
        let diag = NoopDiagnostics;

        write_value("name", Some(&json!("Alice")), &mut properties, &diag);
        write_value("age", Some(&json!(30)), &mut properties, &diag);
        write_value("tags", Some(&json!(["x", "y"])), &mut properties, &diag);

        assert_eq!(properties.len(), 3);
        assert_eq!(properties["name"], "Alice");
        assert_eq!(properties["age"], "30");
        assert_eq!(properties["tags"], r#"["x","y"]"#);
    }
}
