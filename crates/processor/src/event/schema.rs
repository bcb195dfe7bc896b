//! Schema consistency enforcement.
//!
//! Downstream consumers expect `app_version`, `ip` and `locale` on every
//! event. Missing ones are filled with an empty string; present ones are left
//! exactly as received, whatever their type.

use serde_json::{Map, Value};

use super::ParsedEvent;

/// Fields every republished event carries
pub const SCHEMA_FIELDS: [&str; 3] = ["app_version", "ip", "locale"];

/// Fill missing schema fields on a validated event. Idempotent.
pub fn ensure_schema_consistency(mut event: ParsedEvent) -> ParsedEvent {
    for slot in [&mut event.app_version, &mut event.ip, &mut event.locale] {
        slot.get_or_insert_with(empty);
    }
    event
}

/// Fill missing schema fields on a raw JSON map. Idempotent.
pub fn fill_schema_fields(map: &mut Map<String, Value>) {
    for field in SCHEMA_FIELDS {
        map.entry(field).or_insert_with(empty);
    }
}

fn empty() -> Value {
    Value::String(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::validate;
    use proptest::prelude::*;
    use serde_json::json;

    fn base_event() -> ParsedEvent {
        let map = match json!({"user_id": "u", "device_id": "d", "timestamp": "t"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        validate(map).unwrap()
    }

    #[test]
    fn test_all_fields_present() {
        let mut map = Map::new();
        map.insert("app_version".into(), json!("1.0"));
        map.insert("ip".into(), json!("127.0.0.1"));
        map.insert("locale".into(), json!("en_US"));
        let before = map.clone();

        fill_schema_fields(&mut map);
        assert_eq!(map, before);
    }

    #[test]
    fn test_missing_field() {
        let mut map = Map::new();
        map.insert("app_version".into(), json!("1.0"));
        map.insert("ip".into(), json!("127.0.0.1"));

        fill_schema_fields(&mut map);
        assert_eq!(map["locale"], json!(""));
        assert_eq!(map["app_version"], json!("1.0"));
        assert_eq!(map["ip"], json!("127.0.0.1"));
    }

    #[test]
    fn test_empty_map() {
        let mut map = Map::new();
        fill_schema_fields(&mut map);

        assert_eq!(map.len(), 3);
        for field in SCHEMA_FIELDS {
            assert_eq!(map[field], json!(""));
        }
    }

    #[test]
    fn test_parsed_event_fill() {
        let mut event = base_event();
        event.ip = Some(Value::Null);

        let event = ensure_schema_consistency(event);
        assert_eq!(event.app_version, Some(json!("")));
        assert_eq!(event.ip, Some(Value::Null));
        assert_eq!(event.locale, Some(json!("")));
    }

    fn schema_subset() -> impl Strategy<Value = Map<String, Value>> {
        (
            proptest::option::of("[a-z0-9.]{0,8}"),
            proptest::option::of("[0-9.]{0,15}"),
            proptest::option::of("[a-z_A-Z]{0,5}"),
            proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..4),
        )
            .prop_map(|(app_version, ip, locale, extra)| {
                let mut map = Map::new();
                for (key, value) in extra {
                    map.insert(key, json!(value));
                }
                for (key, value) in [("app_version", app_version), ("ip", ip), ("locale", locale)] {
                    if let Some(value) = value {
                        map.insert(key.to_string(), json!(value));
                    }
                }
                map
            })
    }

    proptest! {
        #[test]
        fn prop_fills_exactly_the_missing_fields(map in schema_subset()) {
            let mut filled = map.clone();
            fill_schema_fields(&mut filled);

            for field in SCHEMA_FIELDS {
                match map.get(field) {
                    Some(original) => prop_assert_eq!(&filled[field], original),
                    None => prop_assert_eq!(&filled[field], &json!("")),
                }
            }
            for (key, value) in &map {
                prop_assert_eq!(filled.get(key), Some(value));
            }
            let missing = SCHEMA_FIELDS.iter().filter(|f| !map.contains_key(**f)).count();
            prop_assert_eq!(filled.len(), map.len() + missing);
        }

        #[test]
        fn prop_fill_is_idempotent(map in schema_subset()) {
            let mut once = map.clone();
            fill_schema_fields(&mut once);
            let mut twice = once.clone();
            fill_schema_fields(&mut twice);

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_event_enforcer_is_idempotent(
            app_version in proptest::option::of("[a-z0-9.]{0,8}"),
            locale in proptest::option::of("[a-z_]{0,5}"),
        ) {
            let mut event = base_event();
            event.app_version = app_version.map(Value::String);
            event.locale = locale.map(Value::String);

            let once = ensure_schema_consistency(event);
            let twice = ensure_schema_consistency(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
