//! Property-based tests for the query layer using proptest

use proptest::prelude::*;
use supply_chain_risk::prelude::*;

// ============================================================================
// Row Fidelity Tests
// ============================================================================

#[cfg(feature = "sqlite")]
mod row_fidelity {
    use super::*;
    use std::sync::Arc;

    fn executor() -> QueryExecutor {
        let manager = ConnectionManager::new(Arc::new(SqliteConnector::new(":memory:")));
        QueryExecutor::new(Arc::new(manager))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Reads return exactly the stored rows, in insertion order
        #[test]
        fn test_read_returns_stored_rows(
            rows in prop::collection::vec(("[A-Za-z0-9 ]{0,16}", any::<i64>()), 0..20)
        ) {
            let read = tokio_test::block_on(async {
                let executor = executor();
                executor
                    .execute_write(
                        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, value INTEGER)",
                        &[],
                    )
                    .await?;
                for (name, value) in &rows {
                    executor
                        .execute_write(
                            "INSERT INTO items (name, value) VALUES (?, ?)",
                            &[name.as_str().into(), (*value).into()],
                        )
                        .await?;
                }
                let read = executor
                    .fetch_all("SELECT name, value FROM items ORDER BY id", &[])
                    .await?;
                Ok::<_, DatabaseError>(read)
            })
            .unwrap();

            prop_assert_eq!(read.len(), rows.len());
            for (row, (name, value)) in read.iter().zip(&rows) {
                prop_assert_eq!(row.get("name").and_then(|v| v.as_str()), Some(name.as_str()));
                prop_assert_eq!(row.get("value").and_then(|v| v.as_long()), Some(*value));
                prop_assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["name", "value"]);
            }
        }
    }
}

// ============================================================================
// DatabaseRow Tests
// ============================================================================

proptest! {
    /// Column order survives insertion, lookup and JSON serialization
    #[test]
    fn test_row_preserves_column_order(
        columns in prop::collection::btree_set("[a-z]{3,10}", 1..12)
    ) {
        // Reverse alphabetical, so a sorted map would change the order
        let names: Vec<String> = columns.into_iter().rev().collect();
        let row: DatabaseRow = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), DatabaseValue::from(i as i64)))
            .collect();

        prop_assert_eq!(row.column_names().collect::<Vec<_>>(), names.iter().map(String::as_str).collect::<Vec<_>>());

        let json = serde_json::to_string(&row).unwrap();
        let mut last = 0;
        for name in &names {
            let pos = json.find(&format!("\"{name}\"")).unwrap();
            prop_assert!(pos >= last);
            last = pos;
        }
    }

    /// Inserting an existing column replaces its value in place
    #[test]
    fn test_row_insert_overwrites(first in any::<i64>(), second in any::<i64>()) {
        let mut row = DatabaseRow::new();
        row.insert("a", first.into());
        row.insert("b", DatabaseValue::Null);
        row.insert("a", second.into());

        prop_assert_eq!(row.len(), 2);
        prop_assert_eq!(row.get("a").and_then(|v| v.as_long()), Some(second));
        prop_assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}

// ============================================================================
// JSON Rendering Tests
// ============================================================================

proptest! {
    /// Integers render as JSON numbers with the same value
    #[test]
    fn test_long_renders_as_number(value in any::<i64>()) {
        prop_assert_eq!(DatabaseValue::from(value).to_json(), serde_json::json!(value));
    }

    /// Timestamps render as `YYYY-MM-DD HH:MM:SS`
    #[test]
    fn test_timestamp_renders_as_datetime(seconds in 0i64..4_000_000_000) {
        let rendered = DatabaseValue::Timestamp(seconds * 1_000_000).to_json();
        let text = rendered.as_str().unwrap();
        prop_assert_eq!(text.len(), 19);
        prop_assert!(chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    /// Serialization never fails, whatever the value
    #[test]
    fn test_json_serialization_no_panic(value in prop_oneof![
        any::<bool>().prop_map(DatabaseValue::from),
        any::<i32>().prop_map(DatabaseValue::from),
        any::<i64>().prop_map(DatabaseValue::from),
        any::<f64>().prop_map(DatabaseValue::from),
        ".*".prop_map(|s: String| DatabaseValue::from(s)),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(DatabaseValue::from),
    ]) {
        prop_assert!(serde_json::to_string(&value).is_ok());
    }
}

// ============================================================================
// Error Classification Tests
// ============================================================================

proptest! {
    /// Classification follows the variant, never the message text
    #[test]
    fn test_classification_ignores_message(message in ".*", code in proptest::option::of(any::<u16>())) {
        prop_assert_eq!(DatabaseError::connection_lost(code, message.clone()).kind(), ErrorKind::Connection);
        prop_assert_eq!(DatabaseError::query(message.clone()).kind(), ErrorKind::Query);
        prop_assert_eq!(DatabaseError::configuration(message.clone()).kind(), ErrorKind::Configuration);
        prop_assert_eq!(DatabaseError::transaction(message).kind(), ErrorKind::Query);
    }

    /// A query error that merely mentions a lost connection is still query-class
    #[test]
    fn test_lookalike_messages_stay_query_class(code in prop_oneof![Just(2006u16), Just(2013), Just(2055)]) {
        let err = DatabaseError::query(format!("Lost connection to MySQL server ({code})"));
        prop_assert!(!err.is_connection_class());
    }

    /// Timeouts are connection-class
    #[test]
    fn test_timeouts_are_connection_class(ms in any::<u64>()) {
        prop_assert!(DatabaseError::connection_timeout(ms).is_connection_class());
        prop_assert!(DatabaseError::query_timeout(ms).is_connection_class());
    }
}
