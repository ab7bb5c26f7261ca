// Behavioral tests run against every storage engine.
use std::sync::Arc;

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tristore::{
    Column, ConflictPolicy, Database, Direction, MemoryEngine, MetadataResolver, Record,
    RecordMeta, RecordTable, Registry, StorageEngine, StoreError, TableConfig, TableMeta,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    meta: RecordMeta,
    sensor: String,
    value: f64,
}

impl Record for Reading {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

fn reading(id: &str, record_type: &str, created: i64) -> Reading {
    Reading {
        meta: RecordMeta::with_id(id)
            .with_type(record_type)
            .with_created_at(created),
        sensor: format!("sensor-{id}"),
        value: 0.5,
    }
}

fn ids(readings: &[Reading]) -> Vec<String> {
    readings
        .iter()
        .filter_map(|r| r.meta.id().map(str::to_string))
        .collect()
}

/// Runs `check` once per engine, each on a fresh engine.
fn for_each_engine(check: impl Fn(Arc<dyn StorageEngine>)) {
    check(Arc::new(MemoryEngine::new()));

    #[cfg(feature = "redb")]
    {
        let dir = tempfile::tempdir().unwrap();
        let engine = tristore::RedbEngine::open(dir.path().join("store.redb")).unwrap();
        check(Arc::new(engine));
    }
}

fn open(engine: &Arc<dyn StorageEngine>, version: u32) -> RecordTable<Reading> {
    RecordTable::open(
        Arc::clone(engine),
        &TableConfig::new("plant", "readings").with_version(version),
    )
    .unwrap()
}

#[test]
fn round_trip_preserves_record() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        let stored = reading("k1", "temp", 1_700_000_000_000);

        table.put(&stored).unwrap();
        assert_eq!(table.get("k1").unwrap(), Some(stored));
        assert_eq!(table.get("k2").unwrap(), None);
    });
}

#[test]
fn conflict_policy_matrix() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        table.put(&reading("k", "first", 1)).unwrap();

        for policy in [
            ConflictPolicy::Abort,
            ConflictPolicy::Fail,
            ConflictPolicy::Rollback,
        ] {
            let err = table
                .put_with(&reading("k", "second", 2), policy)
                .unwrap_err();
            assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        }
        table
            .put_with(&reading("k", "second", 2), ConflictPolicy::Ignore)
            .unwrap();
        assert_eq!(
            table.get("k").unwrap().unwrap().meta.record_type(),
            Some("first")
        );

        table
            .put_with(&reading("k", "third", 3), ConflictPolicy::Replace)
            .unwrap();
        assert_eq!(
            table.get("k").unwrap().unwrap().meta.record_type(),
            Some("third")
        );
        assert_eq!(table.count().unwrap(), 1);
    });
}

#[test]
fn delete_twice_is_a_noop() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        table.put(&reading("k", "t", 1)).unwrap();

        assert!(table.delete("k").unwrap());
        assert!(!table.delete("k").unwrap());
        assert_eq!(table.count().unwrap(), 0);
    });
}

#[test]
fn id_range_is_lexicographic() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        for id in ["9", "10", "11", "100"] {
            table.put(&reading(id, "t", 1)).unwrap();
        }

        // "9" sorts after "10", so the numerically sensible range is empty.
        assert!(table.between_ids("9", "10").unwrap().is_empty());
        assert_eq!(
            ids(&table.between_ids("10", "9").unwrap()),
            vec!["10", "100", "11", "9"]
        );
        assert_eq!(
            ids(&table.between_ids("10", "11").unwrap()),
            vec!["10", "100", "11"]
        );
    });
}

#[test]
fn order_then_limit() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        for (id, created) in [("a", 1), ("b", 2), ("c", 3)] {
            table.put(&reading(id, "t", created)).unwrap();
        }

        let mut builder = table.query();
        builder.order(Column::Created, Direction::Desc).limit(2);
        let created: Vec<i64> = builder
            .build()
            .query()
            .unwrap()
            .iter()
            .map(|r| r.meta.created_at())
            .collect();
        assert_eq!(created, vec![3, 2]);
    });
}

#[test]
fn compiled_predicate_renders_in_fixed_order() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        let mut builder = table.query();
        assert_eq!(builder.build().to_string(), "");

        builder.record_type("A").id_to("200").id_from("100");
        assert_eq!(
            builder.build().to_string(),
            "(id BETWEEN '100' AND '200') AND (type = 'A')"
        );
    });
}

#[test]
fn cached_builder_leaks_constraints_until_reset() {
    for_each_engine(|engine| {
        let table = open(&engine, 1);
        table.put(&reading("a", "A", 1)).unwrap();
        table.put(&reading("b", "B", 2)).unwrap();

        let mut builder = table.query();
        builder.cache_query(true);

        builder.record_type("A");
        assert_eq!(ids(&builder.build().query().unwrap()), vec!["a"]);

        // Not reset: the type constraint is still there.
        builder.id_from("a").id_to("z");
        assert_eq!(ids(&builder.build().query().unwrap()), vec!["a"]);

        builder.reset().id_from("a").id_to("z");
        assert_eq!(ids(&builder.build().query().unwrap()), vec!["a", "b"]);
    });
}

#[test]
fn schema_bump_recreates_table() {
    for_each_engine(|engine| {
        open(&engine, 1).put(&reading("a", "t", 1)).unwrap();
        assert_eq!(open(&engine, 1).count().unwrap(), 1);

        let bumped = open(&engine, 2);
        assert_eq!(bumped.count().unwrap(), 0);
        assert_eq!(bumped.schema_version().unwrap(), Some(2));

        let err = RecordTable::<Reading>::open(
            Arc::clone(&engine),
            &TableConfig::new("plant", "readings").with_version(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StoreError::SchemaDowngrade { .. }));
    });
}

#[test]
fn registry_wires_declared_tables() {
    for_each_engine(|engine| {
        let mut resolver = MetadataResolver::new();
        resolver.declare::<Reading>(TableMeta::new("plant", "readings"));

        let registry = Registry::new();
        let database = registry.register(
            Database::builder(engine)
                .add_declared_table::<Reading>(&resolver)
                .unwrap()
                .build()
                .unwrap(),
        );
        assert_eq!(database.name(), "plant");

        registry.save(&reading("r1", "temp", 10)).unwrap();
        registry.save(&reading("r2", "humidity", 20)).unwrap();

        let mut builder = registry.query::<Reading>().unwrap();
        builder.record_type("temp");
        assert_eq!(ids(&builder.build().query().unwrap()), vec!["r1"]);
        drop(builder);

        let loaded = registry.load::<Reading>("r2").unwrap().unwrap();
        assert!(registry.remove(&loaded).unwrap());
        assert_eq!(registry.table::<Reading>().unwrap().count().unwrap(), 1);
    });
}

#[cfg(feature = "redb")]
#[test]
fn redb_tables_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.redb");

    {
        let engine: Arc<dyn StorageEngine> = Arc::new(tristore::RedbEngine::open(&path).unwrap());
        open(&engine, 3).put(&reading("kept", "t", 5)).unwrap();
    }

    let engine: Arc<dyn StorageEngine> = Arc::new(tristore::RedbEngine::open(&path).unwrap());
    let table = open(&engine, 3);
    assert_eq!(table.get("kept").unwrap(), Some(reading("kept", "t", 5)));
    assert_eq!(table.schema_version().unwrap(), Some(3));
}

proptest! {
    #[test]
    fn between_ids_agrees_with_string_comparison(
        stored in proptest::collection::btree_set("[0-9]{1,3}", 0..12),
        from in "[0-9]{1,3}",
        to in "[0-9]{1,3}",
    ) {
        let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        let table = open(&engine, 1);
        for id in &stored {
            table.put(&reading(id, "t", 1)).unwrap();
        }

        let expected: Vec<String> = stored
            .iter()
            .filter(|id| from.as_str() <= id.as_str() && id.as_str() <= to.as_str())
            .cloned()
            .collect();
        prop_assert_eq!(ids(&table.between_ids(&from, &to).unwrap()), expected);
    }
}
