use super::*;
use crate::{
    codec::{SortOrder, encode_value},
    error::ErrorClass,
    key::RowKey,
    kv::MemoryKv,
    mutation::PAYLOAD_QUALIFIER,
    row::{Row, RowId},
    schema::ColumnType,
    table::{QueryKey, QueryType},
};

const U1: RowId = RowId::from_u128(0x0190_0000_0000_0000_0000_0000_0000_0001);
const U2: RowId = RowId::from_u128(0x0190_0000_0000_0000_0000_0000_0000_0002);

fn schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new("a", ColumnType::SignedInt),
        ColumnSchema::new("b", ColumnType::String).with_max_length(8),
    ])
    .with_index(IndexSchema::new("by_b", ["b"]))
}

fn store() -> Store<MemoryKv> {
    let store = Store::new(MemoryKv::new());
    store.create_table("t", &schema()).expect("create");

    store
}

fn row(id: RowId, a: i64, b: &str) -> Row {
    Row::new(id).with("a", a.to_be_bytes()).with("b", b.as_bytes())
}

fn b_values(store: &Store<MemoryKv>, descending: bool) -> Vec<String> {
    let table = store.open_table("t").expect("open");
    let scanner = if descending {
        table.descending_index_scan("by_b")
    } else {
        table.ascending_index_scan("by_b")
    }
    .expect("scan");

    scanner
        .map(|row| {
            let row = row.expect("row");
            String::from_utf8(row.get("b").expect("b").to_vec()).expect("utf8")
        })
        .collect()
}

#[test]
fn insert_is_three_physical_writes() {
    let store = store();
    store.kv().reset_stats();

    store
        .open_table("t")
        .expect("open")
        .insert_row(&row(U1, -5, "foo"))
        .expect("insert");

    let stats = store.kv().stats();
    assert_eq!(stats.puts, 3);
    assert_eq!(stats.deletes, 0);
}

#[test]
fn index_scans_order_by_value() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 1, "foo")).expect("insert");
    table.insert_row(&row(U2, 2, "bar")).expect("insert");

    assert_eq!(b_values(&store, false), ["bar", "foo"]);
    assert_eq!(b_values(&store, true), ["foo", "bar"]);
}

#[test]
fn negative_signed_ints_sort_first() {
    let column = ColumnSchema::new("a", ColumnType::SignedInt);
    let minus_one = encode_value(&column, &(-1i64).to_be_bytes(), SortOrder::Ascending)
        .expect("encode");
    let one = encode_value(&column, &1i64.to_be_bytes(), SortOrder::Ascending).expect("encode");

    assert!(minus_one < one);
}

#[test]
fn auto_inc_increments_accumulate() {
    let store = store();

    assert_eq!(store.increment_auto_inc("t", 5).expect("inc"), 5);
    assert_eq!(store.increment_auto_inc("t", 1).expect("inc"), 6);
    assert_eq!(store.get_auto_inc("t").expect("get"), 6);
}

#[test]
fn stale_index_creations_race_to_one_winner() {
    let store = store();
    let table_id = store.open_table("t").expect("open").id();
    let metadata = store.metadata();

    let first = metadata.read_schema_snapshot(table_id).expect("snapshot");
    let second = metadata.read_schema_snapshot(table_id).expect("snapshot");

    metadata
        .create_table_index_with_snapshot(&first, IndexSchema::new("by_a", ["a"]))
        .expect("first wins");
    for _ in 0..2 {
        let err = metadata
            .create_table_index_with_snapshot(&second, IndexSchema::new("by_a_b", ["a", "b"]))
            .expect_err("stale");
        assert!(err.is_conflict());
    }

    store.cache().invalidate_schema(table_id);
    let schema = store.get_schema("t").expect("schema");
    assert!(schema.index("by_a").is_some());
    assert!(schema.index("by_a_b").is_none());
}

#[test]
fn deleted_row_leaves_no_index_entries() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, -5, "foo")).expect("insert");
    table.insert_row(&row(U2, 3, "bar")).expect("insert");

    table.delete_row(U1).expect("delete");

    for scanner in [
        table.ascending_index_scan("by_b").expect("asc"),
        table.descending_index_scan("by_b").expect("desc"),
        table.table_scan().expect("table"),
    ] {
        let ids: Vec<RowId> = scanner.map(|row| row.expect("row").id()).collect();
        assert_eq!(ids, [U2]);
    }
    assert!(table.get_row(U1).expect_err("gone").is_not_found());
}

#[test]
fn delete_table_removes_rows_and_metadata() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, -5, "foo")).expect("insert");
    store.increment_auto_inc("t", 3).expect("inc");
    store.increment_row_count("t", 1).expect("count");

    store.delete_table("t").expect("drop");

    assert!(store.open_table("t").err().expect("gone").is_not_found());
    // Only the global table-id counter survives.
    assert_eq!(store.kv().len(), 1);

    store.create_table("t", &schema()).expect("recreate");
    assert_eq!(store.get_auto_inc("t").expect("auto inc"), 0);
    assert!(
        store
            .open_table("t")
            .expect("open")
            .table_scan()
            .expect("scan")
            .next()
            .is_none()
    );
}

#[test]
fn rename_moves_the_name() {
    let store = store();
    let table_id = store.open_table("t").expect("open").id();

    store.rename_table("t", "u").expect("rename");

    assert!(store.open_table("t").err().expect("old name").is_not_found());
    assert_eq!(store.open_table("u").expect("new name").id(), table_id);
}

#[test]
fn set_auto_inc_only_raises() {
    let store = store();

    store.set_auto_inc("t", 10).expect("raise");
    store.set_auto_inc("t", 4).expect("ignored");
    assert_eq!(store.get_auto_inc("t").expect("get"), 10);

    store.truncate_auto_inc("t").expect("truncate");
    assert_eq!(store.get_auto_inc("t").expect("get"), 1);
}

#[test]
fn row_count_tracks_deltas() {
    let store = store();

    assert_eq!(store.get_row_count("t").expect("get"), 0);
    assert_eq!(store.increment_row_count("t", 4).expect("inc"), 4);
    assert_eq!(store.increment_row_count("t", -1).expect("dec"), 3);
    assert_eq!(store.get_row_count("t").expect("get"), 3);

    store.truncate_row_count("t").expect("truncate");
    assert_eq!(store.get_row_count("t").expect("get"), 0);
}

#[test]
fn added_index_is_backfilled() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 9, "foo")).expect("insert");
    table.insert_row(&row(U2, -3, "bar")).expect("insert");

    store
        .add_index("t", IndexSchema::new("by_a", ["a"]))
        .expect("add index");

    let ids: Vec<RowId> = table
        .ascending_index_scan("by_a")
        .expect("scan")
        .map(|row| row.expect("row").id())
        .collect();
    assert_eq!(ids, [U2, U1]);
}

#[test]
fn dropped_index_entries_are_removed() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 9, "foo")).expect("insert");
    let before = store.kv().len();

    store.drop_index("t", "by_b").expect("drop");

    assert_eq!(store.kv().len(), before - 2);
    assert!(
        table
            .ascending_index_scan("by_b")
            .err()
            .expect("index gone")
            .is_not_found()
    );
}

#[test]
fn dropped_column_is_hidden_from_reads() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 9, "foo")).expect("insert");

    store
        .add_column("t", ColumnSchema::new("c", ColumnType::UnsignedInt))
        .expect("add");
    store.drop_column("t", "a").expect("drop");

    let row = table.get_row(U1).expect("row");
    assert_eq!(row.get("a"), None);
    assert_eq!(row.get("b"), Some(&b"foo"[..]));
    assert!(store.get_schema("t").expect("schema").column("c").is_some());
}

#[test]
fn readded_column_starts_out_null() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 9, "foo")).expect("insert");

    store.drop_column("t", "a").expect("drop");
    store
        .add_column(
            "t",
            ColumnSchema::new("a", ColumnType::String).with_max_length(4),
        )
        .expect("re-add");

    assert_eq!(table.get_row(U1).expect("row").get("a"), None);
    for row in table.ascending_index_scan("by_b").expect("scan") {
        assert_eq!(row.expect("row").get("a"), None);
    }

    store
        .add_index("t", IndexSchema::new("by_a", ["a"]))
        .expect("index over the new column");
    let nulls = QueryKey::new("by_a", QueryType::ExactKey).with_null("a");
    let ids: Vec<RowId> = table
        .index_scan_exact(&nulls)
        .expect("exact")
        .map(|row| row.expect("row").id())
        .collect();
    assert_eq!(ids, [U1]);
}

#[test]
fn drop_column_rewrites_rows_older_than_a_required_column() {
    let store = store();
    let table = store.open_table("t").expect("open");
    table.insert_row(&row(U1, 9, "foo")).expect("insert");

    store
        .add_column(
            "t",
            ColumnSchema::new("c", ColumnType::UnsignedInt).not_null(),
        )
        .expect("add");
    store.drop_column("t", "a").expect("drop");

    let row = table.get_row(U1).expect("row");
    assert_eq!(row.get("a"), None);
    assert_eq!(row.get("b"), Some(&b"foo"[..]));
}

#[test]
fn delete_table_removes_entries_of_forgotten_indices() {
    let store = store();
    let table = store.open_table("t").expect("open");
    let table_id = table.id();
    table.insert_row(&row(U1, 1, "foo")).expect("insert");

    // An insert lands between clearing the entries and removing the definition.
    table.delete_table_index("by_b").expect("clear entries");
    table.insert_row(&row(U2, 2, "bar")).expect("insert");
    store
        .metadata()
        .delete_table_index(table_id, "by_b")
        .expect("drop definition");
    store.cache().invalidate_schema(table_id);

    store.delete_table("t").expect("drop");

    // Only the global table-id counter survives.
    assert_eq!(store.kv().len(), 1);
}

#[test]
fn failed_backfill_removes_the_index() {
    let config = StoreConfig {
        scan_batch_size: 1,
        ..StoreConfig::default()
    };
    let store = Store::with_config(Arc::new(MemoryKv::new()), config).expect("store");
    store.create_table("t", &schema()).expect("create");
    let table = store.open_table("t").expect("open");
    let table_id = table.id();
    table.insert_row(&row(U1, 1, "foo")).expect("insert");

    let junk = RowKey::Data {
        table_id,
        row_id: Some(U2),
    };
    store
        .kv()
        .put(&junk.encode(), PAYLOAD_QUALIFIER, b"junk")
        .expect("put");
    let before = store.kv().len();

    let err = store
        .add_index("t", IndexSchema::new("by_a", ["a"]))
        .expect_err("backfill hits the bad row");
    assert_eq!(err.class, ErrorClass::Corruption);

    assert_eq!(store.kv().len(), before);
    assert!(store.get_schema("t").expect("schema").index("by_a").is_none());
    assert!(
        !store
            .metadata()
            .get_index_ids(table_id)
            .expect("ids")
            .contains_key("by_a")
    );
    assert!(table.ascending_index_scan("by_a").err().expect("gone").is_not_found());
}

#[test]
fn indexed_column_cannot_be_dropped() {
    let store = store();

    let err = store.drop_column("t", "b").expect_err("indexed");
    assert_eq!(err.class, ErrorClass::Precondition);
}

#[test]
fn zero_batch_size_is_rejected() {
    let config = StoreConfig {
        scan_batch_size: 0,
        ..StoreConfig::default()
    };

    let err = Store::with_config(Arc::new(MemoryKv::new()), config)
        .err()
        .expect("invalid");
    assert_eq!(err.origin, crate::error::ErrorOrigin::Config);
}
