use super::*;
use crate::{
    row::Records,
    schema::{ColumnSchema, ColumnType, IndexSchema, TableSchema},
};
use proptest::prelude::*;
use std::cmp::Ordering;

// Independent comparator over key fields, never looking at encoded bytes.
fn structural_cmp(a: &RowKey, b: &RowKey) -> Ordering {
    fn fields(key: &RowKey) -> (u8, Option<u64>, Option<u64>, Vec<u8>, Option<RowId>) {
        match key {
            RowKey::Tables => (prefix::TABLES, None, None, Vec::new(), None),
            RowKey::Columns { table_id } => (prefix::COLUMNS, Some(*table_id), None, Vec::new(), None),
            RowKey::Indices { table_id } => (prefix::INDICES, Some(*table_id), None, Vec::new(), None),
            RowKey::Schema {
                table_id,
                column_id,
            } => (prefix::SCHEMA, Some(*table_id), *column_id, Vec::new(), None),
            RowKey::AutoInc { table_id } => (prefix::AUTO_INC, Some(*table_id), None, Vec::new(), None),
            RowKey::RowCount { table_id } => {
                (prefix::ROW_COUNT, Some(*table_id), None, Vec::new(), None)
            }
            RowKey::Data { table_id, row_id } => {
                (prefix::DATA, Some(*table_id), None, Vec::new(), *row_id)
            }
            RowKey::AscIndex(key) => (
                prefix::ASC_INDEX,
                Some(key.table_id),
                Some(key.index_id),
                key.values.clone(),
                key.row_id,
            ),
            RowKey::DescIndex(key) => (
                prefix::DESC_INDEX,
                Some(key.table_id),
                Some(key.index_id),
                key.values.clone(),
                key.row_id,
            ),
        }
    }

    fields(a).cmp(&fields(b))
}

fn row_id_strategy() -> impl Strategy<Value = RowId> {
    (1u128..).prop_map(RowId::from_u128)
}

// Index values are fixed width within one index, as real encodings are.
fn row_key_strategy() -> impl Strategy<Value = RowKey> {
    let id = 0u64..5_000_000;
    prop_oneof![
        Just(RowKey::Tables),
        id.clone().prop_map(|table_id| RowKey::Columns { table_id }),
        id.clone().prop_map(|table_id| RowKey::Indices { table_id }),
        (id.clone(), proptest::option::of(any::<u64>())).prop_map(|(table_id, column_id)| {
            RowKey::Schema {
                table_id,
                column_id,
            }
        }),
        id.clone().prop_map(|table_id| RowKey::AutoInc { table_id }),
        id.clone().prop_map(|table_id| RowKey::RowCount { table_id }),
        (id.clone(), proptest::option::of(row_id_strategy()))
            .prop_map(|(table_id, row_id)| RowKey::Data { table_id, row_id }),
        (
            any::<bool>(),
            0u64..4,
            0u64..4,
            proptest::array::uniform4(any::<u8>()),
            row_id_strategy()
        )
            .prop_map(|(asc, table_id, index_id, values, row_id)| {
                let key = IndexKey {
                    table_id,
                    index_id,
                    values: values.to_vec(),
                    row_id: Some(row_id),
                };
                if asc {
                    RowKey::AscIndex(key)
                } else {
                    RowKey::DescIndex(key)
                }
            }),
    ]
}

// Native member values of `by_a_b` plus the row id.
type Member = (Option<i64>, Option<String>, u128);

fn member_strategy() -> impl Strategy<Value = Member> {
    (
        proptest::option::of(any::<i64>()),
        proptest::option::of("[a-z]{0,8}"),
        1u128..1_000,
    )
}

fn member_key(schema: &TableSchema, member: &Member, order: SortOrder) -> Vec<u8> {
    let (a, b, row_id) = member;
    let mut records = Records::new();
    records.insert("a".to_string(), a.map(|a| a.to_be_bytes().to_vec()));
    records.insert("b".to_string(), b.as_ref().map(|b| b.as_bytes().to_vec()));

    IndexRowKeyBuilder::new(1, 2)
        .with_order(order)
        .with_row_id(RowId::from_u128(*row_id))
        .with_row(&records, schema.index("by_a_b").expect("index"), schema)
        .build()
        .expect("key should build")
        .encode()
}

// Values in member order with NULL lowest; descending flips the values only.
fn native_cmp(x: &Member, y: &Member, order: SortOrder) -> Ordering {
    let values = (&x.0, &x.1).cmp(&(&y.0, &y.1));
    let values = match order {
        SortOrder::Ascending => values,
        SortOrder::Descending => values.reverse(),
    };

    values.then(x.2.cmp(&y.2))
}

fn people_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new("a", ColumnType::SignedInt),
        ColumnSchema::new("b", ColumnType::String).with_max_length(8),
    ])
    .with_index(IndexSchema::new("by_b", ["b"]))
    .with_index(IndexSchema::new("by_a_b", ["a", "b"]))
}

fn records(a: Option<i64>, b: Option<&str>) -> Records {
    let mut records = Records::new();
    if let Some(a) = a {
        records.insert("a".to_string(), Some(a.to_be_bytes().to_vec()));
    }
    records.insert("b".to_string(), b.map(|b| b.as_bytes().to_vec()));
    records
}

fn build(schema: &TableSchema, index: &str, records: &Records, order: SortOrder) -> Vec<u8> {
    let index = schema.index(index).expect("index exists");
    IndexRowKeyBuilder::new(1, 2)
        .with_order(order)
        .with_row_id(RowId::from_u128(9))
        .with_row(records, index, schema)
        .build()
        .expect("key should build")
        .encode()
}

#[test]
fn discriminants_order_catalog_before_data_before_index() {
    let keys = [
        RowKey::Tables,
        RowKey::Columns { table_id: 9 },
        RowKey::Indices { table_id: 9 },
        RowKey::Schema {
            table_id: 9,
            column_id: None,
        },
        RowKey::AutoInc { table_id: 9 },
        RowKey::RowCount { table_id: 9 },
        RowKey::data_floor(1),
        RowKey::index_floor(SortOrder::Ascending, 1, 1),
        RowKey::index_floor(SortOrder::Descending, 1, 1),
    ];

    let encoded: Vec<_> = keys.iter().map(RowKey::encode).collect();
    assert!(encoded.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn floor_sorts_before_every_extension() {
    let floor = RowKey::data_floor(7).encode();
    let row = RowKey::Data {
        table_id: 7,
        row_id: Some(RowId::from_u128(1)),
    }
    .encode();
    let next_table = RowKey::data_floor(8).encode();

    assert!(floor < row);
    assert!(row < next_table);
}

#[test]
fn decode_rejects_garbage() {
    assert_eq!(RowKey::decode(&[]), Err(KeyDecodeError::Empty));
    assert_eq!(
        RowKey::decode(&[0x42]),
        Err(KeyDecodeError::UnknownPrefix(0x42))
    );
    assert_eq!(
        RowKey::decode(&[prefix::DATA, 1, 3, 0xAA]),
        Err(KeyDecodeError::RowId { len: 1 })
    );
    assert_eq!(
        RowKey::decode(&[prefix::AUTO_INC, 1, 3, 0xAA]),
        Err(KeyDecodeError::Trailing { len: 1 })
    );
}

#[test]
fn next_id_rejects_max() {
    assert_eq!(next_id(41).expect("successor"), 42);
    assert!(next_id(u64::MAX).is_err());
}

#[test]
fn increment_key_carries() {
    assert_eq!(increment_key(&[0x07, 0x01, 0xFF]), Some(vec![0x07, 0x02, 0x00]));
    assert_eq!(increment_key(&[0xFF, 0xFF]), None);

    let prefix = vec![0x07, 0x01, 0xFF];
    let mut extension = prefix.clone();
    extension.extend_from_slice(&[0xFF; 20]);
    assert!(extension < increment_key(&prefix).expect("increment"));
}

#[test]
fn missing_member_in_row_is_an_explicit_null() {
    let schema = people_schema();

    let absent = build(&schema, "by_a_b", &records(None, Some("x")), SortOrder::Ascending);
    let mut explicit = records(None, Some("x"));
    explicit.insert("a".to_string(), None);
    let explicit = build(&schema, "by_a_b", &explicit, SortOrder::Ascending);

    assert_eq!(absent, explicit);
}

#[test]
fn nulls_sort_first_ascending_and_last_descending() {
    let schema = people_schema();
    let null = records(Some(1), None);
    let value = records(Some(1), Some("a"));

    let asc_null = build(&schema, "by_b", &null, SortOrder::Ascending);
    let asc_value = build(&schema, "by_b", &value, SortOrder::Ascending);
    assert!(asc_null < asc_value);

    let desc_null = build(&schema, "by_b", &null, SortOrder::Descending);
    let desc_value = build(&schema, "by_b", &value, SortOrder::Descending);
    assert!(desc_value < desc_null);
}

#[test]
fn descending_space_reverses_composite_order() {
    let schema = people_schema();
    let rows = [
        records(Some(-3), Some("zz")),
        records(Some(-3), None),
        records(Some(0), Some("a")),
        records(None, Some("b")),
        records(Some(12), Some("a")),
    ];

    let mut asc: Vec<_> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (build(&schema, "by_a_b", r, SortOrder::Ascending), i))
        .collect();
    let mut desc: Vec<_> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (build(&schema, "by_a_b", r, SortOrder::Descending), i))
        .collect();
    asc.sort();
    desc.sort();

    let asc_order: Vec<_> = asc.iter().map(|(_, i)| *i).collect();
    let mut desc_order: Vec<_> = desc.iter().map(|(_, i)| *i).collect();
    desc_order.reverse();

    assert_eq!(asc_order, vec![3, 1, 0, 2, 4]);
    assert_eq!(asc_order, desc_order);
}

#[test]
fn query_prefix_matches_row_key_prefix() {
    let schema = people_schema();
    let index = schema.index("by_a_b").expect("index");
    let mut query = Records::new();
    query.insert("a".to_string(), Some(5i64.to_be_bytes().to_vec()));

    let prefix = IndexRowKeyBuilder::new(1, 2)
        .with_query(&query, index, &schema)
        .build()
        .expect("prefix")
        .encode();
    let full = build(&schema, "by_a_b", &records(Some(5), Some("q")), SortOrder::Ascending);

    assert!(full.starts_with(&prefix));
}

#[test]
fn query_with_gap_is_rejected() {
    let schema = people_schema();
    let index = schema.index("by_a_b").expect("index");
    let mut query = Records::new();
    query.insert("b".to_string(), Some(b"x".to_vec()));

    let err = IndexRowKeyBuilder::new(1, 2)
        .with_query(&query, index, &schema)
        .build()
        .expect_err("gap");
    assert_eq!(err.class, crate::error::ErrorClass::Precondition);
}

#[test]
fn builders_are_independent_values() {
    let base = IndexRowKeyBuilder::new(3, 4);
    let asc = base.clone().build().expect("asc");
    let desc = base.with_order(SortOrder::Descending).build().expect("desc");

    assert!(matches!(asc, RowKey::AscIndex(_)));
    assert!(matches!(desc, RowKey::DescIndex(_)));
}

#[test]
fn index_values_decode_back_to_cells() {
    let schema = people_schema();
    let index = schema.index("by_a_b").expect("index");
    let columns = schema.index_columns(index).expect("columns");

    for order in [SortOrder::Ascending, SortOrder::Descending] {
        let source = records(Some(-8), None);
        let key = IndexRowKeyBuilder::new(1, 2)
            .with_order(order)
            .with_row_id(RowId::from_u128(77))
            .with_row(&source, index, &schema)
            .build()
            .expect("key");

        let decoded = RowKey::decode(&key.encode()).expect("decode");
        assert_eq!(decoded, key);

        let (RowKey::AscIndex(fields) | RowKey::DescIndex(fields)) = decoded else {
            panic!("expected an index key");
        };
        let cells = decode_index_values(&fields.values, &columns, order).expect("cells");
        assert_eq!(cells, vec![Some((-8i64).to_be_bytes().to_vec()), None]);
    }
}

proptest! {
    #[test]
    fn encode_decode_round_trip(key in row_key_strategy()) {
        prop_assert_eq!(RowKey::decode(&key.encode()), Ok(key));
    }

    #[test]
    fn byte_order_matches_structural_order(
        keys in proptest::collection::vec(row_key_strategy(), 2..40)
    ) {
        let mut by_bytes = keys.clone();
        by_bytes.sort_by_key(RowKey::encode);

        let mut by_fields = keys;
        by_fields.sort_by(structural_cmp);

        let by_bytes: Vec<_> = by_bytes.iter().map(RowKey::encode).collect();
        let by_fields: Vec<_> = by_fields.iter().map(RowKey::encode).collect();
        prop_assert_eq!(by_bytes, by_fields);
    }

    #[test]
    fn index_key_order_matches_native_member_order(
        members in proptest::collection::vec(member_strategy(), 2..40)
    ) {
        let schema = people_schema();

        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let mut by_bytes = members.clone();
            by_bytes.sort_by_cached_key(|m| member_key(&schema, m, order));

            let mut by_native = members.clone();
            by_native.sort_by(|x, y| native_cmp(x, y, order));

            prop_assert_eq!(&by_bytes, &by_native, "{:?}", order);
        }
    }
}
