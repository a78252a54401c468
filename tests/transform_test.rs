mod common;

use bytes::Bytes;
use common::{name_rows, name_schema, raw_rows, raw_schema, ERROR_COUNTER};
use kafka_row_writer::schema::{error_schema, Record, Value, ERROR_MESSAGE_FIELD, FAILED_ROW_FIELD};
use kafka_row_writer::{BinaryPair, Error, ErrorCounter, ErrorIsolatingTransform, ValueMapper};
use std::sync::Arc;
use std::thread;

fn sorted(mut pairs: Vec<BinaryPair>) -> Vec<BinaryPair> {
    pairs.sort();
    pairs
}

fn pair(value: &'static [u8]) -> BinaryPair {
    BinaryPair {
        key: Bytes::new(),
        value: Bytes::from_static(value),
    }
}

#[test]
fn test_json_rows_map_to_pairs() {
    let schema = name_schema();
    let transform = ErrorIsolatingTransform::new(
        ERROR_COUNTER,
        ValueMapper::json(Arc::clone(&schema)),
        error_schema(&schema),
        true,
    )
    .unwrap();

    let outputs = transform.process_all(&name_rows(&schema));

    assert_eq!(
        sorted(outputs.pairs),
        vec![
            pair(br#"{"name":"a"}"#),
            pair(br#"{"name":"b"}"#),
            pair(br#"{"name":"c"}"#),
        ]
    );
    assert!(outputs.errors.is_empty());
    assert_eq!(transform.counter().get(), 0);
    assert_eq!(transform.counter().name(), ERROR_COUNTER);
}

#[test]
fn test_raw_rows_map_to_pairs() {
    let schema = raw_schema();
    let transform = ErrorIsolatingTransform::new(
        ERROR_COUNTER,
        ValueMapper::raw(Arc::clone(&schema), "payload").unwrap(),
        error_schema(&schema),
        true,
    )
    .unwrap();

    let outputs = transform.process_all(&raw_rows(&schema));

    assert_eq!(
        sorted(outputs.pairs),
        vec![pair(b"a"), pair(b"b"), pair(b"c")]
    );
    assert!(outputs.errors.is_empty());
    assert_eq!(transform.counter().get(), 0);
}

#[test]
fn test_raw_mapper_rejected_before_processing() {
    let result = ValueMapper::raw(raw_schema(), "body");
    assert!(matches!(result, Err(Error::Configuration(_))));

    let result = ValueMapper::raw(name_schema(), "name");
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_failures_are_isolated_and_counted() {
    let schema = name_schema();
    let transform = ErrorIsolatingTransform::new(
        ERROR_COUNTER,
        ValueMapper::json(Arc::clone(&schema)),
        error_schema(&schema),
        false,
    )
    .unwrap();

    let mut records = name_rows(&schema);
    let bad = Record::builder(Arc::clone(&schema))
        .with_field_value("name", b"not text".to_vec())
        .build()
        .unwrap();
    records.insert(1, bad.clone());

    let outputs = transform.process_all(&records);

    assert_eq!(outputs.pairs.len(), 3);
    assert_eq!(outputs.errors.len(), 1);
    assert_eq!(transform.counter().get(), 1);

    let error_record = &outputs.errors[0];
    assert_eq!(error_record.schema(), transform.error_schema());
    assert_eq!(error_record.get(FAILED_ROW_FIELD), Some(&Value::Row(bad)));
    assert_eq!(
        error_record.get(ERROR_MESSAGE_FIELD),
        Some(&Value::from("field 'name' expected string but found bytes"))
    );
}

#[test]
fn test_counter_matches_failures_across_threads() {
    let schema = name_schema();
    let counter = ErrorCounter::new(ERROR_COUNTER);
    let transform = ErrorIsolatingTransform::with_counter(
        counter.clone(),
        ValueMapper::json(Arc::clone(&schema)),
        error_schema(&schema),
        true,
    )
    .unwrap();

    // Every third record carries a null in a required field
    let records: Vec<Record> = (0..999)
        .map(|i| {
            let builder = Record::builder(Arc::clone(&schema));
            if i % 3 == 0 {
                builder.build().unwrap()
            } else {
                builder
                    .with_field_value("name", format!("user-{}", i))
                    .build()
                    .unwrap()
            }
        })
        .collect();

    let total = thread::scope(|s| {
        records
            .chunks(100)
            .map(|chunk| {
                let transform = &transform;
                s.spawn(move || transform.process_all(chunk))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .map(|outputs| outputs.pairs.len() + outputs.errors.len())
            .sum::<usize>()
    });

    assert_eq!(total, 999);
    assert_eq!(counter.get(), 333);
}
