//! Export pipeline integration tests.
//!
//! Binds a configuration document against an in-memory backend and checks
//! the CSV written by [`ExportService`] for every reference shape:
//! - Spread back references with a fixed width per run
//! - Grouped association references
//! - Direct references, grouped and spread
//! - Scalar formats

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use recordport::cms_config::{CmsConfig, ConfigDocument};
use recordport::io::{ExportRequest, ExportResult, ExportService};
use recordport::schema::{Schema, bind};
use recordport::storage::MemoryRecordStore;
use recordport::{Error, Record, RecordId};
use serde_json::json;
use std::sync::Arc;

const CONFIG: &str = r"
association_records:
  customer_tag:
    fields:
      - name: customer
        reference_target: customer
      - name: tag
        reference_target: tag
exports:
  customers:
    record_type: customer
    fields:
      - name: name
        label: Name
      - name: orders
        reference_via_back_reference: order
        reference_from_field: customer
        reference_fields:
          - name: _id
            label: Order {index} ID
          - name: amount
            label: Order {index} Amount
  order_totals:
    record_type: customer
    fields:
      - name: name
        label: Name
      - name: orders
        label: Amounts
        reference_via_back_reference: order
        reference_from_field: customer
        reference_field_name: amount
  customer_tags:
    record_type: customer
    fields:
      - name: name
        label: Name
      - name: tags
        label: Tags
        reference_via_association_record: customer_tag
        reference_target: tag
        reference_field_name: label
  customer_accounts:
    record_type: customer
    fields:
      - name: name
        label: Name
      - name: account
        label: Account
        reference_target: account
        reference_field_name: code
      - name: vip
        label: VIP
        format: Short
      - name: _created_at
        label: Created
  account_details:
    record_type: customer
    fields:
      - name: name
        label: Name
      - name: account
        reference_target: account
        reference_fields:
          - name: code
            label: Code
          - name: tier
            label: Tier
";

fn schema() -> Schema {
    Schema::new()
        .with_record_type(
            "customer",
            [("name", "string"), ("vip", "boolean"), ("account", "ref(account)")],
        )
        .with_record_type("account", [("code", "string"), ("tier", "string")])
        .with_record_type("order", [("amount", "number"), ("customer", "ref(customer)")])
        .with_record_type("tag", [("label", "string")])
        .with_record_type("customer_tag", [("customer", "ref(customer)"), ("tag", "ref(tag)")])
}

fn reference(id: &str) -> serde_json::Value {
    json!({"$type": "ref", "$id": id})
}

fn store() -> Arc<MemoryRecordStore> {
    let order = |key: &str, amount: serde_json::Value, customer: &str| {
        Record::new(RecordId::new("order", key))
            .with_field("amount", amount)
            .with_field("customer", reference(customer))
    };
    let tag = |key: &str, label: &str| {
        Record::new(RecordId::new("tag", key)).with_field("label", json!(label))
    };
    let link = |key: &str, customer: &str, tag: &str| {
        Record::new(RecordId::new("customer_tag", key))
            .with_field("customer", reference(customer))
            .with_field("tag", reference(tag))
    };

    Arc::new(MemoryRecordStore::new(schema()).with_records([
        Record::new(RecordId::new("account", "a1"))
            .with_field("code", json!("A1"))
            .with_field("tier", json!("gold")),
        Record::new(RecordId::new("customer", "c1"))
            .with_field("name", json!("Ada"))
            .with_field("vip", json!(true))
            .with_field("account", reference("account/a1"))
            .with_field("_created_at", json!({"$type": "date", "$date": "2024-01-02T03:04:05Z"})),
        Record::new(RecordId::new("customer", "c2"))
            .with_field("name", json!("Bob"))
            .with_field("vip", json!(false)),
        order("o1", json!(12.5), "customer/c1"),
        order("o2", json!(20), "customer/c1"),
        order("o3", json!(7.25), "customer/c1"),
        order("o4", json!(5), "customer/c2"),
        tag("t1", "vip"),
        tag("t2", "it's new"),
        link("l1", "customer/c1", "tag/t1"),
        link("l2", "customer/c1", "tag/t2"),
    ]))
}

fn config() -> CmsConfig {
    bind(&ConfigDocument::from_yaml(CONFIG).unwrap(), &schema()).unwrap()
}

fn export(store: &Arc<MemoryRecordStore>, request: &ExportRequest) -> (ExportResult, String) {
    let service = ExportService::new(store.clone());
    let mut out = Vec::new();
    let result = service.export_to_writer(&config(), request, &mut out).unwrap();
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn test_spread_back_reference_pads_to_widest_row() {
    let store = store();
    let (result, csv) = export(&store, &ExportRequest::new("customers"));

    assert_eq!(result.exported, 2);
    assert_eq!(
        csv,
        "Name,Order 0 ID,Order 0 Amount,Order 1 ID,Order 1 Amount,Order 2 ID,Order 2 Amount\n\
         Ada,o1,12.5,o2,20,o3,7.25\n\
         Bob,o4,5,,,,\n"
    );
}

#[test]
fn test_every_row_has_header_width() {
    let store = store();
    let (_, csv) = export(&store, &ExportRequest::new("customers"));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv.as_bytes());
    let widths: Vec<usize> = reader.records().map(|r| r.unwrap().len()).collect();
    assert_eq!(widths, vec![7, 7, 7]);
}

#[test]
fn test_back_reference_queries_once_per_record() {
    let store = store();
    export(&store, &ExportRequest::new("customers"));

    assert_eq!(store.query_count("customer"), 1);
    assert_eq!(store.query_count("order"), 2);
}

#[test]
fn test_spread_width_follows_filtered_records() {
    let store = store();
    let request = ExportRequest::new("customers")
        .with_predicate(r#"["eq", {"$type": "keypath", "$val": "name"}, "Bob"]"#);
    let (result, csv) = export(&store, &request);

    assert_eq!(result.exported, 1);
    assert_eq!(csv, "Name,Order 0 ID,Order 0 Amount\nBob,o4,5\n");
}

#[test]
fn test_grouped_back_reference() {
    let store = store();
    let (_, csv) = export(&store, &ExportRequest::new("order_totals"));

    assert_eq!(csv, "Name,Amounts\nAda,\"'12.5','20','7.25'\"\nBob,'5'\n");
}

#[test]
fn test_grouped_association_escapes_quotes() {
    let store = store();
    let (_, csv) = export(&store, &ExportRequest::new("customer_tags"));

    assert_eq!(csv, "Name,Tags\nAda,\"'vip','it\\'s new'\"\nBob,\n");
    assert_eq!(store.query_count("customer_tag"), 2);
}

#[test]
fn test_direct_reference_and_scalar_formats() {
    let store = store();
    let (_, csv) = export(&store, &ExportRequest::new("customer_accounts"));

    assert_eq!(
        csv,
        "Name,Account,VIP,Created\nAda,A1,T,2024-01-02T03:04:05.000000\nBob,,F,\n"
    );
    assert_eq!(store.query_count("account"), 0);
}

#[test]
fn test_direct_reference_spread() {
    let store = store();
    let (_, csv) = export(&store, &ExportRequest::new("account_details"));

    assert_eq!(csv, "Name,Code,Tier\nAda,A1,gold\nBob,,\n");
}

#[test]
fn test_export_to_file() {
    let store = store();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let service = ExportService::new(store);
    let result = service
        .export_to_file(&config(), &ExportRequest::new("account_details"), &path)
        .unwrap();

    assert_eq!(result.file_name, "account_details.csv");
    assert_eq!(result.content_type, "text/csv");
    assert_eq!(result.output_path, Some(path.display().to_string()));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Name,Code,Tier\nAda,A1,gold\nBob,,\n"
    );
}

#[test]
fn test_empty_export_writes_header_only() {
    let store = store();
    let request = ExportRequest::new("customers")
        .with_predicate(r#"["eq", {"$type": "keypath", "$val": "name"}, "Nobody"]"#);
    let (result, csv) = export(&store, &request);

    assert!(!result.has_exports());
    assert_eq!(csv, "Name\n");
}

#[test]
fn test_unknown_export_name() {
    let store = store();
    let service = ExportService::new(store);
    let result = service.export_to_writer(&config(), &ExportRequest::new("nope"), Vec::new());

    assert!(matches!(result, Err(Error::NotFound { kind: "export", .. })));
}
