use pretty_assertions::assert_eq;
use resalloc_cache::TenantId;
use resalloc_replay::{Error, Trace};
use std::path::Path;
use std::time::Duration;

fn fixture() -> Trace {
  Trace::from_path(&Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_trace.csv")).unwrap()
}

#[test]
fn groups_by_tenant_in_first_seen_order() {
  let trace = fixture();
  assert_eq!(trace.name(), "sample_trace");
  let tenants: Vec<_> = trace.tenants().iter().map(|t| t.tenant).collect();
  assert_eq!(tenants, vec![TenantId(1), TenantId(2)]);
  assert_eq!(trace.len(), 12);
  assert_eq!(trace.distinct_keys(), 6);
}

#[test]
fn sorts_each_tenant_by_timestamp() {
  let trace = fixture();
  let first = &trace.tenants()[0];
  let keys: Vec<_> = first.queries.iter().map(|q| q.key.as_str()).collect();
  assert_eq!(keys, vec!["user:1", "user:2", "user:1", "user:3", "user:2", "user:1"]);
  assert!(first.queries.windows(2).all(|w| w[0].ts <= w[1].ts));
}

#[test]
fn decodes_operation_and_ttl() {
  let trace = fixture();
  let second = &trace.tenants()[1];
  let ops: Vec<_> = second.queries.iter().map(|q| (q.key.as_str(), q.write)).collect();
  assert_eq!(
    ops,
    vec![
      ("item:9", true),
      ("item:9", false),
      ("item:7", false),
      ("item:9", false),
      ("item:7", false),
      ("item:8", true),
    ]
  );
  assert_eq!(second.queries[2].ttl, Some(Duration::from_secs(30)));
  assert_eq!(second.queries[0].ttl, None);
  assert_eq!(second.queries[0].value_size, 64);
}

#[test]
fn equal_timestamps_keep_file_order() {
  let csv = "tntid,ts,key,val_size,op,ttl\n1,1.0,b,1,get,0\n1,0.5,a,1,get,0\n1,1.0,c,1,get,0\n";
  let trace = Trace::parse("t", csv.as_bytes()).unwrap();
  let keys: Vec<_> = trace.tenants()[0].queries.iter().map(|q| q.key.clone()).collect();
  assert_eq!(keys, vec!["a", "b", "c"]);
}

#[test]
fn skips_blank_lines() {
  let csv = "ts,tntid,key,val_size,op,ttl\n0.1,1,a,1,get,0\n\n0.2,1,b,1,set,0\n";
  let trace = Trace::parse("t", csv.as_bytes()).unwrap();
  assert_eq!(trace.len(), 2);
}

#[test]
fn reports_line_of_bad_row() {
  let csv = "ts,tntid,key,val_size,op,ttl\n0.1,1,a,1,get,0\n0.2,x,b,1,get,0\n";
  match Trace::parse("t", csv.as_bytes()) {
    Err(Error::TraceParse { line, message }) => {
      assert_eq!(line, 3);
      assert!(message.contains("tntid"), "{message}");
    }
    other => panic!("expected a trace parse error, got {other:?}"),
  }
}

#[test]
fn rejects_missing_columns_and_short_rows() {
  let missing = "ts,tntid,key,op,ttl\n";
  assert!(matches!(
    Trace::parse("t", missing.as_bytes()),
    Err(Error::TraceParse { line: 1, ref message }) if message.contains("val_size")
  ));

  let short = "ts,tntid,key,val_size,op,ttl\n0.1,1,a\n";
  assert!(matches!(
    Trace::parse("t", short.as_bytes()),
    Err(Error::TraceParse { line: 2, .. })
  ));

  assert!(matches!(Trace::parse("t", "".as_bytes()), Err(Error::TraceParse { .. })));
}
