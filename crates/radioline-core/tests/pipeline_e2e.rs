//! End-to-end pipeline run: batched source with a drain sync point,
//! four workers writing through one shared sink.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use radioline_core::{Emitter, JsonLinesSink, Pipeline};
use tempfile::TempDir;

#[test]
fn batched_source_four_workers_forty_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.jsonl");
    let sink = Arc::new(JsonLinesSink::create(&path).unwrap());

    let pipeline = Pipeline {
        queue_capacity: 64,
        workers: 4,
        idle_timeout: Duration::from_secs(10),
        ..Pipeline::default()
    };

    let source = |out: &Emitter<u32>| -> Result<()> {
        for i in 1..=20 {
            out.send(i)?;
        }
        // Pause generation until the first batch is fully consumed.
        out.drain_below(0);
        for i in 100..120 {
            out.send(i)?;
        }
        Ok(())
    };

    let summary = pipeline
        .run(source, |_worker| {
            let sink = sink.clone();
            Ok(move |task: u32| -> Result<()> {
                sink.append(&serde_json::json!({ "id": task }))?;
                Ok(())
            })
        })
        .unwrap();

    sink.close();

    assert_eq!(summary.produced, 40);
    assert_eq!(summary.consumed, 40);
    assert_eq!(summary.failed, 0);

    let content = std::fs::read_to_string(&path).unwrap();
    let mut ids = HashSet::new();
    for line in content.lines() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(ids.insert(v["id"].as_u64().unwrap()), "duplicate id");
    }

    let expected: HashSet<u64> = (1..=20).chain(100..120).collect();
    assert_eq!(ids, expected);
}
