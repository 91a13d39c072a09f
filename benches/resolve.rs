use std::path::PathBuf;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use countersim::repository::{CounterRecord, RecordTemplate, StoreKey};
use countersim::validation::values_match;
use countersim::{
    parse_path, CounterPath, CounterRepository, ExpectedValue, InMemoryStore, ObjectIdentifierMap, ObservedValue,
};

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

fn make_repository() -> CounterRepository {
    let oids = ObjectIdentifierMap::load_files(
        data_file("COUNTERS_PORT_NAME_MAP.json"),
        data_file("COUNTERS_QUEUE_NAME_MAP.json"),
    )
    .unwrap();
    CounterRepository::new(Arc::new(InMemoryStore::new()), Arc::new(oids))
}

fn bench_paths(c: &mut Criterion) {
    c.bench_function("path/parse_predicates", |b| {
        b.iter(|| parse_path(black_box("/COUNTERS/Ethernet8/Queues[index=3]/SAI_QUEUE_STAT_PACKETS")).unwrap());
    });

    let repository = make_repository();
    let port = CounterPath::parse("/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS").unwrap();
    let queue = CounterPath::parse("/COUNTERS/Ethernet124/Queues/SAI_QUEUE_STAT_CURR_OCCUPANCY_BYTES").unwrap();

    c.bench_function("repository/resolve_port", |b| {
        b.iter(|| repository.resolve(black_box(&port)).unwrap());
    });
    c.bench_function("repository/resolve_queue", |b| {
        b.iter(|| repository.resolve(black_box(&queue)).unwrap());
    });
}

fn bench_staging(c: &mut Criterion) {
    let template = RecordTemplate::load(data_file("templates/port_counters.json")).unwrap();
    let current = std::fs::read_to_string(data_file("COUNTERS:Ethernet68.json")).unwrap();
    let current = serde_json::from_str(&current).unwrap();
    let key = StoreKey::counters("oid:0x1000000000013");

    c.bench_function("record/stage_full_row", |b| {
        b.iter(|| {
            CounterRecord::stage(
                key.clone(),
                &template,
                black_box(&current),
                "SAI_PORT_STAT_PFC_7_RX_PKTS",
                "16",
            )
        });
    });
}

fn bench_compare(c: &mut Criterion) {
    let text = std::fs::read_to_string(data_file("COUNTERS:Ethernet68.json")).unwrap();
    let row: serde_json::Value = serde_json::from_str(&text).unwrap();
    let expected = ExpectedValue::Structured(row.clone());
    let observed = ObservedValue::Structured(row);

    c.bench_function("validation/structured_match", |b| {
        b.iter(|| values_match(black_box(&expected), black_box(&observed)));
    });
}

criterion_group!(benches, bench_paths, bench_staging, bench_compare);
criterion_main!(benches);
