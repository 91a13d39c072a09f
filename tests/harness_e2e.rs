use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use countersim::config::SeedConfig;
use countersim::repository::{RecordTemplate, NEUTRAL_VALUE};
use countersim::simulation::RANDOM_UPPER_BOUND;
use countersim::validation::load_scenarios;
use countersim::{
    default_battery, run_suite, seed_store, CounterRepository, CounterSimulator, CounterStore, HarnessConfig,
    InMemoryStore, LoopbackTelemetry, ObjectIdentifierMap, Outcome, PolicyDocument, SimulationConfig,
};

const ETH0: &str = "COUNTERS:oid:0x1000000000002";
const ETH68: &str = "COUNTERS:oid:0x1000000000013";
const ETH8_Q0: &str = "COUNTERS:oid:0x1500000000004d";

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let config = SeedConfig {
        data_dir: data_dir(),
        ..SeedConfig::default()
    };
    let report = seed_store(store.as_ref(), &config).await.unwrap();
    assert_eq!(report.records_written, 8);
    assert!(report.skipped.is_empty());
    store
}

#[test]
fn shipped_harness_config_is_valid() {
    let config = HarnessConfig::load(data_dir().join("harness.toml")).unwrap();
    assert_eq!(config.store.database, 2);
    assert_eq!(config.seed.tables.len(), 8);
    assert_eq!(config.seed.tables, SeedConfig::default().tables);
}

#[tokio::test]
async fn built_in_battery_passes_against_seeded_store() {
    let store = seeded_store().await;
    let client = LoopbackTelemetry::new(store);

    let battery = default_battery("COUNTERS_DB", &data_dir()).unwrap();
    let report = run_suite(&client, &battery).await;
    for result in &report.results {
        assert!(result.passed(), "{result:?}");
    }
    assert_eq!(report.passed(), battery.len());
}

#[tokio::test]
async fn shipped_scenario_file_passes_against_seeded_store() {
    let store = seeded_store().await;
    let client = LoopbackTelemetry::new(store);

    let scenarios = load_scenarios(data_dir().join("scenarios.toml")).unwrap();
    let report = run_suite(&client, &scenarios).await;
    assert!(report.all_passed(), "{:#?}", report.results);
}

#[tokio::test(start_paused = true)]
async fn shipped_policy_drives_seeded_counters() {
    let store = seeded_store().await;
    let oids = ObjectIdentifierMap::load_from_store(store.as_ref()).await.unwrap();
    let templates = data_dir().join("templates");
    let repository = CounterRepository::new(store.clone(), Arc::new(oids)).with_templates(
        RecordTemplate::load(templates.join("port_counters.json")).unwrap(),
        RecordTemplate::load(templates.join("queue_counters.json")).unwrap(),
    );

    let policies = PolicyDocument::load(data_dir().join("policy.toml")).unwrap();
    assert_eq!(policies.counters.len(), 3);

    let (tx, mut rx) = mpsc::channel(1024);
    let handle = CounterSimulator::new(Arc::new(repository), &SimulationConfig::default())
        .with_reports(tx)
        .start(&policies.counters);
    assert!(handle.failures().is_empty());

    tokio::time::sleep(Duration::from_secs(11)).await;
    handle.shutdown().await;

    let mut pfc_ticks = 0;
    let mut last_random = None;
    while let Ok(report) = rx.try_recv() {
        assert!(report.committed(), "{report:?}");
        match report.counter.as_str() {
            "pfc7_rx" => pfc_ticks += 1,
            "queue_occupancy" => last_random = Some(report.value),
            _ => {}
        }
    }
    assert!(pfc_ticks >= 5);

    let eth68 = store.read_record(ETH68).await.unwrap();
    assert_eq!(eth68["SAI_PORT_STAT_PFC_7_RX_PKTS"], (6 + pfc_ticks * 10).to_string());
    assert_eq!(eth68["SAI_PORT_STAT_IF_IN_OCTETS"], NEUTRAL_VALUE);
    assert_eq!(eth68["SAI_PORT_STAT_PFC_7_TX_PKTS"], NEUTRAL_VALUE);

    let eth0 = store.read_record(ETH0).await.unwrap();
    assert_eq!(eth0["SAI_PORT_STAT_IF_IN_DISCARDS"], "42");
    assert!(eth0
        .iter()
        .filter(|(field, _)| field.as_str() != "SAI_PORT_STAT_IF_IN_DISCARDS")
        .all(|(_, value)| value == NEUTRAL_VALUE));

    let queue = store.read_record(ETH8_Q0).await.unwrap();
    let occupancy: i64 = queue["SAI_QUEUE_STAT_CURR_OCCUPANCY_BYTES"].parse().unwrap();
    assert!((0..RANDOM_UPPER_BOUND).contains(&occupancy));
    assert_eq!(Some(occupancy), last_random);
}

#[tokio::test]
async fn validation_sees_simulated_values() {
    let store = seeded_store().await;
    let oids = ObjectIdentifierMap::load_from_store(store.as_ref()).await.unwrap();
    let repository = CounterRepository::new(store.clone(), Arc::new(oids));
    let counter = repository
        .resolve(&countersim::CounterPath::parse("/COUNTERS/Ethernet68/SAI_PORT_STAT_PFC_7_RX_PKTS").unwrap())
        .unwrap();
    repository.update(&counter, 16).await.unwrap();

    let client = LoopbackTelemetry::new(store);
    let battery = default_battery("COUNTERS_DB", &data_dir()).unwrap();
    let report = run_suite(&client, &battery).await;

    let failed: Vec<_> = report.results.iter().filter(|r| !r.passed()).collect();
    assert_eq!(failed.len(), 2, "{failed:#?}");
    assert!(failed.iter().all(|r| r.outcome == Outcome::ValueMismatch));
    assert!(failed.iter().any(|r| r.description.ends_with("SAI_PORT_STAT_PFC_7_RX_PKTS")));
}
