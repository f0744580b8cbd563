//! CONTEXT: Integration tests for counter refresh through the public engine API
//! OWNERS: @drivers
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 9 integration tests
//!
//! TEST_SCOPE:
//!   - Wrap compensation across ticks
//!   - Per-width sampling intervals
//!   - Registration idempotence, unregister, override/clear
//!   - Round-robin coverage and sampling failures

mod common;

use std::collections::HashSet;

use common::{engine_with, manual_config, port_counter, ScriptedHw};
use nexus_tm_counters::{CounterId, CounterKind, CounterModule, EngineConfig, EntityKey, Error};

#[test]
fn wrapped_register_keeps_counting() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let id = port_counter(0);
    let port = EntityKey::port(0, 1);
    engine.register_counter(CounterModule::Port, id, CounterKind::PacketDrop, 32, hw.clone()).unwrap();
    let node = engine.allocate_node(CounterModule::Port, port).unwrap();
    engine.start().unwrap();

    hw.set(id, port, 0xffff_fff0);
    engine.tick();
    hw.set(id, port, 0x10);
    engine.tick();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 0xffff_fff0 + 0xf + 0x10);
    assert_eq!(engine.last_sample(node, id).unwrap(), 0x10);
    engine.stop().unwrap();
}

#[test]
fn wide_registers_sampled_on_even_ticks() {
    let hw = ScriptedHw::new();
    let config = EngineConfig { narrow_register_max_bits: 36, ..manual_config() };
    let (_table, engine) = engine_with(config);
    let narrow = port_counter(0);
    let wide = port_counter(1);
    engine.register_counter(CounterModule::Port, narrow, CounterKind::PacketDrop, 36, hw.clone()).unwrap();
    engine.register_counter(CounterModule::Port, wide, CounterKind::Bytes, 47, hw.clone()).unwrap();
    engine.allocate_node(CounterModule::Port, EntityKey::port(0, 0)).unwrap();
    engine.start().unwrap();

    let mut per_tick = Vec::new();
    for _ in 0..4 {
        let report = engine.tick();
        let counters: Vec<CounterId> = hw.take_reads().into_iter().map(|(c, _)| c).collect();
        per_tick.push((report.tick, counters));
    }
    assert_eq!(
        per_tick,
        vec![(0, vec![narrow, wide]), (1, vec![narrow]), (2, vec![narrow, wide]), (3, vec![narrow])]
    );
    engine.stop().unwrap();
}

#[test]
fn duplicate_registration_preserves_accumulators() {
    let hw = ScriptedHw::new();
    let other = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let id = port_counter(2);
    let port = EntityKey::port(1, 3);
    engine.register_counter(CounterModule::Port, id, CounterKind::Packets, 32, hw.clone()).unwrap();
    let node = engine.allocate_node(CounterModule::Port, port).unwrap();
    engine.start().unwrap();
    hw.set(id, port, 100);
    engine.tick();

    engine.register_counter(CounterModule::Port, id, CounterKind::Packets, 32, other.clone()).unwrap();
    assert_eq!(engine.stats().modules[CounterModule::Port.index()].counters, 1);
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 100);

    hw.set(id, port, 140);
    engine.tick();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 140);
    assert!(other.take_reads().is_empty());
    engine.stop().unwrap();
}

#[test]
fn unregister_freezes_node_values() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let id = port_counter(0);
    let port = EntityKey::port(0, 0);
    engine.register_counter(CounterModule::Port, id, CounterKind::PacketDrop, 32, hw.clone()).unwrap();
    let node = engine.allocate_node(CounterModule::Port, port).unwrap();
    engine.start().unwrap();
    hw.set(id, port, 55);
    engine.tick();

    engine.unregister_counter(CounterModule::Port, id).unwrap();
    hw.set(id, port, 90);
    let report = engine.tick();
    assert_eq!(report.work.samples, 0);
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 55);
    engine.stop().unwrap();
}

#[test]
fn override_after_hardware_clear_restarts_from_zero() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let id = port_counter(0);
    let port = EntityKey::port(0, 0);
    engine.register_counter(CounterModule::Port, id, CounterKind::PacketDrop, 32, hw.clone()).unwrap();
    let node = engine.allocate_node(CounterModule::Port, port).unwrap();
    engine.start().unwrap();
    hw.set(id, port, 500);
    engine.tick();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 500);

    hw.set(id, port, 0);
    engine.override_accumulated(node, id, 0).unwrap();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 0);
    hw.set(id, port, 30);
    engine.tick();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 30);

    engine.override_accumulated(node, id, 1_000).unwrap();
    assert_eq!(engine.get_accumulated(node, id).unwrap(), 1_000);
    engine.stop().unwrap();
}

#[test]
fn every_node_covered_within_ceil_n_over_b_ticks() {
    let hw = ScriptedHw::new();
    let config = EngineConfig { max_nodes_per_tick: 3, ..manual_config() };
    let (_table, engine) = engine_with(config);
    engine.register_counter(CounterModule::Queue, CounterId::new(CounterModule::Queue, 0).unwrap(), CounterKind::PacketDrop, 32, hw.clone()).unwrap();
    let keys: Vec<EntityKey> = (0..10).map(|q| EntityKey::queue(0, 1, q)).collect();
    for key in &keys {
        engine.allocate_node(CounterModule::Queue, *key).unwrap();
    }
    engine.start().unwrap();

    for _ in 0..4 {
        assert_eq!(engine.tick().work.nodes_visited, 3);
    }
    let seen: HashSet<EntityKey> = hw.take_reads().into_iter().map(|(_, e)| e).collect();
    assert_eq!(seen, keys.into_iter().collect());
    engine.stop().unwrap();
}

#[test]
fn failing_entity_does_not_block_others() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let id = port_counter(0);
    let bad = EntityKey::port(0, 0);
    let good = EntityKey::port(0, 1);
    engine.register_counter(CounterModule::Port, id, CounterKind::Error, 32, hw.clone()).unwrap();
    let bad_node = engine.allocate_node(CounterModule::Port, bad).unwrap();
    let good_node = engine.allocate_node(CounterModule::Port, good).unwrap();
    engine.start().unwrap();

    hw.set(id, bad, 10);
    hw.set(id, good, 20);
    hw.fail(bad, true);
    let report = engine.tick();
    assert_eq!((report.work.samples, report.work.failures), (1, 1));
    assert_eq!(engine.get_accumulated(bad_node, id).unwrap(), 0);
    assert_eq!(engine.get_accumulated(good_node, id).unwrap(), 20);
    assert_eq!(engine.stats().sample_failures, 1);

    hw.fail(bad, false);
    engine.tick();
    assert_eq!(engine.get_accumulated(bad_node, id).unwrap(), 10);
    engine.stop().unwrap();
}

#[test]
fn disabled_node_is_skipped_and_snapshot_lists_counters() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let drops = port_counter(0);
    let bytes = port_counter(4);
    let port = EntityKey::port(2, 8);
    engine.register_counter(CounterModule::Port, drops, CounterKind::PacketDrop, 32, hw.clone()).unwrap();
    engine.register_counter(CounterModule::Port, bytes, CounterKind::Bytes, 32, hw.clone()).unwrap();
    let node = engine.allocate_node(CounterModule::Port, port).unwrap();
    engine.start().unwrap();
    hw.set(drops, port, 3);
    hw.set(bytes, port, 1500);

    engine.set_node_enabled(node, false).unwrap();
    let report = engine.tick();
    assert_eq!((report.work.nodes_visited, report.work.samples), (1, 0));

    engine.set_node_enabled(node, true).unwrap();
    engine.tick();
    assert_eq!(engine.snapshot(node).unwrap(), vec![(drops, 3), (bytes, 1500)]);
    engine.stop().unwrap();
}

#[test]
fn out_of_band_counter_ids_rejected() {
    let hw = ScriptedHw::new();
    let (_table, engine) = engine_with(manual_config());
    let queue_id = CounterId::new(CounterModule::Queue, 0).unwrap();
    let err = engine
        .register_counter(CounterModule::Port, queue_id, CounterKind::Packets, 32, hw.clone())
        .expect_err("foreign band");
    assert!(matches!(err, Error::InvalidCounter));
    let err = engine
        .register_counter(CounterModule::Port, port_counter(0), CounterKind::Packets, 65, hw)
        .expect_err("too wide");
    assert!(matches!(err, Error::InvalidArgument(_)));
}
