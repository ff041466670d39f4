//! Delivery queue and connection health behavior, alone and through the gateway.

mod common;

use std::sync::Arc;

use rfidgate::config::Config;
use rfidgate::delivery::{Delivery, DeliveryQueue, HealthMonitor, HealthVerdict};
use rfidgate::storage::{get_u64, KvStore, MemoryStore, SledStore};
use rfidgate::transport::memory::MemoryPublisher;
use tempfile::tempdir;

use crate::common::{rig, rig_with};

fn payload(i: usize) -> Vec<u8> {
    format!("{{\"seq\":{}}}", i).into_bytes()
}

#[test]
fn overflow_keeps_newest_capacity_entries_in_order() {
    let (capacity, extra) = (5, 3);
    let mut queue = DeliveryQueue::new(capacity, 2, 512);
    for i in 0..capacity + extra {
        let overwrote = queue.enqueue("t", &payload(i), i as u64);
        assert_eq!(overwrote, i >= capacity);
    }
    assert_eq!(queue.len(), capacity);
    let kept: Vec<u64> = queue.entries().map(|e| e.enqueued_at).collect();
    assert_eq!(kept, (extra as u64..(capacity + extra) as u64).collect::<Vec<_>>());
}

#[test]
fn flush_sends_at_most_k_and_preserves_order() {
    let publisher = MemoryPublisher::new(false);
    let mut queue = DeliveryQueue::new(10, 5, 512);
    for i in 0..7 {
        assert_eq!(
            queue.publish_or_buffer(&publisher, &format!("t/{}", i), &payload(i), i as u64),
            Delivery::Buffered
        );
    }
    publisher.set_connected(true);

    let report = queue.flush(&publisher, 3);
    assert_eq!((report.sent, report.remaining), (3, 4));
    let topics: Vec<String> = queue.entries().map(|e| e.topic.clone()).collect();
    assert_eq!(topics, vec!["t/3", "t/4", "t/5", "t/6"]);

    queue.flush(&publisher, 3);
    queue.flush(&publisher, 3);
    let sent: Vec<String> = publisher.published().into_iter().map(|p| p.topic).collect();
    assert_eq!(
        sent,
        (0..7).map(|i| format!("t/{}", i)).collect::<Vec<_>>()
    );
    assert!(queue.is_empty());
}

#[test]
fn failed_flush_leaves_entry_at_front() {
    let publisher = MemoryPublisher::new(true);
    let mut queue = DeliveryQueue::new(10, 5, 512);
    queue.enqueue("a", b"1", 0);
    queue.enqueue("b", b"2", 1);
    publisher.fail_next(1);

    let report = queue.flush(&publisher, 5);
    assert!(report.failed);
    assert_eq!(report.sent, 0);
    assert_eq!(queue.entries().next().unwrap().topic, "a");

    let report = queue.flush(&publisher, 5);
    assert_eq!(report.sent, 2);
}

#[test]
fn persist_then_restore_keeps_most_recent_entries() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("kv");
    let mut queue = DeliveryQueue::new(10, 4, 512);
    for i in 0..7 {
        queue.enqueue(&format!("reader/gw/data/{}", i), &payload(i), 100 + i as u64);
    }
    {
        let store = SledStore::open(&path).unwrap();
        assert_eq!(queue.persist(&store).unwrap(), 4);
        assert_eq!(get_u64(&store, "buf_count").unwrap(), Some(4));
    }

    let store = SledStore::open(&path).unwrap();
    let mut fresh = DeliveryQueue::new(10, 4, 512);
    assert_eq!(fresh.restore(&store).unwrap(), 4);
    let expected: Vec<_> = queue.entries().skip(3).cloned().collect();
    let restored: Vec<_> = fresh.entries().cloned().collect();
    assert_eq!(restored, expected);

    // Power lost again before anything was sent: the same entries come back.
    let mut again = DeliveryQueue::new(10, 4, 512);
    assert_eq!(again.restore(&store).unwrap(), 4);
    let again: Vec<_> = again.entries().cloned().collect();
    assert_eq!(again, expected);
}

#[test]
fn restored_entries_survive_crash_until_delivered() {
    let kv = Arc::new(MemoryStore::new());
    let mut queue = DeliveryQueue::new(20, 10, 512);
    for i in 0..3 {
        queue.enqueue("reader/gw/data/batch", &payload(i), 1_700_000_000_000 + i as u64);
    }
    queue.persist(kv.as_ref()).unwrap();

    let offline = rig_with(&Config::default(), kv.clone());
    offline.publisher.set_connected(false);
    assert_eq!(offline.gw.restore_queue(), 3);
    assert_eq!(offline.gw.flush().sent, 0);
    drop(offline);

    let online = rig_with(&Config::default(), kv.clone());
    assert_eq!(online.gw.restore_queue(), 3);
    assert_eq!(online.gw.flush().sent, 3);
    assert_eq!(get_u64(kv.as_ref(), "buf_count").unwrap(), Some(0));
    drop(online);

    let after = rig_with(&Config::default(), kv);
    assert_eq!(after.gw.restore_queue(), 0);
}

#[test]
fn buffered_entries_stamped_with_wall_clock() {
    let kv = Arc::new(MemoryStore::new());
    let r = rig_with(&Config::default(), kv.clone());
    r.publisher.set_connected(false);
    r.clock.set(1_700_000_123_456);
    r.gw.publish("reader/gw/data/tags", &payload(0));
    assert_eq!(r.gw.persist_queue(), 1);
    assert_eq!(get_u64(kv.as_ref(), "ts_0").unwrap(), Some(1_700_000_123_456));
}

#[test]
fn oversized_payload_dropped_when_unsendable() {
    let publisher = MemoryPublisher::new(false);
    let mut queue = DeliveryQueue::new(4, 2, 16);
    assert_eq!(
        queue.publish_or_buffer(&publisher, "t", &[0u8; 17], 0),
        Delivery::Dropped
    );
    assert!(queue.is_empty());
    publisher.set_connected(true);
    assert_eq!(
        queue.publish_or_buffer(&publisher, "t", &[0u8; 17], 0),
        Delivery::Sent
    );
}

#[test]
fn reconnect_forced_once_per_three_missed_windows() {
    let mut health = HealthMonitor::new(0, 30_000, 3, 5);
    let mut now = 0;
    let mut forced = 0;
    for _ in 0..9 {
        now += 46_000;
        if health.tick(now, true) == HealthVerdict::ForceReconnect {
            forced += 1;
            assert_eq!(health.consecutive_failures(), 0);
        }
    }
    assert_eq!(forced, 3);
}

#[test]
fn successful_publish_keeps_connection_healthy() {
    let r = rig();
    for _ in 0..5 {
        r.clock.advance(25_000);
        assert_eq!(r.gw.publish("reader/x", b"{}"), Delivery::Sent);
        r.clock.advance(25_000);
        assert_eq!(r.gw.health_tick(), HealthVerdict::Healthy);
    }
    assert_eq!(r.publisher.reconnect_requests(), 0);
}

#[test]
fn idle_connected_gateway_never_forced_to_reconnect() {
    let r = rig();
    for _ in 0..6 {
        r.clock.advance(30_001);
        assert_eq!(r.gw.health_tick(), HealthVerdict::Healthy);
    }
    assert_eq!(r.publisher.reconnect_requests(), 0);
}

#[test]
fn failing_flushes_lead_to_forced_reconnect() {
    let r = rig();
    r.publisher.fail_next(usize::MAX);
    assert_eq!(r.gw.publish("reader/gw/data/batch", &payload(0)), Delivery::Buffered);

    let mut verdicts = Vec::new();
    for _ in 0..3 {
        for _ in 0..50 {
            r.clock.advance(1_000);
            assert!(r.gw.flush().failed);
        }
        verdicts.push(r.gw.health_tick());
    }
    assert_eq!(
        verdicts,
        vec![
            HealthVerdict::Missed { consecutive: 1 },
            HealthVerdict::Missed { consecutive: 2 },
            HealthVerdict::ForceReconnect,
        ]
    );
    assert_eq!(r.publisher.reconnect_requests(), 1);

    // An empty, failure-free flush on a connected broker counts as healthy.
    r.publisher.fail_next(0);
    assert_eq!(r.gw.flush().sent, 1);
    r.clock.advance(30_000);
    assert_eq!(r.gw.health_tick(), HealthVerdict::Healthy);
}

#[test]
fn gateway_buffers_while_offline_and_flushes_on_reconnect() {
    let r = rig();
    r.publisher.set_connected(false);
    for i in 0..3 {
        assert_eq!(r.gw.publish("reader/gw/data/tags", &payload(i)), Delivery::Buffered);
    }
    assert_eq!(r.gw.backlog(), 3);

    r.publisher.set_connected(true);
    let report = r.gw.flush();
    assert_eq!(report.sent, 3);
    assert_eq!(r.gw.backlog(), 0);
    assert_eq!(r.publisher.published_on("reader/gw/data/tags").len(), 3);
}

#[test]
fn health_tick_persists_large_backlog() {
    let kv = Arc::new(MemoryStore::new());
    let r = rig_with(&Config::default(), kv.clone());
    r.publisher.set_connected(false);
    for i in 0..6 {
        r.gw.publish("reader/gw/data/batch", &payload(i));
    }
    r.gw.health_tick();
    assert_eq!(get_u64(kv.as_ref(), "buf_count").unwrap(), Some(6));
    assert_eq!(kv.get("topic_0").unwrap(), Some(b"reader/gw/data/batch".to_vec()));
}
