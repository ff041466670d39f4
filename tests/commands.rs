//! Broker commands dispatched through the gateway, checked against the frames that
//! reach the reader and the responses that reach the broker.

mod common;

use rfidgate::commands::{CommandFamily, ResponseStatus};
use rfidgate::protocol::{crc16_xmodem, decode_frame, ids, Frame};
use rfidgate::reader::{CollectionMode, PowerLevels};

use crate::common::{hex, rig, with_crc};

fn response_json(r: &common::Rig) -> serde_json::Value {
    let published = r.publisher.published_on(&r.gw.topics().response());
    let last = published.last().expect("response published");
    serde_json::from_slice(&last.payload).unwrap()
}

#[test]
fn power_set_frame_and_response() {
    let r = rig();
    let topic = r.gw.topics().command(CommandFamily::Power);
    let response = r
        .gw
        .handle_inbound(
            &topic,
            br#"{"action":"set","ant1":20,"ant2":20,"ant3":20,"ant4":20}"#,
        )
        .expect("addressed to this device");
    assert!(response.is_success());

    let sent = r.link.sent();
    assert_eq!(sent.len(), 1);
    let bytes = &sent[0];
    let crc = crc16_xmodem(&bytes[1..bytes.len() - 2]);
    assert_eq!(&bytes[bytes.len() - 2..], &crc.to_be_bytes());
    let (frame, consumed) = decode_frame(bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert!(frame.matches(ids::CATEGORY_RFID, ids::MID_POWER_SET));
    assert_eq!(&frame.payload[..8], &[1, 20, 2, 20, 3, 20, 4, 20]);

    let json = response_json(&r);
    assert_eq!(json["command"], "power");
    assert_eq!(json["action"], "set");
    assert_eq!(json["status"], "success");
    for ant in ["ant1", "ant2", "ant3", "ant4"] {
        assert_eq!(json[ant], 20);
    }
    assert_eq!(r.gw.power_levels(), PowerLevels::uniform(20));
}

#[test]
fn power_report_updates_cache_and_clears_pending() {
    let r = rig();
    r.gw.query_power().unwrap();
    assert!(r.gw.power_pending());

    let report = with_crc(hex("5A 00 01 02 02 00 08 01 1E 02 1E 03 1E 04 1E"));
    r.gw.ingest(&report);

    assert_eq!(r.gw.power_levels(), PowerLevels::uniform(30));
    assert!(!r.gw.power_pending());
}

#[test]
fn power_query_times_out_without_report() {
    let r = rig();
    r.gw.query_power().unwrap();
    r.clock.advance(3_001);
    assert!(!r.gw.power_pending());
}

#[test]
fn out_of_range_power_rejected_without_sending() {
    let r = rig();
    let response = r.gw.dispatch(
        CommandFamily::Power,
        br#"{"action":"set","ant1":20,"ant2":40,"ant3":20,"ant4":20}"#,
    );
    assert_eq!(response.status, ResponseStatus::Error);
    assert!(response.message.unwrap().contains("ant2"));
    assert!(r.link.sent().is_empty());
}

#[test]
fn invalid_json_answered_with_error() {
    let r = rig();
    let topic = r.gw.topics().command(CommandFamily::Rfid);
    r.gw.handle_inbound(&topic, b"{not json");
    let json = response_json(&r);
    assert_eq!(json["status"], "error");
    assert_eq!(json["command"], "rfid");
    assert_eq!(json["message"], "Invalid JSON payload");
    assert!(r.link.sent().is_empty());
}

#[test]
fn unknown_action_names_family() {
    let r = rig();
    let response = r
        .gw
        .dispatch(CommandFamily::Inventory, br#"{"action":"dance"}"#);
    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.action, "dance");
    assert_eq!(
        response.message.as_deref(),
        Some("Unknown inventory action: dance")
    );
}

#[test]
fn remote_inventory_lifecycle() {
    let r = rig();
    let start = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"start"}"#);
    assert!(start.is_success());
    assert_eq!(start.fields["hardware_started"], true);
    assert_eq!(r.link.take_sent(), vec![Frame::inventory_start().encode()]);

    r.gw.record_sighting("E2801122", -40, 1);
    let get = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"get"}"#);
    assert_eq!(get.fields["count"], 1);
    let tags = r.publisher.published_on(&r.gw.topics().tags());
    let json: serde_json::Value = serde_json::from_slice(&tags[0].payload).unwrap();
    assert_eq!(json[0]["epc"], "E2801122");

    let status = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"status"}"#);
    assert_eq!(status.status, ResponseStatus::Info);
    assert_eq!(status.fields["inventory"], "running");
    assert_eq!(status.fields["modes"]["remote"], true);
    assert_eq!(status.fields["tag_count"], 1);

    let stop = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"stop"}"#);
    assert!(stop.is_success());
    assert_eq!(r.link.take_sent(), vec![Frame::inventory_stop(true).encode()]);
    assert!(!r.gw.inventory_state().hardware_enabled());
}

#[test]
fn local_mode_keeps_reader_running_after_remote_stop() {
    let r = rig();
    r.gw.start_inventory(CollectionMode::Local).unwrap();
    r.link.take_sent();

    let start = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"start"}"#);
    assert_eq!(start.fields["hardware_started"], false);
    let stop = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"stop"}"#);
    assert_eq!(stop.fields["hardware_stopped"], false);
    assert!(r.link.sent().is_empty());
    assert!(r.gw.inventory_state().is_enabled(CollectionMode::Local));
}

#[test]
fn reader_link_failure_reported_as_error() {
    let r = rig();
    r.link.set_open(false);
    let response = r.gw.dispatch(CommandFamily::Power, br#"{"action":"query"}"#);
    assert_eq!(response.status, ResponseStatus::Error);
    assert!(!r.gw.power_pending());
}

#[test]
fn get_leaves_out_tags_past_timeout() {
    let r = rig();
    r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"start"}"#);
    r.gw.record_sighting("E2801122", -40, 1);
    r.clock.advance(60_000);

    let get = r.gw.dispatch(CommandFamily::Rfid, br#"{"action":"get"}"#);
    assert_eq!(get.fields["count"], 0);
    let tags = r.publisher.published_on(&r.gw.topics().tags());
    assert_eq!(tags[0].payload_str(), "[]");
    assert_eq!(r.gw.tag_count(), 0);
}

#[test]
fn console_and_broker_inventory_share_the_reader() {
    let r = rig();
    let topic = r.gw.topics().command(CommandFamily::Rfid);
    let start = br#"{"action":"start"}"#;
    let stop = br#"{"action":"stop"}"#;

    let local = r.gw.handle_inbound_from(CollectionMode::Local, &topic, start).unwrap();
    assert_eq!(local.fields["mode"], "local");
    assert_eq!(local.fields["hardware_started"], true);
    let remote = r.gw.handle_inbound(&topic, start).unwrap();
    assert_eq!(remote.fields["mode"], "remote");
    assert_eq!(remote.fields["hardware_started"], false);
    assert_eq!(r.link.take_sent(), vec![Frame::inventory_start().encode()]);

    r.gw.record_sighting("E2801122", -40, 1);
    assert_eq!(r.gw.tag_records(CollectionMode::Local).len(), 1);
    assert_eq!(r.gw.tag_records(CollectionMode::Remote).len(), 1);

    let stopped = r.gw.handle_inbound_from(CollectionMode::Local, &topic, stop).unwrap();
    assert_eq!(stopped.fields["hardware_stopped"], false);
    assert!(r.gw.inventory_state().hardware_enabled());
    assert!(r.link.sent().is_empty());

    let stopped = r.gw.handle_inbound(&topic, stop).unwrap();
    assert_eq!(stopped.fields["hardware_stopped"], true);
    assert!(!r.gw.inventory_state().hardware_enabled());
    assert_eq!(r.link.take_sent(), vec![Frame::inventory_stop(true).encode()]);
}

#[test]
fn power_query_alias_echoed_back() {
    let r = rig();
    let query = r.gw.dispatch(CommandFamily::Power, br#"{"action":"query"}"#);
    assert_eq!(query.action, "query");
    let get = r.gw.dispatch(CommandFamily::Power, br#"{"action":"get"}"#);
    assert_eq!(get.action, "get");
}
