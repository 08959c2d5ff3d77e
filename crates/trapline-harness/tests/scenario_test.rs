//! End-to-end scenarios spanning the wire codec, the Sans-IO driver, and
//! the motion planner against the simulated device/port.

use trapline_core::{DriverConfig, ProtocolDriver};
use trapline_harness::{duplex_pair, SimDevice};
use trapline_planner::{AxisVector, KinematicLimits, MotionPlanner};
use trapline_proto::messages::{Ask, BufferMessage, Segment, StatusFlag, SystemDescription};
use trapline_proto::{CodecTable, Env, FramedParser, Handshake, Message, PROTOCOL_VERSION};

fn limits() -> KinematicLimits {
    KinematicLimits {
        v_max: AxisVector::new(vec![5.0, 5.0]),
        a_max: AxisVector::new(vec![10.0, 10.0]),
        junction_speed: 0.05,
        junction_deviation: 0.1,
    }
}

#[test]
fn handshake_binds_codec_sizes_for_the_advertised_axis_count() {
    let description = SystemDescription { version: PROTOCOL_VERSION, axis_count: 2, magic: 0xDEAD_BEEF, buffer_size: 8 };
    let handshake = Handshake::from_description(description).expect("version matches");

    let mut table = CodecTable::initial();
    table.bind(&handshake.env).expect("NUM_AXIS is bound");

    assert_eq!(table.payload_len(trapline_proto::MessageTag::Segment as u8), Some(4 + 4 + 8 + 8 + 2 * 8));
}

#[test]
fn single_move_produces_one_segment_at_rest_on_both_ends() {
    let mut planner =
        MotionPlanner::new(limits(), AxisVector::new(vec![100.0, 100.0]), AxisVector::zeros(2));

    let segments = planner.goto(AxisVector::new(vec![1.0, 1.0])).expect("planning succeeds");

    assert_eq!(segments.len(), 1);
    let segment = &segments[0];
    assert_eq!(segment.move_id, 0);
    assert_eq!(segment.move_flag, 0);
    assert_eq!(segment.start_velocity, 0.0);
    assert_eq!(segment.end_velocity, 0.0);
    assert_eq!(segment.coords, vec![100.0, 100.0]);
}

#[test]
fn reversal_round_trip_hits_the_junction_speed_floor_and_ends_at_rest() {
    let mut planner =
        MotionPlanner::new(limits(), AxisVector::new(vec![100.0, 100.0]), AxisVector::zeros(2));

    let segments = planner
        .plan_moves(&[AxisVector::new(vec![1.0, 1.0]), AxisVector::zeros(2)], None)
        .expect("planning succeeds");

    assert!(segments.len() >= 2);
    assert_eq!(segments.last().unwrap().end_velocity, 0.0);
    // The reversal at the waypoint is a straight-line direction flip
    // (cos = +1 in the junction formula), so the planner must floor the
    // junction entry speed at `junction_speed` rather than let the chain
    // cruise through the corner. `unit` has norm 1, so v_scale reduces to
    // the microsteps-per-unit factor alone.
    let v_scale = 100.0 * 1e-6;
    assert!(segments[1].start_velocity <= 0.05 * v_scale + 1e-9);
}

#[test]
fn flow_control_caps_sends_at_the_devices_granted_spaces() {
    let mut device = SimDevice::new(2, 4);
    let mut driver = ProtocolDriver::new(DriverConfig::default());

    let segment = |id: u32| {
        Message::Segment(Segment { move_id: id, move_flag: 0, start_velocity: 0.0, end_velocity: 0.0, coords: vec![1.0, 1.0] })
    };

    // First batch: announce and send 4, with Done+Start.
    let first_batch: Vec<Message> = (0..4).map(segment).collect();
    driver.send_segments(&first_batch, true, true).unwrap();
    let _ = device.handle(&Message::Buffer(BufferMessage { request_counter: 1, spaces: 4 }));
    for m in &first_batch {
        let _ = device.handle(m);
    }
    let _ = device.handle(&Message::Done);
    let _ = device.handle(&Message::Start);
    assert_eq!(device.free_space(), 0);

    // Device executes two of the four, leaving only 2 free for the next
    // announcement — the scenario's "granted fewer than requested" case.
    device.execute(2);
    assert_eq!(device.free_space(), 2);

    let second_batch: Vec<Message> = (4..8).map(segment).collect();
    driver.send_segments(&second_batch, false, false).unwrap();
    let replies = device.handle(&Message::Buffer(BufferMessage { request_counter: 2, spaces: 4 }));
    assert_eq!(replies, vec![Message::Buffer(BufferMessage { request_counter: 2, spaces: 2 })]);

    // Host honors the echoed grant and sends only the first two segments.
    let granted = match replies.first() {
        Some(Message::Buffer(b)) => b.spaces as usize,
        _ => unreachable!("device always answers a capped announcement with Buffer"),
    };
    for m in &second_batch[..granted] {
        let _ = device.handle(m);
    }
    assert_eq!(device.free_space(), 0);

    device.execute(4);
    let ask_reply = device.handle(&Message::Ask(Ask { request_counter: 3 }));
    assert_eq!(ask_reply, vec![Message::Status(trapline_proto::messages::Status {
        request_counter: 3,
        status_flag: StatusFlag::Idle,
        free_space: 4,
        move_number: 6,
        override_value: 1.0,
        position: vec![0, 0],
    })]);
}

#[test]
fn stale_status_reply_is_rejected_once_superseded_by_a_buffer_announcement() {
    let mut driver = ProtocolDriver::new(DriverConfig::default());
    driver.request_status().unwrap();
    assert!(driver.has_valid_status_request());

    // A buffer announcement supersedes the in-flight status poll.
    let segment = Message::Segment(Segment { move_id: 0, move_flag: 0, start_velocity: 0.0, end_velocity: 0.0, coords: vec![1.0] });
    driver.send_segments(std::slice::from_ref(&segment), false, false).unwrap();
    assert!(!driver.has_valid_status_request());

    // The late status reply, bearing the now-stale token, must not be
    // treated as the answer to anything currently outstanding.
    assert!(!driver.status_request_matches(1));
}

#[test]
fn byte_stream_through_the_sim_port_resynchronizes_after_a_device_error() {
    let (mut host, mut device_end) = duplex_pair();
    use std::io::{Read, Write};

    device_end.write_all(&[trapline_proto::MessageTag::Error as u8]).unwrap();
    device_end.write_all(b"stepper stall").unwrap();
    device_end.write_all(&[trapline_proto::MessageTag::Inquire as u8]).unwrap();

    let mut parser = FramedParser::new(CodecTable::initial(), Env::new());
    let mut buf = [0_u8; 64];
    let n = host.read(&mut buf).unwrap();
    parser.feed(&buf[..n]);

    assert_eq!(parser.poll(), Some(Ok(Message::Error(b"stepper stall".to_vec()))));
    assert_eq!(
        parser.poll(),
        Some(Ok(Message::Error(vec![trapline_proto::MessageTag::Inquire as u8])))
    );
    assert!(parser.is_errored());
}
