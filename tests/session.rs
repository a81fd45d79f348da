//! State-machine scenarios driven through the sans-io session.

use std::sync::Arc;

use bytes::Bytes;
use nocket::protocol::entropy::FixedMask;
use nocket::protocol::{Frame, OpCode, decode_frames};
use nocket::{
    CloseCode, Config, ConnectionState, Error, Event, Limits, Message, ProtocolError, Role, Session,
};

const KEY: [u8; 4] = [0x11, 0x22, 0x33, 0x44];

fn server() -> (Session, Vec<Event>) {
    let mut session = Session::new(Role::Server, &Config::default());
    let mut events = Vec::new();
    session.open(&mut events).unwrap();
    events.clear();
    (session, events)
}

fn client() -> (Session, Vec<Event>) {
    let mut session =
        Session::new(Role::Client, &Config::default()).with_mask_source(Arc::new(FixedMask(KEY)));
    let mut events = Vec::new();
    session.open(&mut events).unwrap();
    events.clear();
    (session, events)
}

fn masked(frame: Frame) -> Bytes {
    frame.to_bytes(Some(KEY)).unwrap()
}

fn sent(session: &mut Session) -> Vec<Frame> {
    let wire = session.take_outgoing().concat();
    decode_frames(&wire, None).unwrap().frames
}

#[test]
fn test_close_received_echoes_once() {
    let (mut session, mut events) = server();
    let mut payload = vec![0x03, 0xE8];
    payload.extend_from_slice(b"going home");

    session
        .receive(&masked(Frame::new(true, OpCode::Close, payload)), &mut events)
        .unwrap();

    assert_eq!(
        events,
        vec![Event::Closed {
            code: 1000,
            reason: "going home".into()
        }]
    );
    assert_eq!(session.state(), ConnectionState::Closing);

    let echoes = sent(&mut session);
    assert_eq!(echoes.len(), 1);
    assert_eq!(echoes[0].opcode(), OpCode::Close);
    assert_eq!(&echoes[0].payload()[..2], &[0x03, 0xE8]);

    session.on_flushed();
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(!session.has_outgoing());
}

#[test]
fn test_empty_close_surfaces_zero_and_empty_echo() {
    let (mut session, mut events) = server();
    session
        .receive(&masked(Frame::close(None, "")), &mut events)
        .unwrap();

    assert_eq!(
        events,
        vec![Event::Closed {
            code: 0,
            reason: String::new()
        }]
    );
    let echoes = sent(&mut session);
    assert_eq!(echoes.len(), 1);
    assert!(echoes[0].payload().is_empty());
}

#[test]
fn test_unsendable_close_code_echoed_as_normal() {
    let (mut session, mut events) = server();
    session
        .receive(&masked(Frame::close(Some(1005), "")), &mut events)
        .unwrap();

    assert!(matches!(events[0], Event::Closed { code: 1005, .. }));
    let echoes = sent(&mut session);
    assert_eq!(&echoes[0].payload()[..], &[0x03, 0xE8]);
}

#[test]
fn test_one_byte_close_is_protocol_violation() {
    let (mut session, mut events) = server();
    let result = session.receive(&masked(Frame::new(true, OpCode::Close, vec![0x03u8])), &mut events);

    assert_eq!(result, Err(Error::Protocol(ProtocolError::InvalidClosePayload)));
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(matches!(events[..], [Event::Closed { code: 1002, .. }]));
}

#[test]
fn test_local_close_completes_on_peer_close() {
    let (mut session, mut events) = client();
    session.close(CloseCode::GoingAway, "bye").unwrap();
    assert_eq!(session.state(), ConnectionState::Closing);

    let out = sent(&mut session);
    assert_eq!(out.len(), 1);
    assert!(out[0].is_masked());
    assert_eq!(&out[0].payload()[..], b"\x03\xE9bye");

    let reply = Frame::close(Some(1001), "").to_bytes(None).unwrap();
    session.receive(&reply, &mut events).unwrap();
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(!session.has_outgoing());
    assert_eq!(
        events,
        vec![Event::Closed {
            code: 1001,
            reason: String::new()
        }]
    );
}

#[test]
fn test_closing_state_rules() {
    let (mut session, mut events) = server();
    session.close(CloseCode::Normal, "").unwrap();
    session.take_outgoing();

    let mut wire = masked(Frame::ping("p")).to_vec();
    wire.extend_from_slice(&masked(Frame::pong("q")));
    wire.extend_from_slice(&masked(Frame::text("dropped")));
    session.receive(&wire, &mut events).unwrap();

    assert!(!session.has_outgoing());
    assert_eq!(events, vec![Event::Pong(Bytes::from_static(b"q"))]);
    assert_eq!(session.send_text("late"), Err(Error::ConnectionClosed));
}

#[test]
fn test_bytes_after_close_ignored() {
    let (mut session, mut events) = server();
    let mut wire = masked(Frame::close(Some(1000), "")).to_vec();
    wire.extend_from_slice(&masked(Frame::text("after")));
    session.receive(&wire, &mut events).unwrap();
    session.receive(&masked(Frame::text("later")), &mut events).unwrap();

    assert_eq!(events.len(), 1);
    assert!(events[0].is_closed());
}

#[test]
fn test_reserved_bit_rejected_never_delivered() {
    let (mut session, mut events) = server();
    let mut wire = masked(Frame::text("secret")).to_vec();
    wire[0] |= 0x10;

    let result = session.receive(&wire, &mut events);
    assert_eq!(result, Err(Error::Protocol(ProtocolError::ReservedBitsSet)));
    assert!(!events.iter().any(|e| matches!(e, Event::Message(_))));
    assert_eq!(session.state(), ConnectionState::Closed);

    let out = sent(&mut session);
    assert_eq!(out.len(), 1);
    assert_eq!(&out[0].payload()[..2], &[0x03, 0xEA]);

    assert_eq!(
        session.receive(&[0x81, 0x00], &mut events),
        Err(Error::InvalidStateForFrame(ConnectionState::Closed))
    );
}

#[test]
fn test_unmasked_client_frame_rejected() {
    let (mut session, mut events) = server();
    let wire = Frame::text("bare").to_bytes(None).unwrap();
    assert_eq!(
        session.receive(&wire, &mut events),
        Err(Error::Protocol(ProtocolError::UnmaskedClientFrame))
    );
}

#[test]
fn test_fragmented_message_with_interleaved_ping() {
    let (mut session, mut events) = server();
    let mut wire = masked(Frame::new(false, OpCode::Binary, vec![1u8, 2])).to_vec();
    wire.extend_from_slice(&masked(Frame::ping("mid")));
    wire.extend_from_slice(&masked(Frame::new(false, OpCode::Continuation, vec![3u8])));
    wire.extend_from_slice(&masked(Frame::new(true, OpCode::Continuation, vec![4u8])));

    for byte in wire {
        session.receive(&[byte], &mut events).unwrap();
    }

    assert_eq!(events, vec![Event::Message(Message::binary(vec![1u8, 2, 3, 4]))]);
    let out = sent(&mut session);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].opcode(), OpCode::Pong);
    assert_eq!(&out[0].payload()[..], b"mid");
}

#[test]
fn test_continuation_without_start_fails_connection() {
    let (mut session, mut events) = server();
    let result = session.receive(
        &masked(Frame::new(true, OpCode::Continuation, "orphan")),
        &mut events,
    );
    assert_eq!(
        result,
        Err(Error::Protocol(ProtocolError::UnexpectedContinuation))
    );
    assert!(matches!(events[..], [Event::Closed { code: 1002, .. }]));
}

#[test]
fn test_transport_close_discards_partial_message() {
    let (mut session, mut events) = server();
    session
        .receive(&masked(Frame::new(false, OpCode::Text, "half")), &mut events)
        .unwrap();
    session.transport_closed(&mut events);

    assert_eq!(
        events,
        vec![Event::Closed {
            code: 1006,
            reason: String::new()
        }]
    );
    assert_eq!(session.state(), ConnectionState::Closed);
}

#[test]
fn test_transport_close_after_handshake_reports_nothing_new() {
    let (mut session, mut events) = server();
    session
        .receive(&masked(Frame::close(Some(1000), "")), &mut events)
        .unwrap();
    session.transport_closed(&mut events);
    assert_eq!(events.len(), 1);
}

#[test]
fn test_invalid_opcode_rejected() {
    let (mut session, mut events) = server();
    let result = session.receive(&[0x83, 0x80, 0, 0, 0, 0], &mut events);
    assert_eq!(result, Err(Error::Protocol(ProtocolError::InvalidOpcode(3))));
}

#[test]
fn test_oversized_frame_input_is_dropped() {
    let config = Config::default().with_limits(Limits::new(8, 8, 4, 4096));
    let mut session = Session::new(Role::Server, &config);
    let mut events = Vec::<Event>::new();
    session.open(&mut events).unwrap();
    events.clear();

    let result = session.receive(&masked(Frame::binary(vec![0u8; 32])), &mut events);
    assert!(matches!(result, Err(Error::FrameTooLarge { .. })));
    assert_eq!(session.state(), ConnectionState::Open);
    assert!(events.is_empty());

    session.receive(&masked(Frame::text("ok")), &mut events).unwrap();
    assert_eq!(events, vec![Event::Message(Message::text("ok"))]);

    session.fail_connection(CloseCode::MessageTooBig, "too big", &mut events);
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(matches!(events.last(), Some(Event::Closed { code: 1009, .. })));
}
