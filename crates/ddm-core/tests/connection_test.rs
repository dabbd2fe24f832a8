//! Connection behavior over simulated and in-process transports.

use std::{io::Cursor, thread};

use ddm_core::{Connection, ConnectionError, SessionConfig, Transport, TransportKind};
use ddm_harness::{SharedWire, SimStream, SimStreamBuilder};
use ddm_proto::{BufferPool, ChainBuilder, Frame, ProtocolError, ScratchBuffer, encode_frame, read_frame};

fn local_config() -> SessionConfig {
    SessionConfig { transport: TransportKind::Local, ..SessionConfig::default() }
}

#[test]
fn concurrent_senders_never_interleave() {
    let wire = SharedWire::new();
    let mut pool = BufferPool::default();
    let conn = Connection::new(Cursor::new(Vec::new()), wire.clone(), &local_config(), &mut pool);

    thread::scope(|s| {
        for id in 1..=4u8 {
            let sender = conn.sender();
            s.spawn(move || {
                for round in 0..3u16 {
                    let payload = vec![id; 50_000 + usize::from(round) * 7];
                    sender.send(&Frame::request(u16::from(id), payload)).unwrap();
                }
            });
        }
    });

    let mut reader = Cursor::new(wire.bytes());
    let mut scratch = ScratchBuffer::new();
    let mut seen = [0usize; 5];
    for _ in 0..12 {
        let frame = read_frame(&mut reader, &mut scratch).unwrap();
        let id = frame.correlation_id() as u8;
        assert!(frame.payload.iter().all(|&b| b == id), "frame {id} has foreign bytes");
        seen[usize::from(id)] += 1;
    }
    assert_eq!(seen, [0, 3, 3, 3, 3]);
    assert_eq!(reader.position() as usize, wire.bytes().len());
}

#[test]
fn host_round_trip_over_local_transport() {
    let (client, host) = Transport::local_pair();

    let host = thread::spawn(move || {
        let mut pool = BufferPool::default();
        let mut conn = Connection::from_transport(host, &local_config(), &mut pool).unwrap();
        for _ in 0..3 {
            let request = conn.receive().unwrap();
            let mut body = request.payload.to_vec();
            body.reverse();
            conn.send(&Frame::reply(request.correlation_id(), body)).unwrap();
        }
    });

    let mut pool = BufferPool::default();
    let mut conn = Connection::from_transport(client, &local_config(), &mut pool).unwrap();
    for len in [10usize, 32_761, 100_000] {
        let body: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        let reply = conn.request(body.clone()).unwrap();
        assert!(reply.payload.iter().rev().eq(body.iter()));
    }

    host.join().unwrap();
}

#[test]
fn peer_disconnect_mid_message_closes_connection() {
    let wire = encode_frame(&Frame::reply(1, vec![0u8; 70_000]));
    let stream = SimStreamBuilder::new(3).input(&wire).max_chunk(2048).drop_after(40_000).build();

    let mut pool = BufferPool::default();
    let mut conn = Connection::new(stream, Vec::new(), &local_config(), &mut pool);

    let err = conn.receive().unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::Protocol(ProtocolError::ConnectionDropped { context: "continuation packet", .. })
    ));
    assert!(conn.is_closed());
    assert!(matches!(conn.receive(), Err(ConnectionError::Closed)));
    assert!(matches!(conn.send(&Frame::request(2, vec![1])), Err(ConnectionError::Closed)));
}

#[test]
fn fragmented_chain_receipt() {
    let chain = ChainBuilder::new()
        .push(Frame::request(5, vec![1; 100]))
        .push(Frame::object(5, vec![2; 40_000]))
        .push(Frame::object(5, vec![3; 10]))
        .build();

    let mut wire = Vec::new();
    for frame in &chain {
        wire.extend_from_slice(&encode_frame(frame));
    }

    let mut pool = BufferPool::default();
    let stream = SimStream::fragmented(99, &wire, 7);
    let mut conn = Connection::new(stream, Vec::new(), &local_config(), &mut pool);

    let received = conn.receive_chain().unwrap();
    assert_eq!(received.len(), 3);
    assert!(received[0].header.is_same_correlator());
    assert!(!received[2].header.is_chained());
    assert_eq!(received[1].payload.len(), 40_000);
}

#[test]
fn oversized_message_rejected_by_ceiling() {
    let config = SessionConfig { max_message_size: 50_000, ..local_config() };
    let wire = encode_frame(&Frame::reply(1, vec![0u8; 60_000]));

    let mut pool = BufferPool::default();
    let mut conn = Connection::new(Cursor::new(wire.to_vec()), Vec::new(), &config, &mut pool);

    let err = conn.receive().unwrap_err();
    assert!(matches!(err, ConnectionError::Protocol(ProtocolError::FrameTooLarge { max: 50_000, .. })));
}
