//! Integration tests for the full admission + dispatch pipeline: a TCP
//! handshake establishes the session, then UDP datagrams from the same host
//! are routed to the input collaborators.

use std::sync::Arc;
use std::time::Duration;

use iobus_core::protocol::codec::{decode_message, encode_message};
use iobus_core::protocol::messages::{
    HandshakeReq, KeyAction, KeyEvent, Message, ModifierFlags, MouseMove, HEADER_SIZE,
};
use iobus_server::input::mock::{RecordedEvent, RecordingInput};
use iobus_server::session::SessionRegistry;
use iobus_server::transport::control::{run_control_server, ControlSettings};
use iobus_server::transport::data::{run_data_server, DataDispatcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;

struct Stack {
    tcp_address: std::net::SocketAddr,
    udp_address: std::net::SocketAddr,
    input: Arc<RecordingInput>,
    _shutdown: watch::Sender<bool>,
}

async fn start_stack() -> Stack {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tcp_address = listener.local_addr().unwrap();
    let udp_address = udp.local_addr().unwrap();

    let registry = SessionRegistry::new();
    let input = Arc::new(RecordingInput::new());
    let settings = ControlSettings {
        udp_port: udp_address.port(),
        keepalive_interval: 5,
        keepalive_timeout: Duration::from_secs(15),
    };
    let dispatcher = DataDispatcher::new(
        registry.clone(),
        input.clone(),
        input.clone(),
        input.clone(),
    );
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_control_server(
        listener,
        registry,
        settings,
        input.clone(),
        input.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_data_server(udp, dispatcher, shutdown_rx));
    Stack {
        tcp_address,
        udp_address,
        input,
        _shutdown: shutdown,
    }
}

async fn handshake(stack: &Stack) -> TcpStream {
    let mut stream = TcpStream::connect(stack.tcp_address).await.unwrap();
    stream
        .write_all(&encode_message(&Message::HandshakeReq(HandshakeReq {
            client_version: 1,
            flags: 0,
            client_name: "client".to_string(),
        })))
        .await
        .unwrap();
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    let payload_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut frame = header.to_vec();
    frame.resize(HEADER_SIZE + payload_len, 0);
    stream.read_exact(&mut frame[HEADER_SIZE..]).await.unwrap();
    assert!(matches!(
        decode_message(&frame).unwrap().0,
        Message::HandshakeAck(_)
    ));
    stream
}

/// Polls the recorder until `n` events arrived or two seconds pass.
async fn wait_for_events(input: &RecordingInput, n: usize) {
    for _ in 0..100 {
        if input.len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {n} events, got {}", input.len());
}

fn key_down(keycode: u16) -> Vec<u8> {
    encode_message(&Message::KeyEvent(KeyEvent {
        timestamp: 1,
        action: KeyAction::Down,
        keycode,
        modifiers: ModifierFlags(ModifierFlags::SHIFT),
    }))
}

#[tokio::test]
async fn key_event_reaches_keyboard_exactly_once() {
    let stack = start_stack().await;
    let _control = handshake(&stack).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&key_down(0x04), stack.udp_address).await.unwrap();

    wait_for_events(&stack.input, 1).await;
    assert_eq!(
        stack.input.take(),
        vec![RecordedEvent::Key {
            action: KeyAction::Down,
            keycode: 0x04,
            modifiers: ModifierFlags(ModifierFlags::SHIFT),
        }]
    );
}

#[tokio::test]
async fn datagrams_dropped_before_handshake() {
    let stack = start_stack().await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&key_down(0x04), stack.udp_address).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(stack.input.is_empty());
}

#[tokio::test]
async fn corrupt_datagram_does_not_stall_the_stream() {
    let stack = start_stack().await;
    let _control = handshake(&stack).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut corrupt = key_down(0x04);
    corrupt[1] = 0xEE;
    sender.send_to(&corrupt, stack.udp_address).await.unwrap();
    sender
        .send_to(
            &encode_message(&Message::MouseMove(MouseMove {
                timestamp: 2,
                dx: 3,
                dy: 4,
            })),
            stack.udp_address,
        )
        .await
        .unwrap();

    wait_for_events(&stack.input, 1).await;
    assert_eq!(stack.input.take(), vec![RecordedEvent::Move { dx: 3, dy: 4 }]);
}

#[tokio::test]
async fn control_messages_over_udp_ignored() {
    let stack = start_stack().await;
    let _control = handshake(&stack).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(&encode_message(&Message::Ping), stack.udp_address)
        .await
        .unwrap();
    sender
        .send_to(&encode_message(&Message::GetSystemState), stack.udp_address)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(stack.input.is_empty());
}

#[tokio::test]
async fn burst_of_moves_all_dispatched() {
    let stack = start_stack().await;
    let _control = handshake(&stack).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for i in 0..20i16 {
        sender
            .send_to(
                &encode_message(&Message::MouseMove(MouseMove {
                    timestamp: i as u32,
                    dx: i,
                    dy: -i,
                })),
                stack.udp_address,
            )
            .await
            .unwrap();
    }

    wait_for_events(&stack.input, 20).await;
    let events = stack.input.take();
    assert_eq!(events.len(), 20);
    assert_eq!(events[0], RecordedEvent::Move { dx: 0, dy: 0 });
    assert_eq!(events[19], RecordedEvent::Move { dx: 19, dy: -19 });
}
