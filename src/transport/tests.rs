use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use super::serve;
use super::tcp::run_session;
use crate::broker::{Broker, SharedBroker, lock, shared};
use crate::protocol::{Format, FrameReader, Message, codec};

async fn spawn_server(max_connections: usize) -> (SharedBroker, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let broker = shared(Broker::new());
    tokio::spawn(serve(listener, broker.clone(), max_connections));
    (broker, addr)
}

async fn connect(addr: &str) -> (FrameReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (FrameReader::new(read_half), write_half)
}

async fn send(writer: &mut OwnedWriteHalf, format: Format, message: Message) {
    let frame = codec::encode(format, &message).unwrap();
    writer.write_all(&frame).await.unwrap();
}

async fn wait_for_clients(broker: &SharedBroker, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while lock(broker).client_count() != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count never settled");
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let (_broker, addr) = spawn_server(16).await;
    let (mut reader, mut writer) = connect(&addr).await;

    writer.write_all(&[0, 0, 4, b'n', b'o', b'p', b'e']).await.unwrap();
    send(&mut writer, Format::Json, Message::publish("t", "v")).await;
    send(&mut writer, Format::Json, Message::TopicListReq).await;

    let reply = reader.read_message().await.unwrap();
    assert_eq!(
        reply,
        Some(Message::TopicListRep {
            topics: vec!["t".into()]
        })
    );
}

#[tokio::test]
async fn test_replies_follow_acknowledged_format() {
    let (_broker, addr) = spawn_server(16).await;
    let (mut reader, mut writer) = connect(&addr).await;

    send(&mut writer, Format::Json, Message::Ack { format: Format::Binary }).await;
    send(&mut writer, Format::Xml, Message::TopicListReq).await;

    let frame = reader.next_frame().await.unwrap().unwrap();
    assert_eq!(frame.format, Format::Binary);
    assert_eq!(
        codec::decode(&frame).unwrap(),
        Message::TopicListRep { topics: vec![] }
    );
}

#[tokio::test]
async fn test_zero_length_frame_disconnects_client() {
    let (broker, addr) = spawn_server(16).await;
    let (mut reader, mut writer) = connect(&addr).await;

    send(&mut writer, Format::Json, Message::sub("t")).await;
    send(&mut writer, Format::Json, Message::TopicListReq).await;
    assert!(matches!(
        reader.read_message().await.unwrap(),
        Some(Message::TopicListRep { .. })
    ));
    assert_eq!(lock(&broker).client_count(), 1);

    writer.write_all(&[0, 0, 0]).await.unwrap();

    assert_eq!(reader.next_frame().await.unwrap(), None);
    wait_for_clients(&broker, 0).await;
    assert!(lock(&broker).store().subscribers("t").unwrap().is_empty());
}

#[tokio::test]
async fn test_eof_cleans_up_subscriptions() {
    let (broker, addr) = spawn_server(16).await;
    let (mut reader, mut writer) = connect(&addr).await;

    send(&mut writer, Format::Xml, Message::sub("a")).await;
    send(&mut writer, Format::Xml, Message::TopicListReq).await;
    reader.read_message().await.unwrap();

    drop(writer);
    drop(reader);

    wait_for_clients(&broker, 0).await;
    assert!(lock(&broker).store().subscribers("a").unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_limit() {
    let (broker, addr) = spawn_server(1).await;
    let (mut first_reader, mut first_writer) = connect(&addr).await;
    send(&mut first_writer, Format::Json, Message::TopicListReq).await;
    first_reader.read_message().await.unwrap();

    let (mut second_reader, _second_writer) = connect(&addr).await;
    let closed = timeout(Duration::from_secs(5), second_reader.next_frame())
        .await
        .expect("rejected connection was not closed");
    assert!(matches!(closed, Ok(None) | Err(_)));
    assert_eq!(lock(&broker).client_count(), 1);
}

#[tokio::test]
async fn test_write_failure_ends_session() {
    let broker = shared(Broker::new());
    let (mut client_in, server_in) = tokio::io::duplex(4096);
    let (server_out, client_out) = tokio::io::duplex(4096);
    // Nobody reads what the broker sends
    drop(client_out);

    for message in [Message::sub("t"), Message::TopicListReq] {
        let frame = codec::encode(Format::Json, &message).unwrap();
        client_in.write_all(&frame).await.unwrap();
    }

    // client_in stays open, so only the failed reply write can end the session
    timeout(
        Duration::from_secs(5),
        run_session(server_in, server_out, broker.clone(), "duplex".to_string()),
    )
    .await
    .expect("session kept running after a write failure");

    assert_eq!(lock(&broker).client_count(), 0);
    assert!(lock(&broker).store().subscribers("t").unwrap().is_empty());
    drop(client_in);
}
