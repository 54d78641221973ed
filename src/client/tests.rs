use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use super::pubsub_client::{Client, SessionState};
use super::queue::{Queue, QueueKind};
use crate::protocol::{Format, FrameReader, Message, codec};
use crate::utils::error::ClientError;

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<Bytes>();
    let client = Client::new(tx);
    assert!(client.id.starts_with("client-"));
    assert_eq!(client.format, Format::Json);
    assert_eq!(client.state, SessionState::AwaitingFormat);
}

#[test]
fn test_client_ids_are_unique() {
    let (tx, _rx) = mpsc::unbounded_channel::<Bytes>();
    let a = Client::new(tx.clone());
    let b = Client::new(tx);
    assert_ne!(a.id, b.id);
}

#[test]
fn test_send_frame_after_receiver_dropped() {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let client = Client::with_id("a", tx);
    assert!(client.send_frame(Bytes::from_static(b"x")).is_ok());
    drop(rx);
    assert!(client.send_frame(Bytes::from_static(b"y")).is_err());
}

/// Accepts one connection on an ephemeral port, standing in for a broker.
async fn fake_broker() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> (FrameReader<OwnedReadHalf>, OwnedWriteHalf) {
    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, write_half) = stream.into_split();
    (FrameReader::new(read_half), write_half)
}

#[tokio::test]
async fn test_consumer_sends_ack_then_sub() {
    let (listener, addr) = fake_broker().await;
    let queue = tokio::spawn(async move {
        Queue::connect(addr, "news", QueueKind::Consumer, Format::Xml).await
    });
    let (mut reader, _writer) = accept(&listener).await;

    let ack = reader.next_frame().await.unwrap().unwrap();
    assert_eq!(ack.format, Format::Xml);
    assert_eq!(
        codec::decode(&ack).unwrap(),
        Message::Ack { format: Format::Xml }
    );
    let sub = reader.next_frame().await.unwrap().unwrap();
    assert_eq!(sub.format, Format::Xml);
    assert_eq!(codec::decode(&sub).unwrap(), Message::sub("news"));

    let queue = queue.await.unwrap().unwrap();
    assert_eq!(queue.topic(), "news");
    assert_eq!(queue.kind(), QueueKind::Consumer);
}

#[tokio::test]
async fn test_producer_push_and_consumer_refusal() {
    let (listener, addr) = fake_broker().await;
    let producer_addr = addr.clone();
    let producer = tokio::spawn(async move {
        let mut queue =
            Queue::connect(producer_addr, "t", QueueKind::Producer, Format::Binary).await?;
        queue.push("v1").await?;
        queue.close().await
    });
    let (mut reader, _writer) = accept(&listener).await;

    assert_eq!(
        reader.read_message().await.unwrap(),
        Some(Message::Ack {
            format: Format::Binary
        })
    );
    assert_eq!(
        reader.read_message().await.unwrap(),
        Some(Message::publish("t", "v1"))
    );
    assert_eq!(reader.read_message().await.unwrap(), None);
    producer.await.unwrap().unwrap();

    let consumer = tokio::spawn(async move {
        let mut queue = Queue::connect(addr, "t", QueueKind::Consumer, Format::Json).await?;
        queue.push("nope").await
    });
    let _conn = accept(&listener).await;
    assert!(matches!(
        consumer.await.unwrap(),
        Err(ClientError::NotAProducer)
    ));
}

#[tokio::test]
async fn test_list_topics_buffers_deliveries() {
    let (listener, addr) = fake_broker().await;
    let client = tokio::spawn(async move {
        let mut queue = Queue::connect(addr, "a", QueueKind::Consumer, Format::Json).await?;
        let topics = queue.list_topics().await?;
        let first = queue.pull().await?;
        let second = queue.pull().await?;
        let end = queue.pull().await?;
        Ok::<_, ClientError>((topics, first, second, end))
    });

    let (mut reader, mut writer) = accept(&listener).await;
    assert!(matches!(reader.read_message().await, Ok(Some(Message::Ack { .. }))));
    assert_eq!(reader.read_message().await.unwrap(), Some(Message::sub("a")));
    assert_eq!(
        reader.read_message().await.unwrap(),
        Some(Message::TopicListReq)
    );

    for message in [
        Message::publish("a", "1"),
        Message::TopicListRep {
            topics: vec!["a".into()],
        },
        Message::publish("a", "2"),
    ] {
        let frame = codec::encode(Format::Json, &message).unwrap();
        writer.write_all(&frame).await.unwrap();
    }
    writer.shutdown().await.unwrap();
    drop(writer);
    drop(reader);

    let (topics, first, second, end) = client.await.unwrap().unwrap();
    assert_eq!(topics, vec!["a".to_string()]);
    assert_eq!(first, Some(("a".to_string(), "1".to_string())));
    assert_eq!(second, Some(("a".to_string(), "2".to_string())));
    assert_eq!(end, None);
}

#[tokio::test]
async fn test_pull_skips_malformed_frames() {
    let (listener, addr) = fake_broker().await;
    let client = tokio::spawn(async move {
        let mut queue = Queue::connect(addr, "a", QueueKind::Consumer, Format::Json).await?;
        queue.pull().await
    });

    let (_reader, mut writer) = accept(&listener).await;
    writer.write_all(&[0, 0, 3, b'x', b'y', b'z']).await.unwrap();
    let frame = codec::encode(Format::Xml, &Message::publish("a", "ok")).unwrap();
    writer.write_all(&frame).await.unwrap();

    assert_eq!(
        client.await.unwrap().unwrap(),
        Some(("a".to_string(), "ok".to_string()))
    );
}

#[tokio::test]
async fn test_list_topics_on_closed_connection() {
    let (listener, addr) = fake_broker().await;
    let client = tokio::spawn(async move {
        let mut queue = Queue::connect(addr, "a", QueueKind::Producer, Format::Json).await?;
        queue.list_topics().await
    });

    let (mut reader, writer) = accept(&listener).await;
    assert!(matches!(reader.read_message().await, Ok(Some(Message::Ack { .. }))));
    assert_eq!(
        reader.read_message().await.unwrap(),
        Some(Message::TopicListReq)
    );
    drop(writer);
    drop(reader);

    assert!(matches!(
        client.await.unwrap(),
        Err(ClientError::Disconnected)
    ));
}

#[tokio::test]
async fn test_cancel_messages() {
    let (listener, addr) = fake_broker().await;
    let client = tokio::spawn(async move {
        let mut queue = Queue::connect(addr, "news", QueueKind::Consumer, Format::Json).await?;
        queue.cancel().await?;
        queue.cancel_all().await?;
        queue.close().await?;
        Ok::<_, ClientError>(())
    });

    let (mut reader, _writer) = accept(&listener).await;
    let mut received = Vec::new();
    while let Some(message) = reader.read_message().await.unwrap() {
        received.push(message);
    }

    client.await.unwrap().unwrap();
    assert_eq!(
        received,
        vec![
            Message::Ack {
                format: Format::Json
            },
            Message::sub("news"),
            Message::cancel_sub("news"),
            Message::cancel_sub(""),
        ]
    );
}
