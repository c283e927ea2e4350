// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders speaking another protocol version are turned away.

use crate::prelude::*;
use crate::prelude::assert_eq;
use tokio::net::TcpStream;

async fn announce(addr: &str, version: u32) -> rmake_wire::ManagerAcknowledge {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let ann = BuilderAnnouncement { protocol_version: version, ..BuilderAnnouncement::new("old-box", "127.0.0.1:1") };
    write_message(&mut stream, &ann.into()).await.unwrap();
    match read_message(&mut stream).await.unwrap() {
        Message::ManagerAcknowledge(ack) => ack,
        other => panic!("expected acknowledge, got {}", other.kind()),
    }
}

#[tokio::test]
async fn mismatched_version_is_rejected_and_its_uuid_reused() {
    let mut farm = Farm::start().await;

    let ack = announce(&farm.addr, PROTOCOL_VERSION + 1).await;
    assert!(!ack.success);
    assert_eq!(ack.uuid, None);
    assert!(ack.message.contains("not supported"), "{}", ack.message);
    assert_eq!(farm.ctx.queue.len(), 0);
    assert_eq!(farm.ctx.uuids.in_use(), 0);

    // The id handed out during the failed handshake goes to the next builder
    farm.add_builder().await;
    assert!(farm.ctx.builders.get(BuilderId(0)).is_some());
    assert_eq!(farm.ctx.queue.loads(), vec![(BuilderId(0), 0)]);
}

#[tokio::test]
async fn builder_disconnect_frees_its_slot() {
    let mut farm = Farm::start().await.with_builders(1).await;

    let (mut stream, ack) = {
        let mut stream = TcpStream::connect(&farm.addr).await.unwrap();
        let ann = BuilderAnnouncement::new("transient", "127.0.0.1:1");
        write_message(&mut stream, &ann.into()).await.unwrap();
        match read_message(&mut stream).await.unwrap() {
            Message::ManagerAcknowledge(ack) => (stream, ack),
            other => panic!("expected acknowledge, got {}", other.kind()),
        }
    };
    assert_eq!(ack.uuid, Some(BuilderId(1)));
    assert_eq!(farm.ctx.queue.len(), 2);

    use tokio::io::AsyncWriteExt;
    stream.shutdown().await.unwrap();
    drop(stream);
    eventually(|| farm.ctx.queue.len() == 1 && farm.ctx.uuids.in_use() == 1).await;

    // Freed id goes to the next builder
    farm.add_builder().await;
    assert!(farm.ctx.builders.get(BuilderId(1)).is_some());
}
