mod common;

use common::{init_tracing, wait_blocked};
use rendezvous::prelude::*;
use tokio_util::sync::CancellationToken;

const INCREMENT: i32 = 1;
const SILENT: i32 = 2;

async fn increment(mut request: Message) -> Reply {
    let value = request.u8_at(0).unwrap_or_default();
    request.set_u8(1, value.wrapping_add(1));
    request.m_type = errno::OK;
    request.into()
}

#[tokio::test]
async fn test_request_loop_answers() -> rendezvous::Result<()> {
    init_tracing();
    let kernel = Kernel::default();
    let (server, _) = kernel.register(Endpoint::new(39), "server")?;
    let (client, _) = kernel.register(Endpoint::new(40), "client")?;
    let server_loop = server
        .create_request_loop()
        .with_handler(INCREMENT, increment)
        .spawn();
    drop(server);

    let mut message = Message::new(INCREMENT);
    message.set_u8(0, 40).unwrap();
    client.send_receive(Endpoint::new(39), &mut message).await.unwrap();
    assert_eq!(message.m_type, errno::OK);
    assert_eq!(message.source, Endpoint::new(39));
    assert_eq!(&message.data()[..4], &[40, 41, 0, 0]);

    let mut unknown = Message::new(99);
    client.send_receive(Endpoint::new(39), &mut unknown).await.unwrap();
    assert_eq!(unknown.m_type, errno::ENOSYS);

    kernel.kill(Endpoint::new(39));
    assert_eq!(server_loop.await.unwrap(), Ok(()));
    Ok(())
}

#[tokio::test]
async fn test_request_loop_survives_vanished_client() -> rendezvous::Result<()> {
    init_tracing();
    let kernel = Kernel::default();
    let (server, _) = kernel.register(Endpoint::new(39), "server")?;
    let (one_way, _) = kernel.register(Endpoint::new(41), "one-way")?;
    let (client, _) = kernel.register(Endpoint::new(40), "client")?;
    let ct = CancellationToken::new();
    let server_loop = tokio::spawn(
        server
            .create_request_loop()
            .with_handler(INCREMENT, increment)
            .with_handler(SILENT, |_| async { Reply::None })
            .run_until_cancelled(ct.clone()),
    );
    drop(server);

    // a plain send is not waiting for the reply, so the reply is dropped
    one_way.send(Endpoint::new(39), &Message::new(INCREMENT)).await.unwrap();
    one_way.send(Endpoint::new(39), &Message::new(SILENT)).await.unwrap();

    let mut message = Message::new(INCREMENT);
    client.send_receive(Endpoint::new(39), &mut message).await.unwrap();
    assert_eq!(message.u8_at(1), Some(1));

    wait_blocked(&kernel, Endpoint::new(39), PendingKind::Receive).await;
    ct.cancel();
    assert_eq!(server_loop.await.unwrap(), Ok(()));
    // cancelling withdrew the receive, the endpoint itself is gone with its handles
    assert!(!kernel.is_alive(Endpoint::new(39)));
    Ok(())
}
