mod common;

use common::init_tracing;
use rendezvous::prelude::*;

const SERVERS: i32 = 8;
const CLIENTS: i32 = 48;
const ROUNDS: u32 = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_send_receive_pairs() -> rendezvous::Result<()> {
    init_tracing();
    let kernel = Kernel::default();

    let mut servers = Vec::new();
    for id in 0..SERVERS {
        servers.push(kernel.spawn(Endpoint::new(id), format!("server-{id}"), |ep| async move {
            let mut message = Message::default();
            while ep.receive(Endpoint::ANY, &mut message).await.is_ok() {
                let value = message.u32_at(0).unwrap_or_default();
                message.set_u32(1, value + 1);
                message.set_i32(2, ep.endpoint().id());
                if ep.send(message.source, &message).await.is_err() {
                    break;
                }
            }
        })?);
    }

    let mut clients = Vec::new();
    for id in 0..CLIENTS {
        let (client, _) = kernel.register(Endpoint::new(100 + id), format!("client-{id}"))?;
        clients.push(tokio::spawn(async move {
            let server = Endpoint::new(id % SERVERS);
            for round in 0..ROUNDS {
                let mut message = Message::default();
                message.set_u32(0, round).unwrap();
                client.send_receive(server, &mut message).await?;
                assert_eq!(message.source, server);
                assert_eq!(message.u32_at(1), Some(round + 1));
                assert_eq!(message.i32_at(2), Some(server.id()));
            }
            Ok::<_, IpcError>(())
        }));
    }
    for client in clients {
        assert_eq!(client.await.unwrap(), Ok(()));
    }

    for id in 0..SERVERS {
        assert_eq!(kernel.queued_senders(Endpoint::new(id)), Some(0));
    }
    for id in 0..CLIENTS {
        assert!(!kernel.is_alive(Endpoint::new(100 + id)));
    }

    kernel.shutdown();
    for server in servers {
        assert_eq!(server.await, ExitStatus::Killed);
    }
    Ok(())
}
