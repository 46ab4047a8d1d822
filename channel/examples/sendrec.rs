use std::str::FromStr;

use rendezvous::prelude::*;
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

const SERVER: Endpoint = Endpoint::new(39);
const CLIENT: Endpoint = Endpoint::new(40);

#[tokio::main]
async fn main() -> rendezvous::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::from_default_env()
                    .add_directive(Directive::from_str("info").expect("valid directive"))
                    .add_directive(Directive::from_str("rendezvous=debug").expect("valid directive")),
            ),
        )
        .init();

    let kernel = Kernel::new(KernelConfig::default());
    let server = kernel.spawn(SERVER, "server", |ep| async move {
        let mut message = Message::default();
        if let Err(error) = ep.receive(CLIENT, &mut message).await {
            tracing::error!(%error, "server receive failed");
            return ep.exit(ExitStatus::Exited(error.errno()));
        }
        let value = message.u8_at(0).unwrap_or_default();
        message.set_u8(1, value.wrapping_add(1));
        tracing::info!(from = %message.source, value, "server answering");
        let status = match ep.send(CLIENT, &message).await {
            Ok(()) => 0,
            Err(error) => error.errno(),
        };
        ep.exit(ExitStatus::Exited(status));
    })?;
    let client = kernel.spawn(CLIENT, "client", |ep| async move {
        let mut message = Message::default();
        message.set_u8(0, 40);
        match ep.send_receive(SERVER, &mut message).await {
            Ok(()) => {
                tracing::info!(
                    data0 = ?message.u8_at(0),
                    data1 = ?message.u8_at(1),
                    "client got reply"
                );
                ep.exit(ExitStatus::Exited(0));
            }
            Err(error) => {
                tracing::error!(%error, "client sendrec failed");
                ep.exit(ExitStatus::Exited(error.errno()));
            }
        }
    })?;

    let (server, client) = tokio::join!(server, client);
    tracing::info!(%server, %client, "both endpoints exited");

    let mut message = Message::default();
    let (probe, _) = kernel.register(Endpoint::new(41), "probe")?;
    let status = probe.ipc_call(IpcCall::Send.number(), Endpoint::new(999), &mut message).await;
    tracing::info!(status, error = ?IpcError::from_errno(status), "send to a missing endpoint");
    kernel.shutdown();
    Ok(())
}
