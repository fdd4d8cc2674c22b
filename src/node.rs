//! Process lifecycle: wires the networking layer together and owns the
//! long-lived tasks (two receive loops plus the announcement timer).

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::consumer::EventConsumer;
use crate::error::RelayError;
use crate::network::decoder::Decoder;
use crate::network::dispatcher::Dispatcher;
use crate::network::listener;
use crate::network::membership::MembershipStore;
use crate::network::sender::UnicastSender;
use crate::network::transport::{ReliableTransport, UdpTransport};

pub struct RelayNode {
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayNode {
    /// Build the node and start its tasks. The first liveness announcement
    /// goes out immediately (the announcer's interval ticks at zero).
    pub async fn start(
        config: Config,
        consumer: Arc<dyn EventConsumer>,
    ) -> Result<RelayNode, RelayError> {
        let config = Arc::new(config);
        let static_hosts = Arc::new(config.static_host_set());
        tracing::info!(
            "🛰️ Starting relay node {} on port {} ({} static peer addresses)",
            config.node.name,
            config.network.listen_port,
            static_hosts.len()
        );

        let udp = Arc::new(UnicastSender::new(
            Box::new(UdpTransport::new().await?),
            static_hosts.clone(),
        ));
        let reliable = Arc::new(UnicastSender::new(
            Box::new(ReliableTransport::new()),
            static_hosts,
        ));
        let membership = Arc::new(MembershipStore::new(udp.clone(), reliable.clone()));
        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher::new(
            udp,
            reliable,
            membership,
            config.clone(),
            cancel.clone(),
        ));
        let decoder = Arc::new(Decoder::new(consumer, dispatcher.clone()));

        let tasks = vec![
            tokio::spawn(listener::run_udp(
                config.clone(),
                decoder.clone(),
                cancel.clone(),
            )),
            tokio::spawn(listener::run_reliable(config, decoder, cancel.clone())),
            tokio::spawn(dispatcher.clone().run_announcer()),
        ];

        Ok(RelayNode {
            dispatcher,
            cancel,
            tasks: Mutex::new(tasks),
        })
    }

    /// The producing side's handle for emitting events.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Stop the announcer, disable both senders and unblock both receive
    /// loops, then wait for the tasks to drain. Safe to call more than
    /// once; later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.dispatcher.shutdown().await;
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("🛑 Relay task ended abnormally: {}", e);
            }
        }
        tracing::info!("🛑 Relay node stopped");
    }
}
