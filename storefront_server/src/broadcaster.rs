//! Fan-out of order changes to live subscribers.
//!
//! The engine raises events on its own hook channels. [`OrderChangeBroadcaster::hooks`] turns those into
//! [`OrderChangeNotice`]s on a broadcast channel, which the `/api/orders/{order_id}/events` stream filters per order.
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use log::*;
use reconciliation_engine::{db_types::OrderId, events::EventHooks};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::data_objects::OrderChangeNotice;

pub const ORDER_CHANGED_EVENT: &str = "order_changed";
const KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct OrderChangeBroadcaster {
    sender: broadcast::Sender<OrderChangeNotice>,
}

impl OrderChangeBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderChangeNotice> {
        self.sender.subscribe()
    }

    /// Having no subscribers is normal, so a failed send is not an error.
    pub fn publish(&self, notice: OrderChangeNotice) {
        match self.sender.send(notice) {
            Ok(n) => trace!("📡️ Order change sent to {n} subscribers"),
            Err(e) => trace!("📡️ Nobody is listening for changes to order {}", e.0.order_id),
        }
    }

    /// The engine hooks that feed this broadcaster. Every change to an order row, including the paid transition,
    /// arrives as an `on_order_modified` event. `on_order_paid` is only logged.
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let sender = self.clone();
        hooks.on_order_modified(move |ev| {
            let notice = OrderChangeNotice::from(&ev.new_order);
            debug!("🪝️ Order {} changed: {} -> {}", notice.order_id, ev.old_order.status, notice.status);
            sender.publish(notice);
            Box::pin(async {})
        });
        hooks.on_order_paid(|ev| {
            info!("🪝️ Order {} paid via {:?}. Total {}", ev.order.order_id, ev.source, ev.order.total_amount);
            Box::pin(async {})
        });
        hooks
    }

    /// A server-sent event stream of changes to a single order. A comment line is sent every few seconds so that
    /// proxies keep the connection open.
    pub fn event_stream(&self, order_id: OrderId) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
        let mut rx = self.subscribe();
        stream! {
            yield Ok(Bytes::from_static(b": connected\n\n"));
            let mut keep_alive = tokio::time::interval(KEEP_ALIVE);
            keep_alive.tick().await;
            loop {
                let frame = tokio::select! {
                    _ = keep_alive.tick() => Some(Bytes::from_static(b": keep-alive\n\n")),
                    result = rx.recv() => match result {
                        Ok(notice) if notice.order_id == order_id => sse_frame(&notice),
                        Ok(_) => None,
                        Err(RecvError::Lagged(n)) => {
                            warn!("📡️ Subscriber for order {order_id} lagged behind by {n} messages");
                            None
                        },
                        Err(RecvError::Closed) => {
                            info!("📡️ Order change channel closed. Ending stream for {order_id}");
                            break;
                        },
                    },
                };
                if let Some(frame) = frame {
                    yield Ok(frame);
                }
            }
        }
    }
}

pub fn sse_frame(notice: &OrderChangeNotice) -> Option<Bytes> {
    match serde_json::to_string(notice) {
        Ok(json) => Some(Bytes::from(format!("event: {ORDER_CHANGED_EVENT}\ndata: {json}\n\n"))),
        Err(e) => {
            error!("📡️ Could not serialize order change notice: {e}");
            None
        },
    }
}
