//! Client Status Notifier
//!
//! Keeps an up-to-date copy of a single order on the client. Two tasks feed it at the same time:
//! * a subscription to the server's change stream. Every notice triggers a re-fetch of the order.
//! * a polling loop that re-fetches on an adaptive schedule, in case the stream is unavailable or drops notices.
//!
//! Both tasks write through [`apply_update`] into one [`watch`] cell, so consumers see a single, monotonic view of the
//! order no matter which channel learnt about a change first. Both tasks end once the order reaches a terminal status,
//! and are aborted when the notifier is stopped or dropped.
use std::{future::Future, sync::Arc, time::Duration};

use futures::{stream::BoxStream, StreamExt};
use log::*;
use reconciliation_engine::{
    db_types::{OrderId, OrderStatusType},
    order_objects::OrderView,
};
use storefront_server::data_objects::OrderChangeNotice;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep, Instant},
};

use crate::ClientError;

const FAST_POLL: Duration = Duration::from_secs(2);
const FAST_POLL_WINDOW: Duration = Duration::from_secs(30);
const MEDIUM_POLL: Duration = Duration::from_secs(5);
const MEDIUM_POLL_WINDOW: Duration = Duration::from_secs(330);
const SLOW_POLL: Duration = Duration::from_secs(30);

/// Somewhere the current state of an order can be read from.
pub trait OrderStatusSource {
    fn fetch_order(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<OrderView>, ClientError>> + Send;
}

/// A real-time feed of change notices for an order.
pub trait OrderChangeFeed {
    fn subscribe(&self, order_id: &OrderId) -> BoxStream<'static, Result<OrderChangeNotice, ClientError>>;
}

/// How long to wait before the next poll, given how long the notifier has been running.
pub fn poll_interval(elapsed: Duration) -> Duration {
    if elapsed < FAST_POLL_WINDOW {
        FAST_POLL
    } else if elapsed < MEDIUM_POLL_WINDOW {
        MEDIUM_POLL
    } else {
        SLOW_POLL
    }
}

/// Orders in these states will not change again from the customer's point of view.
pub fn is_terminal(status: OrderStatusType) -> bool {
    matches!(status, OrderStatusType::Delivered | OrderStatusType::Cancelled | OrderStatusType::Refunded)
}

/// The single write path into the cell. Views older than the one held are discarded. Returns true if the cell now
/// holds `view`.
pub fn apply_update(cell: &watch::Sender<Option<OrderView>>, view: OrderView) -> bool {
    let mut accepted = false;
    cell.send_if_modified(|current| {
        if let Some(held) = current {
            if view.order.updated_at < held.order.updated_at {
                trace!(
                    "📡️ Discarding stale view of {} ({} < {})",
                    view.order.order_id,
                    view.order.updated_at,
                    held.order.updated_at
                );
                return false;
            }
        }
        accepted = true;
        let changed = current.as_ref() != Some(&view);
        *current = Some(view);
        changed
    });
    accepted
}

fn holds_terminal(cell: &watch::Sender<Option<OrderView>>) -> bool {
    cell.borrow().as_ref().map(|v| is_terminal(v.order.status)).unwrap_or(false)
}

pub struct StatusNotifier {
    order_id: OrderId,
    cell: Arc<watch::Sender<Option<OrderView>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl StatusNotifier {
    /// Starts the subscription and the polling loop for `order_id`. Must be called from within a tokio runtime.
    pub fn start<S, F>(order_id: OrderId, source: S, feed: F) -> Self
    where
        S: OrderStatusSource + Send + Sync + 'static,
        F: OrderChangeFeed,
    {
        let (tx, _) = watch::channel(None);
        let cell = Arc::new(tx);
        let source = Arc::new(source);
        info!("📡️ Watching order {order_id}");
        let changes = feed.subscribe(&order_id);
        let subscription =
            tokio::spawn(run_subscription(order_id.clone(), changes, Arc::clone(&source), Arc::clone(&cell)));
        let polling = tokio::spawn(run_polling(order_id.clone(), source, Arc::clone(&cell)));
        Self { order_id, cell, tasks: vec![subscription, polling] }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// The latest view of the order, if one has been fetched yet.
    pub fn current(&self) -> Option<OrderView> {
        self.cell.borrow().clone()
    }

    /// A receiver that is notified every time the view changes.
    pub fn watch(&self) -> watch::Receiver<Option<OrderView>> {
        self.cell.subscribe()
    }

    /// Waits until the view satisfies `predicate`, returning that view. Returns `None` if the notifier is stopped
    /// first.
    pub async fn wait_until<P>(&self, mut predicate: P) -> Option<OrderView>
    where P: FnMut(&OrderView) -> bool {
        let mut rx = self.cell.subscribe();
        loop {
            if let Some(view) = rx.borrow_and_update().as_ref() {
                if predicate(view) {
                    return Some(view.clone());
                }
            }
            if self.is_finished() {
                return None;
            }
            tokio::select! {
                changed = rx.changed() => if changed.is_err() { return None; },
                // Both tasks may end without a further change
                _ = sleep(FAST_POLL) => {},
            }
        }
    }

    /// True once both tasks have ended, whether by reaching a terminal status or by being stopped.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }

    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        debug!("📡️ Stopped watching order {}", self.order_id);
    }
}

impl Drop for StatusNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh<S: OrderStatusSource>(
    order_id: &OrderId,
    source: &S,
    cell: &watch::Sender<Option<OrderView>>,
) {
    match source.fetch_order(order_id).await {
        Ok(Some(view)) => {
            apply_update(cell, view);
        },
        Ok(None) => debug!("📡️ Order {order_id} was not found"),
        Err(e) => warn!("📡️ Could not fetch order {order_id}. {e}"),
    }
}

async fn run_subscription<S: OrderStatusSource>(
    order_id: OrderId,
    mut changes: BoxStream<'static, Result<OrderChangeNotice, ClientError>>,
    source: Arc<S>,
    cell: Arc<watch::Sender<Option<OrderView>>>,
) {
    let mut views = cell.subscribe();
    loop {
        if holds_terminal(&cell) {
            debug!("📡️ Order {order_id} is final. Closing the subscription");
            return;
        }
        tokio::select! {
            item = changes.next() => match item {
                Some(Ok(notice)) => {
                    debug!("📡️ Order {} changed: {} / {}", notice.order_id, notice.status, notice.payment_status);
                    refresh(&order_id, source.as_ref(), &cell).await;
                },
                Some(Err(e)) => {
                    warn!("📡️ Change stream for order {order_id} failed. Polling continues. {e}");
                    return;
                },
                None => {
                    info!("📡️ Change stream for order {order_id} closed. Polling continues.");
                    return;
                },
            },
            // Polling may be the one to see the final status
            changed = views.changed() => if changed.is_err() { return; },
        }
    }
}

async fn run_polling<S: OrderStatusSource>(order_id: OrderId, source: Arc<S>, cell: Arc<watch::Sender<Option<OrderView>>>) {
    let started = Instant::now();
    loop {
        if holds_terminal(&cell) {
            debug!("📡️ Order {order_id} is final. Polling stopped");
            return;
        }
        refresh(&order_id, source.as_ref(), &cell).await;
        if holds_terminal(&cell) {
            debug!("📡️ Order {order_id} is final. Polling stopped");
            return;
        }
        let wait = poll_interval(started.elapsed());
        trace!("📡️ Next poll for {order_id} in {}s", wait.as_secs());
        sleep(wait).await;
    }
}
