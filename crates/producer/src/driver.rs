//! Background task that owns the connection and feeds the consumer.

use crate::sse_connection::{Connection, Next, ReconnectReason};
use crate::sse_core::error::SdkError;
use crate::sse_core::transport::{SignalReceiver, Transport};
use crate::sse_producer::handle::{ProducerCommand, ProducerStatus};
use crate::sse_types::Event;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{Instant, Sleep};
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "sse_stream::producer";

pub(crate) struct Driver<T: Transport> {
    pub(crate) conn: Connection<T>,
    pub(crate) signal_rx: SignalReceiver,
    pub(crate) cmd_rx: mpsc::Receiver<ProducerCommand>,
    pub(crate) event_tx: mpsc::Sender<Event>,
    pub(crate) demand: Arc<Notify>,
    pub(crate) status_tx: watch::Sender<ProducerStatus>,
    pub(crate) reconnect_delay: Duration,
}

/// Why the run loop stopped.
enum Exit {
    Closed,
    ConsumerGone,
}

/// How handing a batch of events to the consumer ended.
enum Delivery {
    Delivered,
    ConsumerGone,
    /// A command arrived while the consumer was behind; this many events
    /// were still undelivered.
    Interrupted(ProducerCommand, usize),
}

/// Loop bookkeeping shared by the `select!` arms.
#[derive(Default)]
struct RunState {
    started: bool,
    commands_open: bool,
    attempts: u64,
    retry_pending: bool,
    idle_generation: Option<u64>,
}

impl<T: Transport> Driver<T> {
    /// Wait for demand, then keep a connection alive until closed.
    ///
    /// All state lives in this one task: commands, transport signals, the idle
    /// deadline and the retry timer are multiplexed in a single `select!`.
    pub(crate) async fn run(mut self) {
        let mut st = RunState {
            commands_open: true,
            ..RunState::default()
        };

        let idle = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(idle);
        let retry = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(retry);

        let exit = loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv(), if st.commands_open => match cmd {
                    Some(ProducerCommand::Close) => break Exit::Closed,
                    Some(ProducerCommand::Refresh) => {
                        self.refresh(&mut st, idle.as_mut(), retry.as_mut()).await;
                    }
                    None => {
                        // Handles dropped; keep streaming for the consumer.
                        st.commands_open = false;
                    }
                },

                _ = self.event_tx.closed() => break Exit::ConsumerGone,

                _ = self.demand.notified(), if !st.started => {
                    st.started = true;
                    info!(target: LOG_TARGET, "demand received, starting SSE connection");
                    let result = self.conn.connect().await;
                    let ok = self.report(result);
                    self.after_attempt(ok, &mut st, idle.as_mut(), retry.as_mut());
                    self.publish(&st);
                }

                Some(signal) = self.signal_rx.recv() => {
                    let outcome = self.conn.handle_signal(signal);
                    if !outcome.accepted {
                        continue;
                    }
                    match self.deliver(outcome.events, &mut st.commands_open).await {
                        Delivery::Delivered => {}
                        Delivery::ConsumerGone => break Exit::ConsumerGone,
                        Delivery::Interrupted(ProducerCommand::Close, _) => break Exit::Closed,
                        Delivery::Interrupted(ProducerCommand::Refresh, dropped) => {
                            if dropped > 0 {
                                debug!(target: LOG_TARGET, dropped, "refresh discarded undelivered events");
                            }
                            self.refresh(&mut st, idle.as_mut(), retry.as_mut()).await;
                            continue;
                        }
                    }
                    if outcome.next == Next::Stay {
                        self.arm_idle(&mut st, idle.as_mut());
                    } else {
                        st.attempts += 1;
                        let ok = self.follow(outcome.next).await;
                        self.after_attempt(ok, &mut st, idle.as_mut(), retry.as_mut());
                    }
                    self.publish(&st);
                }

                () = &mut idle, if st.idle_generation.is_some() => {
                    if let Some(generation) = st.idle_generation.take() {
                        let next = self.conn.on_idle_timeout(generation);
                        if next != Next::Stay {
                            st.attempts += 1;
                            let ok = self.follow(next).await;
                            self.after_attempt(ok, &mut st, idle.as_mut(), retry.as_mut());
                            self.publish(&st);
                        }
                    }
                }

                () = &mut retry, if st.retry_pending => {
                    st.retry_pending = false;
                    st.attempts += 1;
                    let ok = self.follow(Next::Reconnect(ReconnectReason::ConnectFailed)).await;
                    self.after_attempt(ok, &mut st, idle.as_mut(), retry.as_mut());
                    self.publish(&st);
                }
            }
        };

        match exit {
            Exit::Closed => info!(target: LOG_TARGET, "SSE producer closing (requested)"),
            Exit::ConsumerGone => info!(target: LOG_TARGET, "SSE consumer dropped, shutting down"),
        }
        self.conn.disconnect();
        self.status_tx.send_modify(|status| {
            status.state = self.conn.state();
            status.stopped = true;
        });
    }

    /// Hand events to the consumer in order, one reserved slot at a time,
    /// while still accepting commands.
    async fn deliver(&mut self, events: Vec<Event>, commands_open: &mut bool) -> Delivery {
        let mut queue = VecDeque::from(events);
        while !queue.is_empty() {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv(), if *commands_open => match cmd {
                    Some(cmd) => return Delivery::Interrupted(cmd, queue.len()),
                    None => *commands_open = false,
                },

                permit = self.event_tx.reserve() => match permit {
                    Ok(permit) => {
                        if let Some(event) = queue.pop_front() {
                            permit.send(event);
                        }
                    }
                    Err(_) => return Delivery::ConsumerGone,
                },
            }
        }
        Delivery::Delivered
    }

    async fn refresh(&mut self, st: &mut RunState, idle: Pin<&mut Sleep>, retry: Pin<&mut Sleep>) {
        if !st.started {
            debug!(target: LOG_TARGET, "refresh before first demand ignored");
            return;
        }
        let next = self.conn.refresh();
        st.retry_pending = false;
        st.attempts += 1;
        let ok = self.follow(next).await;
        self.after_attempt(ok, st, idle, retry);
        self.publish(st);
    }

    async fn follow(&mut self, next: Next) -> bool {
        let result = self.conn.follow(next).await;
        self.report(result)
    }

    /// Log a failed attempt by category; the caller schedules the retry.
    fn report(&self, result: Result<(), SdkError>) -> bool {
        match result {
            Ok(()) => true,
            Err(SdkError::Resolve(message)) => {
                error!(target: LOG_TARGET, error = %message, "SSE target resolution failed");
                false
            }
            Err(err) => {
                error!(target: LOG_TARGET, error = %err.format_details(), "SSE connection failed");
                false
            }
        }
    }

    fn after_attempt(&self, ok: bool, st: &mut RunState, idle: Pin<&mut Sleep>, retry: Pin<&mut Sleep>) {
        if ok {
            self.arm_idle(st, idle);
        } else {
            st.idle_generation = None;
            st.retry_pending = true;
            if !self.reconnect_delay.is_zero() {
                warn!(
                    target: LOG_TARGET,
                    delay_ms = self.reconnect_delay.as_millis() as u64,
                    "SSE retrying after delay"
                );
            }
            retry.reset(Instant::now() + self.reconnect_delay);
        }
    }

    /// Cancel-then-reschedule the idle deadline for the current generation.
    fn arm_idle(&self, st: &mut RunState, idle: Pin<&mut Sleep>) {
        match self.conn.idle_deadline() {
            Some(timeout) => {
                idle.reset(Instant::now() + timeout);
                st.idle_generation = Some(self.conn.generation());
            }
            None => st.idle_generation = None,
        }
    }

    fn publish(&self, st: &RunState) {
        let state = self.conn.state();
        let connected_url = self.conn.connected_url().map(str::to_string);
        self.status_tx.send_if_modified(|status| {
            let next = ProducerStatus {
                state,
                connected_url,
                reconnects: st.attempts,
                stopped: false,
            };
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }
}
