//! The single-threaded event loop.
//!
//! One task owns the transport, the registry, the simulator, and the tick
//! clock. Each iteration:
//!
//! 1. services the transport for at most the configured wait and runs every
//!    resulting callback synchronously;
//! 2. asks the [`TickClock`] how many simulated seconds to run, advances the
//!    simulator that many times, and if any ran, requests a writable
//!    opportunity for every live traffic connection.
//!
//! The writable opportunities are delivered by the next service call, where
//! the traffic protocol renders the then-current snapshot. A connection
//! established after the fan-out request is not part of it.
//!
//! # Lifecycle
//!
//! `Running` until the shutdown flag is seen or the transport loses every
//! acceptor, then `Stopping` while the transport is released, then
//! `Stopped`.

use std::time::Duration;

use signalcast_core::clock::{TickClock, wall_clock_second};
use signalcast_core::config::LoopConfig;
use signalcast_core::simulator::SignalSimulator;
use signalcast_types::ProtocolKind;
use tracing::{debug, info, warn};

use crate::handler::{ConnectionHandler, Context};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownFlag;
use crate::transport::{ChannelTransport, Outbound, TransportError};

/// Lifecycle state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Servicing I/O and ticking.
    Running,
    /// Releasing the transport.
    Stopping,
    /// Finished.
    Stopped,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was set.
    ShutdownRequested,
    /// No acceptor remains to produce events.
    TransportClosed,
}

/// Summary returned when the loop finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Why the loop stopped.
    pub reason: StopReason,
    /// Simulated seconds run.
    pub ticks: u64,
    /// Connections that were live when the transport was released.
    pub released_connections: usize,
    /// Lifecycle state the loop finished in.
    pub state: LoopState,
}

/// Owner of all core state.
#[derive(Debug)]
pub struct EventLoop {
    state: LoopState,
    transport: ChannelTransport,
    registry: ConnectionRegistry,
    simulator: SignalSimulator,
    clock: TickClock,
    handler: ConnectionHandler,
    service_timeout: Duration,
    shutdown: ShutdownFlag,
}

impl EventLoop {
    /// Assemble a loop in the `Running` state.
    pub fn new(
        transport: ChannelTransport,
        simulator: SignalSimulator,
        clock: TickClock,
        config: &LoopConfig,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            state: LoopState::Running,
            transport,
            registry: ConnectionRegistry::new(),
            simulator,
            clock,
            handler: ConnectionHandler::new(config.push_on_connect),
            service_timeout: config.service_timeout(),
            shutdown,
        }
    }

    /// Run until shutdown is requested or the transport closes.
    pub async fn run(mut self) -> LoopSummary {
        info!(
            service_timeout_ms = self.service_timeout.as_millis(),
            tick_policy = ?self.clock.policy(),
            "Event loop running"
        );

        let reason = loop {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, stopping event loop");
                break StopReason::ShutdownRequested;
            }
            if let Err(e) = self.service_io().await {
                warn!(error = %e, "Transport closed, stopping event loop");
                break StopReason::TransportClosed;
            }
            self.check_tick(wall_clock_second());
        };

        self.stop(reason)
    }

    /// Service pending transport I/O once and dispatch every event.
    ///
    /// Returns the number of events handled.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnected`] when no acceptor remains.
    pub async fn service_io(&mut self) -> Result<usize, TransportError> {
        let events = self.transport.service(self.service_timeout).await?;
        let handled = events.len();
        let mut cx = Context {
            registry: &mut self.registry,
            simulator: &self.simulator,
            outbound: &mut self.transport,
        };
        for event in events {
            self.handler.dispatch(event, &mut cx);
        }
        Ok(handled)
    }

    /// Run the ticks due at wall-clock second `now` and request the fan-out.
    ///
    /// Returns the number of simulated seconds run.
    pub fn check_tick(&mut self, now: i64) -> u32 {
        let due = self.clock.poll(now);
        if due == 0 {
            return 0;
        }
        for _ in 0..due {
            self.simulator.advance();
        }
        let requested = self.request_fan_out();
        let snapshot = self.simulator.snapshot();
        debug!(
            tick = self.simulator.ticks(),
            ran = due,
            ns = %snapshot.ns.state,
            ns_timer = snapshot.ns.remaining,
            ew = %snapshot.ew.state,
            ew_timer = snapshot.ew.remaining,
            clients = requested,
            "Tick"
        );
        due
    }

    /// Request a writable opportunity for every live traffic connection.
    fn request_fan_out(&mut self) -> usize {
        let transport = &mut self.transport;
        let mut requested: usize = 0;
        self.registry.for_each(|conn| {
            if conn.protocol == ProtocolKind::Traffic {
                transport.request_writable(conn.handle);
                requested = requested.saturating_add(1);
            }
        });
        requested
    }

    fn stop(&mut self, reason: StopReason) -> LoopSummary {
        self.state = LoopState::Stopping;
        let released_connections = self.transport.release();
        self.state = LoopState::Stopped;
        let summary = LoopSummary {
            reason,
            ticks: self.simulator.ticks(),
            released_connections,
            state: self.state,
        };
        info!(
            reason = ?summary.reason,
            ticks = summary.ticks,
            released_connections,
            "Event loop stopped"
        );
        summary
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Live connections.
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The simulator.
    pub const fn simulator(&self) -> &SignalSimulator {
        &self.simulator
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use signalcast_core::clock::TickPolicy;
    use signalcast_core::simulator::SignalTimings;
    use signalcast_types::ConnectionHandle;
    use tokio::sync::mpsc;

    use super::*;
    use crate::transport::{Acceptor, channel};

    const ACK: &str = r#"{"type":"received","data":"received"}"#;
    const PONG: &str = r#"{"type":"pong","data":"Server pong"}"#;

    fn make_loop(
        outbound_capacity: usize,
        policy: TickPolicy,
    ) -> (Acceptor, EventLoop, ShutdownFlag) {
        let (acceptor, transport) = channel(64, outbound_capacity);
        let simulator = SignalSimulator::new(SignalTimings::default()).unwrap();
        let clock = TickClock::new(0, policy, 5);
        let config = LoopConfig {
            service_timeout_ms: 5,
            ..LoopConfig::default()
        };
        let shutdown = ShutdownFlag::new();
        let event_loop = EventLoop::new(transport, simulator, clock, &config, shutdown.clone());
        (acceptor, event_loop, shutdown)
    }

    fn drain(frames: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            out.push(frame);
        }
        out
    }

    async fn connect(
        acceptor: &Acceptor,
        event_loop: &mut EventLoop,
        protocol: ProtocolKind,
    ) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let opened = acceptor.open(protocol).await.unwrap();
        event_loop.service_io().await.unwrap();
        opened
    }

    #[tokio::test]
    async fn tick_fans_out_to_traffic_clients() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        let (_a, mut frames_a) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;
        let (_b, mut frames_b) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;
        let (_e, mut frames_e) = connect(&acceptor, &mut el, ProtocolKind::Echo).await;
        assert_eq!(el.registry().count(), 3);

        assert_eq!(el.check_tick(1), 1);
        el.service_io().await.unwrap();

        let expected =
            r#"{"type":"traffic_update","ns":{"color":"green","timer":29},"ew":{"color":"red","timer":32}}"#;
        assert_eq!(drain(&mut frames_a), vec![expected]);
        assert_eq!(drain(&mut frames_b), vec![expected]);
        assert!(drain(&mut frames_e).is_empty());
    }

    #[tokio::test]
    async fn same_second_does_not_tick_twice() {
        let (_acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        assert_eq!(el.check_tick(1), 1);
        assert_eq!(el.check_tick(1), 0);
        assert_eq!(el.simulator().ticks(), 1);
    }

    #[tokio::test]
    async fn thirtieth_tick_renders_yellow() {
        let (acceptor, mut el, _shutdown) = make_loop(64, TickPolicy::Coarse);
        let (_h, mut frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;

        for now in 1..=30 {
            el.check_tick(now);
            el.service_io().await.unwrap();
        }

        let received = drain(&mut frames);
        assert_eq!(received.len(), 30);
        let last = received.last().unwrap();
        assert!(last.contains(r#""ns":{"color":"yellow","timer":3}"#), "{last}");
        assert!(last.contains(r#""ew":{"color":"red","timer":3}"#), "{last}");
    }

    #[tokio::test]
    async fn coarse_policy_runs_one_tick_after_a_stall() {
        let (_acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        assert_eq!(el.check_tick(10), 1);
        assert_eq!(el.simulator().ticks(), 1);
    }

    #[tokio::test]
    async fn catch_up_policy_runs_each_second_but_fans_out_once() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::CatchUp);
        let (_h, mut frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;

        assert_eq!(el.check_tick(3), 3);
        el.service_io().await.unwrap();
        assert_eq!(el.simulator().ticks(), 3);
        let received = drain(&mut frames);
        assert_eq!(received.len(), 1);
        assert!(received[0].contains(r#""ns":{"color":"green","timer":27}"#));
    }

    #[tokio::test]
    async fn ping_gets_pong_then_ack() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        let (handle, mut frames) = connect(&acceptor, &mut el, ProtocolKind::Echo).await;

        assert!(acceptor.deliver(handle, "ping".to_owned()).await);
        el.service_io().await.unwrap();
        // The writable opportunity arrives on the following service call.
        assert!(drain(&mut frames).is_empty());
        el.service_io().await.unwrap();

        assert_eq!(drain(&mut frames), vec![PONG, ACK]);
    }

    #[tokio::test]
    async fn plain_message_after_ping_gets_only_ack() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        let (handle, mut frames) = connect(&acceptor, &mut el, ProtocolKind::Echo).await;

        assert!(acceptor.deliver(handle, "ping".to_owned()).await);
        assert!(acceptor.deliver(handle, "data".to_owned()).await);
        el.service_io().await.unwrap();
        el.service_io().await.unwrap();

        assert_eq!(drain(&mut frames), vec![ACK]);
    }

    #[tokio::test]
    async fn closed_between_ticks_is_not_written() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        let (gone, mut gone_frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;
        let (_stay, mut stay_frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;

        el.check_tick(1);
        el.service_io().await.unwrap();
        assert_eq!(drain(&mut gone_frames).len(), 1);
        assert_eq!(drain(&mut stay_frames).len(), 1);

        acceptor.disconnect(gone).await;
        el.service_io().await.unwrap();
        assert_eq!(el.registry().count(), 1);

        el.check_tick(2);
        el.service_io().await.unwrap();
        assert!(drain(&mut gone_frames).is_empty());
        assert_eq!(drain(&mut stay_frames).len(), 1);
    }

    #[tokio::test]
    async fn late_joiner_waits_for_next_tick() {
        let (acceptor, mut el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        let (_early, mut early_frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;

        el.check_tick(1);
        // Joins after the fan-out request, before it is delivered.
        let (_late, mut late_frames) = acceptor.open(ProtocolKind::Traffic).await.unwrap();
        el.service_io().await.unwrap();

        assert_eq!(drain(&mut early_frames).len(), 1);
        assert!(drain(&mut late_frames).is_empty());

        el.check_tick(2);
        el.service_io().await.unwrap();
        assert_eq!(drain(&mut late_frames).len(), 1);
    }

    #[tokio::test]
    async fn slow_client_is_dropped_without_affecting_others() {
        let (acceptor, mut el, _shutdown) = make_loop(1, TickPolicy::Coarse);
        let (_slow, mut slow_frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;
        let (_fast, mut fast_frames) = connect(&acceptor, &mut el, ProtocolKind::Traffic).await;

        el.check_tick(1);
        el.service_io().await.unwrap();
        assert_eq!(drain(&mut fast_frames).len(), 1);

        // The slow client never drained its single-slot queue.
        el.check_tick(2);
        el.service_io().await.unwrap();
        assert_eq!(drain(&mut fast_frames).len(), 1);

        // The failed write scheduled a close; the next service reports it.
        el.service_io().await.unwrap();
        assert_eq!(el.registry().count(), 1);

        el.check_tick(3);
        el.service_io().await.unwrap();
        assert_eq!(drain(&mut fast_frames).len(), 1);
        assert_eq!(drain(&mut slow_frames).len(), 1);
        assert!(slow_frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_flag() {
        let (acceptor, el, shutdown) = make_loop(8, TickPolicy::Coarse);
        let (_h, mut frames) = acceptor.open(ProtocolKind::Traffic).await.unwrap();
        shutdown.trigger();

        let summary = el.run().await;
        assert_eq!(summary.reason, StopReason::ShutdownRequested);
        assert_eq!(summary.state, LoopState::Stopped);
        // Never serviced, so the pending connection was never adopted.
        assert_eq!(summary.released_connections, 0);
        drop(acceptor);
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn run_stops_when_acceptors_are_gone() {
        let (acceptor, el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        drop(acceptor);
        let summary = el.run().await;
        assert_eq!(summary.reason, StopReason::TransportClosed);
        assert_eq!(summary.state, LoopState::Stopped);
    }

    #[tokio::test]
    async fn run_releases_live_connections() {
        let (acceptor, el, shutdown) = make_loop(8, TickPolicy::Coarse);
        let (_h, mut frames) = acceptor.open(ProtocolKind::Echo).await.unwrap();

        let task = tokio::spawn(el.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        let summary = task.await.unwrap();

        assert_eq!(summary.reason, StopReason::ShutdownRequested);
        assert_eq!(summary.released_connections, 1);
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn new_loop_is_running() {
        let (_acceptor, el, _shutdown) = make_loop(8, TickPolicy::Coarse);
        assert_eq!(el.state(), LoopState::Running);
    }
}
