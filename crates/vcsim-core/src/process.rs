//! Logical process: one causal participant of the simulation
//!
//! A process owns its vector clock, its mailbox, its strategy state and its
//! local log. Nothing here is shared except through the mailbox registry and
//! the progress board, so the clock itself needs no locking.
//!
//! Loop, repeated until the process has met its send quota:
//!
//! 1. drain every queued message and merge it;
//! 2. if the quota is met, wait a short grace and leave the loop once the
//!    mailbox stays empty;
//! 3. sleep for an exponentially distributed delay with mean λ;
//! 4. execute an internal event with probability `α / (α + 1)`, otherwise a
//!    send to a uniformly chosen neighbor.
//!
//! After the loop the process stops generating events but keeps merging
//! arrivals until stop is broadcast, then drains one final time.

use crate::algorithm::{Algorithm, ClockStrategy};
use crate::clock::{ProcessId, VectorClock};
use crate::config::RunSettings;
use crate::log::{EventId, EventKind, ProcessLog, Sequencer};
use crate::mailbox::{Mailbox, MailboxRegistry};
use crate::message::{Message, MessageId};
use crate::params::SimulationParams;
use crate::termination::{ProgressBoard, StopSignal};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Shared run resources handed to every process
#[derive(Debug, Clone)]
pub struct ProcessContext {
    /// Routing table to every mailbox of this run
    pub registry: Arc<MailboxRegistry>,
    /// Send progress watched by the coordinator
    pub board: Arc<ProgressBoard>,
    /// Run-wide log capture counter
    pub sequencer: Sequencer,
    /// Stop broadcast
    pub stop: StopSignal,
}

/// Local counters of one process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCounters {
    /// Messages handed to a neighbor's mailbox
    pub sent: u64,
    /// Internal events, including degraded sends
    pub internal: u64,
    /// Send-branch events, including degraded sends
    pub send_events: u64,
    /// Last message sequence number used
    pub send_seq: u64,
    /// Messages merged from the mailbox
    pub received: u64,
    /// Clock entries transmitted over all sends
    pub entries_sent: u64,
}

/// What a generated event turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Internal event
    Internal(EventId),
    /// Send branch without neighbors, executed as an internal event
    NoNeighbors(EventId),
    /// Message sent
    Sent {
        /// Message identifier
        message: MessageId,
        /// Receiving process
        to: ProcessId,
        /// Entries in the payload
        entries: usize,
    },
}

/// Final state of a process after its worker exits
#[derive(Debug)]
pub struct ProcessReport {
    /// Process id
    pub id: ProcessId,
    /// Clock at exit
    pub clock: VectorClock,
    /// Local counters at exit
    pub counters: ProcessCounters,
    /// Local log in emission order
    pub log: ProcessLog,
}

/// One simulated process
#[derive(Debug)]
pub struct LogicalProcess {
    id: ProcessId,
    clock: VectorClock,
    mailbox: Mailbox,
    neighbors: Vec<ProcessId>,
    strategy: ClockStrategy,
    rng: ChaCha8Rng,
    params: SimulationParams,
    time_unit: Duration,
    drain_grace: Duration,
    counters: ProcessCounters,
    log: ProcessLog,
    context: ProcessContext,
}

impl LogicalProcess {
    /// Build a process around its mailbox
    ///
    /// With a seed, every process draws from its own stream of the same
    /// ChaCha generator, so event choices are reproducible per process.
    pub fn new(
        mailbox: Mailbox,
        neighbors: Vec<ProcessId>,
        algorithm: Algorithm,
        params: SimulationParams,
        settings: &RunSettings,
        context: ProcessContext,
    ) -> Self {
        let id = mailbox.owner();
        let mut rng = match settings.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        rng.set_stream(id.index() as u64);

        Self {
            id,
            clock: VectorClock::new(params.n),
            mailbox,
            neighbors,
            strategy: ClockStrategy::for_algorithm(algorithm),
            rng,
            params,
            time_unit: settings.time_unit(),
            drain_grace: settings.drain_grace(),
            counters: ProcessCounters::default(),
            log: ProcessLog::new(id, context.sequencer.clone()),
            context,
        }
    }

    /// Process id
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Current clock
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Current counters
    pub fn counters(&self) -> ProcessCounters {
        self.counters
    }

    /// Local log so far
    pub fn log(&self) -> &ProcessLog {
        &self.log
    }

    /// True once the send quota is met
    pub fn quota_met(&self) -> bool {
        self.counters.send_events >= self.params.m
    }

    // =========================================================================
    // Receive side
    // =========================================================================

    /// Merge every currently queued message; returns how many were applied
    pub fn drain(&mut self) -> usize {
        let queued = self.mailbox.drain();
        let applied = queued.len();
        for message in queued {
            self.apply(message);
        }
        applied
    }

    /// Merge one received message and log it
    ///
    /// Full payloads merge every index; selective payloads merge only the
    /// transmitted indices and leave the rest as they were.
    pub fn apply(&mut self, message: Message) {
        let advanced = message.payload.apply_to(&mut self.clock);
        self.counters.received += 1;
        trace!(
            pid = self.id.external(),
            msg_id = %message.id,
            from = message.sender.external(),
            advanced,
            "merged message"
        );
        self.log.record(
            EventKind::Receive {
                message: message.id,
                from: message.sender,
                updates: message.payload.entries(),
            },
            &self.clock,
        );
    }

    // =========================================================================
    // Event generation
    // =========================================================================

    /// Draw the next inter-event delay
    pub fn sample_delay(&mut self) -> Duration {
        if self.params.lambda <= 0.0 {
            return Duration::ZERO;
        }
        let u: f64 = self.rng.gen();
        let units = -self.params.lambda * (1.0 - u).ln();
        Duration::try_from_secs_f64(self.time_unit.as_secs_f64() * units).unwrap_or(Duration::ZERO)
    }

    /// Generate one event: internal or send
    pub fn step(&mut self) -> StepOutcome {
        let internal = self.rng.gen::<f64>() < self.params.internal_probability();
        if internal {
            StepOutcome::Internal(self.internal_event())
        } else {
            self.send_event()
        }
    }

    /// Execute an internal event
    pub fn internal_event(&mut self) -> EventId {
        let event = self.next_event_id();
        self.log.record(EventKind::Internal { event }, &self.clock);
        event
    }

    /// Execute the send branch
    pub fn send_event(&mut self) -> StepOutcome {
        if self.neighbors.is_empty() {
            let event = self.next_event_id();
            self.counters.send_events += 1;
            self.context.board.record_send(self.id, false);
            self.log.record(EventKind::NoNeighbors { event }, &self.clock);
            return StepOutcome::NoNeighbors(event);
        }

        self.clock.tick(self.id);
        let to = self.neighbors[self.rng.gen_range(0..self.neighbors.len())];
        let payload = self.strategy.build_payload(&self.clock, self.id, to);

        self.counters.send_seq += 1;
        let id = MessageId {
            sender: self.id,
            seq: self.counters.send_seq,
        };
        let entries = payload.entry_count();

        // Logged before delivery so the send is captured before any receive.
        self.log.record(
            EventKind::Send {
                message: id,
                to,
                entries,
                algorithm: self.strategy.algorithm(),
            },
            &self.clock,
        );

        let message = Message {
            sender: self.id,
            id,
            payload,
        };
        let delivered = match self.context.registry.deliver(to, message) {
            Ok(()) => true,
            Err(undelivered) => {
                warn!(
                    pid = self.id.external(),
                    msg_id = %undelivered.id,
                    to = to.external(),
                    "target mailbox closed, message dropped"
                );
                false
            }
        };

        self.counters.send_events += 1;
        if delivered {
            self.counters.sent += 1;
            self.counters.entries_sent += entries as u64;
        }
        self.context.board.record_send(self.id, delivered);
        debug!(
            pid = self.id.external(),
            msg_id = %id,
            to = to.external(),
            entries,
            "sent message"
        );

        StepOutcome::Sent {
            message: id,
            to,
            entries,
        }
    }

    fn next_event_id(&mut self) -> EventId {
        self.clock.tick(self.id);
        self.counters.internal += 1;
        EventId {
            process: self.id,
            seq: self.counters.internal,
        }
    }

    // =========================================================================
    // Worker loop
    // =========================================================================

    /// Run until stop is broadcast and return the final state
    pub async fn run(mut self) -> ProcessReport {
        debug!(
            pid = self.id.external(),
            neighbors = self.neighbors.len(),
            algorithm = %self.strategy.algorithm(),
            "process started"
        );

        while !self.context.stop.is_stopped() {
            self.drain();

            if self.quota_met() {
                tokio::time::sleep(self.drain_grace).await;
                if self.mailbox.is_empty() {
                    break;
                }
                continue;
            }

            let delay = self.sample_delay();
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }

            self.step();
        }

        debug!(
            pid = self.id.external(),
            sent = self.counters.sent,
            "quota met, waiting for stop"
        );
        loop {
            let next = tokio::select! {
                biased;
                _ = self.context.stop.stopped() => None,
                message = self.mailbox.recv() => message,
            };
            match next {
                Some(message) => self.apply(message),
                None => break,
            }
        }

        let late = self.drain();
        debug!(
            pid = self.id.external(),
            late,
            received = self.counters.received,
            "process stopped"
        );

        ProcessReport {
            id: self.id,
            clock: self.clock,
            counters: self.counters,
            log: self.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;
    use crate::termination::StopHandle;

    struct Harness {
        processes: Vec<LogicalProcess>,
        board: Arc<ProgressBoard>,
        _stop: StopHandle,
    }

    fn harness(n: usize, rows: Vec<Vec<usize>>, algorithm: Algorithm, alpha: f64) -> Harness {
        let params = SimulationParams {
            n,
            lambda: 0.0,
            alpha,
            m: 2,
        };
        let settings = RunSettings::fast(5);
        let (registry, mailboxes) = MailboxRegistry::new(n);
        let registry = Arc::new(registry);
        let board = Arc::new(ProgressBoard::new(n));
        let (stop, signal) = StopHandle::new();
        let sequencer = Sequencer::new();

        let processes = mailboxes
            .into_iter()
            .zip(rows)
            .map(|(mailbox, row)| {
                LogicalProcess::new(
                    mailbox,
                    row.into_iter().map(ProcessId).collect(),
                    algorithm,
                    params,
                    &settings,
                    ProcessContext {
                        registry: registry.clone(),
                        board: board.clone(),
                        sequencer: sequencer.clone(),
                        stop: signal.clone(),
                    },
                )
            })
            .collect();

        Harness {
            processes,
            board,
            _stop: stop,
        }
    }

    #[test]
    fn test_internal_event_advances_own_index_only() {
        let mut h = harness(2, vec![vec![1], vec![0]], Algorithm::Vc, 0.0);
        let event = h.processes[0].internal_event();

        assert_eq!(event.to_string(), "e11");
        assert_eq!(h.processes[0].clock().as_slice(), &[1, 0]);
        assert_eq!(h.processes[0].counters().internal, 1);
        assert!(!h.processes[0].quota_met());
    }

    #[test]
    fn test_vc_send_and_receive() {
        let mut h = harness(2, vec![vec![1], vec![0]], Algorithm::Vc, 0.0);
        h.processes[0].internal_event();

        let outcome = h.processes[0].send_event();
        assert_eq!(
            outcome,
            StepOutcome::Sent {
                message: MessageId {
                    sender: ProcessId(0),
                    seq: 1
                },
                to: ProcessId(1),
                entries: 2,
            }
        );
        assert_eq!(h.board.messages_sent(ProcessId(0)), 1);

        assert_eq!(h.processes[1].drain(), 1);
        assert_eq!(h.processes[1].clock().as_slice(), &[2, 0]);

        let line = h.processes[1].log().records()[0].render();
        assert!(line.starts_with("Process2 receives m11 from Process1 at "));
        assert!(line.ends_with("vc: [2 0 ]"));
    }

    #[test]
    fn test_sk_receive_merges_only_supplied_indices() {
        let mut h = harness(3, vec![vec![1], vec![0], vec![]], Algorithm::Sk, 0.0);

        // First message to a neighbor carries every index.
        h.processes[0].send_event();
        assert_eq!(h.processes[1].drain(), 1);
        assert_eq!(h.processes[1].clock().as_slice(), &[1, 0, 0]);

        // Process 1 learns a lot about index 2; process 0 does not.
        h.processes[1].apply(Message {
            sender: ProcessId(2),
            id: MessageId {
                sender: ProcessId(2),
                seq: 1,
            },
            payload: Payload::Full(VectorClock::from_entries(vec![0, 0, 9])),
        });
        h.processes[0].send_event();
        h.processes[1].drain();

        // Only index 0 changed, so only index 0 was transmitted.
        assert_eq!(h.processes[1].clock().as_slice(), &[2, 0, 9]);
        let last = h.processes[1].log().records().last().map(|r| r.kind.clone());
        assert!(matches!(
            last,
            Some(EventKind::Receive { updates, .. }) if updates == vec![(0, 2)]
        ));
    }

    #[test]
    fn test_isolated_process_degrades_to_internal() {
        let mut h = harness(2, vec![vec![], vec![0]], Algorithm::Sk, 0.0);

        let first = h.processes[0].step();
        let second = h.processes[0].step();

        assert!(matches!(first, StepOutcome::NoNeighbors(_)));
        assert!(matches!(second, StepOutcome::NoNeighbors(_)));
        assert!(h.processes[0].quota_met());
        assert_eq!(h.processes[0].counters().sent, 0);
        assert_eq!(h.board.quota_progress(ProcessId(0)), 2);
        assert_eq!(h.processes[0].clock().as_slice(), &[2, 0]);
        assert!(h.processes[0].log().records()[0]
            .render()
            .contains("executes internal event (no neighbors) e11"));
    }

    #[test]
    fn test_alpha_zero_never_internal() {
        let mut h = harness(2, vec![vec![1], vec![0]], Algorithm::Vc, 0.0);
        for _ in 0..20 {
            assert!(matches!(h.processes[0].step(), StepOutcome::Sent { .. }));
        }
    }

    #[test]
    fn test_zero_lambda_means_no_delay() {
        let mut h = harness(2, vec![vec![1], vec![0]], Algorithm::Vc, 0.0);
        assert_eq!(h.processes[0].sample_delay(), Duration::ZERO);
    }

    #[test]
    fn test_delays_are_nonnegative_and_seeded() {
        let settings = RunSettings::fast(9);
        let params = SimulationParams {
            n: 1,
            lambda: 3.0,
            alpha: 1.0,
            m: 1,
        };
        let draw = || {
            let (registry, mut mailboxes) = MailboxRegistry::new(1);
            let (_stop, signal) = StopHandle::new();
            let mut process = LogicalProcess::new(
                mailboxes.remove(0),
                Vec::new(),
                Algorithm::Vc,
                params,
                &settings,
                ProcessContext {
                    registry: Arc::new(registry),
                    board: Arc::new(ProgressBoard::new(1)),
                    sequencer: Sequencer::new(),
                    stop: signal,
                },
            );
            (0..32).map(|_| process.sample_delay()).collect::<Vec<_>>()
        };

        let first = draw();
        assert_eq!(first, draw());
        assert!(first.iter().any(|d| !d.is_zero()));
    }
}
