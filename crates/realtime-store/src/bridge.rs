//! Sequencing bridges.
//!
//! A [`Bridge`] accepts locally produced operations and hands back operations
//! in the agreed global order. The model pulls from [`Bridge::poll`] and feeds
//! every sequenced operation through `consume`; a locally submitted operation
//! therefore only becomes visible once it has been sequenced and echoed.
//!
//! Both bridges here echo the submitting replica's own operation instance
//! back to it rather than a re-derived copy.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use realtime_operation::{Operation, SequencedOperation};
use tracing::trace;

use crate::config::ReplicaConfig;
use crate::error::StoreError;

pub trait Bridge {
    /// Accepts a local operation for sequencing.
    fn consume_and_submit(&mut self, operation: Operation) -> Result<(), StoreError>;

    /// Returns the next operation in the global order, if one is ready.
    fn poll(&mut self) -> Option<SequencedOperation>;
}

// ── LocalBridge ────────────────────────────────────────────────────────────

/// Single-replica bridge: the submission order is the global order.
///
/// Remote operations can be injected with [`LocalBridge::receive`]; they join
/// the same delivery queue behind anything already sequenced.
#[derive(Debug)]
pub struct LocalBridge {
    user_id: String,
    session_id: String,
    next_seq: u64,
    inbound: VecDeque<SequencedOperation>,
    outgoing: Vec<SequencedOperation>,
}

impl LocalBridge {
    pub fn new(config: &ReplicaConfig) -> Self {
        Self {
            user_id: config.user_id.clone(),
            session_id: config.session_id.clone(),
            next_seq: 1,
            inbound: VecDeque::new(),
            outgoing: Vec::new(),
        }
    }

    /// Queues an operation sequenced elsewhere.
    pub fn receive(&mut self, sequenced: SequencedOperation) {
        self.next_seq = self.next_seq.max(sequenced.seq.saturating_add(1));
        self.inbound.push_back(sequenced);
    }

    /// Takes the locally sequenced operations not yet shipped to peers.
    pub fn take_outgoing(&mut self) -> Vec<SequencedOperation> {
        std::mem::take(&mut self.outgoing)
    }
}

impl Bridge for LocalBridge {
    fn consume_and_submit(&mut self, operation: Operation) -> Result<(), StoreError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        trace!(seq, op = %operation, "operation sequenced locally");
        let sequenced = SequencedOperation {
            seq,
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            operation,
        };
        self.outgoing.push(sequenced.clone());
        self.inbound.push_back(sequenced);
        Ok(())
    }

    fn poll(&mut self) -> Option<SequencedOperation> {
        self.inbound.pop_front()
    }
}

// ── Sequencer ──────────────────────────────────────────────────────────────

/// In-process total-order authority shared by several replicas.
#[derive(Debug, Default)]
pub struct Sequencer {
    log: Vec<SequencedOperation>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a sequencer so several bridges can share it.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    fn sequence(&mut self, user_id: &str, session_id: &str, operation: Operation) -> u64 {
        let seq = self.log.len() as u64 + 1;
        trace!(seq, session_id, op = %operation, "operation sequenced");
        self.log.push(SequencedOperation {
            seq,
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            operation,
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn log(&self) -> &[SequencedOperation] {
        &self.log
    }
}

/// Bridge for one replica attached to a shared [`Sequencer`].
///
/// Every replica reads the same log through its own cursor, so all replicas
/// receive all operations in one order. Entries this replica submitted are
/// answered with the instance it handed in.
#[derive(Debug)]
pub struct SequencerBridge {
    sequencer: Rc<RefCell<Sequencer>>,
    user_id: String,
    session_id: String,
    cursor: usize,
    pending: VecDeque<(u64, Operation)>,
}

impl SequencerBridge {
    pub fn new(sequencer: Rc<RefCell<Sequencer>>, config: &ReplicaConfig) -> Self {
        Self {
            sequencer,
            user_id: config.user_id.clone(),
            session_id: config.session_id.clone(),
            cursor: 0,
            pending: VecDeque::new(),
        }
    }

    /// Number of own operations sequenced but not yet echoed back.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Bridge for SequencerBridge {
    fn consume_and_submit(&mut self, operation: Operation) -> Result<(), StoreError> {
        let seq = self.sequencer.borrow_mut().sequence(
            &self.user_id,
            &self.session_id,
            operation.clone(),
        );
        self.pending.push_back((seq, operation));
        Ok(())
    }

    fn poll(&mut self) -> Option<SequencedOperation> {
        let mut next = self.sequencer.borrow().log.get(self.cursor).cloned()?;
        self.cursor += 1;
        if self.pending.front().is_some_and(|(seq, _)| *seq == next.seq) {
            if let Some((_, own)) = self.pending.pop_front() {
                next.operation = own;
            }
        }
        Some(next)
    }
}
