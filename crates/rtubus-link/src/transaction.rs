//! The single outstanding master request and how it resolves.

use rtubus_core::ExceptionCode;
use tracing::{debug, warn};

/// How a master transaction ended. Delivered exactly once per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    Success,
    /// The slave answered with an exception reply.
    Exception(ExceptionCode),
    /// No valid reply arrived within the response timeout.
    Timeout,
    /// A checksummed reply from the target carried another function code.
    UnexpectedFunction { expected: u8, received: Option<u8> },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Completion handler; receives the transaction context back by value.
pub type Callback<C> = Box<dyn FnOnce(Outcome, C)>;

pub(crate) struct PendingTransaction<R, C> {
    pub(crate) target: u8,
    pub(crate) request: Vec<u8>,
    pub(crate) register: R,
    pub(crate) context: C,
    callback: Callback<C>,
    started_ms: u32,
}

impl<R, C> PendingTransaction<R, C> {
    pub(crate) fn new(
        target: u8,
        request: Vec<u8>,
        register: R,
        context: C,
        callback: Callback<C>,
        started_ms: u32,
    ) -> Self {
        Self {
            target,
            request,
            register,
            context,
            callback,
            started_ms,
        }
    }

    /// Consumes the transaction, handing its context to the callback. The
    /// retained request is released here.
    pub(crate) fn resolve(self, outcome: Outcome) {
        debug!(unit_id = self.target, ?outcome, "modbus rtu transaction resolved");
        (self.callback)(outcome, self.context);
    }
}

/// Holds at most one [`PendingTransaction`].
pub(crate) struct Transactions<R, C> {
    pending: Option<PendingTransaction<R, C>>,
    timeout_ms: u32,
}

impl<R, C> Transactions<R, C> {
    pub(crate) fn new(timeout_ms: u32) -> Self {
        Self {
            pending: None,
            timeout_ms,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn target(&self) -> Option<u8> {
        self.pending.as_ref().map(|pending| pending.target)
    }

    /// Records `transaction`, refusing to replace an active one.
    pub(crate) fn begin(
        &mut self,
        transaction: PendingTransaction<R, C>,
    ) -> Result<(), PendingTransaction<R, C>> {
        if self.pending.is_some() {
            return Err(transaction);
        }
        self.pending = Some(transaction);
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Option<PendingTransaction<R, C>> {
        self.pending.take()
    }

    /// Resolves the active transaction as a timeout once its deadline has
    /// passed. Returns whether anything was cleaned up.
    pub(crate) fn cleanup(&mut self, now_ms: u32) -> bool {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|pending| now_ms.wrapping_sub(pending.started_ms) > self.timeout_ms);
        if !expired {
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };
        warn!(
            unit_id = pending.target,
            timeout_ms = self.timeout_ms,
            "modbus rtu request timed out"
        );
        pending.resolve(Outcome::Timeout);
        true
    }
}
