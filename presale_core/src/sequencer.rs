// Transaction sequencing for purchases and burns
//
// The flow is an explicit state machine. `transition` is pure: it maps the
// current state and an observed event to the next state plus the command
// the driver has to carry out. `FlowRunner` is that driver: it submits
// through the wallet, watches receipts through the chain client and feeds
// the results back as events.

use crate::chain_client::{ChainClient, PendingCall};
use crate::confirmation::{wait_for_confirmation, WaitOutcome};
use crate::error::CoreError;
use crate::models::ConfirmedReceipt;
use crate::session::SessionHandle;
use crate::wallet::WalletSigner;
use ethers::types::H256;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message for a mined transaction whose receipt reports failure.
pub const REVERTED_MESSAGE: &str = "Transaction reverted";

/// One on-chain transaction within a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Approve,
    Purchase,
    Burn,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Approve => write!(f, "approve"),
            Stage::Purchase => write!(f, "purchase"),
            Stage::Burn => write!(f, "burn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Single payable purchase.
    NativePurchase,
    /// Approve, then purchase once the approval is mined.
    TokenPurchase,
    /// Single transfer to the burn sink.
    Burn,
}

impl FlowKind {
    pub fn first_stage(self) -> Stage {
        match self {
            FlowKind::NativePurchase => Stage::Purchase,
            FlowKind::TokenPurchase => Stage::Approve,
            FlowKind::Burn => Stage::Burn,
        }
    }

    /// Stage submitted after `stage` is confirmed, if any.
    pub fn next_stage(self, stage: Stage) -> Option<Stage> {
        match (self, stage) {
            (FlowKind::TokenPurchase, Stage::Approve) => Some(Stage::Purchase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Submitting(Stage),
    Submitted { stage: Stage, hash: H256 },
    Confirming { stage: Stage, hash: H256 },
    Confirmed { stage: Stage, receipt: ConfirmedReceipt },
    Failed { stage: Stage, message: String },
}

impl FlowState {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FlowState::Idle => None,
            FlowState::Submitting(stage) => Some(*stage),
            FlowState::Submitted { stage, .. }
            | FlowState::Confirming { stage, .. }
            | FlowState::Confirmed { stage, .. }
            | FlowState::Failed { stage, .. } => Some(*stage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Start,
    Submitted(H256),
    SubmitFailed(String),
    Watching,
    Mined(ConfirmedReceipt),
    Advance,
}

/// Work the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Submit(Stage),
    Watch(H256),
    Advance,
}

fn invalid(state: &FlowState, event: &FlowEvent) -> CoreError {
    CoreError::Validation(format!("invalid flow transition: {:?} on {:?}", event, state))
}

/// Pure transition function of the sequencer.
pub fn transition(kind: FlowKind, state: &FlowState, event: FlowEvent) -> Result<(FlowState, Option<Command>), CoreError> {
    let next = match (state, event) {
        (FlowState::Idle, FlowEvent::Start) => {
            let stage = kind.first_stage();
            (FlowState::Submitting(stage), Some(Command::Submit(stage)))
        }
        (FlowState::Submitting(stage), FlowEvent::Submitted(hash)) => {
            (FlowState::Submitted { stage: *stage, hash }, Some(Command::Watch(hash)))
        }
        (FlowState::Submitting(stage), FlowEvent::SubmitFailed(message)) => {
            (FlowState::Failed { stage: *stage, message }, None)
        }
        (FlowState::Submitted { stage, hash }, FlowEvent::Watching) => {
            (FlowState::Confirming { stage: *stage, hash: *hash }, None)
        }
        (FlowState::Confirming { stage, hash }, FlowEvent::Mined(receipt)) if receipt.hash == *hash => {
            if !receipt.succeeded {
                (FlowState::Failed { stage: *stage, message: REVERTED_MESSAGE.to_string() }, None)
            } else {
                let command = kind.next_stage(*stage).map(|_| Command::Advance);
                (FlowState::Confirmed { stage: *stage, receipt }, command)
            }
        }
        (FlowState::Confirmed { stage, .. }, FlowEvent::Advance) => match kind.next_stage(*stage) {
            Some(next) => (FlowState::Submitting(next), Some(Command::Submit(next))),
            None => return Err(invalid(state, &FlowEvent::Advance)),
        },
        (state, event) => return Err(invalid(state, &event)),
    };
    Ok(next)
}

/// Whether `state` ends the flow.
pub fn is_terminal(kind: FlowKind, state: &FlowState) -> bool {
    match state {
        FlowState::Failed { .. } => true,
        FlowState::Confirmed { stage, .. } => kind.next_stage(*stage).is_none(),
        _ => false,
    }
}

/// State of one flow plus what it has observed so far. Each stage keeps
/// its own hash, so a purchase failure still shows the confirmed approval.
#[derive(Debug, Clone)]
pub struct Sequencer {
    kind: FlowKind,
    state: FlowState,
    approve_hash: Option<H256>,
    approve_receipt: Option<ConfirmedReceipt>,
    main_hash: Option<H256>,
    history: Vec<FlowState>,
}

impl Sequencer {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            state: FlowState::Idle,
            approve_hash: None,
            approve_receipt: None,
            main_hash: None,
            history: vec![FlowState::Idle],
        }
    }

    pub fn apply(&mut self, event: FlowEvent) -> Result<Option<Command>, CoreError> {
        let (next, command) = transition(self.kind, &self.state, event)?;
        match &next {
            FlowState::Submitted { stage: Stage::Approve, hash } => self.approve_hash = Some(*hash),
            FlowState::Submitted { hash, .. } => self.main_hash = Some(*hash),
            FlowState::Confirmed { stage: Stage::Approve, receipt } => self.approve_receipt = Some(receipt.clone()),
            _ => {}
        }
        self.history.push(next.clone());
        self.state = next;
        Ok(command)
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn approve_hash(&self) -> Option<H256> {
        self.approve_hash
    }

    pub fn approve_receipt(&self) -> Option<&ConfirmedReceipt> {
        self.approve_receipt.as_ref()
    }

    /// Hash of the purchase or burn transaction, once submitted.
    pub fn main_hash(&self) -> Option<H256> {
        self.main_hash
    }

    /// Every state the flow went through, starting with `Idle`.
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self.kind, &self.state)
    }

    /// Receipt of the final transaction when the whole flow succeeded.
    pub fn final_receipt(&self) -> Option<&ConfirmedReceipt> {
        match &self.state {
            FlowState::Confirmed { receipt, .. } if self.is_terminal() => Some(receipt),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<(Stage, &str)> {
        match &self.state {
            FlowState::Failed { stage, message } => Some((*stage, message.as_str())),
            _ => None,
        }
    }
}

/// Calls a flow will submit, resolved before the flow starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowPlan {
    pub kind: FlowKind,
    pub approve: Option<PendingCall>,
    pub main: PendingCall,
}

impl FlowPlan {
    pub fn native_purchase(purchase: PendingCall) -> Self {
        Self { kind: FlowKind::NativePurchase, approve: None, main: purchase }
    }

    pub fn token_purchase(approve: PendingCall, purchase: PendingCall) -> Self {
        Self { kind: FlowKind::TokenPurchase, approve: Some(approve), main: purchase }
    }

    pub fn burn(transfer: PendingCall) -> Self {
        Self { kind: FlowKind::Burn, approve: None, main: transfer }
    }

    pub fn call_for(&self, stage: Stage) -> Option<&PendingCall> {
        match stage {
            Stage::Approve => self.approve.as_ref(),
            Stage::Purchase | Stage::Burn => Some(&self.main),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// Reached a terminal state: confirmed or failed.
    Finished(Sequencer),
    /// Session ended mid-flow. The sequencer holds the last state reached.
    Disconnected(Sequencer),
}

impl FlowOutcome {
    pub fn sequencer(&self) -> &Sequencer {
        match self {
            FlowOutcome::Finished(s) | FlowOutcome::Disconnected(s) => s,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, FlowOutcome::Disconnected(_))
    }
}

/// Drives a [`FlowPlan`] to completion against injected chain and wallet
/// capabilities.
pub struct FlowRunner<'a> {
    chain: &'a dyn ChainClient,
    wallet: &'a dyn WalletSigner,
    receipt_poll: Duration,
    session: SessionHandle,
    observer: Option<mpsc::UnboundedSender<FlowState>>,
}

impl<'a> FlowRunner<'a> {
    pub fn new(chain: &'a dyn ChainClient, wallet: &'a dyn WalletSigner, receipt_poll: Duration, session: SessionHandle) -> Self {
        Self { chain, wallet, receipt_poll, session, observer: None }
    }

    /// Send every state change to `observer`, the way a UI would re-render.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<FlowState>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn publish(&self, state: &FlowState) {
        if self.session.is_disconnected() {
            return;
        }
        if let Some(observer) = &self.observer {
            let _ = observer.send(state.clone());
        }
    }

    pub async fn run(&self, plan: &FlowPlan) -> Result<FlowOutcome, CoreError> {
        let mut session = self.session.clone();
        let mut seq = Sequencer::new(plan.kind);
        if session.is_disconnected() {
            return Ok(FlowOutcome::Disconnected(seq));
        }

        let mut next = seq.apply(FlowEvent::Start)?;
        self.publish(seq.state());

        while let Some(command) = next {
            if session.is_disconnected() {
                return Ok(FlowOutcome::Disconnected(seq));
            }
            next = match command {
                Command::Submit(stage) => {
                    let call = plan
                        .call_for(stage)
                        .ok_or_else(|| CoreError::Validation(format!("flow has no call for the {} stage", stage)))?;
                    info!("Submitting {} ({})", stage, call.label());
                    let submitted = tokio::select! {
                        biased;
                        _ = session.disconnected() => return Ok(FlowOutcome::Disconnected(seq)),
                        res = self.wallet.submit(call) => res,
                    };
                    match submitted {
                        Ok(hash) => {
                            info!("{} submitted: {:?}", stage, hash);
                            seq.apply(FlowEvent::Submitted(hash))?
                        }
                        Err(failure) => {
                            let message = failure.summary();
                            warn!("{} submission failed: {}", stage, message);
                            seq.apply(FlowEvent::SubmitFailed(message))?
                        }
                    }
                }
                Command::Watch(hash) => {
                    seq.apply(FlowEvent::Watching)?;
                    self.publish(seq.state());
                    match wait_for_confirmation(self.chain, hash, self.receipt_poll, &mut session).await {
                        WaitOutcome::Mined(receipt) => seq.apply(FlowEvent::Mined(receipt))?,
                        WaitOutcome::Disconnected => return Ok(FlowOutcome::Disconnected(seq)),
                    }
                }
                Command::Advance => {
                    debug!("Confirmation observed, advancing flow");
                    seq.apply(FlowEvent::Advance)?
                }
            };
            self.publish(seq.state());
        }

        Ok(FlowOutcome::Finished(seq))
    }
}
