//! Reward claim and distribution
//!
//! The round engine never waits on the chain. The coordinator spawns
//! fire-and-forget tasks against a `PaymentService` and feeds results back
//! into the scheduler loop over a channel; a hung or failed call can cost a
//! round its reward but can never stall a tick.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;

/// Payment call failure. Observable, never fatal to the game loop.
#[derive(Debug, Clone)]
pub enum PayoutError {
    Rpc(String),
}

impl fmt::Display for PayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutError::Rpc(reason) => write!(f, "payment rpc failed: {}", reason),
        }
    }
}

impl Error for PayoutError {}

/// Contract the engine expects from the payment network: claim the accrued
/// fees, and transfer a reward to a winner address. Both can fail
/// independently of game state.
pub trait PaymentService: Send + Sync + 'static {
    fn claim_fees(&self) -> impl Future<Output = Result<f64, PayoutError>> + Send;
    fn transfer(
        &self,
        address: &str,
        amount: f64,
    ) -> impl Future<Output = Result<(), PayoutError>> + Send;
}

/// Results flowing back into the scheduler loop.
#[derive(Debug)]
pub enum PayoutEvent {
    ClaimFinished(Result<f64, PayoutError>),
    DistributeFinished {
        round: u64,
        result: Result<(), PayoutError>,
    },
}

/// Dispatches claim/distribute calls without ever blocking the caller.
pub struct PayoutCoordinator<P: PaymentService> {
    service: Arc<P>,
    events: mpsc::UnboundedSender<PayoutEvent>,
}

impl<P: PaymentService> PayoutCoordinator<P> {
    pub fn new(service: P, events: mpsc::UnboundedSender<PayoutEvent>) -> Self {
        Self {
            service: Arc::new(service),
            events,
        }
    }

    /// Kicks off a fee claim. The result arrives as a `PayoutEvent`.
    pub fn spawn_claim(&self) {
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = service.claim_fees().await;
            match &result {
                Ok(amount) => info!("Fee claim succeeded: {}", amount),
                Err(e) => error!("Fee claim failed: {}", e),
            }
            // The receiver only disappears at shutdown.
            let _ = events.send(PayoutEvent::ClaimFinished(result));
        });
    }

    /// Kicks off the winner transfer for a finished round.
    pub fn spawn_distribute(&self, round: u64, address: String, amount: f64) {
        if amount <= 0.0 {
            debug!("Round #{}: zero reward, skipping distribution", round);
            return;
        }
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = service.transfer(&address, amount).await;
            match &result {
                Ok(()) => info!("Round #{}: distributed {} to winner", round, amount),
                Err(e) => error!("Round #{}: distribution failed: {}", round, e),
            }
            let _ = events.send(PayoutEvent::DistributeFinished { round, result });
        });
    }
}

/// Stand-in payment service with switchable failure modes. Claim amounts
/// land in the configured band.
pub struct MockPaymentService {
    claim_band: (f64, f64),
    fail_claims: bool,
    fail_transfers: bool,
}

impl MockPaymentService {
    pub fn new() -> Self {
        Self {
            claim_band: (0.5, 2.0),
            fail_claims: false,
            fail_transfers: false,
        }
    }

    pub fn failing_claims() -> Self {
        Self {
            fail_claims: true,
            ..Self::new()
        }
    }

    pub fn failing_transfers() -> Self {
        Self {
            fail_transfers: true,
            ..Self::new()
        }
    }
}

impl Default for MockPaymentService {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentService for MockPaymentService {
    fn claim_fees(&self) -> impl Future<Output = Result<f64, PayoutError>> + Send {
        let (lo, hi) = self.claim_band;
        let fail = self.fail_claims;
        async move {
            if fail {
                return Err(PayoutError::Rpc("claim rejected".to_string()));
            }
            let amount = lo + rand::random::<f64>() * (hi - lo);
            Ok((amount * 100.0).round() / 100.0)
        }
    }

    fn transfer(
        &self,
        address: &str,
        _amount: f64,
    ) -> impl Future<Output = Result<(), PayoutError>> + Send {
        let fail = self.fail_transfers;
        let address = address.to_string();
        async move {
            if fail {
                return Err(PayoutError::Rpc(format!("transfer to {} rejected", address)));
            }
            Ok(())
        }
    }
}
