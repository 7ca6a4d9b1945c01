//! Roster supply for a round
//!
//! The engine never talks to a token index directly; it consumes whatever a
//! `HolderSource` hands it. Production wires a live index here, everything
//! else uses the bundled mock roster.

use std::error::Error;
use std::fmt;

use log::debug;
use rand::Rng;

/// One eligible contestant identity.
#[derive(Debug, Clone)]
pub struct Holder {
    /// Short display handle shown to observers.
    pub wallet: String,
    /// Full external address, used only for payout.
    pub address: String,
}

impl Holder {
    pub fn new(wallet: &str, address: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            address: address.to_string(),
        }
    }
}

/// Roster fetch failure. The round simply does not start; the scheduler
/// retries after a short break.
#[derive(Debug)]
pub enum HolderError {
    Unavailable(String),
}

impl fmt::Display for HolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderError::Unavailable(reason) => write!(f, "holder roster unavailable: {}", reason),
        }
    }
}

impl Error for HolderError {}

/// Supplies the roster of eligible contestants for a round.
pub trait HolderSource {
    fn fetch_roster(&mut self) -> Result<Vec<Holder>, HolderError>;
}

/// Wallet prefixes used by the mock roster.
const MOCK_WALLETS: [&str; 18] = [
    "7xKp4mNw", "3fRt8jKl", "9mNp2xWq", "5kLm7yZa", "2pQr9sBt", "8tUv3nCd",
    "4wXy6mEf", "1aZb5hGi", "Fm3nJ7kP", "Lx9oW2yA", "Hp6qZ8dB", "Nv4rS3fC",
    "Qy1tU5gD", "Sw8uV6hE", "Ux5vW7iF", "Wz2wX8jG", "Bk7mR4pL", "Cn9sT6qN",
];

/// Stand-in holder source cycling a fixed wallet list with a randomized
/// roster size per round.
pub struct MockHolderSource {
    min: usize,
    max: usize,
}

impl MockHolderSource {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl HolderSource for MockHolderSource {
    fn fetch_roster(&mut self) -> Result<Vec<Holder>, HolderError> {
        let count = rand::thread_rng().gen_range(self.min..=self.max);
        let roster = (0..count)
            .map(|i| {
                let wallet = MOCK_WALLETS[i % MOCK_WALLETS.len()];
                // Pad the prefix out to a full-length mock address.
                Holder {
                    wallet: wallet.to_string(),
                    address: format!("{:x<44}", wallet),
                }
            })
            .collect();
        debug!("Mock roster of {} holders", count);
        Ok(roster)
    }
}
