//! Deterministic RNG streams segregated by simulation domain.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::cell::{RefCell, RefMut};

use crate::constants::{RNG_DOMAIN_POLICY, RNG_DOMAIN_RISK};

/// Independent streams so that, for example, a driver's choice policy never
/// shifts the risk draws of the engine.
#[derive(Debug, Clone)]
pub struct RngBundle {
    risk: RefCell<CountingRng<ChaCha20Rng>>,
    policy: RefCell<CountingRng<ChaCha20Rng>>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            risk: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_RISK))),
            policy: RefCell::new(CountingRng::new(derive_stream_seed(
                seed,
                RNG_DOMAIN_POLICY,
            ))),
        }
    }

    /// Stream consumed by risk-branch draws.
    #[must_use]
    pub fn risk(&self) -> RefMut<'_, CountingRng<ChaCha20Rng>> {
        self.risk.borrow_mut()
    }

    /// Stream reserved for drivers choosing among event choices.
    #[must_use]
    pub fn policy(&self) -> RefMut<'_, CountingRng<ChaCha20Rng>> {
        self.policy.borrow_mut()
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

/// HMAC-SHA256 of the domain tag keyed by the user seed, truncated to 64 bits.
fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
