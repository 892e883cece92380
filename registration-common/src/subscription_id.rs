use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

const ID_SPACE: u32 = 1_000_000;
const ID_DIGITS: usize = 6;

/// Human-facing 6-digit code handed out for every submission.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("{s} is not a valid subscription id"));
        }
        s.parse::<u32>()
            .map(SubscriptionId)
            .map_err(|e| format!("{s} is not a valid subscription id: {e}"))
    }
}

/// Every subscription id ever issued, plus the random source new ones are drawn from.
///
/// Drawing takes `&mut self`: there must be a single writer. Callers that
/// process submissions concurrently have to put this behind a lock so the
/// check-and-insert stays one step.
pub struct SubscriptionIds<R = StdRng> {
    issued: HashSet<u32>,
    rng: R,
}

impl SubscriptionIds<StdRng> {
    /// Build the set from the ids already stored.
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_rng(existing, StdRng::from_entropy())
    }
}

impl<R: Rng> SubscriptionIds<R> {
    pub fn with_rng<I, S>(existing: I, rng: R) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut issued = HashSet::new();
        for id in existing {
            match id.as_ref().parse::<SubscriptionId>() {
                Ok(id) => {
                    issued.insert(id.value());
                }
                // Can never collide with a generated id.
                Err(error) => warn!("skipping stored subscription id: {}", error),
            }
        }

        Self { issued, rng }
    }

    /// Draw random ids until one has not been issued yet, and reserve it.
    /// There is no bound on the number of draws.
    pub fn next_id(&mut self) -> SubscriptionId {
        let mut attempts = 1;
        loop {
            let candidate = self.rng.gen_range(0..ID_SPACE);
            if self.issued.insert(candidate) {
                debug!(attempts, "issued subscription id");
                return SubscriptionId(candidate);
            }
            attempts += 1;
        }
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.issued.contains(&id.value())
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
