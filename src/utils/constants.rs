//! Shared configuration constants.

/// Pool of plausible desktop user agent strings a launched browser picks
/// from at random, so repeated launches don't all present one fixed
/// fingerprint.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
];

/// Pick one of [`CHROME_USER_AGENTS`] at random.
#[must_use]
pub fn random_chrome_user_agent() -> &'static str {
    use rand::seq::IndexedRandom;
    CHROME_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(CHROME_USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_is_always_from_the_pool() {
        for _ in 0..20 {
            assert!(CHROME_USER_AGENTS.contains(&random_chrome_user_agent()));
        }
    }
}
