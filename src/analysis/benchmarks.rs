//! Immutable benchmark tables keyed by niche and account-size tier.
//!
//! Loaded once at process start and passed explicitly into the components
//! that need them; nothing here is mutated at runtime.

/// Follower-count tier an account falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountTier {
    /// Under 10k followers.
    Nano,
    /// 10k to under 50k.
    Micro,
    /// 50k to under 500k.
    Mid,
    /// 500k to under 1M.
    Macro,
    /// 1M and above.
    Mega,
}

impl AccountTier {
    pub fn from_followers(followers: u64) -> Self {
        match followers {
            0..=9_999 => AccountTier::Nano,
            10_000..=49_999 => AccountTier::Micro,
            50_000..=499_999 => AccountTier::Mid,
            500_000..=999_999 => AccountTier::Macro,
            _ => AccountTier::Mega,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountTier::Nano => "nano",
            AccountTier::Micro => "micro",
            AccountTier::Mid => "mid",
            AccountTier::Macro => "macro",
            AccountTier::Mega => "mega",
        }
    }

    /// Engagement naturally compresses as accounts grow; expected rates
    /// are scaled by this factor.
    fn engagement_multiplier(&self) -> f64 {
        match self {
            AccountTier::Nano => 1.4,
            AccountTier::Micro => 1.1,
            AccountTier::Mid => 0.9,
            AccountTier::Macro => 0.7,
            AccountTier::Mega => 0.5,
        }
    }
}

/// The full benchmark set injected into the deterministic engine.
#[derive(Debug, Clone)]
pub struct Benchmarks {
    niche_engagement: Vec<(&'static str, f64)>,
    default_engagement: f64,
    /// Expected posts per week, (min, max), per tier.
    posting_frequency: Vec<(AccountTier, (f64, f64))>,
    /// Share of reels below which the format mix is flagged.
    pub min_reel_share: f64,
    /// Hashtags per post above which distribution is flagged as spammy.
    pub max_hashtags_per_post: f64,
    /// bot_score at or above this is a high-severity problem.
    pub bot_score_high: f64,
    /// authenticity_score at or below this is a high-severity problem.
    pub authenticity_low: f64,
}

impl Benchmarks {
    /// Expected engagement rate (percent) for a niche and tier.
    /// Unknown niches fall back to the default-niche average (2.5).
    pub fn expected_engagement(&self, niche: &str, tier: AccountTier) -> f64 {
        let lower = niche.to_lowercase();
        let base = self
            .niche_engagement
            .iter()
            .find(|(name, _)| lower.contains(name))
            .map(|(_, avg)| *avg)
            .unwrap_or(self.default_engagement);
        base * tier.engagement_multiplier()
    }

    pub fn posting_frequency_range(&self, tier: AccountTier) -> (f64, f64) {
        self.posting_frequency
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, range)| *range)
            .unwrap_or((3.0, 7.0))
    }
}

/// The standard benchmark set. Values are fixed domain tables, not tunables.
pub fn default_benchmarks() -> Benchmarks {
    Benchmarks {
        niche_engagement: vec![
            ("meme", 4.5),
            ("travel", 3.2),
            ("food", 3.0),
            ("fitness", 2.9),
            ("beauty", 2.2),
            ("fashion", 1.8),
            ("tech", 1.6),
        ],
        default_engagement: 2.5,
        posting_frequency: vec![
            (AccountTier::Nano, (3.0, 7.0)),
            (AccountTier::Micro, (4.0, 10.0)),
            (AccountTier::Mid, (4.0, 12.0)),
            (AccountTier::Macro, (5.0, 14.0)),
            (AccountTier::Mega, (5.0, 14.0)),
        ],
        min_reel_share: 0.25,
        max_hashtags_per_post: 20.0,
        bot_score_high: 70.0,
        authenticity_low: 25.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(AccountTier::from_followers(0), AccountTier::Nano);
        assert_eq!(AccountTier::from_followers(9_999), AccountTier::Nano);
        assert_eq!(AccountTier::from_followers(10_000), AccountTier::Micro);
        assert_eq!(AccountTier::from_followers(50_000), AccountTier::Mid);
        assert_eq!(AccountTier::from_followers(500_000), AccountTier::Macro);
        assert_eq!(AccountTier::from_followers(1_000_000), AccountTier::Mega);
    }

    #[test]
    fn test_unknown_niche_uses_default_average() {
        let b = default_benchmarks();
        // Mid-tier multiplier 0.9 over the 2.5 default.
        assert!((b.expected_engagement("underwater basket weaving", AccountTier::Mid) - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_known_niche_lookup_is_substring_based() {
        let b = default_benchmarks();
        let travel = b.expected_engagement("Travel & Lifestyle", AccountTier::Nano);
        assert!((travel - 3.2 * 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_compresses_with_size() {
        let b = default_benchmarks();
        assert!(
            b.expected_engagement("fitness", AccountTier::Nano)
                > b.expected_engagement("fitness", AccountTier::Mega)
        );
    }
}
