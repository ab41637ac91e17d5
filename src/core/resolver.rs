//! Identity resolution
//!
//! Maps payment and booking records onto canonical members using three
//! deterministic tiers, tried in order:
//!
//! 1. exact `member_id` match
//! 2. exact normalized composite key match (name + contact)
//! 3. fuzzy name similarity above the configured threshold
//!
//! A record that matches several members equally well is marked
//! ambiguous, never guessed. Resolution is a pure planning step: it
//! reads the inputs and produces a [`ResolutionPlan`] without mutating
//! anything.

use std::collections::HashMap;

use crate::types::member::{composite_key, normalize_name};
use crate::types::{Booking, Member, MemberId, Payment};

/// How a record was matched to a member
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchTier {
    MemberId,
    CompositeKey,
    FuzzyName { score: f64 },
}

/// Outcome of resolving a single record
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched { member_id: MemberId, tier: MatchTier },
    /// Several members matched equally well; candidates sorted by id
    Ambiguous { candidates: Vec<MemberId> },
    Unmatched,
}

/// A fuzzy match worth surfacing to the operator, suggesting a source
/// data fix
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzySuggestion {
    /// Name as entered in the payment or booking row
    pub entered: String,
    /// Canonical member name it was matched to
    pub canonical: String,
    pub score: f64,
}

/// Resolutions for every payment and booking of a run, index-aligned
/// with the input slices they were built from
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    pub payments: Vec<Resolution>,
    pub bookings: Vec<Resolution>,
    /// Deduplicated fuzzy matches, in first-seen order
    pub suggestions: Vec<FuzzySuggestion>,
}

/// Name similarity scoring, pluggable for the fuzzy tier
///
/// Implementations must be symmetric and return a score in `[0, 1]`
/// where `1.0` means identical.
pub trait NameSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Default scorer: normalized Levenshtein distance over the
/// whitespace-collapsed, lower-cased names
pub struct LevenshteinSimilarity;

impl NameSimilarity for LevenshteinSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize_name(a);
        let b = normalize_name(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        let max_len = a.chars().count().max(b.chars().count());
        let dist = levenshtein_distance(&a, &b);
        1.0 - (dist as f64 / max_len as f64)
    }
}

/// Classic two-row Levenshtein over chars, O(min(a,b)) memory
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Resolves records against a fixed member roster
pub struct IdentityResolver<'a> {
    members: &'a [Member],
    by_id: HashMap<&'a str, usize>,
    by_key: HashMap<&'a str, Vec<usize>>,
    threshold: f64,
    similarity: Box<dyn NameSimilarity + Send + Sync>,
}

impl<'a> IdentityResolver<'a> {
    /// Build a resolver with the default Levenshtein scorer
    pub fn new(members: &'a [Member], threshold: f64) -> Self {
        Self::with_similarity(members, threshold, Box::new(LevenshteinSimilarity))
    }

    /// Build a resolver with a custom similarity scorer
    pub fn with_similarity(
        members: &'a [Member],
        threshold: f64,
        similarity: Box<dyn NameSimilarity + Send + Sync>,
    ) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, member) in members.iter().enumerate() {
            by_id.insert(member.id.as_str(), idx);
            if let Some(key) = &member.composite_key {
                by_key.entry(key.as_str()).or_default().push(idx);
            }
        }
        IdentityResolver {
            members,
            by_id,
            by_key,
            threshold,
            similarity,
        }
    }

    /// Resolve all payments and bookings in one pass
    pub fn resolve(&self, payments: &[Payment], bookings: &[Booking]) -> ResolutionPlan {
        let mut plan = ResolutionPlan::default();
        for payment in payments {
            let resolution = self.resolve_record(
                payment.member_id.as_deref(),
                payment.name.as_deref(),
                payment.contact.as_deref(),
                &mut plan.suggestions,
            );
            plan.payments.push(resolution);
        }
        for booking in bookings {
            let resolution = self.resolve_record(
                booking.member_id.as_deref(),
                booking.name.as_deref(),
                booking.contact.as_deref(),
                &mut plan.suggestions,
            );
            plan.bookings.push(resolution);
        }
        plan
    }

    fn resolve_record(
        &self,
        member_id: Option<&str>,
        name: Option<&str>,
        contact: Option<&str>,
        suggestions: &mut Vec<FuzzySuggestion>,
    ) -> Resolution {
        // Tier 1: the id is authoritative when it is known
        if let Some(id) = member_id {
            if let Some(&idx) = self.by_id.get(id) {
                return Resolution::Matched {
                    member_id: self.members[idx].id.clone(),
                    tier: MatchTier::MemberId,
                };
            }
            // unknown id: fall through to name-based tiers
        }

        let name = match name {
            Some(n) => n,
            None => return Resolution::Unmatched,
        };

        // Tier 2: exact composite key
        if let Some(key) = composite_key(name, contact) {
            if let Some(indices) = self.by_key.get(key.as_str()) {
                if indices.len() == 1 {
                    return Resolution::Matched {
                        member_id: self.members[indices[0]].id.clone(),
                        tier: MatchTier::CompositeKey,
                    };
                }
                return self.ambiguous(indices);
            }
        }

        // Tier 3: fuzzy name
        let mut best_score = 0.0f64;
        let mut best: Vec<usize> = Vec::new();
        for (idx, member) in self.members.iter().enumerate() {
            let score = self.similarity.similarity(name, &member.display_name);
            if score < self.threshold {
                continue;
            }
            if score > best_score + f64::EPSILON {
                best_score = score;
                best = vec![idx];
            } else if (score - best_score).abs() <= f64::EPSILON {
                best.push(idx);
            }
        }

        match best.len() {
            0 => Resolution::Unmatched,
            1 => {
                let member = &self.members[best[0]];
                let suggestion = FuzzySuggestion {
                    entered: name.to_string(),
                    canonical: member.display_name.clone(),
                    score: best_score,
                };
                // an exact name that only missed the key tier on contact
                // is not worth suggesting
                let is_exact = normalize_name(name) == normalize_name(&member.display_name);
                if !is_exact
                    && !suggestions.iter().any(|s| {
                        s.entered == suggestion.entered && s.canonical == suggestion.canonical
                    })
                {
                    suggestions.push(suggestion);
                }
                Resolution::Matched {
                    member_id: member.id.clone(),
                    tier: MatchTier::FuzzyName { score: best_score },
                }
            }
            _ => self.ambiguous(&best),
        }
    }

    fn ambiguous(&self, indices: &[usize]) -> Resolution {
        let mut candidates: Vec<MemberId> =
            indices.iter().map(|&i| self.members[i].id.clone()).collect();
        candidates.sort();
        Resolution::Ambiguous { candidates }
    }
}
