//! Ballot recording support: voter eligibility, weights and tallies

use governance_types::{
    IndividualId, Participant, PolicyForest, RoleId, Vote, VotingRules, DEFAULT_VOTE_WEIGHT,
};
use std::collections::BTreeMap;

/// Why and with what weight an individual may vote on an instance
#[derive(Clone, Debug, PartialEq)]
pub struct Eligibility {
    pub weight: f64,
    /// Participant roles the individual is a member of
    pub roles: Vec<RoleId>,
}

/// Compute an individual's eligibility under a participant list
///
/// The weight is the maximum over every matching role or direct listing,
/// scaled by the confidence factor of automated participants.
pub fn eligibility(
    forest: &PolicyForest,
    rules: &VotingRules,
    individual: &IndividualId,
) -> Option<Eligibility> {
    let profile = forest.individual(individual);
    let mut weight: Option<f64> = None;
    let mut roles = Vec::new();

    for participant in &rules.participants {
        let candidate = match participant {
            Participant::Role(role_id) => match forest.role(role_id) {
                Some(role) if role.has_member(individual) => {
                    roles.push(role_id.clone());
                    role.vote_weight
                }
                _ => continue,
            },
            Participant::Individual(listed) if listed == individual => profile
                .map(|p| p.weight())
                .unwrap_or(DEFAULT_VOTE_WEIGHT),
            Participant::Individual(_) => continue,
        };
        weight = Some(weight.map_or(candidate, |w: f64| w.max(candidate)));
    }

    weight.map(|w| Eligibility {
        weight: match profile.and_then(|p| p.confidence) {
            Some(confidence) => w * confidence,
            None => w,
        },
        roles,
    })
}

/// Potential weight of every eligible individual of an instance
pub fn eligible_weights(
    forest: &PolicyForest,
    rules: &VotingRules,
) -> BTreeMap<IndividualId, f64> {
    forest
        .expand(&rules.participants)
        .into_iter()
        .filter_map(|individual| {
            eligibility(forest, rules, &individual).map(|e| (individual, e.weight))
        })
        .collect()
}

/// Sums over one ballot box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tally {
    /// Sum of agreeing vote values
    pub in_favour: f64,
    /// Sum of disagreeing vote values
    pub against: f64,
    /// Number of eligible individuals who have not voted
    pub abstention: f64,
    /// Largest weight the abstainers could still add (each counts at least 1)
    pub swing: f64,
}

impl Tally {
    pub fn new(in_favour: f64, against: f64, abstention: f64, swing: f64) -> Self {
        Self {
            in_favour,
            against,
            abstention,
            swing,
        }
    }

    /// Tally unit-weight votes with `abstainers` unit-weight non-voters
    pub fn unit(in_favour: usize, against: usize, abstainers: usize) -> Self {
        Self::new(
            in_favour as f64,
            against as f64,
            abstainers as f64,
            abstainers as f64,
        )
    }

    pub fn compute<'a>(
        votes: impl IntoIterator<Item = &'a Vote>,
        eligible: &BTreeMap<IndividualId, f64>,
    ) -> Self {
        let mut tally = Tally::default();
        let mut voted = Vec::new();
        for vote in votes {
            if vote.agreement {
                tally.in_favour += vote.value;
            } else {
                tally.against += vote.value;
            }
            voted.push(&vote.voter);
        }
        for (individual, weight) in eligible {
            if !voted.contains(&individual) {
                tally.abstention += 1.0;
                tally.swing += weight.max(1.0);
            }
        }
        tally
    }

    pub fn total(&self) -> f64 {
        self.in_favour + self.against
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governance_types::{CollaborationId, Individual, PolicyId, Role};

    fn forest() -> PolicyForest {
        PolicyForest::builder()
            .role(Role::new("maintainers").with_vote_weight(2.0).with_member("alice"))
            .role(Role::new("reviewers").with_member("alice").with_member("bob"))
            .individual(Individual::new("ci-bot").with_confidence(0.5))
            .build()
            .unwrap()
    }

    fn rules() -> VotingRules {
        VotingRules::new()
            .with_participant(Participant::role("maintainers"))
            .with_participant(Participant::role("reviewers"))
            .with_participant(Participant::individual("ci-bot"))
    }

    #[test]
    fn test_weight_is_max_over_memberships() {
        let forest = forest();
        let alice = eligibility(&forest, &rules(), &IndividualId::new("alice")).unwrap();
        assert_eq!(alice.weight, 2.0);
        assert_eq!(alice.roles.len(), 2);

        let bob = eligibility(&forest, &rules(), &IndividualId::new("bob")).unwrap();
        assert_eq!(bob.weight, 1.0);
    }

    #[test]
    fn test_confidence_scales_automated_weight() {
        let bot = eligibility(&forest(), &rules(), &IndividualId::new("ci-bot")).unwrap();
        assert_eq!(bot.weight, 0.5);
        assert!(bot.roles.is_empty());
    }

    #[test]
    fn test_outsider_is_ineligible() {
        assert!(eligibility(&forest(), &rules(), &IndividualId::new("mallory")).is_none());
    }

    #[test]
    fn test_tally_counts_abstainers() {
        let forest = forest();
        let eligible = eligible_weights(&forest, &rules());
        assert_eq!(eligible.len(), 3);

        let vote = Vote::new(
            CollaborationId::new("c"),
            PolicyId::new("p"),
            IndividualId::new("alice"),
            true,
            2.0,
        );
        let tally = Tally::compute([&vote], &eligible);
        assert_eq!(tally.in_favour, 2.0);
        assert_eq!(tally.total(), 2.0);
        assert_eq!(tally.abstention, 2.0);
        // bob weighs 1, the bot 0.5 but counts at least 1
        assert_eq!(tally.swing, 2.0);
    }
}
