// Unit Consistency - Candidates Must Agree After Normalization
//
// Values are clustered by normalized amount. The largest cluster (ties to
// the most confident) is the reference. A disagreeing candidate whose
// currency/scale combination is unique in the group and absent from the
// reference cannot be reconciled and fails; other disagreements warn.

use crate::types::{Candidate, RuleName, Verdict};
use crate::validators::within_tolerance;

/// Group candidates whose normalized values agree within `tolerance`
///
/// Clusters are anchored on their smallest member and returned in
/// ascending value order.
pub fn cluster_by_value<'c>(
    candidates: impl IntoIterator<Item = &'c Candidate>,
    tolerance: f64,
) -> Vec<Vec<&'c Candidate>> {
    let mut sorted: Vec<&Candidate> = candidates.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.normalized_value()
            .cmp(&b.normalized_value())
            .then_with(|| a.id().cmp(b.id()))
    });

    let mut clusters: Vec<Vec<&Candidate>> = Vec::new();
    for candidate in sorted {
        let joins = clusters.last().map_or(false, |cluster| {
            within_tolerance(
                cluster[0].normalized_value(),
                candidate.normalized_value(),
                tolerance,
            )
        });
        if joins {
            if let Some(cluster) = clusters.last_mut() {
                cluster.push(candidate);
            }
        } else {
            clusters.push(vec![candidate]);
        }
    }
    clusters
}

fn max_confidence(cluster: &[&Candidate]) -> f64 {
    cluster.iter().map(|c| c.confidence()).fold(0.0, f64::max)
}

/// Check unit consistency for a whole group
pub fn check(candidates: &[Candidate], tolerance: f64) -> Vec<Verdict> {
    let clusters = cluster_by_value(candidates, tolerance);

    if clusters.len() <= 1 {
        return candidates
            .iter()
            .map(|c| {
                Verdict::pass(
                    c,
                    RuleName::UnitConsistency,
                    "Consistent with all candidates after normalization",
                )
            })
            .collect();
    }

    let reference_index = clusters
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            a.len()
                .cmp(&b.len())
                .then_with(|| max_confidence(a).total_cmp(&max_confidence(b)))
                // Earlier cluster wins a full tie
                .then_with(|| ib.cmp(ia))
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    let reference = &clusters[reference_index];

    candidates
        .iter()
        .map(|candidate| {
            if reference.iter().any(|r| r.id() == candidate.id()) {
                return Verdict::pass(
                    candidate,
                    RuleName::UnitConsistency,
                    format!("Agrees with {} candidate(s)", reference.len()),
                );
            }

            let combination = candidate.unit_combination();
            let shared = candidates.iter().any(|other| {
                other.id() != candidate.id() && other.unit_combination() == combination
            });
            let in_reference = reference.iter().any(|r| r.unit_combination() == combination);
            let (currency, scale) = combination;
            let unit = format!("{} {}", currency.unwrap_or("-"), scale);

            if !shared && !in_reference {
                Verdict::fail(
                    candidate,
                    RuleName::UnitConsistency,
                    format!(
                        "Value {} ({}) cannot be reconciled with {} agreeing candidate(s) at {}",
                        candidate.normalized_value(),
                        unit,
                        reference.len(),
                        reference[0].normalized_value()
                    ),
                )
            } else {
                Verdict::warning(
                    candidate,
                    RuleName::UnitConsistency,
                    format!(
                        "Value {} ({}) disagrees with {} candidate(s) at {}",
                        candidate.normalized_value(),
                        unit,
                        reference.len(),
                        reference[0].normalized_value()
                    ),
                )
            }
        })
        .collect()
}
