use serde::{Deserialize, Serialize};

/// Conformance of a check node, reduced bottom-up through the tree.
///
/// `NotRelevant` is the identity of [`reduce`](Self::reduce) and
/// `NonConformant` absorbs everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConformanceStatus {
    NoTraffic,
    NonConformant,
    PartiallyConformant,
    Conformant,
    NotRelevant,
}

impl ConformanceStatus {
    pub fn reduce(self, other: ConformanceStatus) -> ConformanceStatus {
        use ConformanceStatus::*;
        match (self, other) {
            (NotRelevant, x) | (x, NotRelevant) => x,
            (NonConformant, _) | (_, NonConformant) => NonConformant,
            (PartiallyConformant, _) | (_, PartiallyConformant) => PartiallyConformant,
            (Conformant, Conformant) => Conformant,
            (NoTraffic, NoTraffic) => NoTraffic,
            _ => PartiallyConformant,
        }
    }

    /// Fold of `statuses`; `NotRelevant` when empty.
    pub fn reduce_all(statuses: impl IntoIterator<Item = ConformanceStatus>) -> ConformanceStatus {
        statuses
            .into_iter()
            .fold(ConformanceStatus::NotRelevant, ConformanceStatus::reduce)
    }

    /// Status of a leaf from the exchanges it judged.
    pub fn for_exchange_counts(conformant: usize, non_conformant: usize) -> ConformanceStatus {
        match (conformant, non_conformant) {
            (0, 0) => ConformanceStatus::NoTraffic,
            (_, 0) => ConformanceStatus::Conformant,
            (0, _) => ConformanceStatus::NonConformant,
            _ => ConformanceStatus::PartiallyConformant,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConformanceStatus::Conformant => "CONFORMANT",
            ConformanceStatus::PartiallyConformant => "PARTIALLY CONFORMANT",
            ConformanceStatus::NonConformant => "NON-CONFORMANT",
            ConformanceStatus::NoTraffic | ConformanceStatus::NotRelevant => "NO TRAFFIC",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ConformanceStatus::Conformant => "✅",
            ConformanceStatus::PartiallyConformant => "⚠️",
            ConformanceStatus::NonConformant => "🚫",
            ConformanceStatus::NoTraffic | ConformanceStatus::NotRelevant => "❔",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConformanceStatus::{self, *};

    const ALL: [ConformanceStatus; 5] = [
        NoTraffic,
        NonConformant,
        PartiallyConformant,
        Conformant,
        NotRelevant,
    ];

    #[test]
    fn not_relevant_is_identity() {
        for x in ALL {
            assert_eq!(x.reduce(NotRelevant), x);
            assert_eq!(NotRelevant.reduce(x), x);
        }
    }

    #[test]
    fn non_conformant_absorbs() {
        for x in ALL {
            assert_eq!(NonConformant.reduce(x), NonConformant);
            assert_eq!(x.reduce(NonConformant), NonConformant);
        }
    }

    #[test]
    fn homogeneous_pairs() {
        assert_eq!(Conformant.reduce(Conformant), Conformant);
        assert_eq!(NoTraffic.reduce(NoTraffic), NoTraffic);
        assert_eq!(Conformant.reduce(NoTraffic), PartiallyConformant);
        assert_eq!(PartiallyConformant.reduce(Conformant), PartiallyConformant);
    }

    #[test]
    fn reduction_is_commutative_and_associative() {
        for x in ALL {
            for y in ALL {
                assert_eq!(x.reduce(y), y.reduce(x), "{x:?} {y:?}");
                for z in ALL {
                    assert_eq!(
                        x.reduce(y).reduce(z),
                        x.reduce(y.reduce(z)),
                        "{x:?} {y:?} {z:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn exchange_counts() {
        assert_eq!(ConformanceStatus::for_exchange_counts(0, 0), NoTraffic);
        assert_eq!(ConformanceStatus::for_exchange_counts(2, 0), Conformant);
        assert_eq!(ConformanceStatus::for_exchange_counts(0, 1), NonConformant);
        assert_eq!(
            ConformanceStatus::for_exchange_counts(1, 1),
            PartiallyConformant
        );
        assert_eq!(ConformanceStatus::reduce_all([]), NotRelevant);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(PartiallyConformant).unwrap(),
            serde_json::json!("PARTIALLY_CONFORMANT")
        );
    }
}
