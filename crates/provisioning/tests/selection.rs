use proptest::prelude::*;
use provisioning::{HandlerKind, HandlerSet, select};

fn handler_set() -> impl Strategy<Value = HandlerSet> {
    proptest::collection::vec(proptest::sample::select(HandlerKind::ALL.to_vec()), 0..12)
        .prop_map(|kinds| kinds.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn exclusion_is_complement_of_every_kind(exclude in handler_set()) {
        let effective = select(None, Some(exclude));
        for kind in HandlerKind::ALL {
            prop_assert_eq!(effective.contains(kind), !exclude.contains(kind));
        }
        prop_assert_eq!(effective.len() + exclude.len(), HandlerKind::ALL.len());
    }

    #[test]
    fn include_always_wins(include in handler_set(), exclude in handler_set()) {
        prop_assert_eq!(select(Some(include), Some(exclude)), include);
    }

    #[test]
    fn display_parses_back(set in handler_set()) {
        let text = set.to_string();
        let parsed: HandlerSet = text.parse().unwrap();
        prop_assert_eq!(parsed, set);
    }
}

#[test]
fn nothing_given_selects_all() {
    let effective = select(None, None);
    assert_eq!(effective, HandlerSet::ALL);
    assert_eq!(effective.iter().count(), HandlerKind::ALL.len());
}
