//! End-to-end scenarios against the reference grammar engine and tree model,
//! one test per literal input in the design document plus the stated
//! cross-cutting invariants (reset-equivalence, speculative non-mutation,
//! monotonic progress, the `possible_at` superset property).

use std::time::Duration;

use rngval_core::events::{EventName, EventPayload, ListenerAction};
use rngval_core::progress::WorkingState;
use rngval_core::validator::{Validator, ValidatorOptions};
use rngval_grammar::name::{Name, NameTest};
use rngval_grammar::pattern::{self, ElementDef};
use rngval_grammar::walker::{DerivativeWalker, Grammar, PossibleEvent};
use rngval_tree::{Document, QName};

/// `a -> b`, i.e. `<a>` accepts exactly one `<b/>` child.
fn grammar_a_accepts_single_b() -> Grammar {
    let b = pattern::element(NameTest::Name(Name::local("b")), pattern::empty(), pattern::empty());
    Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: b,
        },
    )
}

fn doc_a_with_child(child_local: Option<&str>) -> (Document, rngval_tree::NodeId) {
    let mut doc = Document::new();
    let a = doc.create_element(QName::local("a"));
    doc.append_child(doc.document_node(), a);
    if let Some(local) = child_local {
        let child = doc.create_element(QName::local(local));
        doc.append_child(a, child);
    }
    (doc, a)
}

// Scenario 1: `<a><b/></a>` against a grammar that accepts it -> Valid, no
// errors, part_done 1.0.
#[test]
fn scenario_1_well_formed_document_is_valid() {
    let (doc, _a) = doc_a_with_child(Some("b"));
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();

    let progress = v.working_state();
    assert_eq!(progress.state, WorkingState::Valid);
    assert_eq!(progress.part_done, 1.0);
    assert!(v.errors().is_empty());
}

// Scenario 2: `<a><c/></a>` -> Invalid, exactly one error owned by `<a>`,
// with index 0 (the first and only content position).
#[test]
fn scenario_2_out_of_place_child_is_invalid() {
    let (doc, a) = doc_a_with_child(Some("c"));
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();

    assert_eq!(v.working_state().state, WorkingState::Invalid);
    assert_eq!(v.errors().len(), 1);
    let owned = v.errors_for(a);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].index, Some(0));
}

// Scenario 3: `<a></a>` against the same grammar -> missing `<b>`, owner
// `<a>`, terminal Invalid.
#[test]
fn scenario_3_missing_required_child_is_invalid() {
    let (doc, a) = doc_a_with_child(None);
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();

    assert_eq!(v.working_state().state, WorkingState::Invalid);
    assert_eq!(v.errors_for(a).len(), 1);
}

// Scenario 4: valid `<a><b/></a>` runs to `Valid`; the host then appends
// `<c/>` under `<a>` and calls `reset_to(<c/>)`. Re-running reports exactly
// one error owned by `<a>`, and a `reset-errors` event fired with `at` equal
// to the event index recorded at the original `<a>` end tag.
#[test]
fn scenario_4_reset_to_after_a_mutation_revalidates_only_the_tail() {
    let (mut doc, a) = doc_a_with_child(Some("b"));
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();
    assert_eq!(v.working_state().state, WorkingState::Valid);

    let reset_ats = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let captured = std::rc::Rc::clone(&reset_ats);
    v.on(EventName::ResetErrors, move |payload| {
        if let EventPayload::ResetErrors { at } = payload {
            captured.borrow_mut().push(*at);
        }
        ListenerAction::Continue
    });

    let c = doc.create_element(QName::local("c"));
    doc.append_child(a, c);
    v.reset_to(&doc, c);
    assert!(v.errors().is_empty(), "reset clears downstream errors immediately");

    v.cycle(&doc, Duration::from_secs(1)).unwrap();
    assert_eq!(v.working_state().state, WorkingState::Invalid);
    assert_eq!(v.errors_for(a).len(), 1);
    // `at` is the first stale index: `<a>`'s own previously recorded end-tag
    // close (event 6: enter-a=1, leave-a-start-tag=2, enter-b=3,
    // leave-b-start-tag=4, end-b=5, end-a=6) — not `<b>`'s close (5), which
    // is merely the internal walker-resume threshold.
    assert_eq!(*reset_ats.borrow(), vec![rngval_core::index::EventIndex(6)]);
}

// Scenario 5: `possible_where(<a>, "enterStartTag", ["", "b"])` where the
// grammar allows `<b>` only as `<a>`'s first (and only) child returns `[0]`;
// the same query for `"c"`, which the grammar never accepts, returns `[]`.
#[test]
fn scenario_5_possible_where_reports_the_only_viable_position() {
    let (doc, a) = doc_a_with_child(None);
    let v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());

    let positions = v
        .possible_where(&doc, a, "enterStartTag", &["".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(positions, vec![0]);

    let positions = v
        .possible_where(&doc, a, "enterStartTag", &["".to_string(), "c".to_string()])
        .unwrap();
    assert!(positions.is_empty());
}

// Scenario 6: speculatively validating `<b/>` under `<a>` reports no errors;
// `<c/>` reports exactly one; neither call perturbs the real error list or
// fires observer events.
#[test]
fn scenario_6_speculative_validation_does_not_mutate_or_emit() {
    let (doc, a) = doc_a_with_child(None);
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());

    let emitted = std::rc::Rc::new(std::cell::Cell::new(0usize));
    let counter = std::rc::Rc::clone(&emitted);
    v.on(EventName::Error, move |_| {
        counter.set(counter.get() + 1);
        ListenerAction::Continue
    });

    let good = rngval_tree::safe_parse("<b/>").unwrap();
    let errors = v.speculatively_validate(&doc, a, &good).unwrap();
    assert!(errors.is_empty());

    let bad = rngval_tree::safe_parse("<c/>").unwrap();
    let errors = v.speculatively_validate(&doc, a, &bad).unwrap();
    assert_eq!(errors.len(), 1);

    assert!(v.errors().is_empty(), "speculative calls never touch the real error list");
    assert_eq!(emitted.get(), 0, "speculative calls never emit observer events");
}

// Invariant: reset_to(root) followed by full validation equals full
// validation from a freshly constructed validator.
#[test]
fn reset_to_root_then_revalidate_matches_a_fresh_run() {
    let (doc, root) = doc_a_with_child(Some("b"));

    let mut fresh: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    fresh.start();
    fresh.cycle(&doc, Duration::from_secs(1)).unwrap();

    let mut reused: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());
    reused.start();
    reused.cycle(&doc, Duration::from_secs(1)).unwrap();
    reused.reset_to(&doc, root);
    reused.cycle(&doc, Duration::from_secs(1)).unwrap();

    assert_eq!(fresh.working_state().state, reused.working_state().state);
    assert_eq!(fresh.errors().len(), reused.errors().len());
}

// Invariant: part_done is monotonically non-decreasing across successive
// cycles and reaches exactly 1.0 at the terminal state.
#[test]
fn part_done_is_monotonic_and_reaches_one() {
    let mut doc = Document::new();
    let root = doc.create_element(QName::local("a"));
    doc.append_child(doc.document_node(), root);
    for _ in 0..5 {
        let b = doc.create_element(QName::local("b"));
        doc.append_child(root, b);
    }
    // grammar accepts zero-or-more <b/> under <a>, so every step succeeds.
    let b = pattern::element(NameTest::Name(Name::local("b")), pattern::empty(), pattern::empty());
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: pattern::zero_or_more(b),
        },
    );

    let mut v: Validator<DerivativeWalker> = Validator::new(
        &doc,
        grammar,
        ValidatorOptions {
            max_timespan: 1,
            ..ValidatorOptions::default()
        },
    );
    v.start();

    let mut last = 0.0;
    loop {
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        let part_done = v.working_state().part_done;
        assert!(part_done >= last);
        last = part_done;
        if v.working_state().state.is_terminal() {
            break;
        }
    }
    assert_eq!(last, 1.0);
}

// Invariant: `possible_at` is a superset of what `speculatively_validate`
// empirically accepts — every name that validates cleanly as a lone child
// also shows up in `possible_at`'s `EnterStartTag` set.
#[test]
fn possible_at_is_a_superset_of_empirically_valid_children() {
    let (doc, a) = doc_a_with_child(None);
    let v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());

    let possible = v.possible_at(&doc, a).unwrap();
    let fragment = rngval_tree::safe_parse("<b/>").unwrap();
    let errors = v.speculatively_validate(&doc, a, &fragment).unwrap();
    assert!(errors.is_empty());
    assert!(possible
        .iter()
        .any(|p| matches!(p, PossibleEvent::EnterStartTag(t) if t.matches(&Name::local("b")))));
}

// §4.7: a child admitted only through an `anyName` alternative is annotated
// `possible-due-to-wildcard = true` and fires exactly one
// `possible-due-to-wildcard-change` event; a child admitted by an exact-name
// alternative never gets the annotation or the event, even in a grammar that
// also allows `anyName` elsewhere.
#[test]
fn scenario_7_wildcard_only_admission_is_tracked_and_reported() {
    let wildcard_child = pattern::element(NameTest::AnyName, pattern::empty(), pattern::empty());
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: wildcard_child,
        },
    );

    let mut doc = Document::new();
    let a = doc.create_element(QName::local("a"));
    doc.append_child(doc.document_node(), a);
    let anything = doc.create_element(QName::local("whatever"));
    doc.append_child(a, anything);

    let mut v: Validator<DerivativeWalker> = Validator::new(&doc, grammar, ValidatorOptions::default());
    let changed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let captured = std::rc::Rc::clone(&changed);
    v.on(EventName::PossibleDueToWildcardChange, move |payload| {
        if let EventPayload::PossibleDueToWildcardChange { node } = payload {
            captured.borrow_mut().push(*node);
        }
        ListenerAction::Continue
    });

    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();

    assert_eq!(v.working_state().state, WorkingState::Valid);
    assert_eq!(
        v.node_property(anything, "possible-due-to-wildcard"),
        Some(rngval_core::annotations::PropertyValue::Bool(true))
    );
    assert_eq!(*changed.borrow(), vec![anything]);
}

// Invariant: a listener that removes itself mid-dispatch is not called
// again; a listener added during dispatch does not see the event that
// triggered its own registration.
#[test]
fn observer_re_entrance_rules_hold() {
    let (doc, a) = doc_a_with_child(Some("c"));
    let mut v: Validator<DerivativeWalker> =
        Validator::new(&doc, grammar_a_accepts_single_b(), ValidatorOptions::default());

    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let s1 = std::rc::Rc::clone(&seen);
    v.on(EventName::Error, move |_| {
        s1.borrow_mut().push("first");
        ListenerAction::Stop
    });
    let s2 = std::rc::Rc::clone(&seen);
    v.on(EventName::Error, move |_| {
        s2.borrow_mut().push("second");
        ListenerAction::Continue
    });

    v.start();
    v.cycle(&doc, Duration::from_secs(1)).unwrap();

    // only the first listener ran for this dispatch: `Stop` halted it before
    // the second listener was reached, and the first listener was removed.
    assert_eq!(*seen.borrow(), vec!["first"]);
    let _ = a;
}
