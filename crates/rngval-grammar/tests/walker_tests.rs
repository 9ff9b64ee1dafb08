use rngval_grammar::name::{Name, NameTest};
use rngval_grammar::pattern::{self, ElementDef};
use rngval_grammar::walker::{Event, Grammar, Walker};

fn leaf(name: &str) -> std::rc::Rc<pattern::Pattern> {
    pattern::element(NameTest::Name(Name::local(name)), pattern::empty(), pattern::empty())
}

#[test]
fn accepts_exactly_the_modeled_document() {
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: leaf("b"),
        },
    );
    let mut w = grammar.new_walker();
    assert!(w.fire_event(&Event::EnterStartTag(Name::local("a"))).is_ok());
    assert!(w.fire_event(&Event::LeaveStartTag).is_ok());
    assert!(w.fire_event(&Event::EnterStartTag(Name::local("b"))).is_ok());
    assert!(w.fire_event(&Event::LeaveStartTag).is_ok());
    assert!(w.fire_event(&Event::EndTag(Name::local("b"))).is_ok());
    assert!(w.fire_event(&Event::EndTag(Name::local("a"))).is_ok());
    assert!(w.end().is_ok());
}

#[test]
fn rejects_wrong_child() {
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: leaf("b"),
        },
    );
    let mut w = grammar.new_walker();
    w.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
    w.fire_event(&Event::LeaveStartTag).unwrap();
    let err = w.fire_event(&Event::EnterStartTag(Name::local("c")));
    assert!(err.is_err());
}

#[test]
fn reports_missing_child_at_end_tag() {
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: leaf("b"),
        },
    );
    let mut w = grammar.new_walker();
    w.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
    w.fire_event(&Event::LeaveStartTag).unwrap();
    let err = w.fire_event(&Event::EndTag(Name::local("a")));
    assert!(err.is_err());
}

#[test]
fn interleaved_attributes_can_arrive_in_any_order() {
    let attrs = pattern::interleave(vec![
        pattern::attribute(NameTest::Name(Name::local("x")), pattern::text()),
        pattern::attribute(NameTest::Name(Name::local("y")), pattern::text()),
    ]);
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs,
            content: pattern::empty(),
        },
    );
    let mut w = grammar.new_walker();
    w.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
    w.fire_event(&Event::AttributeName(Name::local("y"))).unwrap();
    w.fire_event(&Event::AttributeValue("2".into())).unwrap();
    w.fire_event(&Event::AttributeName(Name::local("x"))).unwrap();
    w.fire_event(&Event::AttributeValue("1".into())).unwrap();
    assert!(w.fire_event(&Event::LeaveStartTag).is_ok());
}

#[test]
fn clone_is_independent_of_original() {
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: leaf("b"),
        },
    );
    let mut w = grammar.new_walker();
    w.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
    w.fire_event(&Event::LeaveStartTag).unwrap();
    let mut clone = w.clone();
    clone.fire_event(&Event::EnterStartTag(Name::local("b"))).unwrap();
    // The original walker is unaffected by the clone's progress.
    assert!(w.fire_event(&Event::EnterStartTag(Name::local("b"))).is_ok());
}

#[test]
fn possible_reports_enter_start_tag_and_end_tag() {
    let grammar = Grammar::new(
        NameTest::Name(Name::local("a")),
        ElementDef {
            attrs: pattern::empty(),
            content: pattern::optional(leaf("b")),
        },
    );
    let mut w = grammar.new_walker();
    w.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
    w.fire_event(&Event::LeaveStartTag).unwrap();
    let possible = w.possible();
    assert!(possible.iter().any(|p| matches!(p, rngval_grammar::PossibleEvent::EnterStartTag(_))));
    assert!(possible.iter().any(|p| matches!(p, rngval_grammar::PossibleEvent::EndTag)));
}
