//! Behavioural tests for tag diffs.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

use osmcoop_core::{Change, Element, Operation, Tag, TagOperation, tag_operations};

fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
    pairs
        .iter()
        .map(|(key, value)| Tag::new(*key, *value))
        .collect()
}

#[fixture]
fn prior() -> RefCell<Element> {
    RefCell::new(Element::node(42, 0.0, 0.0).with_version(1))
}

#[fixture]
fn operations() -> RefCell<Vec<TagOperation>> {
    RefCell::new(Vec::new())
}

#[given("a prior node tagged a=1 and b=2")]
fn given_prior(#[from(prior)] prior: &RefCell<Element>) {
    prior.borrow_mut().tags = tags(&[("a", "1"), ("b", "2")]);
}

fn diff_with(prior: &RefCell<Element>, operations: &RefCell<Vec<TagOperation>>, edited: Vec<Tag>) {
    let before = prior.borrow();
    let change = Change::new(before.clone().with_tags(edited), Operation::Modify);
    *operations.borrow_mut() = tag_operations(Some(&before), &change);
}

#[when("the edited node is tagged a=1 and c=3")]
fn when_edited(
    #[from(prior)] prior: &RefCell<Element>,
    #[from(operations)] operations: &RefCell<Vec<TagOperation>>,
) {
    diff_with(prior, operations, tags(&[("a", "1"), ("c", "3")]));
}

#[when("the edited node keeps the same tags")]
fn when_unchanged(
    #[from(prior)] prior: &RefCell<Element>,
    #[from(operations)] operations: &RefCell<Vec<TagOperation>>,
) {
    let same = prior.borrow().tags.clone();
    diff_with(prior, operations, same);
}

#[then("the operations set c=3 and unset b")]
fn then_set_and_unset(#[from(operations)] operations: &RefCell<Vec<TagOperation>>) {
    assert_eq!(
        *operations.borrow(),
        vec![
            TagOperation::SetTags(tags(&[("c", "3")])),
            TagOperation::UnsetTags(vec!["b".to_owned()]),
        ]
    );
}

#[then("no operations are produced")]
fn then_none(#[from(operations)] operations: &RefCell<Vec<TagOperation>>) {
    assert!(operations.borrow().is_empty());
}

#[scenario(path = "tests/features/tag_diff.feature", index = 0)]
fn changed_tags(prior: RefCell<Element>, operations: RefCell<Vec<TagOperation>>) {
    let _ = (prior, operations);
}

#[scenario(path = "tests/features/tag_diff.feature", index = 1)]
fn unchanged_tags(prior: RefCell<Element>, operations: RefCell<Vec<TagOperation>>) {
    let _ = (prior, operations);
}
