//! Behavioural tests for splitting change files.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

use osmcoop_core::xml::parse_document;
use osmcoop_core::{DocumentError, explode};

const JOSM_FILE: &str = r#"<osm version="0.6" generator="JOSM">
  <node id="-1" lat="0" lon="0"/>
  <node id="-2" lat="1" lon="1"/>
  <node id="4" version="2" lat="2" lon="2" action="delete"/>
  <way id="-3"><nd ref="-1"/><nd ref="-2"/><tag k="highway" v="footway"/></way>
</osm>"#;

const OSC_FILE: &str = r#"<osmChange version="0.6">
  <create><node id="-1" lat="0" lon="0"/></create>
  <delete><node id="4" version="2"/></delete>
</osmChange>"#;

#[fixture]
fn source() -> RefCell<String> {
    RefCell::new(String::new())
}

#[fixture]
fn documents() -> RefCell<Result<Vec<String>, DocumentError>> {
    RefCell::new(Ok(Vec::new()))
}

#[given("a JOSM file with a new way over two new nodes and a deleted node")]
fn given_josm(#[from(source)] source: &RefCell<String>) {
    *source.borrow_mut() = JOSM_FILE.to_owned();
}

#[given("an OSMChange file with a create block and a delete block")]
fn given_osc(#[from(source)] source: &RefCell<String>) {
    *source.borrow_mut() = OSC_FILE.to_owned();
}

#[when("the file is exploded at the top level")]
fn when_top_level(
    #[from(source)] source: &RefCell<String>,
    #[from(documents)] documents: &RefCell<Result<Vec<String>, DocumentError>>,
) {
    *documents.borrow_mut() = explode(&source.borrow(), true);
}

#[when("the file is exploded for every edit")]
fn when_every_edit(
    #[from(source)] source: &RefCell<String>,
    #[from(documents)] documents: &RefCell<Result<Vec<String>, DocumentError>>,
) {
    *documents.borrow_mut() = explode(&source.borrow(), false);
}

#[then("{count} documents are produced")]
fn then_count(
    count: usize,
    #[from(documents)] documents: &RefCell<Result<Vec<String>, DocumentError>>,
) {
    let borrow = documents.borrow();
    let parts = borrow.as_ref().expect("explode succeeds");
    assert_eq!(parts.len(), count);
}

#[then("the last document lists node/-1, node/-2, way/-3")]
fn then_last_lists(#[from(documents)] documents: &RefCell<Result<Vec<String>, DocumentError>>) {
    let borrow = documents.borrow();
    let parts = borrow.as_ref().expect("explode succeeds");
    let last = parts.last().expect("at least one document");
    let root = parse_document(last).expect("document parses");
    let listed: Vec<String> = root
        .children
        .iter()
        .map(|child| format!("{}/{}", child.name, child.attribute("id").unwrap_or("?")))
        .collect();
    assert_eq!(listed, vec!["node/-1", "node/-2", "way/-3"]);
}

#[scenario(path = "tests/features/explode.feature", index = 0)]
fn top_level_explode(source: RefCell<String>, documents: RefCell<Result<Vec<String>, DocumentError>>) {
    let _ = (source, documents);
}

#[scenario(path = "tests/features/explode.feature", index = 1)]
fn every_edit_explode(
    source: RefCell<String>,
    documents: RefCell<Result<Vec<String>, DocumentError>>,
) {
    let _ = (source, documents);
}

#[scenario(path = "tests/features/explode.feature", index = 2)]
fn osc_block_explode(source: RefCell<String>, documents: RefCell<Result<Vec<String>, DocumentError>>) {
    let _ = (source, documents);
}
