//! Sample change files, prior versions and output parsing for CLI tests.

use std::fs;

use base64::{Engine as _, engine::general_purpose};
use camino::{Utf8Path, Utf8PathBuf};
use osmcoop_core::test_support::StubElementSource;
use osmcoop_core::{Element, Tag};
use serde_json::Value;
use tempfile::TempDir;

use crate::session::Session;

/// Retags node 100 (version 3): adds `name`, drops `cuisine`.
pub(super) const RETAGGED_CAFE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="JOSM">
  <node id="100" version="3" lat="51.5" lon="-0.1" action="modify">
    <tag k="amenity" v="cafe"/>
    <tag k="name" v="Bean There"/>
  </node>
</osm>"#;

/// Moves node 101 (version 1) away from the origin.
pub(super) const MOVED_NODE: &str = r#"<osm version="0.6" generator="JOSM">
  <node id="101" version="1" lat="1.0" lon="1.0" action="modify">
    <tag k="barrier" v="gate"/>
  </node>
</osm>"#;

/// A new footway over two new nodes plus an unrelated deletion.
pub(super) const FOOTWAY_AND_DELETION: &str = r#"<osm version="0.6" generator="JOSM">
  <node id="-1" lat="0.0" lon="0.0"/>
  <node id="-2" lat="1.0" lon="1.0"/>
  <way id="-3" action="modify">
    <nd ref="-1"/>
    <nd ref="-2"/>
    <tag k="highway" v="footway"/>
  </way>
  <node id="7" version="2" lat="5.0" lon="5.0" action="delete"/>
</osm>"#;

/// An OSMChange file with a create block and a delete block.
pub(super) const BENCH_AND_DELETION: &str = r#"<osmChange version="0.6">
  <create>
    <node id="-1" lat="2.0" lon="3.0"><tag k="amenity" v="bench"/></node>
  </create>
  <delete>
    <node id="8" version="4" lat="1.0" lon="1.0"/>
  </delete>
</osmChange>"#;

/// Source serving the prior versions referenced by the samples.
pub(super) fn prior_versions() -> StubElementSource {
    StubElementSource::new()
        .with_version(
            Element::node(100, 51.5, -0.1)
                .with_version(3)
                .with_tags(vec![Tag::new("amenity", "cafe"), Tag::new("cuisine", "coffee")]),
        )
        .with_version(
            Element::node(101, 0.0, 0.0)
                .with_version(1)
                .with_tags(vec![Tag::new("barrier", "gate")]),
        )
}

pub(super) fn stub_session() -> Session<StubElementSource> {
    Session::new(prior_versions()).expect("session builds")
}

/// Temporary directory holding input and output files.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `contents` to `name` inside the workspace.
    pub(super) fn file(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        write_utf8(&path, contents.as_bytes());
        path
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write fixture file");
}

/// Parse line-delimited records, stripping RFC 7464 separators.
pub(super) fn records(output: &[u8]) -> Vec<Value> {
    let text = std::str::from_utf8(output).expect("utf-8 output");
    text.lines()
        .map(|line| line.trim_start_matches('\u{1e}'))
        .map(|line| serde_json::from_str(line).expect("record is JSON"))
        .collect()
}

/// Decode the change file attached to a change-file record.
pub(super) fn attached_change(record: &Value) -> String {
    let content = record["cooperativeWork"]["file"]["content"]
        .as_str()
        .expect("base64 content");
    let bytes = general_purpose::STANDARD
        .decode(content)
        .expect("valid base64");
    String::from_utf8(bytes).expect("utf-8 change file")
}
