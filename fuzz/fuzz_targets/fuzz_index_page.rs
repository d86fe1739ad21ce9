#![no_main]

use libfuzzer_sys::fuzz_target;
use shpidx::index::node::Node;
use shpidx::index::{IndexHeader, RecordKind};

fuzz_target!(|data: &[u8]| {
    let _ = IndexHeader::decode(data);
    let _ = Node::decode(data, RecordKind::Point);
    let _ = Node::decode(data, RecordKind::Rectangle);
});
