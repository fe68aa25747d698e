// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use libfuzzer_sys::fuzz_target;
use structext_core::{publish_to_string, DocumentStore, OutputFormat, PublishConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let mut store = DocumentStore::new();
    let root = store.parse_text(source);
    for format in OutputFormat::ALL {
        let _ = publish_to_string(&mut store, root, format, &PublishConfig::default());
    }
});
