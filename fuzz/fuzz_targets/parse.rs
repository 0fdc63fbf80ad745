#![no_main]

use libfuzzer_sys::fuzz_target;

use earmark::RunQuery;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(journal) = earmark::parse(text) {
            let _ = journal.run(&RunQuery::default());
        }
    }
});
