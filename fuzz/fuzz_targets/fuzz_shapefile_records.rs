#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header parsing and record iteration must reject, never panic
    let _ = shpidx::shapefile::parse_header(data);
    if let Ok(records) = shpidx::shapefile::records(data) {
        for record in records {
            if record.is_err() {
                break;
            }
        }
    }
});
