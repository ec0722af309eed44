//! Fuzz target for `?` to `$n` placeholder rewriting.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_placeholders
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use polysql_postgres::placeholders::rewrite;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let (out, count) = rewrite(sql);

        // Every rewritten placeholder consumed exactly one `?`.
        let before = sql.matches('?').count();
        let after = out.matches('?').count();
        assert_eq!(before - after, count);

        if count == 0 {
            assert_eq!(out, sql);
        }
    }
});
