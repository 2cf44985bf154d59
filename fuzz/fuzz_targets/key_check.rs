#![no_main]

use libfuzzer_sys::fuzz_target;
use bottlecache::{MAX_KEY_LENGTH, check_key};

fuzz_target!(|key: &str| {
    let verdict = check_key(key);

    // Verify: deterministic
    assert_eq!(verdict, check_key(key));

    // Verify: accepted keys obey the memcached key rule
    if verdict.is_ok() {
        assert!(!key.is_empty());
        assert!(key.len() <= MAX_KEY_LENGTH);
        assert!(!key.chars().any(|c| c.is_whitespace() || c.is_control()));
    }
});
