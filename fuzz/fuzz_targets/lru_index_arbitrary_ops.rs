#![no_main]

use counterkit::ds::LruIndex;
use libfuzzer_sys::fuzz_target;

// Fuzz arbitrary operation sequences on LruIndex
//
// Tests random sequences of insert, get, peek, remove, remove_if, pop_lru
// and drain against the capacity bound and index/list consistency.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = usize::from(data[0] % 16);
    let mut index: LruIndex<u8, u32> = LruIndex::new(capacity);

    let mut idx = 1;
    while idx + 1 < data.len() {
        let op = data[idx] % 8;
        let key = data[idx + 1] % 32;

        match op {
            0 | 1 => {
                // insert
                let existed = index.contains(&key);
                let displaced = index.insert(key, u32::from(key));
                if existed {
                    assert_eq!(displaced.map(|(k, _)| k), Some(key));
                } else if capacity == 0 {
                    assert_eq!(displaced, Some((key, u32::from(key))));
                }
                if capacity > 0 {
                    assert_eq!(index.recency_rank(&key), Some(0));
                }
            }
            2 => {
                // get promotes
                if index.get(&key).is_some() {
                    assert_eq!(index.recency_rank(&key), Some(0));
                }
            }
            3 => {
                // peek leaves order alone
                let before = index.recency_rank(&key);
                let _ = index.peek(&key);
                assert_eq!(index.recency_rank(&key), before);
            }
            4 => {
                // remove
                let existed = index.contains(&key);
                assert_eq!(index.remove(&key).is_some(), existed);
                assert!(!index.contains(&key));
            }
            5 => {
                // remove_if with a value-dependent predicate
                let removed = index.remove_if(&key, |value| value % 2 == 0);
                if removed.is_some() {
                    assert!(!index.contains(&key));
                }
            }
            6 => {
                // pop_lru
                let lru = index.peek_lru().map(|(k, _)| *k);
                assert_eq!(index.pop_lru().map(|(k, _)| k), lru);
            }
            7 => {
                // drain
                let len = index.len();
                assert_eq!(index.drain().len(), len);
                assert!(index.is_empty());
            }
            _ => unreachable!(),
        }

        assert!(index.len() <= capacity);
        assert!(index.check_invariants().is_ok());
        idx += 2;
    }
});
