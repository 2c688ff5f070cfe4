//! `LookupKey` packs a user key and a sequence number into a single
//! contiguous buffer that doubles as both a memtable search key and an
//! internal key. These tests exercise that packing from outside the crate,
//! across both the inline-stack and heap-spill storage paths.

use kvcore::dbformat::LookupKey;

#[test]
fn test_lookup_key_exposes_user_key_unchanged() {
    let key = LookupKey::new(b"hello", 42);
    assert_eq!(key.user_key(), b"hello");
}

#[test]
fn test_lookup_key_internal_key_is_memtable_key_minus_length_prefix() {
    let key = LookupKey::new(b"hello", 42);
    let memkey = key.memtable_key();
    let ikey = key.internal_key();
    // memtable_key is a varint32 length prefix followed by internal_key.
    assert!(memkey.len() > ikey.len());
    assert_eq!(&memkey[memkey.len() - ikey.len()..], ikey);
}

#[test]
fn test_lookup_key_internal_key_is_user_key_plus_eight_byte_tag() {
    let key = LookupKey::new(b"hello", 42);
    assert_eq!(key.internal_key().len(), key.user_key().len() + 8);
    assert!(key.internal_key().starts_with(b"hello"));
}

#[test]
fn test_lookup_key_handles_empty_user_key() {
    let key = LookupKey::new(b"", 7);
    assert_eq!(key.user_key(), b"");
    assert_eq!(key.internal_key().len(), 8);
}

#[test]
fn test_lookup_key_spills_to_heap_for_long_user_keys() {
    // LOOKUP_KEY_STACK_SPACE is 200 bytes; ksize + 13 > 200 forces the heap path.
    let long_key = vec![b'k'; 250];
    let key = LookupKey::new(&long_key, 1);
    assert_eq!(key.user_key(), long_key.as_slice());
    assert_eq!(key.internal_key().len(), long_key.len() + 8);
}

#[test]
fn test_lookup_key_distinct_sequences_produce_distinct_internal_keys() {
    let a = LookupKey::new(b"same-user-key", 1);
    let b = LookupKey::new(b"same-user-key", 2);
    assert_eq!(a.user_key(), b.user_key());
    assert_ne!(a.internal_key(), b.internal_key());
}
