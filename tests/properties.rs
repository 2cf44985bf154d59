// Property tests for chunking, key rules and the store round-trip

use std::io::Cursor;

use bottlecache::{BlobError, BlobStore, CacheClient, Chunker, KeyValidator, MemoryCache, StoreConfig};
use proptest::prelude::*;

fn data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn split_then_join_is_identity(data in data_strategy(), chunk_size in 1usize..300) {
        let chunker = Chunker::new(chunk_size).unwrap();
        let chunks = chunker.split(data.clone());

        prop_assert_eq!(chunks.len() as u64, chunker.chunk_count(data.len() as u64));
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i as u64);
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.len() <= chunk_size);
        }
        prop_assert_eq!(&Chunker::join(chunks)[..], &data[..]);
    }

    #[test]
    fn reader_and_split_agree(data in data_strategy(), chunk_size in 1usize..300) {
        let chunker = Chunker::new(chunk_size).unwrap();
        let streamed: Vec<_> = chunker
            .chunk(Cursor::new(data.clone()))
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert_eq!(streamed, chunker.split(data));
    }

    #[test]
    fn chunk_count_is_ceiling(len in 0u64..1_000_000, chunk_size in 1usize..5000) {
        let chunker = Chunker::new(chunk_size).unwrap();
        let count = chunker.chunk_count(len);
        let size = chunk_size as u64;

        prop_assert!(count * size >= len);
        prop_assert!(count == 0 || (count - 1) * size < len);
    }

    #[test]
    fn validation_is_deterministic(key in "\\PC{0,260}") {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);

        let first = validator.validate(&key).is_ok();
        cache.set("unrelated", b"state").unwrap();
        prop_assert_eq!(first, validator.validate(&key).is_ok());
    }

    #[test]
    fn store_roundtrip(data in data_strategy(), key in "[a-zA-Z0-9_./-]{1,40}") {
        let store = BlobStore::new(MemoryCache::new(), StoreConfig::new(64, 4096).unwrap()).unwrap();

        prop_assert_eq!(store.put(&key, data.clone()).unwrap(), key.clone());
        prop_assert_eq!(&store.get(&key).unwrap()[..], &data[..]);
        prop_assert!(matches!(
            store.put(&key, data),
            Err(BlobError::KeyExists { .. })
        ), "second put of same key should return KeyExists");
    }
}
