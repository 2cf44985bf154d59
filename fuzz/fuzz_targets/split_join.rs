#![no_main]

use libfuzzer_sys::fuzz_target;
use bottlecache::{Chunker, Manifest};

fuzz_target!(|input: (u16, Vec<u8>)| {
    let (size, data) = input;
    let chunk_size = usize::from(size).max(1);
    let chunker = Chunker::new(chunk_size).unwrap();

    let chunks = chunker.split(data.clone());

    // Verify: count matches the ceiling, no empty chunk, all but the last full
    assert_eq!(chunks.len() as u64, chunker.chunk_count(data.len() as u64));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i as u64);
        assert!(!chunk.is_empty());
        if i + 1 < chunks.len() {
            assert_eq!(chunk.len(), chunk_size);
        }
    }

    // Verify: the streaming path agrees with the in-memory one
    let streamed: Vec<_> = chunker
        .chunk(std::io::Cursor::new(&data))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(streamed, chunks);

    // Verify: join restores the input
    assert_eq!(&Chunker::join(chunks)[..], &data[..]);

    // Manifests never panic on garbage
    let _ = Manifest::decode(&data);
});
