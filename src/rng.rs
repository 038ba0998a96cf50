use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Named ChaCha streams over one world seed. Every stream shares the seed
/// and differs only in its ChaCha stream id, which is derived from the name,
/// so asking for streams in a different order yields the same sequences.
#[derive(Debug, Clone)]
pub struct RngManager {
    seed: u64,
    streams: BTreeMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: BTreeMap::new(),
        }
    }

    /// Generator for `name`, resuming where the previous borrow left off.
    pub fn stream(&mut self, name: &str) -> &mut ChaCha8Rng {
        let seed = self.seed;
        self.streams.entry(name.to_string()).or_insert_with(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(stream_id(name));
            rng
        })
    }
}

/// FNV-1a over the stream name.
fn stream_id(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
