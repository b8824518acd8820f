//! Storage keys for uploaded audio.

use rand::RngCore;
use std::fmt;

/// Random bytes in every key. 128 bits makes collisions negligible without
/// checking the store first.
const KEY_ENTROPY_BYTES: usize = 16;

/// Key under which an audio payload is stored: 32 lowercase hex characters,
/// a dot, and the original file's extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Generate a fresh key for a file called `original_filename`.
    pub fn generate(original_filename: &str) -> Self {
        let mut entropy = [0u8; KEY_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut entropy);
        Self(format!("{}.{}", hex::encode(entropy), extension(original_filename)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything after the last `.`; a name without a dot is its own extension.
fn extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[idx + 1..],
        None => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn random_part(key: &BlobKey) -> &str {
        &key.as_str()[..32]
    }

    #[test]
    fn test_key_shape() {
        let key = BlobKey::generate("clip.wav");
        let (random, ext) = key.as_str().split_once('.').unwrap();

        assert_eq!(random.len(), 32);
        assert!(random.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        assert_eq!(ext, "wav");
    }

    #[test]
    fn test_extension_uses_last_dot() {
        assert_eq!(extension("voice.note.m4a"), "m4a");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension(".ogg"), "ogg");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn test_filename_without_dot_becomes_the_extension() {
        let key = BlobKey::generate("recording");
        assert!(key.as_str().ends_with(".recording"));
        assert_eq!(key.as_str().len(), 32 + 1 + "recording".len());
    }

    #[test]
    fn test_keys_do_not_repeat() {
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            let key = BlobKey::generate("clip.wav");
            assert!(seen.insert(random_part(&key).to_string()), "duplicate key {key}");
        }
    }
}
