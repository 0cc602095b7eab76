//! Scene chunking for prompt generation
//!
//! Shots sharing a scene key are sent to the generation service together.
//! The scene key is the shot id without its last `-` segment; ids without a
//! `-` fall into the `default` chunk. Chunks keep first-seen key order and
//! shots keep their order inside a chunk.

use std::fmt;

use crate::types::Shot;

pub const DEFAULT_SCENE_KEY: &str = "default";

/// Grouping key of a shot. The unprefixed chunk is displayed as `default`
/// but never merges with shots whose real prefix is `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKey<'a> {
    Scene(&'a str),
    Unprefixed,
}

impl fmt::Display for SceneKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene(prefix) => f.write_str(prefix),
            Self::Unprefixed => f.write_str(DEFAULT_SCENE_KEY),
        }
    }
}

/// Scene key of a shot id: `1-1-01` -> `1-1`, `2-01` -> `2`, `07` -> `default`
pub fn scene_key(shot_id: &str) -> SceneKey<'_> {
    match shot_id.rfind('-') {
        Some(idx) => SceneKey::Scene(&shot_id[..idx]),
        None => SceneKey::Unprefixed,
    }
}

/// Shots of one scene, processed by a single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct SceneChunk<'a> {
    pub key: SceneKey<'a>,
    pub shots: Vec<&'a Shot>,
}

impl SceneChunk<'_> {
    /// Every shot already carries a generated prompt
    pub fn is_complete(&self) -> bool {
        self.shots.iter().all(|shot| shot.has_prompt())
    }

    pub fn shot_ids(&self) -> impl Iterator<Item = &str> {
        self.shots.iter().map(|shot| shot.id.as_str())
    }

    pub fn contains(&self, shot_id: &str) -> bool {
        self.shots.iter().any(|shot| shot.id == shot_id)
    }
}

/// Group shots into scene chunks in first-seen key order
pub fn scene_chunks(shots: &[Shot]) -> Vec<SceneChunk<'_>> {
    let mut chunks: Vec<SceneChunk<'_>> = Vec::new();

    for shot in shots {
        let key = scene_key(&shot.id);
        match chunks.iter_mut().find(|chunk| chunk.key == key) {
            Some(chunk) => chunk.shots.push(shot),
            None => chunks.push(SceneChunk {
                key,
                shots: vec![shot],
            }),
        }
    }

    chunks
}
