//! Parsed book content model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{decode_blob, encode_blob};
use crate::Result;

/// Parsed book content as kept in the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContent {
    /// Chapter HTML in reading order
    pub chapters: Vec<String>,
    /// Image bytes keyed by their path inside the book
    #[serde(default)]
    pub image_blobs: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub chapter_filenames: Vec<String>,
}

/// Transport form of [`ParsedContent`] with base64 image blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    pub chapters: Vec<String>,
    #[serde(default)]
    pub image_blobs: BTreeMap<String, String>,
    #[serde(default)]
    pub chapter_filenames: Vec<String>,
}

impl ParsedContent {
    /// Encode image blobs for transport.
    pub fn to_payload(&self) -> ContentPayload {
        ContentPayload {
            chapters: self.chapters.clone(),
            image_blobs: self
                .image_blobs
                .iter()
                .map(|(path, bytes)| (path.clone(), encode_blob(bytes)))
                .collect(),
            chapter_filenames: self.chapter_filenames.clone(),
        }
    }

    /// Total size of all image blobs in bytes.
    pub fn image_bytes(&self) -> usize {
        self.image_blobs.values().map(Vec::len).sum()
    }
}

impl ContentPayload {
    /// Decode image blobs back into bytes.
    pub fn to_parsed(&self) -> Result<ParsedContent> {
        let image_blobs = self
            .image_blobs
            .iter()
            .map(|(path, text)| Ok((path.clone(), decode_blob(text)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(ParsedContent {
            chapters: self.chapters.clone(),
            image_blobs,
            chapter_filenames: self.chapter_filenames.clone(),
        })
    }
}
