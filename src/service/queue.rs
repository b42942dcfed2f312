//! FIFO of synthesized speech segments awaiting playback or merging.

use std::collections::VecDeque;
use std::path::PathBuf;

use super::task::TaskId;
use crate::audio::AudioFormat;

/// One `SpeechEncoded` result.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    pub text: String,
    /// Empty when the segment carries no audio (end-of-synthesis marker).
    pub audio_path: PathBuf,
    pub format: AudioFormat,
    pub progress: f64,
    pub last: bool,
    pub task: TaskId,
    /// `audio_path` is a temporary file owned by the queue.
    pub remove_audio_file: bool,
}

impl PartialResult {
    pub fn has_audio(&self) -> bool {
        !self.audio_path.as_os_str().is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ResultQueue {
    items: VecDeque<PartialResult>,
}

impl ResultQueue {
    pub fn push(&mut self, item: PartialResult) {
        log::debug!(
            "queue: push task={} last={} audio={}",
            item.task,
            item.last,
            item.audio_path.display()
        );
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<PartialResult> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every entry, deleting temporary audio files.
    pub fn clear(&mut self) {
        for item in self.items.drain(..) {
            discard(&item);
        }
    }
}

/// Delete the entry's audio file if the queue owns it.
pub fn discard(item: &PartialResult) {
    if item.remove_audio_file && item.has_audio() {
        if let Err(e) = std::fs::remove_file(&item.audio_path) {
            log::warn!("queue: cannot remove {}: {e}", item.audio_path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(text: &str, last: bool) -> PartialResult {
        PartialResult {
            text: text.into(),
            audio_path: PathBuf::from(format!("/cache/{text}.wav")),
            format: AudioFormat::Wav,
            progress: 0.0,
            last,
            task: 1,
            remove_audio_file: false,
        }
    }

    #[test]
    fn delivers_in_push_order() {
        let mut q = ResultQueue::default();
        q.push(item("a", false));
        q.push(item("b", false));
        q.push(item("c", true));

        let order: Vec<String> = std::iter::from_fn(|| q.pop()).map(|r| r.text).collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn clear_removes_owned_files_only() {
        let dir = tempdir().unwrap();
        let owned = dir.path().join("owned.wav");
        let kept = dir.path().join("kept.wav");
        std::fs::write(&owned, b"x").unwrap();
        std::fs::write(&kept, b"x").unwrap();

        let mut q = ResultQueue::default();
        q.push(PartialResult {
            audio_path: owned.clone(),
            remove_audio_file: true,
            ..item("a", false)
        });
        q.push(PartialResult {
            audio_path: kept.clone(),
            ..item("b", true)
        });
        assert_eq!(q.len(), 2);
        q.clear();

        assert!(q.is_empty());
        assert!(!owned.exists());
        assert!(kept.exists());
    }

    #[test]
    fn marker_has_no_audio() {
        let marker = PartialResult {
            audio_path: PathBuf::new(),
            ..item("", true)
        };
        assert!(!marker.has_audio());
    }
}
