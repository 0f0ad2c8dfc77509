use thiserror::Error;

/// Opaque story snapshot produced by the client.
pub type SavedStory = serde_json::Value;

pub const MAX_SAVED_STORIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavedStoriesError {
    #[error("story index {index} is out of range ({len} saved stories)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Puts `story` at the front and drops the oldest entries beyond the cap.
pub fn insert_story(mut stories: Vec<SavedStory>, story: SavedStory) -> Vec<SavedStory> {
    stories.insert(0, story);
    stories.truncate(MAX_SAVED_STORIES);
    stories
}

pub fn delete_story(
    mut stories: Vec<SavedStory>,
    index: usize,
) -> Result<Vec<SavedStory>, SavedStoriesError> {
    if index >= stories.len() {
        return Err(SavedStoriesError::IndexOutOfRange {
            index,
            len: stories.len(),
        });
    }

    stories.remove(index);
    Ok(stories)
}
