use super::Track;
use uuid::Uuid;

/// Linear view over the playlist with a movable "current" pointer.
///
/// `current` is either `None` or a valid index into `items`; every method
/// keeps it that way. Moving never wraps around either end.
#[derive(Debug, Clone, Default)]
pub struct PlaylistCursor {
    items: Vec<Track>,
    current: Option<usize>,
}

impl PlaylistCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list. The pointer follows the current track by id when it
    /// is still present, else falls back to the first track (or `None`).
    pub fn set_list(&mut self, tracks: Vec<Track>) {
        let current_id = self.current().map(|track| track.id());
        self.items = tracks;

        self.current = if self.items.is_empty() {
            None
        } else {
            current_id
                .and_then(|id| self.position_of(id))
                .or(Some(0))
        };
    }

    /// Point at the track with `id`. An unknown id leaves the pointer alone.
    pub fn set_current_by_id(&mut self, id: Uuid) -> bool {
        match self.position_of(id) {
            Some(idx) => {
                self.current = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|idx| self.items.get(idx))
    }

    pub fn index(&self) -> Option<usize> {
        self.current
    }

    pub fn has_next(&self) -> bool {
        matches!(self.current, Some(idx) if idx + 1 < self.items.len())
    }

    pub fn has_prev(&self) -> bool {
        matches!(self.current, Some(idx) if idx > 0)
    }

    pub fn next(&mut self) -> Option<&Track> {
        if !self.has_next() {
            return None;
        }
        self.current = self.current.map(|idx| idx + 1);
        self.current()
    }

    pub fn prev(&mut self) -> Option<&Track> {
        if !self.has_prev() {
            return None;
        }
        self.current = self.current.map(|idx| idx - 1);
        self.current()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position_of(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|track| track.id() == id)
    }
}
