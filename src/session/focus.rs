// Audio focus - who gets to make noise right now
// The arbitration itself belongs to the host; we only ask, give back, and react

/// Raw focus-change signal as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gained,
    Lost,
    LostTransient,
    /// Treated exactly like a transient loss: full pause, no volume ducking.
    LostTransientCanDuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    Pause { abandon: bool },
    Resume,
    Ignore,
}

/// Maps focus signals to session actions and remembers whether the next
/// gain should resume playback.
#[derive(Debug, Default)]
pub struct FocusPolicy {
    resume_on_gain: bool,
}

impl FocusPolicy {
    pub fn on_change(&mut self, change: FocusChange, was_playing: bool) -> FocusAction {
        match change {
            FocusChange::Lost => {
                self.resume_on_gain = false;
                FocusAction::Pause { abandon: true }
            }
            FocusChange::LostTransient | FocusChange::LostTransientCanDuck => {
                self.resume_on_gain = was_playing;
                FocusAction::Pause { abandon: false }
            }
            FocusChange::Gained => {
                if std::mem::take(&mut self.resume_on_gain) {
                    FocusAction::Resume
                } else {
                    FocusAction::Ignore
                }
            }
        }
    }

    pub fn resume_on_gain(&self) -> bool {
        self.resume_on_gain
    }

    /// Forget a pending resume, e.g. after the user paused explicitly.
    pub fn clear(&mut self) {
        self.resume_on_gain = false;
    }
}

/// Outbound side: request and give back focus.
pub trait AudioFocus: Send {
    /// Returns whether focus was granted.
    fn request(&mut self) -> bool;

    fn abandon(&mut self);
}

/// Desktop default: nobody else competes for the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl AudioFocus for AlwaysGranted {
    fn request(&mut self) -> bool {
        true
    }

    fn abandon(&mut self) {}
}
