use super::stream::{run_blocking, MediaBackend, MediaStream, PlayerError};
use rodio::{Decoder, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Opens local files on the default output device.
///
/// The `OutputStream` itself is not `Send`, so whoever creates the backend
/// keeps it alive on their own thread and only hands the handle over.
pub struct RodioBackend {
    stream_handle: OutputStreamHandle,
    volume: f32,
}

impl RodioBackend {
    pub fn new(stream_handle: OutputStreamHandle, volume: f32) -> Self {
        Self {
            stream_handle,
            volume: volume.clamp(0.0, 1.0),
        }
    }
}

pub struct RodioStream {
    // shared with in-flight seeks
    sink: Arc<Sink>,
    path: PathBuf,
    locator: String,
    duration: Option<Duration>,
}

fn decode(path: &Path, locator: &str) -> Result<Decoder<BufReader<File>>, PlayerError> {
    let file = File::open(path).map_err(|source| PlayerError::Open {
        locator: locator.to_string(),
        source,
    })?;

    Decoder::new(BufReader::new(file)).map_err(|e| PlayerError::Decode {
        locator: locator.to_string(),
        reason: e.to_string(),
    })
}

impl MediaBackend for RodioBackend {
    type Stream = RodioStream;

    fn open(&self, locator: &str) -> Result<RodioStream, PlayerError> {
        let path = PathBuf::from(locator);
        let source = decode(&path, locator)?;
        // mp3 often has no header duration; 0 then means "unknown"
        let duration = source.total_duration();

        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| PlayerError::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);

        Ok(RodioStream {
            sink: Arc::new(sink),
            path,
            locator: locator.to_string(),
            duration,
        })
    }
}

impl RodioStream {
    // Once the sink has drained its source is gone; decode the file again so
    // the same stream can be rewound and replayed.
    fn requeue(&mut self) -> Result<(), PlayerError> {
        let source = decode(&self.path, &self.locator)?;
        self.sink.append(source);
        Ok(())
    }
}

impl MediaStream for RodioStream {
    fn duration_ms(&self) -> u64 {
        self.duration.map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    fn position_ms(&self) -> u64 {
        self.sink.get_pos().as_millis() as u64
    }

    fn play(&mut self) {
        if self.sink.empty() {
            if let Err(e) = self.requeue() {
                warn!(error = %e, "could not restart finished stream");
                return;
            }
        }
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position_ms: u64) {
        if self.sink.empty() {
            if let Err(e) = self.requeue() {
                warn!(error = %e, "could not rewind finished stream");
                return;
            }
        }
        // try_seek waits for the audio thread to pick the order up, so it
        // must not run on the control task. A later seek replaces an earlier
        // one that has not been applied yet.
        let sink = Arc::clone(&self.sink);
        let locator = self.locator.clone();
        run_blocking(move || {
            if let Err(e) = sink.try_seek(Duration::from_millis(position_ms)) {
                warn!(%locator, error = %e, "seek failed");
            }
        });
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

impl Drop for RodioStream {
    fn drop(&mut self) {
        self.sink.stop();
    }
}
