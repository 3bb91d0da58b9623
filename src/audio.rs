use log::error;
use rodio::{Decoder, Sink};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What to play: a file from the clip catalog or fetched bytes (TTS)
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub source: PlaybackSource,
    pub volume: f32,
}

/// Handle to the playback worker. Sending is fire-and-forget: the caller only
/// learns whether the request was accepted, never waits for the clip.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: std::sync::mpsc::Sender<PlaybackRequest>,
    stop: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn play_file(&self, path: PathBuf, volume: f32) -> bool {
        self.tx
            .send(PlaybackRequest {
                source: PlaybackSource::File(path),
                volume,
            })
            .is_ok()
    }

    pub fn play_bytes(&self, bytes: Vec<u8>, volume: f32) -> bool {
        self.tx
            .send(PlaybackRequest {
                source: PlaybackSource::Memory(bytes),
                volume,
            })
            .is_ok()
    }

    /// Interrupt the clip currently playing, if any
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn test_pair() -> (Self, std::sync::mpsc::Receiver<PlaybackRequest>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = Self {
            tx,
            stop: Arc::new(AtomicBool::new(false)),
        };
        (handle, rx)
    }
}

/// Spawn the dedicated playback thread. The rodio `OutputStream` lives on
/// that thread for its whole life, so a long clip can never stall the async
/// runtime that services socket frames and commands.
pub fn spawn_playback_thread() -> PlaybackHandle {
    let (tx, rx) = std::sync::mpsc::channel::<PlaybackRequest>();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = stop.clone();

    std::thread::spawn(move || playback_task(rx, stop_for_thread));

    PlaybackHandle { tx, stop }
}

/// Plays one clip at a time to completion, polling the stop flag. Decode and
/// open failures are logged and swallowed; nothing escapes to the event loop.
fn playback_task(rx: std::sync::mpsc::Receiver<PlaybackRequest>, stop: Arc<AtomicBool>) {
    let stream = match rodio::OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to open audio output stream: {}", e);
            return;
        }
    };

    while let Ok(request) = rx.recv() {
        stop.store(false, Ordering::SeqCst);

        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(request.volume);

        match request.source {
            PlaybackSource::File(path) => match File::open(&path) {
                Ok(file) => match Decoder::new(BufReader::new(file)) {
                    Ok(source) => sink.append(source),
                    Err(e) => {
                        error!("Could not decode audio file {}: {}", path.display(), e);
                        continue;
                    }
                },
                Err(e) => {
                    error!("Could not open audio file {}: {}", path.display(), e);
                    continue;
                }
            },
            PlaybackSource::Memory(bytes) => {
                match Decoder::new(BufReader::new(Cursor::new(bytes))) {
                    Ok(source) => sink.append(source),
                    Err(e) => {
                        error!("Could not decode in-memory audio: {}", e);
                        continue;
                    }
                }
            }
        }

        while !sink.empty() {
            if stop.load(Ordering::SeqCst) {
                sink.stop();
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}
