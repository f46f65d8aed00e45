//! Control loop of a voice-assistant appliance.
//!
//! A single state machine sequences wake detection, microphone capture,
//! speech recognition, a remote question-answering query and spoken replies.
//! Every backend sits behind a trait in [`Context`], so the loop itself only
//! deals with transitions and recovery.

// Re-export from sub-crates
pub use hark_audio::{AudioError, AudioSource, Microphone, Recording};
pub use hark_core::{APP_NAME, CancelToken, Config, ConfigManager, DEFAULT_LOG_LEVEL};
pub use hark_speech::{Recognizer, Speaker, SttError, TtsError};

pub mod context;
#[cfg(feature = "rpi")]
pub mod gpio;
pub mod lifecycle;
pub mod query;
pub mod renderer;
pub mod signal;
pub mod state;
pub mod wake;

pub use context::{Context, ContextBuilder};
pub use lifecycle::ShutdownSignal;
pub use query::{Entity, Feed, Location, QueryClient, QueryError, Reply, SusiClient, Table};
pub use renderer::{Renderer, RendererEvent, TracingRenderer};
pub use signal::{LogSignals, Signal, SignalSink, signals_from_config};
pub use state::{
    ErrorKind, FALLBACK_ANSWER, MAX_TABLE_ROWS, MachineError, Payload, StateKind, StateMachine,
    Step, Transition, error_message, spoken_lines,
};
pub use wake::{
    Wake, WakeChannel, WakeDetector, WakeError, WakeListener, WakeMessage, WakeTrigger,
    spawn_keyboard_listener, start_listener, wake_channel,
};

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
