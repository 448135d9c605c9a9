//! Single-channel acoustic echo cancellation for TTS playback loops.
//!
//! A voice interface that plays synthesized speech through a loudspeaker
//! while capturing the user's voice picks up an acoustically coupled copy of
//! its own playback. [`EchoSession`] removes that echo: feed the playback
//! signal through [`EchoSession::analyze_render`] shortly before it is
//! played, then run each captured block through
//! [`EchoSession::process_capture`].
//!
//! Fixed format: 48 kHz, mono, f32 samples in nominal [-1, +1], processed in
//! 480-sample (10 ms) blocks.
//!
//! ```
//! use tts_aec::{EchoSession, SessionConfig, BLOCK_SIZE};
//!
//! let mut session = EchoSession::new(SessionConfig::default())?;
//! session.set_stream_delay_ms(120);
//!
//! let playback = [0.0f32; BLOCK_SIZE];
//! let mic = [0.0f32; BLOCK_SIZE];
//! let mut clean = [0.0f32; BLOCK_SIZE];
//!
//! session.analyze_render(&playback)?;
//! session.process_capture(&mic, &mut clean, false)?;
//! # Ok::<(), tts_aec::Error>(())
//! ```

#![deny(unsafe_code)]

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{is_valid_block_len, is_valid_sample_rate, EchoSession, Error};
pub use stats::SessionStats;
pub use tts_aec_core::{BLOCK_SIZE, SAMPLE_RATE_HZ};
