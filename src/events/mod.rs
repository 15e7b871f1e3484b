//! # Events Module
//!
//! Progress events emitted by the engine while a comparison runs.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Comparison(ComparisonEvent::PhaseChanged { phase }) = event {
//!             println!("{}", phase);
//!         }
//!     }
//! });
//!
//! engine.compare_files_with_events(&reference, &candidate, &ArtifactKey::Latest, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
