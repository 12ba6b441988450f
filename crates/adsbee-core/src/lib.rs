//! Core logic for the ADSBee console monitor: WebSocket framing, line
//! classification, console state, tab completion, and hex annotation.
//! Everything here is synchronous and I/O-free; the binary crate wires it
//! to the socket and the terminal.

pub mod annotate;
pub mod classify;
pub mod frame;
pub mod state;
pub mod suggest;

pub use annotate::Annotator;
pub use classify::{Classifier, Stats, Tag};
pub use frame::{encode_frame, Frame, FrameDecoder, FrameError, Opcode};
pub use state::{CommandHistory, ConsoleState, LogLine, Overlay, Scrollback};
