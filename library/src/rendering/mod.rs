//! Background rendering: one worker thread per output size.

pub mod worker;

pub use self::worker::{RenderWorker, WorkerPriority, WorkerState};
