//! The turn loop: interrupts, per-turn driving, and the session facade
//! hosts talk to.

mod driver;
mod fallback;
mod interrupt;
mod session;

pub use driver::TurnDriver;
pub use fallback::HeadlineSummarizer;
pub use interrupt::InterruptManager;
pub use session::Session;
pub use session::SessionBuilder;
pub use session::SessionError;
pub use session::TurnOutcome;
