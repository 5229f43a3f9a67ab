#[cfg(feature = "gemini")]
pub mod gemini;
pub mod flexible;
pub mod mock;

#[cfg(feature = "gemini")]
pub use gemini::*;
pub use flexible::*;
pub use mock::*;
