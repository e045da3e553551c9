pub mod transcript;
pub mod worker;

pub use transcript::*;
pub use worker::*;
