//! Interactive resolution of transfer parameters

pub mod input;
pub mod prompt;
pub mod resolver;

pub use prompt::{Prompter, TerminalPrompter};
pub use resolver::{BridgeArgs, Resolution, Resolver};
