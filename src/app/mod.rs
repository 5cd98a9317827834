//! Application runtime composition modules.

pub(crate) mod config;
pub(crate) mod exit_handler;
pub(crate) mod input_processor;
pub(crate) mod output;
pub(crate) mod runtime;
pub(crate) mod terminal;
pub(crate) mod validation;
