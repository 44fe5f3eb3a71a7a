pub mod descriptor;
pub mod error;
pub mod expand;
pub mod io;
pub mod orchestrator;
pub mod params;
pub mod paths;
pub mod resolve;
pub mod runner;
pub mod template;
pub mod types;
pub mod unit;

pub use error::{Result, SvcError};
