pub mod cli;
pub mod config_doc;
pub mod extract;
pub mod gate;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod sandbox;
pub mod supervisor;
