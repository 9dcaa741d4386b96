mod open_source;

pub use open_source::{OpenSourceArgs, cmd_open_source};
