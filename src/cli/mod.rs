pub mod doctor;
pub mod output;
pub mod run;
pub mod serve;

pub use doctor::cmd_doctor;
pub use output::OutputFormat;
pub use run::{cmd_run, RunArgs};
pub use serve::{cmd_serve, ServeArgs};
