//! Command handlers, one module per subcommand.

pub mod habit;
pub mod history;
pub mod init;
pub mod mark;
pub mod rebuild;
pub mod record;
pub mod retro;
