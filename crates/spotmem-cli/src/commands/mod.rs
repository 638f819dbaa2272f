pub mod find_offsets;
pub mod key;
pub mod status;
pub mod watch;
