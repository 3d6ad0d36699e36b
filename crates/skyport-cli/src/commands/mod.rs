pub mod init;
pub mod synth;
pub mod validate;
