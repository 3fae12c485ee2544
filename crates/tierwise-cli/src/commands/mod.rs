pub mod compare;
pub mod init;
pub mod run;
pub mod show_config;
pub mod validate;
