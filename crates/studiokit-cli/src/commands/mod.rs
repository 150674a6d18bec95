pub mod check;
pub mod compare;
pub mod help_url;
pub mod init;
pub mod run;
pub mod tree;
pub mod validate;
