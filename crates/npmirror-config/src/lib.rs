pub mod annotations;
pub mod config;
pub mod error;
pub mod remote;

#[cfg(test)]
pub mod test_utils;
