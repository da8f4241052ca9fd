pub mod status;

#[cfg(test)]
mod status_tests;
