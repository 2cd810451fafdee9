pub mod case_generation;
pub mod catalog;
pub mod connection;
pub mod export;
pub mod questionnaire;

#[cfg(test)]
pub(crate) mod test_support;
