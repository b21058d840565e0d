//! Unit tests over the pure screening and estimation logic

mod screening_rules;
