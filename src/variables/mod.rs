//! Parsers for FreeSWITCH's multi-value channel variable encodings.

pub mod esl_array;

pub use esl_array::EslArray;
