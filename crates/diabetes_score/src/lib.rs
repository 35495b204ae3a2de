//! Diabetes Risk Prediction Service
//!
//! Serves predictions from a logistic regression model trained on the
//! Pima Indians diabetes dataset and keeps a log of every scored request.

pub mod commands;
pub mod server;
