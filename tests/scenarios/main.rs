//! End-to-end pipeline scenarios run against scripted skills

mod helpers;

mod batch_execution;
mod conditional_skip;
mod failure_handling;
mod retry_behavior;
mod trigger_matching;
mod variable_substitution;
