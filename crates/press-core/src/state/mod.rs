//! State management for production orders.

pub mod order;

pub use order::OrderStateMachine;
