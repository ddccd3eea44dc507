// Agent identity and the trait strips act on
pub mod agent;

// Shared tuple space
pub mod blackboard;

// Configuration loading
pub mod config;

// Generic state machine with bad-state recovery
pub mod fsm;

// Flickering lamp agent
pub mod light;

// Clock, random source, lamp output
pub mod services;

// Fixed-step scheduler
pub mod sim;

// Rule units
pub mod strip;
