// Routines for persisting model parameters
pub mod checkpoint;
// Routines for datasets
pub mod data;
// Routines for evaluation on held-out data
pub mod evaluation;
// Routines for directional derivatives
pub mod operators;
// Routines for output
pub mod output;
// Routines for settings
pub mod settings;
// Routines for flattening parameter tensors
pub mod vectorize;
