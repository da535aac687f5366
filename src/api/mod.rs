pub mod health;
pub mod order;
pub mod preview;
pub mod queue;
pub mod state;
pub mod validation;
