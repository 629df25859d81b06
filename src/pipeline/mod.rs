// Reconciliation pipeline: leaf transforms first, composed by the runners

pub mod change_detect;
pub mod classify;
pub mod dedupe;
pub mod demolition;
pub mod geometry;
pub mod normalize;
pub mod overlay;
pub mod runner;
pub mod validation;

pub use runner::{CapitalRunner, HousingRunner};
