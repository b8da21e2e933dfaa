pub mod bot;
pub mod structure;

pub use bot::Bot;
pub use structure::{
    RigOffsets, Rod, RodId, RodState, Structure, DETACH_MIN_X, PICKUP_X_TOL, PICKUP_Y_TOL,
};
