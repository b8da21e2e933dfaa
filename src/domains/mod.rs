pub mod map;
pub mod motion;
pub mod sequencer;
pub mod simulation;
pub mod trajectory;
