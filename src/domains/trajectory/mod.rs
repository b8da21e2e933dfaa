pub mod ast;
pub mod compiler;
pub mod frame;
pub mod parser;
pub mod ports;

pub use ast::Command;
pub use compiler::{compile_script, compile_text, TrajectoryCompiler, DEFAULT_RATE};
pub use frame::{ControlFrame, Timeline};
pub use parser::ScriptParser;
pub use ports::ScriptSource;
