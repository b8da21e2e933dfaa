/// Parsed command tree of a build script.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A single command invocation, e.g. `zmove(Z01, 1.5, 0)`.
    Leaf { name: String, args: Vec<String> },
    /// A script body: children compile one after another.
    Serial {
        script: String,
        children: Vec<Command>,
    },
    /// `simscript(...)` branches: children compile index-wise in parallel.
    Parallel { children: Vec<Command> },
}
