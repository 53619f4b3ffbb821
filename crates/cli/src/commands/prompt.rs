//! `pengate prompt`: Print the assembled system prompt.

use pengate_agent::{AgentMode, build_system_prompt};

pub fn run(mode: AgentMode, context: Option<&str>) {
    println!("{}", build_system_prompt(mode, context));
}
