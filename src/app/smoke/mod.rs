pub mod invocation;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod stages;

#[cfg(test)]
mod tests;
