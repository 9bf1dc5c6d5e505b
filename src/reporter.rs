use log::info;

/// Receives the informational lines produced while resolving and applying configs.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
}

/// Forwards every line to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        info!("{message}");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VoidReporter;

impl Reporter for VoidReporter {
    fn info(&self, _message: &str) {}
}
