use alloc::boxed::Box;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Output channel of the logger.
pub type Sink = fn(fmt::Arguments<'_>);

/// `log` backend writing `[LEVEL] target: message` lines.
///
/// Lines go to the firmware console until [`LoaderLogger::exit_boot_services`]
/// is called, and to the optional trace sink (e.g. a debug port) always.
pub struct LoaderLogger {
    max_level: LevelFilter,
    console: Sink,
    trace: Option<Sink>,
    boot_services_available: AtomicBool,
}

impl LoaderLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, console: Sink) -> Self {
        Self {
            max_level,
            console,
            trace: None,
            boot_services_available: AtomicBool::new(true),
        }
    }

    /// Adds a sink that keeps receiving lines after boot services are gone.
    #[must_use]
    pub const fn with_trace(mut self, trace: Sink) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Installs the logger. Call this once during early init.
    ///
    /// # Errors
    /// Fails if another logger was installed before.
    pub fn init(self) -> Result<&'static Self, SetLoggerError> {
        let max_level = self.max_level;
        let logger: &'static Self = Box::leak(Box::new(self));
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(logger)
    }

    /// Stops console output.
    pub fn exit_boot_services(&self) {
        self.boot_services_available.store(false, Ordering::Release);
    }
}

impl Log for LoaderLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(trace) = self.trace {
            trace(format_args!(
                "[{}] {}: {}\n",
                record.level(),
                record.target(),
                record.args()
            ));
        }

        if self.boot_services_available.load(Ordering::Acquire) {
            (self.console)(format_args!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    fn flush(&self) {}
}
