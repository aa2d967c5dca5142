use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logger over the UEFI text console. All output it will ever produce must
/// happen before boot services end; [`BootConsoleLogger::exit_boot_services`]
/// turns it into a no-op so a late `log!` cannot touch a dead console.
pub struct BootConsoleLogger {
    max_level: LevelFilter,
    boot_services_available: AtomicBool,
}

impl BootConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            boot_services_available: AtomicBool::new(true),
        }
    }

    /// Call this once during early init.
    #[allow(
        static_mut_refs,
        clippy::missing_errors_doc,
        clippy::missing_panics_doc
    )]
    pub fn init(self) -> Result<&'static Self, SetLoggerError> {
        // SAFETY: log::set_logger expects &'static Log; with no allocator
        // guaranteed yet, a static is the only home for it.
        static mut LOGGER: Option<BootConsoleLogger> = None;

        // move self into the static
        unsafe {
            LOGGER = Some(self);
            log::set_logger(LOGGER.as_ref().unwrap() as &'static dyn Log)?;
        }
        log::set_max_level(LevelFilter::Trace);
        unsafe { Ok(LOGGER.as_ref().expect("initialized")) }
    }

    /// Silence the console sink. Must run before the exit call itself.
    pub fn exit_boot_services(&self) {
        self.boot_services_available.store(false, Ordering::Release);
    }
}

impl Log for BootConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message"
        if self.boot_services_available.load(Ordering::Acquire) {
            uefi::println!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        // nothing buffered
    }
}
