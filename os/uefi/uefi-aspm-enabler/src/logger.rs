use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logs `[LEVEL] target: message` to the UEFI console and, with the `qemu`
/// feature, to the QEMU debug console.
pub struct UefiLogger;

static LOGGER: UefiLogger = UefiLogger;

impl UefiLogger {
    /// Call this once during early init.
    #[allow(clippy::missing_errors_doc)]
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        #[cfg(all(feature = "qemu", target_arch = "x86_64"))]
        crate::debugcon::write(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));

        uefi::println!(
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // console output is unbuffered
    }
}
