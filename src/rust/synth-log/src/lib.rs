// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging macros of the synthesizer compiler crates.
//!
//! Records go through the `log` facade with a `synth.rust::{module}` target,
//! so a host can route or filter all compiler output with one prefix. The
//! host installs the logger.
use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $($arg:tt)+) => {
        $crate::_log::$level!(target: concat!("synth.rust::", module_path!()), $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::__log!(info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::__log!(warn, $($arg)+)
    };
}

/// Log a diagnostic message at debug level if diagnostics logging is enabled.
///
/// Diagnostics are compiler statistics (node counts, region sizes) that are
/// too chatty for regular `info` output. The arguments are not evaluated
/// while diagnostics are disabled.
#[macro_export]
macro_rules! diagnostic {
    ($($arg:tt)+) => {
        if $crate::is_diagnostics_enabled() {
            $crate::__log!(debug, $($arg)+)
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Enable or disable diagnostics output.
///
/// Called by the embedding application before compiling. No logger is
/// installed here.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;

    struct Capture(Mutex<Vec<(Level, String, String)>>);

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.0.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

    // One test owns the global logger and the diagnostics flag.
    #[test]
    fn test_records_and_diagnostics_flag() {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Debug);

        init_logging(false);
        assert!(!is_diagnostics_enabled());
        info!("Compiling channel group {}", "RF0D");
        let mut evaluated = false;
        diagnostic!("{} instruction words", {
            evaluated = true;
            0
        });
        assert!(!evaluated);

        init_logging(true);
        assert!(is_diagnostics_enabled());
        diagnostic!("{} instruction words", 12);
        warn!("Timestamp rounds to zero");
        init_logging(false);

        let target = "synth.rust::synth_log::tests".to_string();
        let records = CAPTURE.0.lock().unwrap().clone();
        assert_eq!(
            records,
            vec![
                (Level::Info, target.clone(), "Compiling channel group RF0D".to_string()),
                (Level::Debug, target.clone(), "12 instruction words".to_string()),
                (Level::Warn, target, "Timestamp rounds to zero".to_string()),
            ]
        );
    }
}
