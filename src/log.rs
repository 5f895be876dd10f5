//! Serial logging, in the style of a board's early-boot console.
//!
//! The kernel embedding this crate is expected to install a [`Serial`]
//! implementation via [`set_serial`]; until then, `println!`/`log!` are
//! silently dropped rather than panicking, since VM code runs before and
//! during board bring-up.

use crate::sync::SpinLock;
use core::fmt::{self, Write};

/// A destination for log output, usually a UART.
pub trait Serial: Send {
    /// Writes a string to the serial device.
    fn write_str(&mut self, s: &str);
}

/// Adapts a borrowed [`Serial`] device to [`core::fmt::Write`] so
/// `format_args!` output can be written to it without an intermediate
/// allocation.
struct SerialSink<'a>(&'a mut dyn Serial);

impl Write for SerialSink<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

static SINK: SpinLock<Option<alloc::boxed::Box<dyn Serial>>> = SpinLock::new(None);

/// Installs the serial device `println!`/`log!` write to.
pub fn set_serial(serial: alloc::boxed::Box<dyn Serial>) {
    *SINK.lock() = Some(serial);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let mut guard = SINK.lock();
    if let Some(serial) = guard.as_deref_mut() {
        let _ = SerialSink(serial).write_fmt(args);
    }
}

/// Prints to the installed serial device, without a trailing newline.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::log::_print(core::format_args!($($arg)*))
    };
}

/// Prints to the installed serial device, with a trailing newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::log::_print(core::format_args!($($arg)*));
        $crate::print!("\n");
    }};
}

/// Verbose diagnostic logging, compiled out unless the `verbose` feature
/// is enabled. Used for the fault handler's per-fault trace, which is far
/// too noisy to leave on by default.
#[cfg(feature = "verbose")]
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::println!($($arg)*)
    };
}

#[cfg(not(feature = "verbose"))]
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        ()
    };
}
