//! QEMU debug console (`-debugcon`), a write-only byte sink on I/O port `0x402`.
//!
//! On real hardware the port is usually unclaimed and writes go nowhere.

use core::fmt::{self, Write};

const DEBUGCON_PORT: u16 = 0x402;

struct DebugCon;

impl Write for DebugCon {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            // SAFETY: Writing to the debug console port has no side effects on memory.
            unsafe { outb(DEBUGCON_PORT, b) }
        }
        Ok(())
    }
}

#[allow(clippy::inline_always)]
#[inline(always)]
unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
        );
    }
}

/// Best-effort formatted write; errors are dropped.
pub fn write(args: fmt::Arguments) {
    let _ = DebugCon.write_fmt(args);
}
