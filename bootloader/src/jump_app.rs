// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use cortex_m::peripheral::SCB;

use crate::port::Platform;

/// Resets and jumps through the Cortex-M core.
pub struct CortexM;

impl Platform for CortexM {
    fn reset(&mut self) -> ! {
        SCB::sys_reset()
    }

    fn jump(&mut self, entry: u32) -> ! {
        // SAFETY: `entry` is only ever APP_ENTRY, which the verifier has just
        // covered with a valid signature.
        unsafe { jump_to_app(entry) }
    }
}

/// Boots the application whose reset handler address is stored at `entry`.
///
/// The word just below `entry` is taken as the initial stack pointer, as in a
/// vector table. With `entry == APP_ENTRY` that is the word at address 0, so
/// the application starts on a fresh stack at the top the core resets to.
///
/// # Safety
///
/// This will run whatever code the word at `entry` points to, with
/// interrupts disabled and the bootloader's stack discarded.
pub unsafe fn jump_to_app(entry: u32) -> ! {
    cortex_m::interrupt::disable();

    let table = entry.saturating_sub(4);
    let rv = core::ptr::read_volatile(entry as *const u32);
    info!("table = {:#x}, rv = {:#x}", table, rv);

    // * Use MSP as stack pointer (clear spsel)
    // * Synchronize instruction barrier
    // * Load MSP from the table. Address 0 is read here, not through a Rust pointer
    // * Set link register to not return (0xFF)
    // * Jump to the application reset handler
    core::arch::asm!(
        "mrs {tmp}, CONTROL",
        "bics {tmp}, {spsel}",
        "msr CONTROL, {tmp}",
        "isb",
        "ldr {tmp}, [{table}]",
        "msr MSP, {tmp}",
        "mov lr, {new_lr}",
        "bx {rv}",
        // `out(reg) _` is not permitted in a `noreturn` asm! call
        tmp = in(reg) 0,
        spsel = in(reg) 2,
        table = in(reg) table,
        new_lr = in(reg) 0xFFFFFFFFu32,
        rv = in(reg) rv,
        options(noreturn),
    );
}
