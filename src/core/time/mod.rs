//! # Time: Relógio do Sistema
//!
//! Contador global de ticks (jiffies) e as listas de eventos de timer
//! por núcleo. O tick nominal é `TIMER_FREQUENCY` Hz (10 ms).

pub mod events;

pub mod test;

use core::sync::atomic::{AtomicU64, Ordering};

/// Frequência do tick (Hz). Fixa em 100 (1 tick = 10 ms).
pub const TIMER_FREQUENCY: u32 = 100;

/// Ticks desde o boot. Incrementado apenas pela lista de eventos do BSP.
static JIFFIES: AtomicU64 = AtomicU64::new(0);

/// Retorna o número atual de jiffies.
#[inline]
pub fn jiffies() -> u64 {
    JIFFIES.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn inc_jiffies() {
    JIFFIES.fetch_add(1, Ordering::Relaxed);
}

/// Converte milissegundos em ticks, arredondando para cima
/// (`ceil(TIMER_FREQUENCY·ms / 1000)`).
#[inline]
pub const fn millis_to_ticks(millis: u32) -> u32 {
    let product = TIMER_FREQUENCY as u64 * millis as u64;
    ((product + 999) / 1000) as u32
}
