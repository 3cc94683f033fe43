//! Barreira contada para sincronização de bringup SMP.
//!
//! Cada núcleo incrementa o contador e gira até todos chegarem.
//! Construída diretamente sobre `lock add` / `lock cmpxchg`: nenhuma
//! dependência do scheduler, pois os APs ainda não têm tasks.

use core::cell::UnsafeCell;

use crate::arch::Cpu;

pub struct Barrier {
    count: UnsafeCell<u32>,
}

// SAFETY: todo acesso ao contador passa por operações atômicas.
unsafe impl Sync for Barrier {}

impl Barrier {
    pub const fn new() -> Self {
        Self {
            count: UnsafeCell::new(0),
        }
    }

    /// Zera o contador para reuso em uma nova rodada.
    pub fn reset(&self) {
        unsafe { core::ptr::write_volatile(self.count.get(), 0) };
    }

    /// Valor atual (diagnóstico).
    pub fn count(&self) -> u32 {
        unsafe { Cpu::cmpxchg32(self.count.get(), 0, 0) }
    }

    /// Incrementa e espera até o contador atingir `thread_count`.
    ///
    /// Nenhuma thread sai antes da N-ésima chegada.
    pub fn add_and_wait(&self, thread_count: u32) {
        unsafe {
            Cpu::lock_add32(self.count.get(), 1);
            while Cpu::cmpxchg32(self.count.get(), thread_count, thread_count) != thread_count {
                Cpu::pause();
            }
        }
    }

    /// Incrementa sem esperar (registrar presença).
    pub fn add(&self) {
        unsafe { Cpu::lock_add32(self.count.get(), 1) };
    }
}
