//! Spinlock - bloqueio com busy-wait consciente de interrupções
//!
//! # Quando usar
//!
//! - Seções críticas MUITO curtas
//! - Dentro de handlers de interrupção
//! - Quando não pode chamar o scheduler
//!
//! # Quando NÃO usar
//!
//! - Seções que podem demorar
//! - Quando pode chamar funções que dormem (use `Semaphore`)
//!
//! # Estados
//!
//! O byte de estado tem três valores: `ACQUIRABLE` (livre),
//! `NOT_ACQUIRABLE` (ocupado) e `IGNORED`. Um lock `IGNORED` curto-circuita
//! acquire e release: é usado para instâncias que sabidamente só são
//! tocadas por um fluxo (ex.: estruturas ainda não publicadas no boot).
//!
//! O IF (interrupt flag) vigente no momento do acquire é salvo no próprio
//! lock e restaurado no release; aquisições aninhadas de locks distintos
//! restauram o estado correto em cascata.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::arch::Cpu;

const NOT_ACQUIRABLE: u8 = 0;
const ACQUIRABLE: u8 = 1;
const IGNORED: u8 = 2;

/// Spinlock tri-estado protegendo um `T`.
pub struct Spinlock<T> {
    acquirable: UnsafeCell<u8>,
    /// IF salvo pelo dono atual. Só é lido/escrito com o lock em mãos.
    interrupt_flag: UnsafeCell<bool>,
    data: UnsafeCell<T>,
}

// SAFETY: o protocolo de aquisição serializa todo acesso a `data` e aos
// campos de controle.
unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    /// Cria novo spinlock (livre).
    pub const fn new(data: T) -> Self {
        Self {
            acquirable: UnsafeCell::new(ACQUIRABLE),
            interrupt_flag: UnsafeCell::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Cria um lock `IGNORED`: acquire/release viram no-ops.
    pub const fn ignored(data: T) -> Self {
        Self {
            acquirable: UnsafeCell::new(IGNORED),
            interrupt_flag: UnsafeCell::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    fn state(&self) -> u8 {
        unsafe { core::ptr::read_volatile(self.acquirable.get()) }
    }

    /// O lock está livre (ou é `IGNORED`)?
    pub fn is_acquirable(&self) -> bool {
        self.state() != NOT_ACQUIRABLE
    }

    /// Adquire o lock.
    ///
    /// Desabilita interrupções antes de cada tentativa; entre tentativas
    /// frustradas o IF original é restaurado para não segurar a latência
    /// de interrupção do núcleo enquanto espera.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        if self.state() == IGNORED {
            return SpinlockGuard {
                lock: self,
                spin_count: 0,
            };
        }

        let interrupt_enabled = Cpu::interrupts_enabled();
        let mut spin_count: u32 = 0;

        loop {
            Cpu::disable_interrupts();
            let previous = unsafe { Cpu::xchg8(self.acquirable.get(), NOT_ACQUIRABLE) };
            if previous == ACQUIRABLE {
                unsafe { *self.interrupt_flag.get() = interrupt_enabled };
                return SpinlockGuard {
                    lock: self,
                    spin_count,
                };
            }
            if interrupt_enabled {
                Cpu::enable_interrupts();
            }
            while self.state() == NOT_ACQUIRABLE {
                spin_count += 1;
                Cpu::pause();
            }
        }
    }

    /// Tenta adquirir sem esperar.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        if self.state() == IGNORED {
            return Some(SpinlockGuard {
                lock: self,
                spin_count: 0,
            });
        }

        let interrupt_enabled = Cpu::interrupts_enabled();
        Cpu::disable_interrupts();

        let previous = unsafe { Cpu::xchg8(self.acquirable.get(), NOT_ACQUIRABLE) };
        if previous == ACQUIRABLE {
            unsafe { *self.interrupt_flag.get() = interrupt_enabled };
            Some(SpinlockGuard {
                lock: self,
                spin_count: 0,
            })
        } else {
            // Não conseguiu: restaurar interrupções
            if interrupt_enabled {
                Cpu::enable_interrupts();
            }
            None
        }
    }

    /// Força o desbloqueio do spinlock.
    ///
    /// # Safety
    /// Só deve ser usado em caminhos de recuperação onde o Guard original
    /// comprovadamente nunca vai rodar (ex.: task destruída).
    pub unsafe fn force_unlock(&self) {
        if self.state() != IGNORED {
            Cpu::xchg8(self.acquirable.get(), ACQUIRABLE);
        }
    }
}

/// Guard do spinlock - libera ao sair do escopo.
pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
    spin_count: u32,
}

impl<T> SpinlockGuard<'_, T> {
    /// Número de iterações de espera gastas para adquirir (diagnóstico
    /// de contenção).
    pub fn spin_count(&self) -> u32 {
        self.spin_count
    }
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        if self.lock.state() == IGNORED {
            return;
        }

        debug_assert!(!Cpu::interrupts_enabled());
        debug_assert!(self.lock.state() == NOT_ACQUIRABLE);

        let interrupt_enabled = unsafe { *self.lock.interrupt_flag.get() };
        unsafe { Cpu::xchg8(self.lock.acquirable.get(), ACQUIRABLE) };

        // Restaurar interrupções se estavam habilitadas antes do acquire
        if interrupt_enabled {
            Cpu::enable_interrupts();
        }
    }
}
