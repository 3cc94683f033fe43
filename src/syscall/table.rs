//! Tabela de syscalls: 32 slots fixos `(função, argumento)`.

use crate::arch::x86::entry::TrapFrame;
use crate::sync::Spinlock;

use super::numbers::{
    NUMBER_OF_RESERVED_SYSTEM_CALLS, NUMBER_OF_SYSTEM_CALLS, SYSCALL_SERVICE_BEGIN,
    SYSCALL_SERVICE_END,
};

/// Tipo de handler de syscall: recebe o frame da interrupção (argumentos
/// nos registradores salvos) e o argumento opaco do registro.
pub type SystemCallFn = fn(&mut TrapFrame, usize);

pub struct SystemCallTable {
    slots: [Spinlock<Option<(SystemCallFn, usize)>>; NUMBER_OF_SYSTEM_CALLS],
}

impl SystemCallTable {
    pub(super) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Spinlock::new(None)),
        }
    }

    /// Liga um slot reservado. Religar um slot ocupado é bug de kernel.
    pub fn register_system_call(&self, slot: usize, func: SystemCallFn, arg: usize) {
        assert!(slot < NUMBER_OF_RESERVED_SYSTEM_CALLS, "slot nao reservado");
        let mut entry = self.slots[slot].lock();
        assert!(entry.is_none(), "syscall ja registrada");
        *entry = Some((func, arg));
    }

    /// Ocupa o próximo slot livre da área de serviços [16, 32).
    pub(super) fn bind_service(&self, func: SystemCallFn, arg: usize) -> Option<usize> {
        for slot in SYSCALL_SERVICE_BEGIN..SYSCALL_SERVICE_END {
            let mut entry = self.slots[slot].lock();
            if entry.is_none() {
                *entry = Some((func, arg));
                return Some(slot);
            }
        }
        None
    }

    /// Par `(função, argumento)` de um slot, se ligado.
    pub fn get(&self, number: usize) -> Option<(SystemCallFn, usize)> {
        if number >= NUMBER_OF_SYSTEM_CALLS {
            return None;
        }
        *self.slots[number].lock()
    }
}
