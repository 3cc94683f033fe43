//! Números de syscall e constantes da ABI.
//!
//! Convenção de chamada: número em EAX, argumentos em EBX, ECX, EDX,
//! ESI, EDI (nesta ordem), retorno em EAX, via `int 0x7E` (vetor 126).

/// Slots reservados (ligados no boot)
pub const SYSCALL_SUSPEND: usize = 0;
pub const SYSCALL_TASK_DEFINED: usize = 1;
pub const SYSCALL_ACQUIRE_SEMAPHORE: usize = 2;
pub const SYSCALL_RELEASE_SEMAPHORE: usize = 3;
pub const SYSCALL_SET_ALARM: usize = 4;
pub const SYSCALL_WAIT_IO: usize = 5;
pub const SYSCALL_CANCEL_IO: usize = 6;
pub const SYSCALL_SLEEP: usize = 7;
pub const SYSCALL_TERMINATE: usize = 8;

/// Primeiros 16 slots são reservados; [16, 32) vão para serviços
/// registrados em runtime.
pub const NUMBER_OF_RESERVED_SYSTEM_CALLS: usize = 16;
pub const NUMBER_OF_SYSTEM_CALLS: usize = 32;

pub const SYSCALL_SERVICE_BEGIN: usize = NUMBER_OF_RESERVED_SYSTEM_CALLS;
pub const SYSCALL_SERVICE_END: usize = NUMBER_OF_SYSTEM_CALLS;

/// Valor sentinela de falha para syscalls de I/O (handles nunca são 0).
pub const IO_REQUEST_FAILURE: u32 = 0;
