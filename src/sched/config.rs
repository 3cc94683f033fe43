//! Parâmetros do scheduler.

/// Níveis de prioridade. 0 = mais alta (convenção do kernel inteiro).
pub const NUMBER_OF_PRIORITIES: usize = 4;

/// Drivers e serviços sensíveis a latência.
pub const PRIORITY_DRIVER: u8 = 0;
/// Tasks de kernel comuns.
pub const PRIORITY_KERNEL: u8 = 1;
/// Tasks de usuário.
pub const PRIORITY_USER: u8 = 2;
/// A task idle de cada núcleo (nunca bloqueia).
pub const PRIORITY_IDLE: u8 = 3;

/// Stack de kernel de cada task (16 KiB).
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;
