//! # Syscall: Interface com Userspace
//!
//! Tabela de 32 slots ligada ao vetor 126: os 16 primeiros são
//! reservados (suspend, semáforos, alarmes, sleep, terminate...), os 16
//! últimos recebem serviços nomeados registrados em runtime (drivers).
//!
//! O handler do vetor valida `eax < 32`, exige slot ligado (slot vazio é
//! bug de kernel, não erro de usuário), invoca a função com os
//! argumentos nos registradores salvos e religa interrupções.

pub mod numbers;
pub mod service;
pub mod table;

pub mod test;

use alloc::boxed::Box;

use crate::arch::x86::entry::TrapFrame;
use crate::arch::Cpu;
use crate::core::smp::percpu;
use crate::core::time::events;
use crate::interrupt::{InterruptTable, SYSTEM_CALL_VECTOR};
use crate::sched::scheduler;
use crate::sync::{Once, Semaphore};

pub use numbers::*;
pub use service::{ServiceNameError, MAX_NAME_LENGTH};
pub use table::{SystemCallFn, SystemCallTable};

static TABLE: Once<&'static SystemCallTable> = Once::new();

/// Tabela global de syscalls.
pub fn system_call_table() -> &'static SystemCallTable {
    TABLE.get().expect("tabela de syscalls nao inicializada")
}

/// Argumentos de syscall na ordem da ABI (EBX, ECX, EDX, ESI, EDI).
pub fn syscall_args(frame: &TrapFrame) -> [u32; 5] {
    [frame.ebx, frame.ecx, frame.edx, frame.esi, frame.edi]
}

/// Cria a tabela, liga o vetor 126 e registra os slots reservados.
pub fn init(interrupt_table: &'static InterruptTable) -> &'static SystemCallTable {
    let table: &'static SystemCallTable =
        TABLE.call_once(|| Box::leak(Box::new(SystemCallTable::new())));

    interrupt_table.register_interrupt(SYSTEM_CALL_VECTOR, syscall_handler, 0);

    table.register_system_call(SYSCALL_SUSPEND, sys_suspend, 0);
    table.register_system_call(SYSCALL_TASK_DEFINED, sys_task_defined, 0);
    table.register_system_call(SYSCALL_ACQUIRE_SEMAPHORE, sys_acquire_semaphore, 0);
    table.register_system_call(SYSCALL_RELEASE_SEMAPHORE, sys_release_semaphore, 0);
    table.register_system_call(SYSCALL_SET_ALARM, sys_set_alarm, 0);
    table.register_system_call(SYSCALL_WAIT_IO, sys_wait_io, 0);
    table.register_system_call(SYSCALL_CANCEL_IO, sys_cancel_io, 0);
    table.register_system_call(SYSCALL_SLEEP, sys_sleep, 0);
    table.register_system_call(SYSCALL_TERMINATE, sys_terminate, 0);

    crate::kinfo!("(SYSCALL) Tabela ligada ao vetor ", SYSTEM_CALL_VECTOR);
    table
}

/// Registra um serviço nomeado no próximo slot livre de [16, 32).
pub fn register_system_service(
    name: &str,
    func: SystemCallFn,
    arg: usize,
) -> Result<u8, ServiceNameError> {
    service::registry().register(system_call_table(), name, func, arg)
}

/// Slot de um serviço nomeado, se registrado.
pub fn query_system_service(name: &str) -> Option<u8> {
    service::registry().query(name)
}

// =============================================================================
// HANDLER DO VETOR 126
// =============================================================================

fn syscall_handler(frame: &mut TrapFrame, _arg: usize) {
    let number = frame.eax as usize;
    assert!(
        number < NUMBER_OF_SYSTEM_CALLS,
        "numero de syscall fora da faixa"
    );
    let (func, arg) = system_call_table()
        .get(number)
        .expect("slot de syscall nao ligado");

    func(frame, arg);
    Cpu::enable_interrupts();
}

// =============================================================================
// SLOTS RESERVADOS
// =============================================================================

fn sys_suspend(_frame: &mut TrapFrame, _arg: usize) {
    scheduler::suspend_current();
}

/// Despacha para o handler definido pela própria task (se instalado).
fn sys_task_defined(frame: &mut TrapFrame, _arg: usize) {
    let handler = scheduler::with_current(|task| task.trap_handler);
    match handler {
        Some((func, arg)) => func(frame, arg),
        None => frame.eax = IO_REQUEST_FAILURE,
    }
}

/// EBX = endereço do semáforo (handle opaco entregue pelo kernel ao
/// serviço que o criou).
fn sys_acquire_semaphore(frame: &mut TrapFrame, _arg: usize) {
    let semaphore = frame.ebx as *const Semaphore;
    unsafe { (*semaphore).acquire() };
}

fn sys_release_semaphore(frame: &mut TrapFrame, _arg: usize) {
    let semaphore = frame.ebx as *const Semaphore;
    unsafe { (*semaphore).release() };
}

/// EBX = milissegundos, ECX = periódico (0/1). Retorna handle ou 0.
fn sys_set_alarm(frame: &mut TrapFrame, _arg: usize) {
    frame.eax = events::set_alarm(frame.ebx, frame.ecx != 0);
}

/// EBX = handle. Bloqueia até o disparo. Retorna 1, ou 0 para handle
/// inválido.
fn sys_wait_io(frame: &mut TrapFrame, _arg: usize) {
    frame.eax = if events::wait_io(frame.ebx) {
        1
    } else {
        IO_REQUEST_FAILURE
    };
}

/// EBX = handle. Retorna 1 sse o cancelamento venceu o disparo.
fn sys_cancel_io(frame: &mut TrapFrame, _arg: usize) {
    frame.eax = if events::cancel_io(frame.ebx) {
        1
    } else {
        IO_REQUEST_FAILURE
    };
}

/// EBX = milissegundos.
fn sys_sleep(frame: &mut TrapFrame, _arg: usize) {
    percpu::processor_local_timer().kernel_sleep(frame.ebx);
}

fn sys_terminate(_frame: &mut TrapFrame, _arg: usize) {
    scheduler::terminate_current();
}
