//! Troca de Contexto (Context Switching): i686.
//!
//! Salva/restaura apenas os registradores callee-saved da ABI cdecl
//! (EBX, ESI, EDI, EBP) mais ESP/EIP; os demais já foram preservados
//! pelo compilador no ponto da chamada.

use crate::sched::scheduler;
use crate::sched::task::TaskEntry;

/// Contexto de CPU salvo de uma task.
///
/// Offsets fixos consumidos pelo assembly abaixo:
/// 0:ebx, 4:esi, 8:edi, 12:ebp, 16:esp, 20:eip
#[repr(C)]
pub struct CpuContext {
    pub ebx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
}

impl CpuContext {
    pub const fn new() -> Self {
        Self {
            ebx: 0,
            esi: 0,
            edi: 0,
            ebp: 0,
            esp: 0,
            eip: 0,
        }
    }

    /// Prepara o contexto inicial de uma task nova: o primeiro switch
    /// "retorna" para o trampolim de entrada com a stack recém-criada.
    pub fn setup_initial(&mut self, stack_top: u32) {
        let top = stack_top & !0xF;
        // O slot [esp] é sobrescrito com o EIP pelo assembly de switch
        self.esp = top - 4;
        self.eip = task_entry_trampoline as usize as u32;
        self.ebp = 0;
    }
}

extern "C" {
    fn context_switch_asm(old: *mut CpuContext, new: *const CpuContext);
    fn jump_context_asm(new: *const CpuContext) -> !;
}

/// Salva o contexto atual em `old` e retoma `new`.
///
/// Retorna quando a task de `old` for re-escalonada no futuro.
///
/// # Safety
/// - Interrupções devem estar desabilitadas.
/// - `old` e `new` devem apontar para contextos válidos e pinados.
pub unsafe fn switch_context(old: *mut CpuContext, new: *const CpuContext) {
    context_switch_asm(old, new);
}

/// Restaura `new` sem salvar o contexto atual (task que está morrendo
/// ou primeiro dispatch de um núcleo).
///
/// # Safety
/// Como `switch_context`, e a stack atual nunca mais é usada.
pub unsafe fn jump_context(new: *const CpuContext) -> ! {
    jump_context_asm(new)
}

core::arch::global_asm!(
    r#"
.global context_switch_asm
context_switch_asm:
    // [esp+4] = old, [esp+8] = new
    mov eax, [esp + 4]

    // Salvar callee-saved + stack
    mov [eax + 0], ebx
    mov [eax + 4], esi
    mov [eax + 8], edi
    mov [eax + 12], ebp
    mov [eax + 16], esp

    // Endereço de retorno vira o EIP salvo
    mov edx, [esp]
    mov [eax + 20], edx

    // --- Ponto de troca ---

    mov eax, [esp + 8]
    mov ebx, [eax + 0]
    mov esi, [eax + 4]
    mov edi, [eax + 8]
    mov ebp, [eax + 12]
    mov esp, [eax + 16]

    // Sobrescrever o slot de retorno e consumi-lo com ret:
    // 'push + ret' deixaria o endereço antigo vazando na stack.
    mov edx, [eax + 20]
    mov [esp], edx
    ret

.global jump_context_asm
jump_context_asm:
    mov eax, [esp + 4]
    mov ebx, [eax + 0]
    mov esi, [eax + 4]
    mov edi, [eax + 8]
    mov ebp, [eax + 12]
    mov esp, [eax + 16]
    mov edx, [eax + 20]
    mov [esp], edx
    ret
"#
);

/// Primeiro código executado por toda task nova (ainda com IF desligado,
/// já instalada como task corrente do núcleo).
#[no_mangle]
extern "C" fn task_entry_trampoline() -> ! {
    scheduler::finish_switch();
    let entry = scheduler::current_entry();

    crate::arch::Cpu::enable_interrupts();

    match entry {
        TaskEntry::Kernel { entry, arg } => {
            entry(arg);
            scheduler::terminate_current();
        }
        TaskEntry::Loader { loader, arg } => loader(arg),
        TaskEntry::User { eip, esp } => unsafe { enter_user_mode(eip, esp) },
        TaskEntry::V8086 { cs, ip } => unsafe { crate::arch::x86::v8086::enter_v8086(cs, ip) },
        TaskEntry::BootIdle => scheduler::idle_loop(),
    }
}

/// Salta para Ring 3 via IRETD com os seletores de usuário.
///
/// # Safety
/// `eip`/`esp` devem estar mapeados no espaço do usuário da task atual.
pub unsafe fn enter_user_mode(eip: u32, esp: u32) -> ! {
    use crate::arch::x86::gdt::{USER_CODE_SELECTOR, USER_DATA_SELECTOR};

    // EFLAGS do usuário: IF ligado + bit 1 reservado
    let eflags: u32 = (1 << 9) | 0x2;

    core::arch::asm!(
        "mov ds, {udata:x}",
        "mov es, {udata:x}",
        "mov fs, {udata:x}",
        "mov gs, {udata:x}",
        "push {udata}",
        "push {esp}",
        "push {eflags}",
        "push {ucode}",
        "push {eip}",
        "iretd",
        udata = in(reg) USER_DATA_SELECTOR as u32,
        ucode = in(reg) USER_CODE_SELECTOR as u32,
        esp = in(reg) esp,
        eflags = in(reg) eflags,
        eip = in(reg) eip,
        options(noreturn)
    );
}
