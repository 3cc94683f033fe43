//! # Subsistema de Interrupções
//!
//! Tabela de 256 vetores com slots `(handler, argumento)`, glue de
//! dispatch chamado pelos stubs de `arch::x86::entry`, e a abstração
//! polimórfica de controlador (`Pic`) com as implementações 8259 e APIC.
//!
//! ## Mapa de vetores
//! - 0–31: exceções da CPU (reservados)
//! - 32–95: uso geral (IRQs ocupam os 16 primeiros a partir da base 32)
//! - 126: system call
//! - 127: spurious
//!
//! ## Atomicidade de `replace_handler`
//! Handler e argumento trocam juntos sob o spinlock do vetor; o dispatch
//! tira um snapshot do par sob o mesmo lock. Uma interrupção em voo vê o
//! par antigo ou o novo, nunca uma mistura.

pub mod apic;
pub mod pic;
pub mod pic8259;

pub mod test;

use alloc::boxed::Box;

use crate::arch::x86::entry::TrapFrame;
use crate::arch::x86::idt;
use crate::sync::{Once, Spinlock};

pub use pic::Pic;

// Vetores reservados (exceções da Intel SDM)
pub const DIVIDE_BY_ZERO_FAULT: u8 = 0;
pub const BREAKPOINT_TRAP: u8 = 3;
pub const INVALID_OPCODE_FAULT: u8 = 6;
pub const DOUBLE_FAULT: u8 = 8;
pub const GENERAL_PROTECTION_FAULT: u8 = 13;
pub const PAGE_FAULT: u8 = 14;

/// Início da área de vetores de uso geral.
pub const BEGIN_GENERAL_VECTOR: u8 = 32;
/// Fim (exclusivo) da área de uso geral.
pub const END_GENERAL_VECTOR: u8 = 96;
/// Vetor da system call (`int 0x7E`).
pub const SYSTEM_CALL_VECTOR: u8 = 126;
/// Vetor spurious (nunca recebe EOI).
pub const SPURIOUS_VECTOR: u8 = 127;
/// Vetor da IPI de parada usada pelo protocolo de pânico (fora da área
/// geral, para não deslocar a base das IRQs).
pub const HALT_IPI_VECTOR: u8 = 96;

/// Assinatura de um handler de interrupção: recebe o frame salvo e o
/// argumento opaco registrado junto com ele.
pub type InterruptHandler = fn(&mut TrapFrame, usize);

struct HandlerSlot {
    handler: InterruptHandler,
    arg: usize,
}

/// Um vetor da tabela: número fixo, linha de IRQ associada (-1 se
/// nenhuma) e o slot de handler trocável.
pub struct InterruptVector {
    number: u8,
    irq: Spinlock<i32>,
    slot: Spinlock<HandlerSlot>,
}

impl InterruptVector {
    fn new(number: u8) -> Self {
        Self {
            number,
            irq: Spinlock::new(-1),
            slot: Spinlock::new(HandlerSlot {
                handler: default_handler,
                arg: 0,
            }),
        }
    }

    /// Número do vetor (0-255).
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Linha de IRQ associada, ou -1.
    pub fn irq(&self) -> i32 {
        *self.irq.lock()
    }
}

/// Tabela de vetores do sistema (única, imutável após o boot do BSP).
pub struct InterruptTable {
    vectors: [InterruptVector; 256],
    /// Próximo vetor livre na área geral.
    next_general: Spinlock<u8>,
}

static TABLE: Once<&'static InterruptTable> = Once::new();

impl InterruptTable {
    pub(crate) fn new() -> Self {
        Self {
            vectors: core::array::from_fn(|i| InterruptVector::new(i as u8)),
            next_general: Spinlock::new(BEGIN_GENERAL_VECTOR),
        }
    }

    /// Vetor pelo número.
    pub fn vector(&self, number: u8) -> &InterruptVector {
        &self.vectors[number as usize]
    }

    /// Vetor `base + offset` (navegação a partir de uma base de IRQs).
    pub fn vector_at(&self, base: &InterruptVector, offset: u32) -> &InterruptVector {
        &self.vectors[base.number as usize + offset as usize]
    }

    /// Aloca o primeiro vetor livre em [32, 96) e liga `(handler, arg)`.
    /// Retorna `None` se a área geral está esgotada.
    pub fn register_general_interrupt(
        &self,
        handler: InterruptHandler,
        arg: usize,
    ) -> Option<&InterruptVector> {
        let mut next = self.next_general.lock();
        if *next >= END_GENERAL_VECTOR {
            return None;
        }
        let vector = &self.vectors[*next as usize];
        *next += 1;
        drop(next);

        set_handler(vector, handler, arg);
        Some(vector)
    }

    /// Aloca `count` vetores contíguos para as IRQs `irq_begin..`,
    /// marcando cada um com sua linha. Retorna o vetor base.
    pub fn register_irqs(&self, irq_begin: u32, count: u32) -> Option<&InterruptVector> {
        let mut next = self.next_general.lock();
        if *next as u32 + count > END_GENERAL_VECTOR as u32 {
            return None;
        }
        let base_number = *next;
        *next += count as u8;
        drop(next);

        for i in 0..count {
            let vector = &self.vectors[(base_number as u32 + i) as usize];
            *vector.irq.lock() = (irq_begin + i) as i32;
        }
        Some(&self.vectors[base_number as usize])
    }

    /// Liga um handler a um vetor reservado específico (exceções,
    /// syscall, spurious).
    pub fn register_interrupt(&self, number: u8, handler: InterruptHandler, arg: usize) {
        debug_assert!(
            number < BEGIN_GENERAL_VECTOR || number >= END_GENERAL_VECTOR,
            "vetor geral deve usar register_general_interrupt"
        );
        set_handler(self.vector(number), handler, arg);
    }
}

/// Liga `(handler, arg)` sem devolver o par anterior.
pub fn set_handler(vector: &InterruptVector, handler: InterruptHandler, arg: usize) {
    let mut slot = vector.slot.lock();
    slot.handler = handler;
    slot.arg = arg;
}

/// Troca handler e argumento de um vetor, devolvendo o par anterior.
/// Atômico em relação ao dispatch.
pub fn replace_handler(
    vector: &InterruptVector,
    handler: InterruptHandler,
    arg: usize,
) -> (InterruptHandler, usize) {
    let mut slot = vector.slot.lock();
    let old = (slot.handler, slot.arg);
    slot.handler = handler;
    slot.arg = arg;
    old
}

/// Tabela global (inicializada por `init`).
pub fn system_table() -> &'static InterruptTable {
    TABLE.get().expect("tabela de interrupcoes nao inicializada")
}

/// Inicializa a tabela de vetores, a IDT e os vetores de serviço
/// (spurious + halt). Chamado uma vez no BSP.
pub fn init() -> &'static InterruptTable {
    let table: &'static InterruptTable = TABLE.call_once(|| Box::leak(Box::new(InterruptTable::new())));

    unsafe {
        idt::init(SYSTEM_CALL_VECTOR);
        idt::load();
    }

    // Spurious: ignorar, sem EOI
    table.register_interrupt(SPURIOUS_VECTOR, spurious_handler, 0);

    // Vetor de parada para o protocolo de pânico
    table.register_interrupt(HALT_IPI_VECTOR, halt_handler, 0);

    crate::kinfo!("(INT) Tabela de vetores pronta, syscall=", SYSTEM_CALL_VECTOR);
    table
}

/// Carrega a IDT já construída no núcleo atual (APs).
pub fn load_on_ap() {
    unsafe { idt::load() };
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Dispatch central: chamado pelo trampolim comum com o frame salvo.
///
/// Mantém a contagem de aninhamento *por task* (o contador viaja com a
/// stack da task através de trocas de contexto).
pub fn dispatch(frame: &mut TrapFrame) {
    nest_enter();

    let (handler, arg) = {
        let table = match TABLE.get() {
            Some(t) => t,
            None => {
                // Exceção antes do init da tabela: fatal
                default_handler(frame, 0);
                nest_exit();
                return;
            }
        };
        let slot = table.vector(frame.vector as u8).slot.lock();
        (slot.handler, slot.arg)
    };

    handler(frame, arg);

    nest_exit();
}

/// Nível de aninhamento de interrupções da task atual: 0 = handler mais
/// externo. Usado pelo tick do timer para decidir se pode preemptar.
pub fn nest_level() -> u32 {
    current_nest().saturating_sub(1)
}

fn current_nest() -> u32 {
    crate::sched::scheduler::current_irq_nest()
}

fn nest_enter() {
    crate::sched::scheduler::adjust_irq_nest(1);
}

fn nest_exit() {
    crate::sched::scheduler::adjust_irq_nest(-1);
}

// =============================================================================
// HANDLERS DE SERVIÇO
// =============================================================================

fn spurious_handler(_frame: &mut TrapFrame, _arg: usize) {
    // Spurious interrupt não recebe EOI
}

fn halt_handler(_frame: &mut TrapFrame, _arg: usize) {
    crate::arch::Cpu::hang();
}

/// Pede aos demais núcleos que parem (protocolo de pânico).
/// Silencioso se o PIC local ainda não foi instalado.
pub fn stop_all_other_processors() {
    if let Some(table) = TABLE.get() {
        if let Some(pic) = crate::core::smp::percpu::try_processor_local_pic() {
            pic.interrupt_all_other(table.vector(HALT_IPI_VECTOR));
        }
    }
}

/// Handler default: dump do vetor e dos registradores, depois pânico.
fn default_handler(frame: &mut TrapFrame, _arg: usize) {
    use crate::drivers::console;

    crate::kerror!("(INT) Vetor sem handler: ", frame.vector);
    crate::kerror!("  eip=", frame.eip, " cs=", frame.cs);
    crate::kerror!("  eflags=", frame.eflags, " err=", frame.error_code);
    crate::kerror!("  eax=", frame.eax, " ebx=", frame.ebx);
    crate::kerror!("  ecx=", frame.ecx, " edx=", frame.edx);
    crate::kerror!("  esi=", frame.esi, " edi=", frame.edi);
    crate::kerror!("  ebp=", frame.ebp, " cr2=", crate::arch::Cpu::read_cr2());

    // Dump também no console (pode não haver serial conectada)
    unsafe {
        console::force_write(|c| {
            c.set_attr(console::PANIC_ATTR);
            c.write_str("\nEXCECAO: vetor ");
            c.write_hex32(frame.vector);
            c.write_str(" err ");
            c.write_hex32(frame.error_code);
            c.write_str(" eip ");
            c.write_hex32(frame.eip);
            c.write_str("\n");
        });
    }

    panic!("interrupcao sem handler");
}
