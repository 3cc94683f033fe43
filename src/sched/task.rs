//! Task Control Block e criação de tasks.
//!
//! Uma task é identificada pelo endereço estável do seu registro
//! (`Pin<Box<Task>>`): a posse do box circula entre a task corrente do
//! núcleo, as filas de prontos e as filas de espera de semáforos, mas o
//! registro em si nunca muda de endereço.

use alloc::boxed::Box;
use alloc::vec;
use core::cell::Cell;
use core::pin::Pin;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::x86::entry::TrapFrame;
use crate::arch::Cpu;
use crate::mm::vmm::{self, UserSpace};
use crate::sched::config::{KERNEL_STACK_SIZE, NUMBER_OF_PRIORITIES};
use crate::sched::scheduler::TaskManager;
use crate::sched::switch::CpuContext;

pub type Tid = u32;

/// Contador global de TIDs.
static NEXT_TID: AtomicU32 = AtomicU32::new(1);

/// Estado de uma task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Fora das filas; espera um `resume` (estado inicial e de bloqueio).
    Suspended,
    /// Na fila de prontos do seu núcleo.
    Ready,
    /// Ocupando a CPU.
    Running,
    /// Morta; recursos sendo reclamados.
    Terminated,
}

impl TaskState {
    pub const fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

/// Como a task começa a executar no primeiro dispatch.
#[derive(Clone, Copy)]
pub enum TaskEntry {
    /// Função de kernel; terminada automaticamente no retorno.
    Kernel { entry: fn(usize), arg: usize },
    /// Loader de task de usuário: roda em modo kernel, deve inicializar
    /// o espaço de usuário e entrar em Ring 3 por conta própria.
    Loader { loader: fn(usize) -> !, arg: usize },
    /// Entrada direta em Ring 3 (espaço já semeado na criação).
    User { eip: u32, esp: u32 },
    /// Task Virtual-8086 (rotinas de BIOS).
    V8086 { cs: u16, ip: u16 },
    /// O fluxo de boot adotado como idle do núcleo.
    BootIdle,
}

/// Handler de syscall definido pela task (slot TASK_DEFINED).
pub type TaskTrapHandler = fn(&mut TrapFrame, usize);

/// Task Control Block
pub struct Task {
    tid: Tid,
    /// Nome (debug)
    pub name: [u8; 32],
    /// Prioridade (0 = maior)
    pub priority: u8,
    /// Estado atual
    pub state: TaskState,
    /// Contexto de CPU salvo
    pub context: CpuContext,
    /// Stack de kernel (None apenas para a task de boot adotada)
    kernel_stack: Option<Box<[u8]>>,
    /// Diretório de páginas ativo quando esta task roda
    pub cr3: u32,
    /// Gerenciador de memória linear (apenas tasks de usuário)
    pub user_space: Option<UserSpace>,
    /// Ponto de entrada
    pub entry: TaskEntry,
    /// Handler do syscall TASK_DEFINED, se instalado
    pub trap_handler: Option<(TaskTrapHandler, usize)>,
    /// Nível de aninhamento de interrupções desta task (viaja com a
    /// stack da task através de trocas de contexto)
    pub irq_nest: Cell<u32>,
    /// Núcleo dono: `resume` devolve a task para a fila de prontos dele
    home: &'static TaskManager,
}

impl Task {
    fn name_buf(name: &str) -> [u8; 32] {
        let mut buf = [0u8; 32];
        let bytes = name.as_bytes();
        let len = bytes.len().min(31);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    fn new_common(
        name: &str,
        priority: u8,
        entry: TaskEntry,
        cr3: u32,
        user_space: Option<UserSpace>,
        home: &'static TaskManager,
    ) -> Option<Pin<Box<Task>>> {
        debug_assert!((priority as usize) < NUMBER_OF_PRIORITIES);

        let stack = vec![0u8; KERNEL_STACK_SIZE].into_boxed_slice();
        let stack_top = stack.as_ptr() as u32 + stack.len() as u32;

        let mut task = Box::pin(Task {
            tid: NEXT_TID.fetch_add(1, Ordering::Relaxed),
            name: Self::name_buf(name),
            priority,
            state: TaskState::Suspended,
            context: CpuContext::new(),
            kernel_stack: Some(stack),
            cr3,
            user_space,
            entry,
            trap_handler: None,
            irq_nest: Cell::new(0),
            home,
        });

        unsafe {
            Pin::get_unchecked_mut(task.as_mut())
                .context
                .setup_initial(stack_top);
        }
        Some(task)
    }

    /// Adota o fluxo de boot do núcleo como task idle (sem stack própria:
    /// continua na stack de boot; o contexto é preenchido no primeiro
    /// switch para outra task).
    pub(super) fn adopt_boot(name: &str, home: &'static TaskManager) -> Pin<Box<Task>> {
        Box::pin(Task {
            tid: NEXT_TID.fetch_add(1, Ordering::Relaxed),
            name: Self::name_buf(name),
            priority: crate::sched::config::PRIORITY_IDLE,
            state: TaskState::Running,
            context: CpuContext::new(),
            kernel_stack: None,
            cr3: vmm::kernel_cr3(),
            user_space: None,
            entry: TaskEntry::BootIdle,
            trap_handler: None,
            irq_nest: Cell::new(0),
            home,
        })
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn home(&self) -> &'static TaskManager {
        self.home
    }

    pub fn set_ready(&mut self) {
        self.state = TaskState::Ready;
    }

    pub fn set_running(&mut self) {
        self.state = TaskState::Running;
    }

    pub fn set_suspended(&mut self) {
        self.state = TaskState::Suspended;
    }

    pub fn set_terminated(&mut self) {
        self.state = TaskState::Terminated;
    }

    /// Instala o handler do syscall TASK_DEFINED desta task.
    pub fn set_task_defined_handler(&mut self, handler: TaskTrapHandler, arg: usize) {
        self.trap_handler = Some((handler, arg));
    }

    /// Devolve toda a memória de usuário ao sistema (terminação).
    pub fn release_user_memory(&mut self) {
        if let Some(user_space) = self.user_space.take() {
            // O CR3 desta task morre junto: voltar ao diretório do
            // kernel ANTES de devolver o diretório ao buddy.
            self.cr3 = vmm::kernel_cr3();
            unsafe { Cpu::write_cr3(self.cr3) };
            drop(user_space);
        }
    }

    /// Aplica o estado de hardware da task (TSS, CR3) na CPU atual.
    ///
    /// # Safety
    /// Chamar com interrupções desabilitadas, imediatamente antes do
    /// switch para esta task.
    pub unsafe fn apply_hardware_state(&self) {
        if let Some(stack) = &self.kernel_stack {
            let top = stack.as_ptr() as u32 + stack.len() as u32;
            crate::core::smp::percpu::processor_local_gdt().set_tss_kernel_stack(top);
        }
        if Cpu::read_cr3() != self.cr3 {
            Cpu::write_cr3(self.cr3);
        }
    }
}

// =============================================================================
// CRIAÇÃO
// =============================================================================
//
// Todas retornam a task em SUSPENDED; ela só roda depois de
// `scheduler::resume`. `None` = exaustão de memória (o caller propaga).

fn current_home() -> &'static TaskManager {
    crate::core::smp::percpu::processor_local_task_manager()
}

/// Task de kernel: roda `entry(arg)` em Ring 0 com o diretório do kernel.
pub fn create_kernel_task(
    name: &str,
    entry: fn(usize),
    arg: usize,
    priority: u8,
) -> Option<Pin<Box<Task>>> {
    create_kernel_task_on(current_home(), name, entry, arg, priority)
}

/// Variante com o núcleo dono explícito (bringup e self-tests).
pub(crate) fn create_kernel_task_on(
    home: &'static TaskManager,
    name: &str,
    entry: fn(usize),
    arg: usize,
    priority: u8,
) -> Option<Pin<Box<Task>>> {
    Task::new_common(
        name,
        priority,
        TaskEntry::Kernel { entry, arg },
        vmm::kernel_cr3(),
        None,
        home,
    )
}

/// Task de usuário sem loader: nasce com espaço de endereçamento e
/// stack prontos e entra direto em Ring 3 no `entry` dado (o código em
/// `entry` precisa ter sido mapeado pelo criador).
pub fn create_user_task_without_loader(
    name: &str,
    entry: u32,
    priority: u8,
) -> Option<Pin<Box<Task>>> {
    let mut user_space = UserSpace::new()?;
    let esp = user_space.create_stack()?;
    let cr3 = user_space.dir_phys();

    Task::new_common(
        name,
        priority,
        TaskEntry::User { eip: entry, esp },
        cr3,
        Some(user_space),
        current_home(),
    )
}

/// Task de usuário com loader: `loader(arg)` roda primeiro, em modo
/// kernel, e deve inicializar o gerenciador de memória linear da task
/// (via `setup_current_user_space`) antes de entrar em Ring 3.
pub fn create_user_task(
    name: &str,
    loader: fn(usize) -> !,
    arg: usize,
    priority: u8,
) -> Option<Pin<Box<Task>>> {
    Task::new_common(
        name,
        priority,
        TaskEntry::Loader { loader, arg },
        vmm::kernel_cr3(),
        None,
        current_home(),
    )
}

/// Task de usuário a partir de uma imagem ELF32 em memória: o espaço de
/// endereçamento é criado e semeado agora; a task nasce pronta para
/// entrar em Ring 3.
pub fn create_user_task_from_elf(
    name: &str,
    image: &[u8],
    priority: u8,
) -> Option<Pin<Box<Task>>> {
    let mut user_space = UserSpace::new()?;
    let loaded = crate::sched::elf::load(image, &mut user_space)?;
    let esp = user_space.create_stack()?;
    let cr3 = user_space.dir_phys();

    Task::new_common(
        name,
        priority,
        TaskEntry::User {
            eip: loaded.entry,
            esp,
        },
        cr3,
        Some(user_space),
        current_home(),
    )
}

/// Task Virtual-8086: executa o código de modo real em `cs:ip`
/// (empacotado como `cs << 16 | ip`) com a janela de stack reservada.
pub fn create_v8086_task(name: &str, cs_ip: u32, priority: u8) -> Option<Pin<Box<Task>>> {
    let (cs, ip) = crate::arch::x86::v8086::split_cs_ip(cs_ip);
    Task::new_common(
        name,
        priority,
        TaskEntry::V8086 { cs, ip },
        vmm::kernel_cr3(),
        None,
        current_home(),
    )
}

/// Cria e anexa o espaço de usuário da task atual (chamado por loaders).
/// Troca o CR3 imediatamente para o novo diretório.
pub fn setup_current_user_space() -> bool {
    let Some(user_space) = UserSpace::new() else {
        return false;
    };
    let cr3 = user_space.dir_phys();
    crate::sched::scheduler::with_current(|task| {
        task.user_space = Some(user_space);
        task.cr3 = cr3;
    });
    unsafe { Cpu::write_cr3(cr3) };
    true
}
