//! GDT (Global Descriptor Table) + TSS.
//!
//! Cada núcleo possui sua própria `SegmentTable` (GDT + TSS), pois o campo
//! ESP0 do TSS é o ponto de entrada de stack nas transições Ring 3 → Ring 0
//! e precisa apontar para a stack de kernel da task daquele núcleo.

use core::arch::asm;
use core::mem::size_of;

/// Entrada da GDT
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_middle: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    /// Cria nova entrada da GDT
    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_middle: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: ((limit >> 16) & 0x0F) as u8 | (flags & 0xF0),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    /// Entrada nula (obrigatória na posição 0)
    const fn null() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Task State Segment (32-bit).
///
/// Usamos apenas ESP0/SS0 (stack de kernel para trocas de privilégio).
/// Hardware task switching não é utilizado.
#[repr(C, packed)]
pub struct Tss {
    prev_task: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        // Zeroed, exceto iomap_base apontando para além do limite
        // (nenhum bitmap de I/O: acessos de Ring 3 a portas falham).
        Self {
            prev_task: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

// Seletores fixos (índice << 3 | RPL)
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
const TSS_SELECTOR: u16 = 0x28;

// Flags de acesso
const PRESENT: u8 = 1 << 7;
const RING_0: u8 = 0 << 5;
const RING_3: u8 = 3 << 5;
const SYSTEM: u8 = 1 << 4;
const EXECUTABLE: u8 = 1 << 3;
const READWRITE: u8 = 1 << 1;
const TSS_32_AVAILABLE: u8 = 0x9;

// Flags de granularidade
const SIZE_32: u8 = 1 << 6;
const PAGE_GRANULAR: u8 = 1 << 7;

/// GDT + TSS de um núcleo.
#[repr(C, align(16))]
pub struct SegmentTable {
    entries: [GdtEntry; 6],
    tss: Tss,
}

/// Ponteiro para GDT (usado pelo LGDT)
#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

impl SegmentTable {
    /// Cria uma GDT flat-model com segmentos de kernel/usuário e um TSS.
    /// O descritor do TSS é preenchido em `load` (precisa do endereço final).
    pub const fn new() -> Self {
        Self {
            entries: [
                GdtEntry::null(),
                // Kernel code (0x08): base 0, limite 4 GiB
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    PRESENT | RING_0 | SYSTEM | EXECUTABLE | READWRITE,
                    SIZE_32 | PAGE_GRANULAR,
                ),
                // Kernel data (0x10)
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    PRESENT | RING_0 | SYSTEM | READWRITE,
                    SIZE_32 | PAGE_GRANULAR,
                ),
                // User code (0x1B)
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    PRESENT | RING_3 | SYSTEM | EXECUTABLE | READWRITE,
                    SIZE_32 | PAGE_GRANULAR,
                ),
                // User data (0x23)
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    PRESENT | RING_3 | SYSTEM | READWRITE,
                    SIZE_32 | PAGE_GRANULAR,
                ),
                // TSS (0x28): preenchido em load()
                GdtEntry::null(),
            ],
            tss: Tss::new(),
        }
    }

    /// Carrega esta GDT no núcleo atual, recarrega os seletores e o TR.
    ///
    /// # Safety
    /// `self` deve viver para sempre no mesmo endereço (a CPU mantém o
    /// ponteiro no GDTR): na prática, alocada via `mm::new_one`.
    pub unsafe fn load(&mut self) {
        // Descritor do TSS agora que o endereço é definitivo
        let tss_base = core::ptr::addr_of!(self.tss) as u32;
        let tss_limit = (size_of::<Tss>() - 1) as u32;
        self.entries[(TSS_SELECTOR >> 3) as usize] =
            GdtEntry::new(tss_base, tss_limit, PRESENT | RING_0 | TSS_32_AVAILABLE, 0);

        let pointer = GdtPointer {
            limit: (size_of::<[GdtEntry; 6]>() - 1) as u16,
            base: self.entries.as_ptr() as u32,
        };

        asm!(
            "lgdt [{ptr}]",
            // Recarregar seletores de dados
            "mov ax, {kdata}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            // Recarregar CS via far return
            "push {kcode}",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            // Carregar Task Register
            "mov ax, {tss}",
            "ltr ax",
            ptr = in(reg) &pointer,
            kdata = const KERNEL_DATA_SELECTOR as u32,
            kcode = const KERNEL_CODE_SELECTOR as u32,
            tss = const TSS_SELECTOR as u32,
            out("eax") _,
            options(preserves_flags)
        );
    }

    /// Atualiza o ESP0 do TSS (stack de kernel da task que vai rodar).
    ///
    /// Chamado pelo scheduler a cada troca de contexto.
    pub fn set_tss_kernel_stack(&self, esp0: u32) {
        // O TSS é lido pelo hardware; escrita volátil evita reordenação.
        unsafe {
            let tss = core::ptr::addr_of!(self.tss) as *mut Tss;
            core::ptr::addr_of_mut!((*tss).esp0).write_volatile(esp0);
        }
    }

    pub fn kernel_code_selector(&self) -> u16 {
        KERNEL_CODE_SELECTOR
    }

    pub fn kernel_data_selector(&self) -> u16 {
        KERNEL_DATA_SELECTOR
    }
}
