//! Paginação i686 (dois níveis) e espaços de endereçamento de usuário.
//!
//! Layout linear:
//! - `[0, KERNEL_LINEAR_LIMIT)`: identity-map do kernel, presente em
//!   todos os diretórios (PDEs compartilhados, sem bit USER).
//! - acima disso: espaço do usuário, por diretório.
//!
//! As tabelas vivem em frames do buddy (identity-mapped), então podem ser
//! manipuladas diretamente pelo endereço físico.

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::arch::Cpu;
use crate::mm::{buddy, PhysAddr, VirtAddr, KERNEL_LINEAR_LIMIT, PAGE_SIZE};
use crate::sync::Once;

bitflags! {
    /// Flags de uma entrada de page table / page directory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
    }
}

const ENTRIES: usize = 1024;
const ADDR_MASK: u32 = 0xFFFF_F000;

/// Um diretório de páginas (CR3 candidato).
#[derive(Clone, Copy)]
pub struct PageDirectory {
    phys: PhysAddr,
}

static KERNEL_DIR: Once<PageDirectory> = Once::new();

#[inline]
fn dir_index(lin: VirtAddr) -> usize {
    (lin >> 22) as usize
}

#[inline]
fn table_index(lin: VirtAddr) -> usize {
    ((lin >> 12) & 0x3FF) as usize
}

/// Visão identity-mapped de um frame de tabela.
unsafe fn entries(phys: PhysAddr) -> &'static mut [u32; ENTRIES] {
    &mut *(phys as *mut [u32; ENTRIES])
}

/// Invalida uma entrada do TLB para o endereço dado.
#[inline]
fn invlpg(lin: VirtAddr) {
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) lin, options(nostack, preserves_flags));
    }
}

impl PageDirectory {
    /// Constrói o diretório do kernel: identity-map de
    /// `[0, KERNEL_LINEAR_LIMIT)` com PTEs de 4 KiB.
    fn new_kernel() -> Option<Self> {
        let dir = Self {
            phys: buddy::alloc_frames_zeroed(0)?,
        };
        let mut addr: u32 = 0;
        while addr < KERNEL_LINEAR_LIMIT {
            dir.map_page(addr, addr, PageFlags::PRESENT | PageFlags::WRITABLE)?;
            addr += PAGE_SIZE as u32;
        }
        Some(dir)
    }

    /// Novo diretório de usuário: compartilha os PDEs do kernel,
    /// restante vazio.
    pub fn new_user() -> Option<Self> {
        let kernel = kernel_directory();
        let dir = Self {
            phys: buddy::alloc_frames_zeroed(0)?,
        };
        unsafe {
            let src = entries(kernel.phys);
            let dst = entries(dir.phys);
            for i in 0..ENTRIES {
                if src[i] & PageFlags::PRESENT.bits() != 0 {
                    dst[i] = src[i];
                }
            }
        }
        Some(dir)
    }

    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    /// Mapeia uma página. Aloca a tabela intermediária se preciso.
    /// Retorna `None` em exaustão de memória.
    pub fn map_page(&self, lin: VirtAddr, phys: PhysAddr, flags: PageFlags) -> Option<()> {
        let pd = unsafe { entries(self.phys) };
        let pde = &mut pd[dir_index(lin)];

        if *pde & PageFlags::PRESENT.bits() == 0 {
            let table = buddy::alloc_frames_zeroed(0)?;
            // PDE com USER: a proteção final fica por conta da PTE
            *pde = table
                | (PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER).bits();
        }

        let table = unsafe { entries(*pde & ADDR_MASK) };
        table[table_index(lin)] = (phys & ADDR_MASK) | flags.bits();

        if Cpu::read_cr3() == self.phys {
            invlpg(lin);
        }
        Some(())
    }

    /// Remove o mapeamento de uma página (se existir).
    pub fn unmap_page(&self, lin: VirtAddr) {
        let pd = unsafe { entries(self.phys) };
        let pde = pd[dir_index(lin)];
        if pde & PageFlags::PRESENT.bits() == 0 {
            return;
        }
        let table = unsafe { entries(pde & ADDR_MASK) };
        table[table_index(lin)] = 0;
        if Cpu::read_cr3() == self.phys {
            invlpg(lin);
        }
    }

    /// Traduz um endereço linear para físico. `None` se não mapeado.
    pub fn translate_page(&self, lin: VirtAddr) -> Option<PhysAddr> {
        let pd = unsafe { entries(self.phys) };
        let pde = pd[dir_index(lin)];
        if pde & PageFlags::PRESENT.bits() == 0 {
            return None;
        }
        let table = unsafe { entries(pde & ADDR_MASK) };
        let pte = table[table_index(lin)];
        if pte & PageFlags::PRESENT.bits() == 0 {
            return None;
        }
        Some((pte & ADDR_MASK) | (lin & 0xFFF))
    }
}

/// Diretório do kernel (todo CR3 de task de kernel).
pub fn kernel_directory() -> PageDirectory {
    *KERNEL_DIR.get().expect("vmm nao inicializado")
}

/// CR3 padrão para tasks de kernel.
pub fn kernel_cr3() -> u32 {
    kernel_directory().phys
}

/// Mapeia uma página no espaço do kernel (ex.: MMIO do APIC).
///
/// Deve ser chamado antes da criação de espaços de usuário: PDEs novos
/// não se propagam para diretórios já clonados.
pub fn map_kernel_page(lin: VirtAddr, phys: PhysAddr, flags: PageFlags) -> Option<()> {
    kernel_directory().map_page(lin, phys, flags)
}

/// Constrói o diretório do kernel e liga a paginação (CR0.PG + CR0.WP).
pub fn init() {
    let dir = PageDirectory::new_kernel().expect("sem memoria para o diretorio do kernel");
    KERNEL_DIR.call_once(|| dir);

    unsafe {
        Cpu::write_cr3(dir.phys);
        let cr0 = Cpu::read_cr0() | (1 << 31) | (1 << 16); // PG | WP
        Cpu::write_cr0(cr0);
    }
    crate::kinfo!("(VMM) Paging ligado, CR3=", dir.phys);
}

// =============================================================================
// ESPAÇO DE USUÁRIO
// =============================================================================

/// Base dos blocos lineares alocados dinamicamente para o usuário.
const USER_BLOCK_BASE: u32 = 0x4000_0000;
/// Topo da stack de usuário.
pub const USER_STACK_TOP: u32 = 0x8000_0000;
/// Páginas de stack de usuário criadas por padrão.
const USER_STACK_PAGES: usize = 16;

struct UserBlock {
    base: u32,
    pages: usize,
}

/// Gerenciador de memória linear de uma task de usuário.
///
/// Possui o diretório de páginas e a lista de blocos mapeados; soltar o
/// `UserSpace` devolve tudo ao buddy (frames, tabelas próprias e o
/// diretório).
pub struct UserSpace {
    dir: PageDirectory,
    blocks: Vec<UserBlock>,
    next_base: u32,
}

impl UserSpace {
    pub fn new() -> Option<Self> {
        Some(Self {
            dir: PageDirectory::new_user()?,
            blocks: Vec::new(),
            next_base: USER_BLOCK_BASE,
        })
    }

    pub fn dir_phys(&self) -> PhysAddr {
        self.dir.phys()
    }

    /// Mapeia `pages` páginas novas a partir de `base` (fixo, usado pelo
    /// loader de ELF). Falha se a faixa invade o espaço do kernel.
    pub fn map_fixed(&mut self, base: u32, pages: usize) -> Option<u32> {
        if base < KERNEL_LINEAR_LIMIT {
            return None;
        }
        let base = crate::mm::page_align_down(base);
        for i in 0..pages {
            let lin = base + (i * PAGE_SIZE) as u32;
            // Segmentos adjacentes podem compartilhar uma página já
            // mapeada por um bloco anterior
            if self.dir.translate_page(lin).is_some() {
                continue;
            }
            let frame = buddy::alloc_frames_zeroed(0)?;
            self.dir.map_page(
                lin,
                frame,
                PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
            )?;
        }
        self.blocks.push(UserBlock { base, pages });
        Some(base)
    }

    /// Aloca um bloco linear de `pages` páginas (bump a partir de
    /// `USER_BLOCK_BASE`).
    pub fn allocate_block(&mut self, pages: usize) -> Option<u32> {
        let base = self.next_base;
        self.next_base += (pages * PAGE_SIZE) as u32;
        self.map_fixed(base, pages)
    }

    /// Cria a stack de usuário e retorna o topo inicial.
    pub fn create_stack(&mut self) -> Option<u32> {
        let base = USER_STACK_TOP - (USER_STACK_PAGES * PAGE_SIZE) as u32;
        self.map_fixed(base, USER_STACK_PAGES)?;
        Some(USER_STACK_TOP - 16)
    }

    /// Copia bytes para o espaço do usuário via tradução página a página.
    /// As páginas de destino precisam estar mapeadas.
    pub fn write(&self, dest: u32, data: &[u8]) -> bool {
        let mut offset = 0usize;
        while offset < data.len() {
            let lin = dest + offset as u32;
            let Some(phys) = self.dir.translate_page(lin) else {
                return false;
            };
            let page_rest = PAGE_SIZE - (lin as usize & (PAGE_SIZE - 1));
            let chunk = page_rest.min(data.len() - offset);
            unsafe {
                core::ptr::copy_nonoverlapping(
                    data.as_ptr().add(offset),
                    phys as *mut u8,
                    chunk,
                );
            }
            offset += chunk;
        }
        true
    }
}

impl Drop for UserSpace {
    fn drop(&mut self) {
        // 1. Frames dos blocos mapeados
        for block in &self.blocks {
            for i in 0..block.pages {
                let lin = block.base + (i * PAGE_SIZE) as u32;
                if let Some(phys) = self.dir.translate_page(lin) {
                    unsafe { buddy::free_frames(crate::mm::page_align_down(phys), 0) };
                    // Desmapear evita double-free quando blocos se sobrepõem
                    self.dir.unmap_page(lin);
                }
            }
        }
        // 2. Tabelas exclusivas deste espaço (PDEs que não são do kernel)
        let kernel = kernel_directory();
        unsafe {
            let kpd = entries(kernel.phys);
            let upd = entries(self.dir.phys);
            for i in 0..ENTRIES {
                let pde = upd[i];
                if pde & PageFlags::PRESENT.bits() != 0 && kpd[i] != pde {
                    buddy::free_frames(pde & ADDR_MASK, 0);
                }
            }
            // 3. O próprio diretório
            buddy::free_frames(self.dir.phys, 0);
        }
    }
}
