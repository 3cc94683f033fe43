//! # Kernel Heap Allocator
//!
//! Heap geral do kernel (`Box`, `Vec`, `Arc`), implementado pela crate
//! `linked_list_allocator` sobre uma região contígua cedida pelo buddy.
//!
//! O slab cobre objetos fixos de longa duração; o heap cobre as coleções
//! dinâmicas (filas do scheduler, tabelas de serviço, buffers).

use linked_list_allocator::LockedHeap;

use crate::mm::buddy;

/// Tamanho do heap do kernel (4 MiB: uma alocação de ordem máxima).
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Reserva a região e inicializa o alocador global.
///
/// Chamado uma única vez, no BSP, antes de qualquer uso de `alloc`.
pub fn init() {
    let region = buddy::alloc_frames(buddy::MAX_ORDER)
        .expect("sem memoria fisica para o heap do kernel");
    unsafe {
        ALLOCATOR.lock().init(region as *mut u8, HEAP_SIZE);
    }
    crate::kinfo!("(Heap) Inicializado em ", region, " tamanho=", HEAP_SIZE as u64);
}
