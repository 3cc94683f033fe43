//! Testes de memória (buddy, slab, paginação).

use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::mm::vmm::{kernel_directory, PageFlags};
use crate::mm::{buddy, slab, PAGE_SIZE};
use crate::{kassert, kassert_eq};

const MM_TESTS: &[TestCase] = &[
    TestCase::new("buddy_aloca_e_devolve", test_buddy_roundtrip),
    TestCase::new("buddy_alinhamento", test_buddy_alignment),
    TestCase::new("slab_reuso_lifo", test_slab_reuse),
    TestCase::new("slab_new_one", test_slab_new_one),
    TestCase::new("vmm_traducao", test_vmm_translate),
];

pub fn run_mm_tests() {
    run_test_suite("MM", MM_TESTS);
}

/// Alocações distintas, e o free devolve os bytes ao contador.
fn test_buddy_roundtrip() -> TestResult {
    let before = buddy::free_bytes();

    let a = buddy::alloc_frames(0).unwrap();
    let b = buddy::alloc_frames(0).unwrap();
    kassert!(a != b);
    kassert_eq!(buddy::free_bytes(), before - 2 * PAGE_SIZE);

    unsafe {
        buddy::free_frames(a, 0);
        buddy::free_frames(b, 0);
    }
    kassert_eq!(buddy::free_bytes(), before);

    TestResult::Pass
}

/// Blocos de ordem N saem alinhados a 2^N páginas.
fn test_buddy_alignment() -> TestResult {
    let block = buddy::alloc_frames(3).unwrap();
    kassert_eq!(block as usize % (PAGE_SIZE << 3), 0usize);
    unsafe { buddy::free_frames(block, 3) };

    TestResult::Pass
}

/// A free list da classe é LIFO: liberar e realocar devolve o mesmo bloco.
fn test_slab_reuse() -> TestResult {
    let a = slab::alloc_raw(64);
    kassert!(!a.is_null());
    unsafe { slab::free_raw(a, 64) };
    let b = slab::alloc_raw(64);
    kassert!(a == b);
    unsafe { slab::free_raw(b, 64) };

    TestResult::Pass
}

/// new_one devolve referência estável e inicializada.
fn test_slab_new_one() -> TestResult {
    let value = slab::new_one::<u64>(0xDEAD_BEEF).unwrap();
    kassert_eq!(*value, 0xDEAD_BEEFu64);
    kassert_eq!(value as *const u64 as usize % core::mem::align_of::<u64>(), 0usize);

    let array = slab::new_array::<u32>(8).unwrap();
    kassert_eq!(array.len(), 8usize);
    kassert_eq!(array[7], 0u32);

    TestResult::Pass
}

/// map → translate → unmap numa janela linear fora do identity-map.
fn test_vmm_translate() -> TestResult {
    const PROBE: u32 = 0xE000_0000;
    let dir = kernel_directory();

    let frame = buddy::alloc_frames(0).unwrap();
    kassert!(dir.translate_page(PROBE).is_none());

    dir.map_page(PROBE, frame, PageFlags::PRESENT | PageFlags::WRITABLE)
        .unwrap();
    kassert_eq!(dir.translate_page(PROBE).unwrap(), frame);
    kassert_eq!(dir.translate_page(PROBE + 0x123).unwrap(), frame + 0x123);

    dir.unmap_page(PROBE);
    kassert!(dir.translate_page(PROBE).is_none());
    unsafe { buddy::free_frames(frame, 0) };

    TestResult::Pass
}
