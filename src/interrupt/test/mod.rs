//! Testes da tabela de vetores e do 8259.

use crate::arch::x86::entry::TrapFrame;
use crate::interrupt::pic8259::{apply_mask, reset_sequence};
use crate::interrupt::{InterruptTable, BEGIN_GENERAL_VECTOR};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::{kassert, kassert_eq};

const INTERRUPT_TESTS: &[TestCase] = &[
    TestCase::new("alocacao_vetores_gerais", test_general_allocation),
    TestCase::new("irq_para_vetor", test_irq_mapping),
    TestCase::new("troca_de_handler", test_replace_handler),
    TestCase::new("sequencia_reset_8259", test_8259_reset_sequence),
    TestCase::new("mascara_8259", test_8259_mask),
];

pub fn run_interrupt_tests() {
    run_test_suite("Interrupt", INTERRUPT_TESTS);
}

fn nop_handler(_frame: &mut TrapFrame, _arg: usize) {}

/// Vetores gerais saem contíguos a partir de 32.
fn test_general_allocation() -> TestResult {
    let table = InterruptTable::new();

    let first = table.register_general_interrupt(nop_handler, 1);
    let second = table.register_general_interrupt(nop_handler, 2);
    kassert!(first.is_some() && second.is_some());
    kassert_eq!(first.unwrap().number(), BEGIN_GENERAL_VECTOR);
    kassert_eq!(second.unwrap().number(), BEGIN_GENERAL_VECTOR + 1);
    kassert!(first.unwrap().irq() == -1);

    TestResult::Pass
}

/// 16 IRQs contíguas, cada vetor marcado com a linha correspondente.
fn test_irq_mapping() -> TestResult {
    let table = InterruptTable::new();

    let base = table.register_irqs(0, 16).unwrap();
    kassert_eq!(base.number(), BEGIN_GENERAL_VECTOR);
    kassert_eq!(base.irq(), 0);

    let irq12 = table.vector_at(base, 12);
    kassert_eq!(irq12.number(), BEGIN_GENERAL_VECTOR + 12);
    kassert_eq!(irq12.irq(), 12);

    // Alocação geral continua depois da faixa de IRQs
    let next = table.register_general_interrupt(nop_handler, 0).unwrap();
    kassert_eq!(next.number(), BEGIN_GENERAL_VECTOR + 16);

    TestResult::Pass
}

/// `replace_handler` devolve o par anterior.
fn test_replace_handler() -> TestResult {
    let table = InterruptTable::new();
    let vector = table.register_general_interrupt(nop_handler, 0xAA).unwrap();

    let (_, old_arg) = crate::interrupt::replace_handler(vector, nop_handler, 0xBB);
    kassert_eq!(old_arg, 0xAA);
    let (_, new_arg) = crate::interrupt::replace_handler(vector, nop_handler, 0xCC);
    kassert_eq!(new_arg, 0xBB);

    TestResult::Pass
}

/// Sequência exata de ICW/OCW para base de vetor 0x20.
fn test_8259_reset_sequence() -> TestResult {
    let seq = reset_sequence(0x20);
    let expected: [(u16, u8); 12] = [
        (0x21, 0xFF),
        (0xA1, 0xFF),
        (0x20, 0x11),
        (0x21, 0x20),
        (0x21, 0x04),
        (0x21, 0x01),
        (0xA0, 0x11),
        (0xA1, 0x28),
        (0xA1, 0x02),
        (0xA1, 0x01),
        (0x21, 0xFF),
        (0xA1, 0xFF),
    ];

    let mut i = 0;
    while i < 12 {
        kassert_eq!(seq[i].0, expected[i].0);
        kassert_eq!(seq[i].1, expected[i].1);
        i += 1;
    }

    TestResult::Pass
}

/// Desmascarar a cascata (IRQ 2) a partir de tudo-mascarado dá 0xFB.
fn test_8259_mask() -> TestResult {
    kassert_eq!(apply_mask(0xFF, 2, false), 0xFB);
    kassert_eq!(apply_mask(0xFB, 2, true), 0xFF);
    // Linhas do slave usam o bit local (irq - 8)
    kassert_eq!(apply_mask(0xFF, 12, false), 0xEF);

    TestResult::Pass
}
