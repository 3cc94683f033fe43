//! Testes da tabela de syscalls e do registro de serviços.

use crate::arch::x86::entry::TrapFrame;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::syscall::numbers::{SYSCALL_SERVICE_BEGIN, SYSCALL_SERVICE_END, SYSCALL_SUSPEND};
use crate::syscall::service::{ServiceNameError, ServiceRegistry};
use crate::syscall::table::SystemCallTable;
use crate::{kassert, kassert_eq};

const SYSCALL_TESTS: &[TestCase] = &[
    TestCase::new("slot_reservado", test_reserved_slot),
    TestCase::new("registro_e_consulta", test_register_query),
    TestCase::new("nome_invalido", test_invalid_name),
    TestCase::new("nome_duplicado", test_duplicate_name),
    TestCase::new("slots_esgotados", test_too_many_services),
];

pub fn run_syscall_tests() {
    run_test_suite("Syscall", SYSCALL_TESTS);
}

fn nop_syscall(_frame: &mut TrapFrame, _arg: usize) {}

/// Slot reservado aceita um registro e o expõe via get.
fn test_reserved_slot() -> TestResult {
    let table = SystemCallTable::new();
    kassert!(table.get(SYSCALL_SUSPEND).is_none());

    table.register_system_call(SYSCALL_SUSPEND, nop_syscall, 5);
    let (_, arg) = table.get(SYSCALL_SUSPEND).unwrap();
    kassert_eq!(arg, 5usize);

    TestResult::Pass
}

/// query(nome) devolve o slot retornado pelo register.
fn test_register_query() -> TestResult {
    let table = SystemCallTable::new();
    let registry = ServiceRegistry::new();

    let slot = registry.register(&table, "teclado", nop_syscall, 0).unwrap();
    kassert_eq!(slot as usize, SYSCALL_SERVICE_BEGIN);
    kassert_eq!(registry.query("teclado").unwrap(), slot);
    kassert!(registry.query("mouse").is_none());

    // O slot ficou de fato ligado na tabela
    kassert!(table.get(slot as usize).is_some());

    TestResult::Pass
}

/// Vazio e >15 bytes são rejeitados.
fn test_invalid_name() -> TestResult {
    let table = SystemCallTable::new();
    let registry = ServiceRegistry::new();

    kassert!(matches!(
        registry.register(&table, "", nop_syscall, 0),
        Err(ServiceNameError::InvalidName)
    ));
    kassert!(matches!(
        registry.register(&table, "nome-grande-demais", nop_syscall, 0),
        Err(ServiceNameError::InvalidName)
    ));
    // 15 bytes é o máximo válido
    kassert!(registry.register(&table, "123456789012345", nop_syscall, 0).is_ok());

    TestResult::Pass
}

/// Reregistrar o mesmo nome falha sem consumir slot.
fn test_duplicate_name() -> TestResult {
    let table = SystemCallTable::new();
    let registry = ServiceRegistry::new();

    let slot = registry.register(&table, "disco", nop_syscall, 0).unwrap();
    kassert!(matches!(
        registry.register(&table, "disco", nop_syscall, 0),
        Err(ServiceNameError::ServiceExisting)
    ));
    kassert_eq!(registry.query("disco").unwrap(), slot);

    TestResult::Pass
}

/// Os 16 slots de serviço esgotam e o 17º registro falha.
fn test_too_many_services() -> TestResult {
    let table = SystemCallTable::new();
    let registry = ServiceRegistry::new();

    let names = [
        "s00", "s01", "s02", "s03", "s04", "s05", "s06", "s07", "s08", "s09", "s10", "s11",
        "s12", "s13", "s14", "s15",
    ];
    for (i, name) in names.iter().enumerate() {
        let slot = registry.register(&table, name, nop_syscall, 0).unwrap();
        kassert_eq!(slot as usize, SYSCALL_SERVICE_BEGIN + i);
    }
    kassert_eq!(
        SYSCALL_SERVICE_BEGIN + names.len(),
        SYSCALL_SERVICE_END
    );
    kassert!(matches!(
        registry.register(&table, "s16", nop_syscall, 0),
        Err(ServiceNameError::TooManyService)
    ));

    TestResult::Pass
}
