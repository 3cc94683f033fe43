//! Driver de Teclado PS/2: o exemplar de "driver como task".
//!
//! O handler da IRQ 1 só faz o mínimo: lê o scancode, empurra na FIFO e
//! dá release no semáforo. A task do driver consome a FIFO, traduz para
//! ASCII e publica o serviço nomeado `"keyboard"` na tabela de syscalls
//! (consulta não-bloqueante; retorna `IO_REQUEST_FAILURE` sem tecla).

use crate::arch::x86::entry::TrapFrame;
use crate::arch::x86::ports::inb;
use crate::interrupt::pic::KEYBOARD_IRQ;
use crate::interrupt::Pic;
use crate::klib::Fifo;
use crate::sched::config::PRIORITY_DRIVER;
use crate::sched::{scheduler, task};
use crate::sync::{Lazy, Semaphore, Spinlock};
use crate::syscall;

const PS2_DATA_PORT: u16 = 0x60;

/// Scancodes crus vindos da IRQ.
static SCANCODES: Lazy<Spinlock<Fifo<u8>>> = Lazy::new(|| Spinlock::new(Fifo::new(128)));
/// Caracteres traduzidos prontos para o serviço.
static CHARS: Lazy<Spinlock<Fifo<u8>>> = Lazy::new(|| Spinlock::new(Fifo::new(128)));
/// Sinaliza scancodes pendentes para a task do driver.
static KBD_SEM: Semaphore = Semaphore::new(0);

/// Tradução parcial do scancode set 1 (make codes) para ASCII,
/// sem modificadores.
static SET1_ASCII: [u8; 0x3A] = [
    0, 27, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 8, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a',
    b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x',
    b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

fn keyboard_irq_handler(frame: &mut TrapFrame, _arg: usize) {
    let scancode = unsafe { inb(PS2_DATA_PORT) };
    SCANCODES.lock().push(scancode);
    KBD_SEM.release();

    let pic = crate::core::smp::percpu::processor_local_pic();
    pic.end_of_interrupt(crate::interrupt::system_table().vector(frame.vector as u8));
}

/// Corpo da task do driver.
fn keyboard_task(_arg: usize) {
    match syscall::register_system_service("keyboard", sys_read_key, 0) {
        Ok(slot) => crate::kinfo!("(PS2) Servico keyboard no slot ", slot),
        Err(_) => {
            crate::kerror!("(PS2) Falha ao registrar servico keyboard");
            return;
        }
    }

    loop {
        KBD_SEM.acquire();
        let Some(scancode) = SCANCODES.lock().pop() else {
            continue;
        };
        // Ignorar break codes (bit 7)
        if scancode & 0x80 != 0 {
            continue;
        }
        let ascii = SET1_ASCII
            .get(scancode as usize)
            .copied()
            .unwrap_or(0);
        if ascii != 0 {
            CHARS.lock().push(ascii);
            crate::ktrace!("(PS2) Tecla ascii=", ascii);
        }
    }
}

/// Serviço "keyboard": EAX ← próximo caractere, ou IO_REQUEST_FAILURE.
fn sys_read_key(frame: &mut TrapFrame, _arg: usize) {
    frame.eax = match CHARS.lock().pop() {
        Some(c) => c as u32,
        None => syscall::IO_REQUEST_FAILURE,
    };
}

/// Liga o handler da IRQ 1, cria a task do driver e desmascara a linha.
pub fn init(pic: &'static dyn Pic) {
    // Materializar as FIFOs agora: o handler de IRQ não pode alocar
    Lazy::force(&SCANCODES);
    Lazy::force(&CHARS);

    // Dreno de qualquer byte pendente do controlador
    unsafe {
        let _ = inb(PS2_DATA_PORT);
    }

    let vector = pic.irq_to_vector(KEYBOARD_IRQ);
    crate::interrupt::set_handler(vector, keyboard_irq_handler, 0);

    match task::create_kernel_task("ps2-keyboard", keyboard_task, 0, PRIORITY_DRIVER) {
        Some(task) => scheduler::resume(task),
        None => {
            crate::kerror!("(PS2) Sem memoria para a task do driver");
            return;
        }
    }

    pic.set_mask(KEYBOARD_IRQ, false);
    crate::kinfo!("(PS2) Teclado ativo, vetor=", vector.number());
}
