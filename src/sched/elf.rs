//! Loader de imagens ELF32 estáticas (EM_386, ET_EXEC).
//!
//! Semeia os segmentos PT_LOAD no espaço de usuário da task. Sem
//! relocação nem interpretador: apenas executáveis estáticos linkados
//! para o layout de usuário do kernel.

use crate::mm::vmm::UserSpace;
use crate::mm::{page_align_down, PAGE_SIZE};

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const CLASS_32: u8 = 1;
const DATA_LSB: u8 = 1;
const TYPE_EXEC: u16 = 2;
const MACHINE_386: u16 = 3;
const PT_LOAD: u32 = 1;

pub struct LoadedImage {
    pub entry: u32,
}

fn read_u16(image: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(
        image.get(offset..offset + 2)?.try_into().ok()?,
    ))
}

fn read_u32(image: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(
        image.get(offset..offset + 4)?.try_into().ok()?,
    ))
}

/// Valida o cabeçalho e mapeia os segmentos. `None` para imagens
/// inválidas ou exaustão de memória.
pub fn load(image: &[u8], user_space: &mut UserSpace) -> Option<LoadedImage> {
    if image.get(..4)? != &ELF_MAGIC[..]
        || *image.get(4)? != CLASS_32
        || *image.get(5)? != DATA_LSB
        || read_u16(image, 16)? != TYPE_EXEC
        || read_u16(image, 18)? != MACHINE_386
    {
        crate::kwarn!("(ELF) Imagem invalida");
        return None;
    }

    let entry = read_u32(image, 24)?;
    let ph_offset = read_u32(image, 28)? as usize;
    let ph_entry_size = read_u16(image, 42)? as usize;
    let ph_count = read_u16(image, 44)? as usize;

    for i in 0..ph_count {
        let ph = ph_offset + i * ph_entry_size;
        if read_u32(image, ph)? != PT_LOAD {
            continue;
        }
        let offset = read_u32(image, ph + 4)? as usize;
        let vaddr = read_u32(image, ph + 8)?;
        let file_size = read_u32(image, ph + 16)? as usize;
        let mem_size = read_u32(image, ph + 20)? as usize;

        if mem_size == 0 {
            continue;
        }

        let base = page_align_down(vaddr);
        let span = (vaddr - base) as usize + mem_size;
        let pages = (span + PAGE_SIZE - 1) / PAGE_SIZE;
        user_space.map_fixed(base, pages)?;

        let data = image.get(offset..offset + file_size)?;
        if !user_space.write(vaddr, data) {
            return None;
        }
        // O restante (bss) já está zerado: frames saem zerados do buddy
    }

    crate::kdebug!("(ELF) Carregado, entry=", entry);
    Some(LoadedImage { entry })
}
