//! Packed ELF32 header and program-header layouts, parsed with `zerocopy` instead of hand-rolled
//! bounds-checked field reads (see spec design note: "Packed structs... should use a serializer
//! that writes the exact encoding" — here we're on the *reading* side of the same idea).

use core::mem::size_of;

use snafu::{ensure, OptionExt};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{self, Result};

pub const EI_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
pub const ELFCLASS32: u8 = 1;
pub const ELFDATA2LSB: u8 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_ARM: u16 = 40;
pub const EV_CURRENT: u32 = 1;

pub const PT_LOAD: u32 = 1;
pub const PT_ARM_EXIDX: u32 = 0x7000_0001;

/// The ELF32 file header, exactly as laid out in `original_source/src/elf.h`'s `elf_ehdr_t`.
#[derive(FromBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Ehdr {
    pub ident_magic: [u8; 4],
    pub ident_class: u8,
    pub ident_data: u8,
    pub ident_version: u8,
    pub ident_osabi: u8,
    pub ident_abiversion: u8,
    pub ident_pad: [u8; 7],
    pub e_type: U16,
    pub machine: U16,
    pub version: U32,
    pub entry: U32,
    pub phoff: U32,
    pub shoff: U32,
    pub flags: U32,
    pub ehsize: U16,
    pub phentsize: U16,
    pub phnum: U16,
    pub shentsize: U16,
    pub shnum: U16,
    pub shstrndx: U16,
}

/// The ELF32 program header, exactly as laid out in `original_source/src/elf.h`'s `elf_phdr_t`.
#[derive(FromBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Phdr {
    pub p_type: U32,
    pub offset: U32,
    pub vaddr: U32,
    pub paddr: U32,
    pub filesz: U32,
    pub memsz: U32,
    pub flags: U32,
    pub align: U32,
}

impl Elf32Ehdr {
    /// Parses and validates the ELF32 header at the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the file is truncated or any of the magic/class/endianness/type/machine/
    /// version fields don't match what this platform requires (spec §4.G, §6).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let ehdr = Self::read_from_bytes(data.get(..size_of::<Self>()).context(error::TruncatedSnafu)?)
            .expect("slice length matches Self's size");

        ensure!(ehdr.ident_magic == EI_MAGIC, error::InvalidMagicSnafu);
        ensure!(ehdr.ident_class == ELFCLASS32, error::UnsupportedClassSnafu);
        ensure!(ehdr.ident_data == ELFDATA2LSB, error::UnsupportedEndianSnafu);
        ensure!(ehdr.e_type.get() == ET_EXEC, error::UnsupportedTypeSnafu);
        ensure!(ehdr.machine.get() == EM_ARM, error::UnsupportedMachineSnafu);
        ensure!(ehdr.version.get() == EV_CURRENT, error::UnsupportedVersionSnafu);

        Ok(ehdr)
    }

    /// Returns the program headers described by this ELF header, parsed out of `data`.
    ///
    /// # Errors
    /// Returns [`Truncated`](error::Error::Truncated) if `data` does not contain `phnum` headers of
    /// `phentsize` bytes each starting at `phoff`.
    pub fn program_headers<'d>(&self, data: &'d [u8]) -> Result<Vec<Elf32Phdr>> {
        let phoff = self.phoff.get() as usize;
        let phentsize = self.phentsize.get() as usize;
        let phnum = self.phnum.get() as usize;

        let mut headers = Vec::with_capacity(phnum);
        for index in 0..phnum {
            let start = phoff + index * phentsize;
            let end = start.checked_add(size_of::<Elf32Phdr>()).context(error::TruncatedSnafu)?;
            let bytes: &'d [u8] = data.get(start..end).context(error::TruncatedSnafu)?;
            headers.push(Elf32Phdr::read_from_bytes(bytes).expect("slice length matches Self's size"));
        }
        Ok(headers)
    }
}
