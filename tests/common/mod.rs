// Builds a small but structurally faithful PDB in memory, mirroring the
// debug output of testdata/minimal.cpp: an MSF container with an info
// stream, a hashed type stream describing `struct Yolo`, and a DBI stream
// pointing at symbol records and section headers.

use pdbview::codeview::{call, leaf, sym};
use pdbview::hash::name_hash_v1;
use pdbview::info::VC70;
use pdbview::msf::MAGIC;

pub const PAGE_SIZE: u32 = 512;
pub const BUCKET_COUNT: u32 = 0x3ffff;
pub const SIGNATURE: u32 = 1_700_000_000;
pub const GUID: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

pub const IMAGE_BASE: u64 = 0x1_4000_0000;
pub const TEXT_RVA: u32 = 0x1000;
pub const DATA_RVA: u32 = 0x3000;

pub fn p16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn p32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Length-prefixed type record, padded to four bytes with 0xF0|n bytes the
/// way the MSVC type writer pads.
pub fn type_record(leaf_id: u16, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    p16(&mut payload, leaf_id);
    payload.extend_from_slice(body);
    let over = (payload.len() + 2) % 4;
    if over != 0 {
        for n in (1..=(4 - over)).rev() {
            payload.push(0xf0 | n as u8);
        }
    }
    let mut out = Vec::new();
    p16(&mut out, payload.len() as u16);
    out.extend_from_slice(&payload);
    out
}

/// Length-prefixed symbol record, zero padded to four bytes.
pub fn sym_record(kind: u16, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    p16(&mut payload, kind);
    payload.extend_from_slice(body);
    while (payload.len() + 2) % 4 != 0 {
        payload.push(0);
    }
    let mut out = Vec::new();
    p16(&mut out, payload.len() as u16);
    out.extend_from_slice(&payload);
    out
}

fn data_sym(kind: u16, type_index: u32, offset: u32, segment: u16, name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    p32(&mut body, type_index);
    p32(&mut body, offset);
    p16(&mut body, segment);
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    sym_record(kind, &body)
}

fn pub_sym(flags: u32, offset: u32, segment: u16, name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    p32(&mut body, flags);
    p32(&mut body, offset);
    p16(&mut body, segment);
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    sym_record(sym::S_PUB32, &body)
}

pub struct MsfBuilder {
    streams: Vec<Vec<u8>>,
}

impl MsfBuilder {
    pub fn new() -> Self {
        Self { streams: Vec::new() }
    }

    pub fn stream(&mut self, data: Vec<u8>) -> u16 {
        self.streams.push(data);
        (self.streams.len() - 1) as u16
    }

    pub fn finish(self) -> Vec<u8> {
        // page 0 is the superblock, filled in last
        let mut pages: Vec<Vec<u8>> = vec![vec![0; PAGE_SIZE as usize]];

        let stream_pages: Vec<Vec<u32>> = self
            .streams
            .iter()
            .map(|stream| alloc_pages(&mut pages, stream))
            .collect();

        let mut directory = Vec::new();
        p32(&mut directory, self.streams.len() as u32);
        for stream in &self.streams {
            p32(&mut directory, stream.len() as u32);
        }
        for list in &stream_pages {
            for &page in list {
                p32(&mut directory, page);
            }
        }
        let directory_pages = alloc_pages(&mut pages, &directory);

        let mut index = Vec::new();
        for &page in &directory_pages {
            p32(&mut index, page);
        }
        let index_pages = alloc_pages(&mut pages, &index);

        let mut superblock = Vec::new();
        superblock.extend_from_slice(MAGIC);
        p32(&mut superblock, PAGE_SIZE);
        p32(&mut superblock, 1); // free page map
        p32(&mut superblock, pages.len() as u32);
        p32(&mut superblock, directory.len() as u32);
        p32(&mut superblock, 0); // reserved
        for &page in &index_pages {
            p32(&mut superblock, page);
        }
        superblock.resize(PAGE_SIZE as usize, 0);
        pages[0] = superblock;

        pages.concat()
    }
}

fn alloc_pages(pages: &mut Vec<Vec<u8>>, data: &[u8]) -> Vec<u32> {
    let mut numbers = Vec::new();
    for chunk in data.chunks(PAGE_SIZE as usize) {
        let mut page = chunk.to_vec();
        page.resize(PAGE_SIZE as usize, 0);
        numbers.push(pages.len() as u32);
        pages.push(page);
    }
    numbers
}

fn build_info() -> Vec<u8> {
    let mut out = Vec::new();
    p32(&mut out, VC70);
    p32(&mut out, SIGNATURE);
    p32(&mut out, 1); // age
    out.extend_from_slice(&GUID);
    p32(&mut out, 0); // empty named-stream buffer
    out
}

// Dynamic type indices, in record order.
pub const TI_CHAR_PTR_PTR: u32 = 0x1000;
pub const TI_ARGLIST: u32 = 0x1001;
pub const TI_ENTRY_PROC: u32 = 0x1002;
pub const TI_YOLO_FIELDS: u32 = 0x1003;
pub const TI_YOLO: u32 = 0x1004;

// Primitive indices the records refer to.
pub const TI_CHAR_PTR: u32 = 0x0670;
pub const TI_INT: u32 = 0x0074;
pub const TI_FLOAT: u32 = 0x0040;
pub const TI_DOUBLE_PTR: u32 = 0x0641;

fn member(field_type: u32, offset: u16, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    p16(&mut out, leaf::LF_MEMBER);
    p16(&mut out, 3); // public access
    p32(&mut out, field_type);
    p16(&mut out, offset); // inline numeric leaf
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out
}

fn build_tpi(hash_stream: u16) -> Vec<u8> {
    let mut records = Vec::new();

    // 0x1000: char**
    let mut body = Vec::new();
    p32(&mut body, TI_CHAR_PTR);
    p32(&mut body, 0x0c | (8 << 13)); // 64-bit pointer, 8 bytes
    records.extend_from_slice(&type_record(leaf::LF_POINTER, &body));

    // 0x1001: ()
    let mut body = Vec::new();
    p32(&mut body, 0);
    records.extend_from_slice(&type_record(leaf::LF_ARGLIST, &body));

    // 0x1002: int __stdcall ()
    let mut body = Vec::new();
    p32(&mut body, TI_INT);
    body.push(call::NEAR_STD);
    body.push(0);
    p16(&mut body, 0);
    p32(&mut body, TI_ARGLIST);
    records.extend_from_slice(&type_record(leaf::LF_PROCEDURE, &body));

    // 0x1003: the members of Yolo
    let mut body = Vec::new();
    body.extend_from_slice(&member(TI_INT, 0, "x"));
    body.extend_from_slice(&member(TI_FLOAT, 4, "y"));
    body.extend_from_slice(&member(TI_DOUBLE_PTR, 8, "z"));
    records.extend_from_slice(&type_record(leaf::LF_FIELDLIST, &body));

    // 0x1004: struct Yolo
    let mut body = Vec::new();
    p16(&mut body, 3); // field count
    p16(&mut body, 1 << 9); // has unique name
    p32(&mut body, TI_YOLO_FIELDS);
    p32(&mut body, 0); // derived
    p32(&mut body, 0); // vshape
    p16(&mut body, 16); // sizeof, inline numeric leaf
    body.extend_from_slice(b"Yolo\0");
    body.extend_from_slice(b".?AUYolo@@\0");
    records.extend_from_slice(&type_record(leaf::LF_STRUCTURE, &body));

    let mut out = Vec::new();
    p32(&mut out, 20040203); // V80
    p32(&mut out, 56); // header size
    p32(&mut out, 0x1000); // ti_min
    p32(&mut out, 0x1005); // ti_max
    p32(&mut out, records.len() as u32);
    p16(&mut out, hash_stream);
    p16(&mut out, 0xffff); // no aux hash stream
    p32(&mut out, 4); // hash key size
    p32(&mut out, BUCKET_COUNT);
    p32(&mut out, 0); // hash values offset
    p32(&mut out, 4 * 5); // hash values size
    p32(&mut out, 20); // index offsets offset
    p32(&mut out, 0);
    p32(&mut out, 20); // hash adjusters offset
    p32(&mut out, 0);
    out.extend_from_slice(&records);
    out
}

fn build_tpi_hash() -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..4 {
        p32(&mut out, 0); // nameless records hash to bucket 0 here
    }
    p32(&mut out, name_hash_v1("Yolo") % BUCKET_COUNT);
    out
}

fn build_dbi(symbol_stream: u16, section_stream: u16) -> Vec<u8> {
    let mut module = Vec::new();
    p32(&mut module, 0); // opened
    p16(&mut module, 1); // contribution: .text
    p16(&mut module, 0);
    p32(&mut module, 0); // offset
    p32(&mut module, 0x10); // size
    p32(&mut module, 0x6050_0020); // characteristics
    p16(&mut module, 0); // module
    p16(&mut module, 0);
    p32(&mut module, 0); // data crc
    p32(&mut module, 0); // reloc crc
    p16(&mut module, 0); // flags
    p16(&mut module, 0xffff); // no per-module debug stream
    p32(&mut module, 0); // local symbols size
    p32(&mut module, 0); // line numbers size
    p32(&mut module, 0); // c13 line numbers size
    p16(&mut module, 1); // file count
    p16(&mut module, 0);
    p32(&mut module, 0); // opened
    p32(&mut module, 0); // source file name index
    p32(&mut module, 0); // pdb file name index
    module.extend_from_slice(b"minimal.obj\0");
    module.extend_from_slice(b"minimal.obj\0");
    while module.len() % 4 != 0 {
        module.push(0);
    }

    let mut section_map = Vec::new();
    p16(&mut section_map, 2); // segment count
    p16(&mut section_map, 2); // logical segment count
    for (frame, length) in [(1u16, 0x100u32), (2, 0x40)] {
        p16(&mut section_map, 0x10d); // read, execute, 32-bit, selector
        p16(&mut section_map, 0); // logical overlay
        p16(&mut section_map, 0); // group
        p16(&mut section_map, frame);
        p16(&mut section_map, 0xffff); // section name
        p16(&mut section_map, 0xffff); // class name
        p32(&mut section_map, 0); // offset
        p32(&mut section_map, length);
    }

    let mut debug_header = Vec::new();
    for _ in 0..5 {
        p16(&mut debug_header, 0xffff); // fpo through src-to-omap
    }
    p16(&mut debug_header, section_stream);
    for _ in 0..5 {
        p16(&mut debug_header, 0xffff); // token map through original section headers
    }

    let mut out = Vec::new();
    p32(&mut out, 0xffff_ffff); // signature
    p32(&mut out, 19990903); // V70
    p32(&mut out, 1); // age
    p16(&mut out, 0xffff); // global symbol stream
    p16(&mut out, 0); // build version
    p16(&mut out, 0xffff); // public symbol stream
    p16(&mut out, 0); // pdb dll version
    p16(&mut out, symbol_stream);
    p16(&mut out, 0); // pdb dll rbld
    p32(&mut out, module.len() as u32);
    p32(&mut out, 0); // section contributions
    p32(&mut out, section_map.len() as u32);
    p32(&mut out, 0); // file info
    p32(&mut out, 0); // type server map
    p32(&mut out, 0); // mfc type server
    p32(&mut out, debug_header.len() as u32);
    p32(&mut out, 0); // ec info
    p16(&mut out, 0); // flags
    p16(&mut out, 0x8664); // machine
    p32(&mut out, 0); // reserved
    out.extend_from_slice(&module);
    out.extend_from_slice(&section_map);
    out.extend_from_slice(&debug_header);
    out
}

/// Data symbols land in .data (segment 2) eight bytes apart, in declaration
/// order; the entry point is the only code symbol.
fn build_symbols() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&data_sym(sym::S_GDATA32, TI_INT, 0, 2, "_fltused"));
    out.extend_from_slice(&data_sym(
        sym::S_GDATA32,
        TI_CHAR_PTR_PTR,
        8,
        2,
        "global_char_ptr_ptr",
    ));
    out.extend_from_slice(&data_sym(
        sym::S_LDATA32,
        TI_CHAR_PTR_PTR,
        16,
        2,
        "static_global_char_ptr_ptr",
    ));
    out.extend_from_slice(&data_sym(
        sym::S_LDATA32,
        TI_CHAR_PTR_PTR,
        24,
        2,
        "namespaced_global_char_ptr_ptr",
    ));
    out.extend_from_slice(&data_sym(
        sym::S_GDATA32,
        TI_CHAR_PTR_PTR,
        32,
        2,
        "export_global_char_ptr_ptr",
    ));
    out.extend_from_slice(&pub_sym(0, 32, 2, "export_global_char_ptr_ptr"));
    out.extend_from_slice(&pub_sym(2, 0, 1, "WinMainCRTStartup"));

    let mut udt = Vec::new();
    p32(&mut udt, TI_YOLO);
    udt.extend_from_slice(b"Yolo\0");
    out.extend_from_slice(&sym_record(sym::S_UDT, &udt));
    out
}

fn section_header(name: &[u8], virtual_size: u32, rva: u32, characteristics: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let mut raw_name = [0u8; 8];
    raw_name[..name.len()].copy_from_slice(name);
    out.extend_from_slice(&raw_name);
    p32(&mut out, virtual_size);
    p32(&mut out, rva);
    p32(&mut out, virtual_size); // raw size
    p32(&mut out, 0x400); // raw pointer
    p32(&mut out, 0);
    p32(&mut out, 0);
    p16(&mut out, 0);
    p16(&mut out, 0);
    p32(&mut out, characteristics);
    out
}

fn build_sections() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&section_header(b".text", 0x100, TEXT_RVA, 0x6000_0020));
    out.extend_from_slice(&section_header(b".data", 0x40, DATA_RVA, 0xc000_0040));
    out
}

pub fn minimal_pdb() -> Vec<u8> {
    let mut msf = MsfBuilder::new();
    let old_directory = msf.stream(Vec::new());
    let info = msf.stream(build_info());
    let tpi = msf.stream(build_tpi(4));
    let dbi = msf.stream(build_dbi(5, 6));
    let tpi_hash = msf.stream(build_tpi_hash());
    let symbols = msf.stream(build_symbols());
    let sections = msf.stream(build_sections());
    assert_eq!(
        (old_directory, info, tpi, dbi, tpi_hash, symbols, sections),
        (0, 1, 2, 3, 4, 5, 6)
    );
    msf.finish()
}

lazy_static::lazy_static! {
    pub static ref MINIMAL_PDB: Vec<u8> = minimal_pdb();
}
