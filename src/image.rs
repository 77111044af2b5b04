// The symbol surface of the compiled image itself, for cross-checking
// what the PDB claims: which names exist, their linkage, and the export
// table.

use std::collections::HashSet;

use anyhow::{Context, Result};
use object::{Object, ObjectSymbol};

use crate::sym::Linkage;

#[derive(Debug, Clone)]
pub struct ImageSymbol {
    pub name: String,
    pub address: u64,
    pub linkage: Linkage,
    pub exported: bool,
}

/// Every defined, named symbol in the image.
pub fn symbol_surface(data: &[u8]) -> Result<Vec<ImageSymbol>> {
    let file = object::File::parse(data).context("not a recognized object or image file")?;
    let exports: HashSet<Vec<u8>> = file
        .exports()
        .context("reading the export table")?
        .into_iter()
        .map(|export| export.name().to_vec())
        .collect();

    let mut symbols = Vec::new();
    for symbol in file.symbols() {
        if !symbol.is_definition() {
            continue;
        }
        let name = symbol.name().context("symbol with undecodable name")?;
        if name.is_empty() {
            continue;
        }
        let linkage = match symbol.scope() {
            object::SymbolScope::Compilation => Linkage::Internal,
            _ => Linkage::External,
        };
        symbols.push(ImageSymbol {
            name: name.to_string(),
            address: symbol.address(),
            linkage,
            exported: exports.contains(name.as_bytes()),
        });
    }
    Ok(symbols)
}

/// Names in the image's export table, in file order.
pub fn exported_names(data: &[u8]) -> Result<Vec<String>> {
    let file = object::File::parse(data).context("not a recognized object or image file")?;
    Ok(file
        .exports()
        .context("reading the export table")?
        .into_iter()
        .map(|export| String::from_utf8_lossy(export.name()).into_owned())
        .collect())
}
