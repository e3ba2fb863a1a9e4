//! Binary bytecode codec: bit-granular streams, the serializing
//! traversal, and the stack-driven deserializing driver.

pub mod error;
pub mod reader;
pub mod stream;
pub mod widths;
pub mod writer;

pub use error::{BytecodeError, BytecodeErrorKind};
pub use reader::BytecodeReader;
pub use stream::{dump_bytes, BitStreamReader, BitStreamWriter, MAX_ATOM_SIZE};
pub use writer::BytecodeWriter;

use crate::til::{Builder, SExpr};

/// Serializes one expression to an in-memory byte stream.
pub fn write_expr(root: &SExpr) -> Result<Vec<u8>, BytecodeError> {
    let mut writer = BytecodeWriter::new(Vec::new());
    writer.write(root)?;
    writer.finish()
}

/// Reconstructs one expression from an in-memory byte stream.
pub fn read_expr(bytes: &[u8]) -> Result<SExpr, BytecodeError> {
    BytecodeReader::new(Builder::new(), bytes)?.read()
}
