pub mod chunked_reader;
mod handle;
pub mod input;
pub mod provider;
mod reader;

// Mock process for testing (always available for unit and integration tests)
#[doc(hidden)]
pub mod mock;

pub use chunked_reader::{ChunkedMemoryIterator, DEFAULT_CHUNK_SIZE, MemoryChunk};
pub use handle::*;
pub use input::{MediaKey, MediaKeySender, SystemMediaKeys, send_media_key};
pub use provider::{MemoryRegion, ModuleInfo, ProcessInfo, ProcessProvider};
pub use reader::ReadMemory;

#[doc(hidden)]
pub use mock::{MockMemoryBuilder, MockMemoryReader, MockProcess};
