pub mod gemini;
pub mod mock_backend;
pub mod mock_store;
pub mod remote_backend;
pub mod slots;

pub use gemini::GeminiAdapter;
pub use mock_backend::MockBackend;
pub use mock_store::MockStore;
pub use remote_backend::RemoteBackend;
pub use slots::{MemorySlots, SqliteSlots};
