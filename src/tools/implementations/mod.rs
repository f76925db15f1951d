// Tool handler implementations

pub mod fs;
pub mod provider_tools;
pub mod search;
pub mod shell;
pub mod todo_tools;

pub use fs::FsTools;
pub use provider_tools::ProviderTools;
pub use search::SearchTools;
pub use shell::ShellTools;
pub use todo_tools::TodoTools;
