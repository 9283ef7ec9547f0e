mod agent;
mod completion;
pub mod entities;
mod extractor;
mod finalized;
mod injector;
mod pending;
mod transport;
mod watcher;

pub use agent::*;
pub use completion::*;
pub use extractor::*;
pub use finalized::*;
pub use injector::*;
pub use pending::*;
pub use transport::*;
pub use watcher::*;
